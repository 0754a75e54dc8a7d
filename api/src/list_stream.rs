use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::prelude::*;

use crate::{FilterParams, ListPage, ResourceApi, Result};

const PAGE_SIZE: u32 = 500;

type ListResponse<K> = BoxFuture<'static, Result<ListPage<K>>>;

fn list_request<K>(
    api: Arc<dyn ResourceApi<K>>,
    params: FilterParams,
    continue_token: Option<String>,
) -> ListResponse<K>
where
    K: Send + Sync + 'static,
{
    async move { api.list_page(&params, continue_token).await }.boxed()
}

/// Streams every object matching `params`, following continuation tokens
/// until the server reports no further pages.
pub struct ListStream<K> {
    api: Arc<dyn ResourceApi<K>>,
    params: FilterParams,
    items: VecDeque<K>,
    next: Option<ListResponse<K>>,
}

impl<K> ListStream<K>
where
    K: Send + Sync + 'static,
{
    pub fn new(api: Arc<dyn ResourceApi<K>>, params: &FilterParams) -> Self {
        let mut params = params.clone();
        params.limit.get_or_insert(PAGE_SIZE);
        Self {
            next: Some(list_request(api.clone(), params.clone(), None)),
            api,
            params,
            items: VecDeque::new(),
        }
    }
}

impl<K> Stream for ListStream<K>
where
    K: Send + Sync + Unpin + 'static,
{
    type Item = Result<K>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(item) = this.items.pop_front() {
                return Poll::Ready(Some(Ok(item)));
            }
            let Some(mut next) = this.next.take() else {
                return Poll::Ready(None);
            };
            match next.as_mut().poll(cx) {
                Poll::Ready(Ok(page)) => {
                    this.items.extend(page.items);
                    if let Some(token) = page.continue_token {
                        this.next = Some(list_request(
                            this.api.clone(),
                            this.params.clone(),
                            Some(token),
                        ));
                    }
                }
                Poll::Ready(Err(err)) => return Poll::Ready(Some(Err(err))),
                Poll::Pending => {
                    this.next = Some(next);
                    return Poll::Pending;
                }
            }
        }
    }
}

pub trait ApiListStreamExt<K> {
    fn list_stream(&self, params: &FilterParams) -> ListStream<K>;
}

impl<K> ApiListStreamExt<K> for Arc<dyn ResourceApi<K>>
where
    K: Send + Sync + 'static,
{
    fn list_stream(&self, params: &FilterParams) -> ListStream<K> {
        ListStream::new(self.clone(), params)
    }
}
