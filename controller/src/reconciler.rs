use tokio_util::sync::CancellationToken;
use userworkers::{Pagination, Store, WorkerFilters};

use crate::backend::{Backend, Scope};
use crate::error::{ApplyErrors, ReconcileError};

/// Drives one backend towards the enabled workers of a store.
///
/// A pass first removes wandering resources, then walks the store page by
/// page: desired state, current state, plan, apply. Apply failures do not stop
/// the pass; they are returned together once every page has been handled.
pub struct Reconciler<B, S> {
    pub(crate) backend: B,
    pub(crate) store: S,
    page_size: u32,
}

impl<B, S> Reconciler<B, S>
where
    B: Backend,
    S: Store,
{
    pub fn new(backend: B, store: S) -> Self {
        Self {
            backend,
            store,
            page_size: B::PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: Option<u32>) -> Self {
        if let Some(page_size) = page_size {
            self.page_size = page_size;
        }
        self
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[tracing::instrument(skip_all, fields(backend = B::NAME))]
    pub async fn reconcile(&self, cancel: &CancellationToken) -> Result<(), ReconcileError> {
        tracing::info!("Reconciling...");
        let mut failures = ApplyErrors::default();
        self.delete_wandering(cancel, &mut failures).await?;

        let filters = WorkerFilters::enabled();
        let mut pagination = Pagination::first(self.page_size);
        loop {
            if cancel.is_cancelled() {
                failures.cancelled = true;
                break;
            }
            let page = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    failures.cancelled = true;
                    break;
                }
                page = self.store.list_user_workers(&filters, &pagination) => {
                    page.map_err(ReconcileError::ListWorkers)?
                }
            };
            tracing::info!("Reconciling {} user workers...", page.data.len());

            let ids = page.data.iter().map(|worker| worker.id).collect();
            let desired = self.backend.desired_state(&page.data);
            let current = self
                .backend
                .current_state(Scope::Workers(ids), cancel)
                .await
                .map_err(ReconcileError::current_state)?;
            let work = self
                .backend
                .plan(&current, &desired)
                .map_err(ReconcileError::Plan)?;
            if let Err(errors) = self.backend.apply(work, cancel).await {
                tracing::error!("Error applying work: {errors}");
                failures.extend(errors);
            }

            match page.cursor {
                Some(cursor) => pagination = pagination.next(cursor),
                None => break,
            }
        }
        failures.into_result().map_err(ReconcileError::from)?;
        tracing::info!("Reconciliation finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use userworkers::{Package, WorkerLabels};

    use super::*;
    use crate::error::Action;
    use crate::testing::{FissionFixture, enabled_worker};

    fn all_kinds(action: &str, name: &str) -> Vec<String> {
        ["Package", "Function", "MessageQueueTrigger"]
            .iter()
            .map(|kind| format!("{action} {kind} {name}"))
            .collect()
    }

    fn name(worker: &userworkers::UserWorker) -> String {
        format!("worker-{}", worker.id)
    }

    #[tokio::test]
    async fn test_worker_lifecycle() {
        let mut worker = enabled_worker("print(1)");
        let fx = FissionFixture::new([worker.clone()]);
        let cancel = CancellationToken::new();

        fx.reconciler.reconcile(&cancel).await.unwrap();
        assert_eq!(fx.journal.take(), all_kinds("create", &name(&worker)));
        let function = fx.functions.get(&name(&worker)).unwrap();
        let labels = function.metadata.labels.unwrap();
        assert_eq!(labels["worker-revision"], "1");
        assert_eq!(labels["worker-id"], worker.id.to_string());
        assert_eq!(labels["controlled-by"], "userworkers");

        fx.reconciler.reconcile(&cancel).await.unwrap();
        assert!(fx.journal.take().is_empty());

        worker.set_source(b"print(2)".to_vec());
        worker.commit();
        fx.reconciler.store().upsert(worker.clone());
        fx.reconciler.reconcile(&cancel).await.unwrap();
        assert_eq!(fx.journal.take(), all_kinds("update", &name(&worker)));
        let package = fx.packages.get(&name(&worker)).unwrap();
        assert_eq!(
            package.spec.source.literal.unwrap().0,
            b"print(2)".to_vec()
        );
        assert_eq!(
            package.metadata.labels.unwrap()["worker-revision"],
            "2"
        );

        worker.disable();
        worker.commit();
        fx.reconciler.store().upsert(worker.clone());
        fx.reconciler.reconcile(&cancel).await.unwrap();
        assert_eq!(fx.journal.take(), all_kinds("delete", &name(&worker)));
        assert!(fx.functions.names().is_empty());
        assert!(fx.packages.names().is_empty());
        assert!(fx.triggers.names().is_empty());
    }

    #[tokio::test]
    async fn test_newer_backend_revision_is_not_overwritten() {
        let worker = enabled_worker("print(1)");
        let fx = FissionFixture::new([worker.clone()]);
        let mut newer = worker.clone();
        newer.revision = 5;
        newer.set_source(b"print(5)".to_vec());
        fx.seed(&newer);

        fx.reconciler.reconcile(&CancellationToken::new()).await.unwrap();
        assert!(fx.journal.take().is_empty());
        let package = fx.packages.get(&name(&worker)).unwrap();
        assert_eq!(package.spec.source.literal.unwrap().0, b"print(5)".to_vec());
    }

    #[tokio::test]
    async fn test_wandering_workers_are_deleted() {
        let (a, b, c) = (
            enabled_worker("a"),
            enabled_worker("b"),
            enabled_worker("c"),
        );
        let fx = FissionFixture::new([a.clone(), c.clone()]);
        for worker in [&a, &b, &c] {
            fx.seed(worker);
        }

        fx.reconciler.reconcile(&CancellationToken::new()).await.unwrap();
        assert_eq!(fx.journal.take(), all_kinds("delete", &name(&b)));
        let mut remaining = vec![name(&a), name(&c)];
        remaining.sort();
        assert_eq!(fx.functions.names(), remaining);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_pass() {
        let (a, b) = (enabled_worker("a"), enabled_worker("b"));
        let fx = FissionFixture::new([a.clone(), b.clone()]);
        fx.packages.fail("create", &name(&a));

        let err = fx
            .reconciler
            .reconcile(&CancellationToken::new())
            .await
            .unwrap_err();
        let ReconcileError::Apply(errors) = err else {
            panic!("expected apply errors, got {err}");
        };
        assert_eq!(errors.errors.len(), 1);
        assert_eq!(errors.errors[0].action, Action::Create);
        assert_eq!(errors.errors[0].kind, "Package");
        assert_eq!(errors.errors[0].name, name(&a));
        assert_eq!(fx.packages.names(), vec![name(&b)]);
        assert_eq!(fx.functions.names().len(), 2);
        assert_eq!(fx.triggers.names().len(), 2);
    }

    #[tokio::test]
    async fn test_apply_order() {
        let mut a = enabled_worker("a");
        let b = enabled_worker("b");
        let stale = a.clone();
        a.set_source(b"a2".to_vec());
        a.commit();
        let fx = FissionFixture::new([a.clone(), b.clone()]);
        fx.seed(&stale);
        let mut duplicate: Package = fx.reconciler.backend().desired_package(&stale).resource;
        duplicate.metadata.name = Some("duplicate".to_string());
        duplicate.metadata.labels = Some(WorkerLabels::new("userworkers", a.id, 0).to_map());
        fx.packages.insert(duplicate);

        fx.reconciler.reconcile(&CancellationToken::new()).await.unwrap();
        let (a, b) = (name(&a), name(&b));
        assert_eq!(
            fx.journal.take(),
            vec![
                "delete Package duplicate".to_string(),
                format!("update Package {a}"),
                format!("create Package {b}"),
                format!("update Function {a}"),
                format!("create Function {b}"),
                format!("update MessageQueueTrigger {a}"),
                format!("create MessageQueueTrigger {b}"),
            ]
        );
    }

    #[tokio::test]
    async fn test_every_page_is_reconciled() {
        let workers = (0..5)
            .map(|i| enabled_worker(&i.to_string()))
            .collect::<Vec<_>>();
        let FissionFixture {
            journal,
            triggers,
            reconciler,
            ..
        } = FissionFixture::new(workers);
        let reconciler = reconciler.with_page_size(Some(2));
        let cancel = CancellationToken::new();

        reconciler.reconcile(&cancel).await.unwrap();
        assert_eq!(journal.take().len(), 15);
        assert_eq!(triggers.names().len(), 5);

        // Owned objects now span several list pages.
        reconciler.reconcile(&cancel).await.unwrap();
        assert!(journal.take().is_empty());
    }

    #[tokio::test]
    async fn test_objects_with_bad_labels_are_skipped() {
        let fx = FissionFixture::new([]);
        let mut foreign = fx
            .reconciler
            .backend()
            .desired_function(&enabled_worker("x"))
            .resource;
        foreign.metadata.name = Some("foreign".to_string());
        foreign.metadata.labels = Some(BTreeMap::from([
            ("controlled-by".to_string(), "userworkers".to_string()),
            ("worker-id".to_string(), "not-a-uuid".to_string()),
            ("worker-revision".to_string(), "1".to_string()),
        ]));
        fx.functions.insert(foreign);

        fx.reconciler.reconcile(&CancellationToken::new()).await.unwrap();
        assert!(fx.journal.take().is_empty());
        assert_eq!(fx.functions.names(), vec!["foreign".to_string()]);
    }

    #[tokio::test]
    async fn test_list_failure_is_fatal() {
        let fx = FissionFixture::new([enabled_worker("a")]);
        fx.triggers.fail_list();
        let err = fx
            .reconciler
            .reconcile(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Wandering(_)), "{err}");
        assert!(fx.journal.take().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_pass_makes_no_calls() {
        let fx = FissionFixture::new([enabled_worker("a")]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            fx.reconciler.reconcile(&cancel).await,
            Err(ReconcileError::Cancelled)
        ));
        assert!(fx.journal.take().is_empty());
    }
}
