use std::collections::HashMap;

use super::selector::{Expression, Selector};

#[derive(Default, Clone, Debug)]
pub struct FilterParams {
    pub labels: Option<Selector>,
    pub limit: Option<u32>,
}

impl FilterParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_labels(mut self, labels: impl Into<Selector>) -> Self {
        self.labels = Some(labels.into());
        self
    }

    pub fn matches<'a>(&self, get: impl Fn(&str) -> Option<&'a str>) -> bool {
        self.labels
            .as_ref()
            .is_none_or(|selector| selector.matches(get))
    }
}

impl From<&FilterParams> for kube::api::ListParams {
    fn from(params: &FilterParams) -> Self {
        let mut list_params = Self::default();
        if let Some(labels) = params.labels.as_ref() {
            list_params = list_params.labels(&labels.to_string());
        }
        if let Some(limit) = params.limit {
            list_params = list_params.limit(limit);
        }
        list_params
    }
}

impl From<&FilterParams> for HashMap<String, Vec<String>> {
    fn from(params: &FilterParams) -> Self {
        let labels = params
            .labels
            .iter()
            .flat_map(Selector::iter)
            .filter_map(Expression::docker_filter)
            .collect::<Vec<_>>();
        if labels.is_empty() {
            HashMap::new()
        } else {
            HashMap::from([("label".to_string(), labels)])
        }
    }
}
