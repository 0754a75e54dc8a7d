use serde_json::Value;

use crate::resource::{ManagedResource, WorkerResource};

const MAX_VALUE_LEN: usize = 64;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceDiff {
    pub has_changed: bool,
    pub changes: Vec<String>,
}

impl ResourceDiff {
    fn from_changes(changes: Vec<String>) -> Self {
        Self {
            has_changed: !changes.is_empty(),
            changes,
        }
    }

    pub fn unchanged() -> Self {
        Self::default()
    }
}

/// Compares a current object against the desired one.
///
/// Fields present in the desired document are compared everywhere. Fields it
/// leaves out count as drift only under the kind's `OWNED_PATHS`, so values
/// the backend fills in on its own elsewhere are ignored. A current object
/// that reports a newer revision than desired is always left alone.
pub fn diff<T>(
    current: &WorkerResource<T>,
    desired: &WorkerResource<T>,
) -> serde_json::Result<ResourceDiff>
where
    T: ManagedResource,
{
    if current.revision > desired.revision {
        return Ok(ResourceDiff::unchanged());
    }
    let mut changes = Vec::new();
    compare(
        "",
        Some(&current.resource.comparable()?),
        &desired.resource.comparable()?,
        T::OWNED_PATHS,
        &mut changes,
    );
    changes.extend(current.resource.health());
    Ok(ResourceDiff::from_changes(changes))
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn display(value: Option<&Value>) -> String {
    let Some(value) = value else {
        return "<none>".to_string();
    };
    let mut text = value.to_string();
    if text.len() > MAX_VALUE_LEN {
        let mut end = MAX_VALUE_LEN;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
        text.push_str("...");
    }
    text
}

fn is_owned(path: &str, owned: &[&str]) -> bool {
    owned.iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(['.', '[']))
    })
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(fields)) => fields.is_empty(),
        Some(_) => false,
    }
}

fn compare(
    path: &str,
    current: Option<&Value>,
    desired: &Value,
    owned: &[&str],
    changes: &mut Vec<String>,
) {
    match desired {
        Value::Null => {
            if is_owned(path, owned) && !is_empty(current) {
                changes.push(format!("{path}: {} -> {}", display(current), display(None)));
            }
        }
        Value::Object(fields) => {
            for (key, value) in fields {
                let current = current.and_then(|current| current.get(key));
                compare(&join(path, key), current, value, owned, changes);
            }
            if !is_owned(path, owned) {
                return;
            }
            let Some(Value::Object(current_fields)) = current else {
                return;
            };
            for (key, value) in current_fields {
                if !fields.contains_key(key) && !is_empty(Some(value)) {
                    changes.push(format!(
                        "{}: {} -> {}",
                        join(path, key),
                        display(Some(value)),
                        display(None)
                    ));
                }
            }
        }
        Value::Array(items) => {
            let current_items = current.and_then(Value::as_array);
            let current_len = current_items.map(Vec::len).unwrap_or_default();
            if current_len != items.len() {
                changes.push(format!(
                    "{path}: {} -> {}",
                    display(current),
                    display(Some(desired))
                ));
                return;
            }
            for (index, item) in items.iter().enumerate() {
                let current = current_items.and_then(|current| current.get(index));
                compare(&format!("{path}[{index}]"), current, item, owned, changes);
            }
        }
        _ => {
            if current != Some(desired) {
                changes.push(format!(
                    "{path}: {} -> {}",
                    display(current),
                    display(Some(desired))
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;
    use userworkers::k8s_openapi::api::core::v1::{LocalObjectReference, PodSpec};
    use userworkers::{ContainerRecord, ContainerSpec, MessageQueueTrigger, MessageQueueTriggerSpec};
    use uuid::Uuid;

    use super::*;

    fn container(revision: u64, env: &[(&str, &str)], state: &str) -> WorkerResource<ContainerRecord> {
        WorkerResource {
            id: Uuid::nil(),
            revision,
            resource: ContainerRecord {
                id: "abc".into(),
                spec: ContainerSpec {
                    name: "worker-a".into(),
                    image: "worker:latest".into(),
                    env: env
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect::<BTreeMap<_, _>>(),
                    tty: true,
                    ..Default::default()
                },
                state: Some(state.into()),
            },
        }
    }

    #[test]
    fn test_extra_current_fields_are_ignored() {
        let current = container(1, &[("WORKER_ID", "a"), ("PATH", "/bin")], "running");
        let desired = container(1, &[("WORKER_ID", "a")], "");
        assert_eq!(diff(&current, &desired).unwrap(), ResourceDiff::unchanged());
    }

    #[test]
    fn test_changed_field_reports_path() {
        let current = container(1, &[("WORKER_ID", "a")], "running");
        let desired = container(2, &[("WORKER_ID", "b")], "");
        let diff = diff(&current, &desired).unwrap();
        assert!(diff.has_changed);
        assert_eq!(diff.changes, vec![r#"env.WORKER_ID: "a" -> "b""#]);
    }

    #[test]
    fn test_newer_current_revision_is_kept() {
        let current = container(3, &[("WORKER_ID", "a")], "exited");
        let desired = container(2, &[("WORKER_ID", "b")], "");
        assert!(!diff(&current, &desired).unwrap().has_changed);
    }

    #[test]
    fn test_unhealthy_container_changes() {
        let current = container(1, &[], "exited");
        let desired = container(1, &[], "");
        assert_eq!(
            diff(&current, &desired).unwrap().changes,
            vec!["state: exited".to_string()]
        );
    }

    #[test]
    fn test_arrays_and_truncation() {
        let mut changes = Vec::new();
        compare(
            "",
            Some(&json!({"env": [{"name": "A", "value": "1"}]})),
            &json!({"env": [{"name": "A", "value": "2"}]}),
            &[],
            &mut changes,
        );
        assert_eq!(changes, vec![r#"env[0].value: "1" -> "2""#]);

        changes.clear();
        let long = "x".repeat(100);
        compare("", Some(&json!({})), &json!({ "literal": long }), &[], &mut changes);
        assert!(changes[0].starts_with("literal: <none> -> \"xxx"));
        assert!(changes[0].ends_with("..."));

        changes.clear();
        compare("", None, &json!({ "list": [] }), &[], &mut changes);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_owned_paths_report_dropped_fields() {
        let current = json!({
            "metadata": {"labels": {"a": "1", "stale": "x"}, "uid": "u"},
            "spec": {"secrets": ["old"], "image": "v1", "extra": null, "list": []},
        });
        let desired = json!({
            "metadata": {"labels": {"a": "1"}},
            "spec": {"image": "v1", "secret": null},
        });
        let mut changes = Vec::new();
        compare("", Some(&current), &desired, &["metadata.labels", "spec"], &mut changes);
        assert_eq!(
            changes,
            vec![
                r#"metadata.labels.stale: "x" -> <none>"#,
                r#"spec.secrets: ["old"] -> <none>"#,
            ]
        );

        changes.clear();
        compare("", Some(&current), &desired, &[], &mut changes);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_dropped_pull_secret_is_drift() {
        let trigger = |secrets: Option<Vec<LocalObjectReference>>| WorkerResource {
            id: Uuid::nil(),
            revision: 1,
            resource: MessageQueueTrigger::new(
                "worker-a",
                MessageQueueTriggerSpec {
                    pod_spec: Some(PodSpec {
                        image_pull_secrets: secrets,
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ),
        };
        let current = trigger(Some(vec![LocalObjectReference {
            name: "old-secret".into(),
        }]));
        let desired = trigger(None);
        let diff = diff(&current, &desired).unwrap();
        assert!(diff.has_changed);
        assert!(
            diff.changes[0].starts_with("spec.podspec.imagePullSecrets: "),
            "{:?}",
            diff.changes
        );
        assert!(!super::diff(&desired, &desired).unwrap().has_changed);
    }
}
