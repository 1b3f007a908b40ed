//! Variable resolution against the outputs of already-executed steps.
//!
//! Resolution never substitutes `null` for a missing value: a dangling
//! reference aborts the step with an `error` outcome.
use super::reference::{format_path, InputTemplate, PathSegment, StepTarget, VarRef};
use serde_json::Value;

/// Recorded output of an executed step, indexed by step position.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    pub alias: Option<String>,
    pub data: Option<Value>,
}

/// A reference that cannot be satisfied by the steps executed so far.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("{reference}: no previous step has run")]
    NoPreviousStep { reference: String },
    #[error("{reference}: step {index} has not run yet")]
    StepNotRun { reference: String, index: usize },
    #[error("{reference}: no executed step has alias {alias:?}")]
    UnknownAlias { reference: String, alias: String },
    #[error("{reference}: step {index} produced no data")]
    NoData { reference: String, index: usize },
    #[error("{reference}: path `{path}` does not resolve in step {index} output")]
    PathNotFound {
        reference: String,
        index: usize,
        path: String,
    },
}

/// Build the concrete input for a step from its compiled template.
pub fn resolve_input(
    template: &InputTemplate,
    outputs: &[StepOutput],
) -> Result<Value, ResolutionError> {
    match template {
        InputTemplate::Literal(value) => Ok(value.clone()),
        InputTemplate::Reference(reference) => resolve_reference(reference, outputs),
        InputTemplate::Array(items) => items
            .iter()
            .map(|item| resolve_input(item, outputs))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        InputTemplate::Object(entries) => {
            let mut map = serde_json::Map::with_capacity(entries.len());
            for (key, value) in entries {
                map.insert(key.clone(), resolve_input(value, outputs)?);
            }
            Ok(Value::Object(map))
        }
    }
}

/// Resolve one reference. `outputs` holds exactly the executed steps, so
/// `outputs.len()` is the index of the step being resolved.
pub fn resolve_reference(
    reference: &VarRef,
    outputs: &[StepOutput],
) -> Result<Value, ResolutionError> {
    let index = target_index(reference, outputs)?;
    let data = outputs[index]
        .data
        .as_ref()
        .ok_or_else(|| ResolutionError::NoData {
            reference: reference.raw.clone(),
            index,
        })?;
    lookup_path(data, &reference.path)
        .cloned()
        .ok_or_else(|| ResolutionError::PathNotFound {
            reference: reference.raw.clone(),
            index,
            path: format_path(&reference.path),
        })
}

fn target_index(reference: &VarRef, outputs: &[StepOutput]) -> Result<usize, ResolutionError> {
    match &reference.target {
        StepTarget::Prev => outputs
            .len()
            .checked_sub(1)
            .ok_or_else(|| ResolutionError::NoPreviousStep {
                reference: reference.raw.clone(),
            }),
        StepTarget::First => {
            if outputs.is_empty() {
                Err(ResolutionError::StepNotRun {
                    reference: reference.raw.clone(),
                    index: 0,
                })
            } else {
                Ok(0)
            }
        }
        StepTarget::Index(index) => {
            if *index < outputs.len() {
                Ok(*index)
            } else {
                Err(ResolutionError::StepNotRun {
                    reference: reference.raw.clone(),
                    index: *index,
                })
            }
        }
        StepTarget::Alias(alias) => outputs
            .iter()
            .position(|output| output.alias.as_deref() == Some(alias.as_str()))
            .ok_or_else(|| ResolutionError::UnknownAlias {
                reference: reference.raw.clone(),
                alias: alias.clone(),
            }),
    }
}

/// Walk a path through objects and arrays. A key segment that looks like a
/// number also indexes into arrays (`items.0`).
pub fn lookup_path<'a>(value: &'a Value, path: &[PathSegment]) -> Option<&'a Value> {
    let mut current = value;
    for segment in path {
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Object(map)) => map.get(key)?,
            (PathSegment::Key(key), Value::Array(items)) => items.get(key.parse::<usize>().ok()?)?,
            (PathSegment::Index(index), Value::Array(items)) => items.get(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::reference::InputTemplate;
    use serde_json::json;

    fn output(alias: Option<&str>, data: Value) -> StepOutput {
        StepOutput {
            alias: alias.map(str::to_string),
            data: Some(data),
        }
    }

    fn resolve(input: Value, outputs: &[StepOutput]) -> Result<Value, ResolutionError> {
        let template = InputTemplate::compile(&input).expect("compile input");
        resolve_input(&template, outputs)
    }

    #[test]
    fn prev_field_is_substituted_exactly() {
        let outputs = vec![output(None, json!({"id": "abc", "title": "x"}))];
        let resolved = resolve(json!({"id": "$prev.id", "keep": true}), &outputs)
            .expect("resolve prev.id");
        assert_eq!(resolved, json!({"id": "abc", "keep": true}));
    }

    #[test]
    fn whole_outputs_and_nested_positions_resolve() {
        let outputs = vec![
            output(Some("user"), json!({"id": 7, "roles": ["admin", "dev"]})),
            output(None, json!([{"sku": "a"}, {"sku": "b"}])),
        ];
        let resolved = resolve(
            json!({
                "first": "$first",
                "user": "$steps.user.id",
                "role": "$steps[0].roles[1]",
                "items": ["$prev[1].sku", "$prev.0.sku"],
                "deep": {"list": ["$steps.user.roles"]}
            }),
            &outputs,
        )
        .expect("resolve nested");
        assert_eq!(
            resolved,
            json!({
                "first": {"id": 7, "roles": ["admin", "dev"]},
                "user": 7,
                "role": "dev",
                "items": ["b", "a"],
                "deep": {"list": [["admin", "dev"]]}
            })
        );
    }

    #[test]
    fn references_to_future_steps_fail() {
        let outputs = vec![output(None, json!({}))];
        let err = resolve(json!("$steps[1]"), &outputs).expect_err("step 1 has not run");
        assert_eq!(
            err,
            ResolutionError::StepNotRun {
                reference: "$steps[1]".to_string(),
                index: 1
            }
        );
        assert!(matches!(
            resolve(json!("$prev"), &[]),
            Err(ResolutionError::NoPreviousStep { .. })
        ));
        assert!(matches!(
            resolve(json!("$first.id"), &[]),
            Err(ResolutionError::StepNotRun { index: 0, .. })
        ));
    }

    #[test]
    fn missing_paths_and_data_are_errors_not_null() {
        let outputs = vec![
            output(Some("a"), json!({"id": 1})),
            StepOutput {
                alias: None,
                data: None,
            },
        ];
        assert!(matches!(
            resolve(json!("$steps.a.missing"), &outputs),
            Err(ResolutionError::PathNotFound { index: 0, .. })
        ));
        assert!(matches!(
            resolve(json!("$prev"), &outputs),
            Err(ResolutionError::NoData { index: 1, .. })
        ));
        assert!(matches!(
            resolve(json!("$steps.nope"), &outputs),
            Err(ResolutionError::UnknownAlias { .. })
        ));
    }

    #[test]
    fn explicit_null_values_resolve() {
        let outputs = vec![output(None, json!({"parent": null}))];
        let resolved =
            resolve(json!({"parent": "$prev.parent"}), &outputs).expect("null is a value");
        assert_eq!(resolved, json!({"parent": null}));
    }
}
