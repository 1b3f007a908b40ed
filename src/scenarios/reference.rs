//! Variable references between steps, parsed once per scenario.
//!
//! A step input is compiled into an [`InputTemplate`] whose reference leaves
//! are already split into a step target and path segments, so resolution
//! never rescans strings.
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;

const PREV: &str = "$prev";
const FIRST: &str = "$first";
const STEPS: &str = "$steps";

/// Which earlier step a reference reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepTarget {
    Prev,
    First,
    Index(usize),
    Alias(String),
}

/// One hop inside a step output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{key}"),
            PathSegment::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// Render a path the way it is written in scenarios (`items[0].id`).
pub fn format_path(path: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in path {
        if matches!(segment, PathSegment::Key(_)) && !out.is_empty() {
            out.push('.');
        }
        out.push_str(&segment.to_string());
    }
    out
}

/// Pre-parsed reference such as `$steps.user.profile.id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarRef {
    pub raw: String,
    pub target: StepTarget,
    pub path: Vec<PathSegment>,
}

impl fmt::Display for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A string that starts like a reference but cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid reference {reference:?}: {reason}")]
pub struct ReferenceError {
    pub reference: String,
    pub reason: String,
}

impl ReferenceError {
    fn new(reference: &str, reason: impl Into<String>) -> Self {
        Self {
            reference: reference.to_string(),
            reason: reason.into(),
        }
    }
}

/// Step input with references lifted out of the JSON tree.
#[derive(Debug, Clone, PartialEq)]
pub enum InputTemplate {
    Literal(Value),
    Reference(VarRef),
    Array(Vec<InputTemplate>),
    Object(Vec<(String, InputTemplate)>),
}

impl InputTemplate {
    /// Compile a declared input. Subtrees without references collapse into a
    /// single literal.
    pub fn compile(input: &Value) -> Result<Self, ReferenceError> {
        match input {
            Value::String(text) => match parse_reference(text) {
                Some(reference) => Ok(InputTemplate::Reference(reference?)),
                None => Ok(InputTemplate::Literal(input.clone())),
            },
            Value::Array(items) => {
                let compiled = items
                    .iter()
                    .map(InputTemplate::compile)
                    .collect::<Result<Vec<_>, _>>()?;
                if compiled.iter().all(InputTemplate::is_literal) {
                    return Ok(InputTemplate::Literal(input.clone()));
                }
                Ok(InputTemplate::Array(compiled))
            }
            Value::Object(map) => {
                let mut compiled = Vec::with_capacity(map.len());
                for (key, value) in map {
                    compiled.push((key.clone(), InputTemplate::compile(value)?));
                }
                if compiled.iter().all(|(_, value)| value.is_literal()) {
                    return Ok(InputTemplate::Literal(input.clone()));
                }
                Ok(InputTemplate::Object(compiled))
            }
            _ => Ok(InputTemplate::Literal(input.clone())),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, InputTemplate::Literal(_))
    }

    /// All references in declaration order.
    pub fn references(&self) -> Vec<&VarRef> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a VarRef>) {
        match self {
            InputTemplate::Literal(_) => {}
            InputTemplate::Reference(reference) => out.push(reference),
            InputTemplate::Array(items) => {
                for item in items {
                    item.collect_references(out);
                }
            }
            InputTemplate::Object(entries) => {
                for (_, value) in entries {
                    value.collect_references(out);
                }
            }
        }
    }
}

/// Parse a string as a reference.
///
/// Returns `None` for ordinary strings. Only `$prev`, `$first` and `$steps`
/// followed by end of string, `.` or `[` are references; `"$5.00"` or
/// `"$previous"` stay literal.
pub fn parse_reference(raw: &str) -> Option<Result<VarRef, ReferenceError>> {
    let head = [PREV, FIRST, STEPS].into_iter().find(|head| {
        raw.strip_prefix(head)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('.') || rest.starts_with('['))
    })?;
    let rest = &raw[head.len()..];
    let parsed = match head {
        PREV => parse_tail(raw, rest).map(|path| (StepTarget::Prev, path)),
        FIRST => parse_tail(raw, rest).map(|path| (StepTarget::First, path)),
        _ => parse_steps(raw, rest),
    };
    Some(parsed.map(|(target, path)| VarRef {
        raw: raw.to_string(),
        target,
        path,
    }))
}

fn parse_steps(raw: &str, rest: &str) -> Result<(StepTarget, Vec<PathSegment>), ReferenceError> {
    if rest.is_empty() {
        return Err(ReferenceError::new(
            raw,
            "`$steps` needs an index (`$steps[0]`) or an alias (`$steps.name`)",
        ));
    }
    if rest.starts_with('[') {
        let captures = step_index_regex()
            .captures(rest)
            .ok_or_else(|| ReferenceError::new(raw, "step index must be a non-negative integer"))?;
        let digits = &captures[1];
        let index: usize = digits
            .parse()
            .map_err(|_| ReferenceError::new(raw, format!("step index {digits} is out of range")))?;
        let path = parse_tail(raw, &rest[captures[0].len()..])?;
        return Ok((StepTarget::Index(index), path));
    }
    let after_dot = &rest[1..];
    let alias_end = after_dot
        .find(|c: char| c == '.' || c == '[')
        .unwrap_or(after_dot.len());
    let alias = &after_dot[..alias_end];
    if alias.is_empty() {
        return Err(ReferenceError::new(raw, "missing step alias after `$steps.`"));
    }
    let path = parse_tail(raw, &after_dot[alias_end..])?;
    Ok((StepTarget::Alias(alias.to_string()), path))
}

fn parse_tail(raw: &str, tail: &str) -> Result<Vec<PathSegment>, ReferenceError> {
    if tail.is_empty() {
        return Ok(Vec::new());
    }
    if let Some(path) = tail.strip_prefix('.') {
        if path.is_empty() {
            return Err(ReferenceError::new(raw, "empty path after `.`"));
        }
        return parse_path(raw, path);
    }
    if tail.starts_with('[') {
        return parse_path(raw, tail);
    }
    Err(ReferenceError::new(
        raw,
        format!("unexpected text {tail:?} after step selector"),
    ))
}

fn parse_path(raw: &str, path: &str) -> Result<Vec<PathSegment>, ReferenceError> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        let captures = path_part_regex()
            .captures(part)
            .ok_or_else(|| ReferenceError::new(raw, format!("malformed path segment {part:?}")))?;
        let name = captures.get(1).map_or("", |m| m.as_str());
        let indices = captures.get(2).map_or("", |m| m.as_str());
        if name.is_empty() && indices.is_empty() {
            return Err(ReferenceError::new(raw, "empty path segment"));
        }
        if !name.is_empty() {
            segments.push(PathSegment::Key(name.to_string()));
        }
        for index in index_regex().captures_iter(indices) {
            let digits = &index[1];
            let value: usize = digits.parse().map_err(|_| {
                ReferenceError::new(raw, format!("array index {digits} is out of range"))
            })?;
            segments.push(PathSegment::Index(value));
        }
    }
    Ok(segments)
}

fn step_index_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[(\d+)\]").expect("valid step index regex"))
}

fn path_part_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([^\[\]]*)((?:\[\d+\])*)$").expect("valid path regex"))
}

fn index_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[(\d+)\]").expect("valid index regex"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parsed(raw: &str) -> VarRef {
        parse_reference(raw)
            .expect("is a reference")
            .expect("parses cleanly")
    }

    #[test]
    fn plain_strings_are_not_references() {
        for raw in ["hello", "$5.00", "$previous", "$stepsize", "prev", ""] {
            assert!(parse_reference(raw).is_none(), "{raw} should be literal");
        }
    }

    #[test]
    fn parses_each_target_form() {
        assert_eq!(parsed("$prev").target, StepTarget::Prev);
        assert_eq!(parsed("$first").target, StepTarget::First);
        assert_eq!(parsed("$steps[2]").target, StepTarget::Index(2));
        assert_eq!(
            parsed("$steps.user").target,
            StepTarget::Alias("user".to_string())
        );
    }

    #[test]
    fn parses_nested_paths_with_indices() {
        let reference = parsed("$steps.list.items[0].tags[1]");
        assert_eq!(reference.target, StepTarget::Alias("list".to_string()));
        assert_eq!(
            reference.path,
            vec![
                PathSegment::Key("items".to_string()),
                PathSegment::Index(0),
                PathSegment::Key("tags".to_string()),
                PathSegment::Index(1),
            ]
        );
        assert_eq!(format_path(&reference.path), "items[0].tags[1]");

        let indexed = parsed("$steps[1].id");
        assert_eq!(indexed.target, StepTarget::Index(1));
        assert_eq!(indexed.path, vec![PathSegment::Key("id".to_string())]);

        let bare_index = parsed("$prev[3]");
        assert_eq!(bare_index.path, vec![PathSegment::Index(3)]);
    }

    #[test]
    fn malformed_references_are_errors() {
        let malformed = [
            "$steps",
            "$steps[x]",
            "$steps.",
            "$prev.",
            "$prev..id",
            "$steps[1]id",
            "$first.a]",
        ];
        for raw in malformed {
            let result = parse_reference(raw).expect("looks like a reference");
            assert!(result.is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn compile_collapses_literal_subtrees() {
        let template = InputTemplate::compile(&json!({"a": [1, 2], "b": {"c": "x"}}))
            .expect("compile literal");
        assert!(template.is_literal());

        let template = InputTemplate::compile(&json!({"a": [1, "$prev.id"], "b": "lit"}))
            .expect("compile with reference");
        assert!(!template.is_literal());
        let references = template.references();
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].raw, "$prev.id");
    }

    #[test]
    fn compile_surfaces_first_malformed_reference() {
        let err = InputTemplate::compile(&json!({"id": "$steps[oops]"}))
            .expect_err("malformed reference");
        assert_eq!(err.reference, "$steps[oops]");
    }
}
