use crate::handler::CommandResult;
use crate::scenarios::Expectation;
use serde_json::Value;

/// Check a command result against a partial expectation.
///
/// Returns one line per mismatch; an empty list means the step passed. A
/// `success` mismatch short-circuits the remaining checks.
pub fn match_expectation(actual: &CommandResult, expect: &Expectation) -> Vec<String> {
    let mut failures = Vec::new();

    if actual.is_success() != expect.success {
        failures.push(describe_success_mismatch(actual, expect));
        return failures;
    }

    if !expect.success {
        validate_error_code(actual, expect, &mut failures);
    }

    if let Some(expected) = expect.data.as_ref() {
        validate_data(actual.data(), expected, &mut failures);
    }

    failures
}

fn describe_success_mismatch(actual: &CommandResult, expect: &Expectation) -> String {
    match actual {
        CommandResult::Failure { error } => format!(
            "expected success, command failed with {}: {}",
            error.code, error.message
        ),
        CommandResult::Success { .. } => match expect.error.as_ref() {
            Some(expected) => format!("expected failure {}, command succeeded", expected.code),
            None => "expected failure, command succeeded".to_string(),
        },
    }
}

fn validate_error_code(actual: &CommandResult, expect: &Expectation, failures: &mut Vec<String>) {
    let Some(expected) = expect.error.as_ref() else {
        return;
    };
    let observed = actual.error().map(|error| error.code.as_str());
    if observed != Some(expected.code.as_str()) {
        failures.push(format!(
            "expected error code {:?}, observed {:?}",
            expected.code,
            observed.unwrap_or("<none>")
        ));
    }
}

fn validate_data(actual: Option<&Value>, expected: &Value, failures: &mut Vec<String>) {
    let Some(actual) = actual else {
        failures.push("expected data, command returned none".to_string());
        return;
    };
    let Value::Object(expected_fields) = expected else {
        if !values_equal(actual, expected) {
            failures.push(format!("expected data {expected}, observed {actual}"));
        }
        return;
    };
    let Value::Object(actual_fields) = actual else {
        failures.push(format!("expected object data, observed {actual}"));
        return;
    };
    for (key, expected_value) in expected_fields {
        match actual_fields.get(key) {
            None => failures.push(format!("data missing key {key:?}")),
            Some(actual_value) if !values_equal(actual_value, expected_value) => {
                failures.push(format!(
                    "data.{key}: expected {expected_value}, observed {actual_value}"
                ));
            }
            Some(_) => {}
        }
    }
}

/// Deep equality that treats `1` and `1.0` as the same number.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            if a == b {
                return true;
            }
            // Integer pairs compare exactly; f64 would merge values above 2^53.
            if !a.is_f64() && !b.is_f64() {
                return false;
            }
            match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| values_equal(x, y)))
        }
        _ => left == right,
    }
}
