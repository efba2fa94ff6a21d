//! Test assertions for invocation reports.

use crate::errors::{ErrorKind, Result};
use crate::runtime::InvocationReport;

/// Asserts the entry point returned `expected`.
pub fn assert_result(report: &InvocationReport, expected: &serde_json::Value) {
    assert_eq!(
        report.result.as_ref(),
        Some(expected),
        "Expected result {:?} from '{}', got {:?}",
        expected,
        report.module,
        report.result
    );
}

/// Asserts an output slot holds `expected`.
pub fn assert_output_value(report: &InvocationReport, slot: &str, expected: &serde_json::Value) {
    let actual = report.output(slot);
    assert_eq!(
        actual,
        Some(expected),
        "Expected value {:?} for slot '{}', got {:?}",
        expected,
        slot,
        actual
    );
}

/// Asserts an output slot was not produced.
pub fn assert_output_absent(report: &InvocationReport, slot: &str) {
    assert!(
        report.output(slot).is_none(),
        "Expected slot '{}' to be absent. Slots: {:?}",
        slot,
        report.outputs.keys().collect::<Vec<_>>()
    );
}

/// Asserts `result` failed with an error of `expected` kind.
pub fn assert_error_kind<T: std::fmt::Debug>(result: &Result<T>, expected: ErrorKind) {
    match result {
        Ok(value) => panic!("Expected {expected:?} error, got Ok({value:?})"),
        Err(err) => assert_eq!(
            err.kind(),
            expected,
            "Expected {:?} error, got {:?}: {}",
            expected,
            err.kind(),
            err
        ),
    }
}
