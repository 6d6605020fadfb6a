// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Custom Test Assertions
//!
//! Assertion helpers for attribute results and engine errors, with
//! failure messages that name the attribute or error involved.

use std::fmt::Debug;

use ualink_core::{AttributeId, AttributeSet, ErrorKind, StatusCode, UaResult, Value};

// =============================================================================
// AttributeSet Assertions
// =============================================================================

/// Assertion extensions for [`AttributeSet`].
pub trait AttributeSetAssertions {
    /// Assert that the attribute was read with a good status.
    fn assert_good(&self, attribute: AttributeId);

    /// Assert the status of one attribute.
    fn assert_status(&self, attribute: AttributeId, expected: StatusCode);

    /// Assert that every attribute carries `expected` and no value.
    fn assert_all_failed_with(&self, expected: StatusCode);

    /// Assert the value of one attribute.
    fn assert_value(&self, attribute: AttributeId, expected: &Value);
}

impl AttributeSetAssertions for AttributeSet {
    fn assert_good(&self, attribute: AttributeId) {
        match self.status(attribute) {
            Some(status) => assert!(
                status.is_good(),
                "Expected {} to be good, got {}",
                attribute,
                status
            ),
            None => panic!("{} missing from result", attribute),
        }
    }

    fn assert_status(&self, attribute: AttributeId, expected: StatusCode) {
        assert_eq!(
            self.status(attribute),
            Some(expected),
            "Unexpected status for {}",
            attribute
        );
    }

    fn assert_all_failed_with(&self, expected: StatusCode) {
        assert!(!self.is_empty(), "Result set is empty");
        for (attribute, result) in self.iter() {
            assert_eq!(result.status, expected, "Unexpected status for {}", attribute);
            assert!(
                result.value.is_none(),
                "{} carries a value despite status {}",
                attribute,
                result.status
            );
        }
    }

    fn assert_value(&self, attribute: AttributeId, expected: &Value) {
        assert_eq!(
            self.value(attribute),
            Some(expected),
            "Unexpected value for {}",
            attribute
        );
    }
}

// =============================================================================
// Error Assertions
// =============================================================================

/// Assert that `result` failed with an error of `kind`.
pub fn assert_error_kind<T: Debug>(result: &UaResult<T>, kind: ErrorKind) {
    match result {
        Ok(value) => panic!("Expected {:?} error, got Ok({:?})", kind, value),
        Err(err) => assert_eq!(err.kind(), kind, "Unexpected error: {}", err),
    }
}

/// Assert that `value` is a Double within `tolerance` of `expected`.
pub fn assert_double(value: &Value, expected: f64, tolerance: f64) {
    match value {
        Value::Double(actual) => assert!(
            (actual - expected).abs() <= tolerance,
            "Expected {} ± {}, got {}",
            expected,
            tolerance,
            actual
        ),
        other => panic!("Expected a Double, got {:?}", other),
    }
}
