//! Argument matchers used by behavior definitions and assertions.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;
use tracing::warn;

/// Matches a single argument of a call.
///
/// A plain `null` converted into a matcher means "any value", so a pattern
/// written with `null` placeholders matches every call of that method.
#[derive(Clone)]
pub enum ArgumentMatcher {
    /// Structural equality with the given value.
    Eq(Value),
    /// Matches every value.
    Any,
    /// Matches every value except `null`.
    NotNull,
    /// Matches only `null`.
    Null,
    /// Matches when the predicate holds.
    Predicate {
        description: String,
        predicate: Rc<dyn Fn(&Value) -> bool>,
    },
}

impl ArgumentMatcher {
    /// Returns true if `value` satisfies this matcher.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ArgumentMatcher::Eq(expected) => expected == value,
            ArgumentMatcher::Any => true,
            ArgumentMatcher::NotNull => !value.is_null(),
            ArgumentMatcher::Null => value.is_null(),
            ArgumentMatcher::Predicate { predicate, .. } => predicate(value),
        }
    }
}

impl fmt::Debug for ArgumentMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for ArgumentMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentMatcher::Eq(value) => write!(f, "{value}"),
            ArgumentMatcher::Any => f.write_str("any()"),
            ArgumentMatcher::NotNull => f.write_str("not_null()"),
            ArgumentMatcher::Null => f.write_str("is_null()"),
            ArgumentMatcher::Predicate { description, .. } => write!(f, "matching({description})"),
        }
    }
}

impl From<Value> for ArgumentMatcher {
    fn from(value: Value) -> Self {
        if value.is_null() {
            ArgumentMatcher::Any
        } else {
            ArgumentMatcher::Eq(value)
        }
    }
}

impl From<&str> for ArgumentMatcher {
    fn from(value: &str) -> Self {
        ArgumentMatcher::Eq(Value::from(value))
    }
}

impl From<i64> for ArgumentMatcher {
    fn from(value: i64) -> Self {
        ArgumentMatcher::Eq(Value::from(value))
    }
}

impl From<bool> for ArgumentMatcher {
    fn from(value: bool) -> Self {
        ArgumentMatcher::Eq(Value::from(value))
    }
}

/// Matches values structurally equal to `value`.
///
/// A value that cannot be represented as JSON yields a matcher that matches
/// nothing.
pub fn eq<T: Serialize>(value: T) -> ArgumentMatcher {
    match serde_json::to_value(value) {
        Ok(value) => ArgumentMatcher::Eq(value),
        Err(e) => {
            warn!(error = %e, "Expected argument cannot be represented as JSON");
            ArgumentMatcher::Predicate {
                description: format!("unserializable value: {e}"),
                predicate: Rc::new(|_| false),
            }
        }
    }
}

pub fn any() -> ArgumentMatcher {
    ArgumentMatcher::Any
}

pub fn not_null() -> ArgumentMatcher {
    ArgumentMatcher::NotNull
}

pub fn is_null() -> ArgumentMatcher {
    ArgumentMatcher::Null
}

/// Matches values for which `predicate` returns true.
pub fn matching(
    description: impl Into<String>,
    predicate: impl Fn(&Value) -> bool + 'static,
) -> ArgumentMatcher {
    ArgumentMatcher::Predicate {
        description: description.into(),
        predicate: Rc::new(predicate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_eq_is_structural() {
        assert!(eq(vec![1, 2]).matches(&json!([1, 2])));
        assert!(!eq(vec![1, 2]).matches(&json!([2, 1])));
        assert!(eq("text").matches(&json!("text")));
    }

    #[test]
    fn test_null_converts_to_any() {
        let matcher = ArgumentMatcher::from(Value::Null);
        assert!(matcher.matches(&json!("anything")));
        assert!(matcher.matches(&Value::Null));
    }

    #[test]
    fn test_eq_null_only_matches_null() {
        assert!(eq(Option::<i32>::None).matches(&Value::Null));
        assert!(!eq(Option::<i32>::None).matches(&json!(0)));
    }

    #[test]
    fn test_null_matchers() {
        assert!(not_null().matches(&json!(0)));
        assert!(!not_null().matches(&Value::Null));
        assert!(is_null().matches(&Value::Null));
        assert!(!is_null().matches(&json!("")));
    }

    #[test]
    fn test_predicate() {
        let starts_with_update = matching("starts with update", |v| {
            v.as_str().is_some_and(|s| s.starts_with("update"))
        });
        assert!(starts_with_update.matches(&json!("update t set a=?")));
        assert!(!starts_with_update.matches(&json!("insert into t")));
        assert_eq!(starts_with_update.to_string(), "matching(starts with update)");
    }

    #[test]
    fn test_eq_with_unserializable_value_matches_nothing() {
        // tuple keys have no JSON representation
        let pairs: std::collections::HashMap<(i32, i32), i32> = [((1, 2), 3)].into();
        let matcher = eq(pairs);

        assert!(!matcher.matches(&Value::Null));
        assert!(!matcher.matches(&json!({})));
        assert!(matcher.to_string().contains("unserializable value"));
    }
}
