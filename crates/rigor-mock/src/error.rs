//! Failures raised by mocks and by scenario assertions.

use crate::invocation::CallSite;

/// A verification expectation that was not met.
///
/// Every variant carries the full scenario report rendered at the moment of
/// failure, so the message alone is enough to diagnose the test.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AssertionFailure {
    /// No unverified call matched an `assert_invoked*` pattern.
    #[error("Expected invocation of {method}, but it didn't occur.\nasserted at {asserted_at}\n\n{report}")]
    NotInvoked {
        method: String,
        asserted_at: CallSite,
        report: String,
    },

    /// An unverified call matched an `assert_not_invoked` pattern.
    #[error(
        "Expected no invocation of {method}, but it did occur.\nat {invoked_at}\nasserted at {asserted_at}\n\n{report}"
    )]
    UnexpectedInvocation {
        method: String,
        invoked_at: CallSite,
        asserted_at: CallSite,
        report: String,
    },

    /// The matched call happened before a call already verified in order.
    #[error(
        "Invocation of {method} was expected to be performed after {previous} but actually occurred before it.\nasserted at {asserted_at}\n\n{report}"
    )]
    InvokedOutOfOrder {
        method: String,
        previous: String,
        asserted_at: CallSite,
        report: String,
    },

    /// Unverified, unstubbed calls remain.
    #[error("No more invocations expected, yet observed following calls:\n{calls}\nasserted at {asserted_at}\n{report}")]
    NoMoreInvocations {
        calls: String,
        asserted_at: CallSite,
        report: String,
    },
}

impl AssertionFailure {
    /// The scenario report attached to this failure.
    pub fn report(&self) -> &str {
        match self {
            AssertionFailure::NotInvoked { report, .. }
            | AssertionFailure::UnexpectedInvocation { report, .. }
            | AssertionFailure::InvokedOutOfOrder { report, .. }
            | AssertionFailure::NoMoreInvocations { report, .. } => report.as_str(),
        }
    }

    /// Where the failing assertion was made.
    pub fn asserted_at(&self) -> CallSite {
        match self {
            AssertionFailure::NotInvoked { asserted_at, .. }
            | AssertionFailure::UnexpectedInvocation { asserted_at, .. }
            | AssertionFailure::InvokedOutOfOrder { asserted_at, .. }
            | AssertionFailure::NoMoreInvocations { asserted_at, .. } => *asserted_at,
        }
    }
}

/// Errors surfaced to the code calling a mock.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MockError {
    /// A `raises` behavior answered the call.
    #[error("{message}")]
    Raised { message: String },

    /// The stubbed value does not convert to the type the adapter expects.
    #[error("Cannot convert return value of {method} to {expected}: {reason}")]
    ReturnType {
        method: String,
        expected: &'static str,
        reason: String,
    },
}

impl MockError {
    /// Creates the error a `raises` behavior produces.
    pub fn raised(message: impl Into<String>) -> Self {
        MockError::Raised {
            message: message.into(),
        }
    }
}
