//! Records of calls made against mocks.

use serde_json::Value;
use std::fmt;
use std::panic::Location;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Source location of a call or an assertion.
pub type CallSite = &'static Location<'static>;

/// Identity of one mock handle. Clones of a handle share the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MockId(usize);

impl MockId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for MockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mock#{}", self.0)
    }
}

/// What an observed call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The call returned a value (`null` for unstubbed calls).
    Returned(Value),
    /// The call failed with the given message.
    Raised(String),
}

/// The behavior definition that answered an observed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BehaviorLink {
    /// Short description of the response, e.g. `returns 1`.
    pub description: String,
    /// Where the behavior was defined.
    pub defined_at: CallSite,
}

/// One call made against a mock. Immutable once recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedInvocation {
    mock: MockId,
    mock_name: Rc<str>,
    method: String,
    arguments: Vec<Value>,
    invoked_at: CallSite,
    behavior: Option<BehaviorLink>,
    outcome: Outcome,
}

impl ObservedInvocation {
    /// Creates a new record.
    pub fn new(
        mock: MockId,
        mock_name: Rc<str>,
        method: impl Into<String>,
        arguments: Vec<Value>,
        invoked_at: CallSite,
        behavior: Option<BehaviorLink>,
        outcome: Outcome,
    ) -> Self {
        Self {
            mock,
            mock_name,
            method: method.into(),
            arguments,
            invoked_at,
            behavior,
            outcome,
        }
    }

    pub fn mock(&self) -> MockId {
        self.mock
    }

    pub fn mock_name(&self) -> &str {
        &self.mock_name
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    pub fn invoked_at(&self) -> CallSite {
        self.invoked_at
    }

    /// The behavior that answered this call, `None` if it was unstubbed.
    pub fn behavior(&self) -> Option<&BehaviorLink> {
        self.behavior.as_ref()
    }

    /// Returns true if a behavior definition answered this call.
    pub fn is_stubbed(&self) -> bool {
        self.behavior.is_some()
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// `mock.method`, as used in assertion messages.
    pub fn qualified_method(&self) -> String {
        format!("{}.{}", self.mock_name, self.method)
    }
}
