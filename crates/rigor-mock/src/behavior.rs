//! Behavior definitions: call patterns plus the response they produce.

use crate::error::MockError;
use crate::invocation::{BehaviorLink, CallSite, MockId, ObservedInvocation};
use crate::matcher::ArgumentMatcher;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// A call pattern: mock, method name and one matcher per argument.
///
/// Matching is structural. Two calls match the same pattern whenever their
/// mock, method and arguments satisfy it, regardless of which call object
/// they came from.
#[derive(Debug, Clone)]
pub struct BehaviorDefiningInvocation {
    mock: MockId,
    mock_name: Rc<str>,
    method: String,
    matchers: Vec<ArgumentMatcher>,
    defined_at: CallSite,
}

impl BehaviorDefiningInvocation {
    pub fn new(
        mock: MockId,
        mock_name: Rc<str>,
        method: impl Into<String>,
        matchers: Vec<ArgumentMatcher>,
        defined_at: CallSite,
    ) -> Self {
        Self {
            mock,
            mock_name,
            method: method.into(),
            matchers,
            defined_at,
        }
    }

    /// Returns true if the observed call fits this pattern.
    pub fn matches(&self, observed: &ObservedInvocation) -> bool {
        self.matches_call(observed.mock(), observed.method(), observed.arguments())
    }

    pub(crate) fn matches_call(&self, mock: MockId, method: &str, arguments: &[Value]) -> bool {
        self.mock == mock
            && self.method == method
            && self.matchers.len() == arguments.len()
            && self
                .matchers
                .iter()
                .zip(arguments)
                .all(|(matcher, argument)| matcher.matches(argument))
    }

    /// `mock.method`, as used in assertion messages.
    pub fn qualified_method(&self) -> String {
        format!("{}.{}", self.mock_name, self.method)
    }

    pub fn matchers(&self) -> &[ArgumentMatcher] {
        &self.matchers
    }

    pub fn defined_at(&self) -> CallSite {
        self.defined_at
    }
}

impl fmt::Display for BehaviorDefiningInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let matchers = self
            .matchers
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{}.{}({matchers})", self.mock_name, self.method)
    }
}

/// Closure standing in for a real implementation.
pub type Delegate = Rc<dyn Fn(&[Value]) -> Result<Value, MockError>>;

/// What a matching call produces.
#[derive(Clone)]
pub enum Response {
    Return(Value),
    Raise(String),
    Perform(Delegate),
}

impl Response {
    pub(crate) fn execute(&self, arguments: &[Value]) -> Result<Value, MockError> {
        match self {
            Response::Return(value) => Ok(value.clone()),
            Response::Raise(message) => Err(MockError::raised(message.clone())),
            Response::Perform(delegate) => delegate(arguments),
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Return(value) => write!(f, "returns {value}"),
            Response::Raise(message) => write!(f, "raises {message:?}"),
            Response::Perform(_) => f.write_str("performs <delegate>"),
        }
    }
}

/// How often a definition may answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    /// Answers every matching call.
    Always,
    /// Answers the first matching call, then is removed.
    Once,
}

/// A pattern bound to a response.
#[derive(Debug, Clone)]
pub struct BehaviorDefinition {
    pub pattern: BehaviorDefiningInvocation,
    pub response: Response,
    pub multiplicity: Multiplicity,
}

impl BehaviorDefinition {
    pub(crate) fn link(&self) -> BehaviorLink {
        let once = match self.multiplicity {
            Multiplicity::Always => "",
            Multiplicity::Once => "once ",
        };
        BehaviorLink {
            description: format!("{once}{:?}", self.response),
            defined_at: self.pattern.defined_at(),
        }
    }
}

/// Pending definitions of one mock.
///
/// Lookup order: one-shot definitions first, then always-definitions.
///
/// One-shot definitions are tried oldest first, so a sequence of
/// `once_returns` plays back as a script. This holds even when a newer
/// one-shot definition is narrower than an older one: the older one answers
/// first. Always-definitions are the opposite and are tried most recent first,
/// so a later definition overrides an earlier one.
#[derive(Debug, Default)]
pub struct BehaviorRegistry {
    once: Vec<Rc<BehaviorDefinition>>,
    always: Vec<Rc<BehaviorDefinition>>,
}

impl BehaviorRegistry {
    pub fn add(&mut self, definition: BehaviorDefinition) {
        match definition.multiplicity {
            Multiplicity::Once => self.once.push(Rc::new(definition)),
            Multiplicity::Always => self.always.push(Rc::new(definition)),
        }
    }

    /// Finds the definition answering a call, consuming it if one-shot.
    pub fn take_matching(
        &mut self,
        mock: MockId,
        method: &str,
        arguments: &[Value],
    ) -> Option<Rc<BehaviorDefinition>> {
        if let Some(position) = self
            .once
            .iter()
            .position(|d| d.pattern.matches_call(mock, method, arguments))
        {
            return Some(self.once.remove(position));
        }
        self.always
            .iter()
            .rev()
            .find(|d| d.pattern.matches_call(mock, method, arguments))
            .cloned()
    }

    pub fn clear(&mut self) {
        self.once.clear();
        self.always.clear();
    }

    pub fn len(&self) -> usize {
        self.once.len() + self.always.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
