//! Mock handles: behavior definition and call dispatch.
//!
//! A [`Mock`] stands in for one collaborator. Capability adapters (a struct
//! implementing the collaborator's trait by forwarding every method to
//! [`Mock::invoke`]) give production code the real interface:
//!
//! ```
//! use rigor_mock::{Mock, MockError, Scenario, any};
//! use serde_json::json;
//!
//! trait Clock {
//!     fn now(&self, zone: &str) -> Result<i64, MockError>;
//! }
//!
//! struct MockClock(Mock);
//!
//! impl Clock for MockClock {
//!     fn now(&self, zone: &str) -> Result<i64, MockError> {
//!         self.0.invoke_as("now", vec![json!(zone)])
//!     }
//! }
//!
//! let scenario = Scenario::shared();
//! let clock = MockClock(Mock::new("clock", &scenario));
//! clock.0.returns(1_700_000_000).on("now", [any()]);
//!
//! assert_eq!(clock.now("UTC").unwrap(), 1_700_000_000);
//! clock.0.assert_invoked("now", ["UTC"]).unwrap();
//! ```

use crate::behavior::{
    BehaviorDefiningInvocation, BehaviorDefinition, BehaviorRegistry, Multiplicity, Response,
};
use crate::error::{AssertionFailure, MockError};
use crate::invocation::{CallSite, MockId, ObservedInvocation, Outcome};
use crate::matcher::ArgumentMatcher;
use crate::scenario::SharedScenario;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cell::RefCell;
use std::panic::Location;
use std::rc::Rc;
use tracing::{debug, warn};

struct MockInner {
    id: MockId,
    name: Rc<str>,
    scenario: SharedScenario,
    behaviors: RefCell<BehaviorRegistry>,
}

/// A mock collaborator. Clones share identity, behaviors and scenario.
#[derive(Clone)]
pub struct Mock {
    inner: Rc<MockInner>,
}

impl std::fmt::Debug for Mock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mock")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("behaviors", &self.inner.behaviors.borrow().len())
            .finish()
    }
}

impl Mock {
    /// Creates a mock that records its calls in `scenario`.
    pub fn new(name: impl Into<String>, scenario: &SharedScenario) -> Self {
        let name: String = name.into();
        Self {
            inner: Rc::new(MockInner {
                id: MockId::next(),
                name: Rc::from(name),
                scenario: Rc::clone(scenario),
                behaviors: RefCell::new(BehaviorRegistry::default()),
            }),
        }
    }

    pub fn id(&self) -> MockId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The scenario this mock records into.
    pub fn scenario(&self) -> &SharedScenario {
        &self.inner.scenario
    }

    // ─────────────────────────────────────────────────────────────────────
    // Behavior definition
    // ─────────────────────────────────────────────────────────────────────

    /// Every matching call returns `value`.
    #[track_caller]
    pub fn returns(&self, value: impl Serialize) -> BehaviorBuilder<'_> {
        self.define(return_response(value), Multiplicity::Always)
    }

    /// The next matching call returns `value`.
    #[track_caller]
    pub fn once_returns(&self, value: impl Serialize) -> BehaviorBuilder<'_> {
        self.define(return_response(value), Multiplicity::Once)
    }

    /// Every matching call fails with `message`.
    #[track_caller]
    pub fn raises(&self, message: impl Into<String>) -> BehaviorBuilder<'_> {
        self.define(Response::Raise(message.into()), Multiplicity::Always)
    }

    /// The next matching call fails with `message`.
    #[track_caller]
    pub fn once_raises(&self, message: impl Into<String>) -> BehaviorBuilder<'_> {
        self.define(Response::Raise(message.into()), Multiplicity::Once)
    }

    /// Every matching call is answered by `delegate`.
    #[track_caller]
    pub fn performs(
        &self,
        delegate: impl Fn(&[Value]) -> Result<Value, MockError> + 'static,
    ) -> BehaviorBuilder<'_> {
        self.define(Response::Perform(Rc::new(delegate)), Multiplicity::Always)
    }

    /// The next matching call is answered by `delegate`.
    #[track_caller]
    pub fn once_performs(
        &self,
        delegate: impl Fn(&[Value]) -> Result<Value, MockError> + 'static,
    ) -> BehaviorBuilder<'_> {
        self.define(Response::Perform(Rc::new(delegate)), Multiplicity::Once)
    }

    /// Drops every behavior definition of this mock.
    pub fn reset_behavior(&self) {
        self.inner.behaviors.borrow_mut().clear();
    }

    #[track_caller]
    fn define(&self, response: Response, multiplicity: Multiplicity) -> BehaviorBuilder<'_> {
        BehaviorBuilder {
            mock: self,
            response,
            multiplicity,
            defined_at: Location::caller(),
        }
    }

    fn pattern<I>(&self, method: &str, arguments: I, at: CallSite) -> BehaviorDefiningInvocation
    where
        I: IntoIterator,
        I::Item: Into<ArgumentMatcher>,
    {
        BehaviorDefiningInvocation::new(
            self.inner.id,
            Rc::clone(&self.inner.name),
            method,
            arguments.into_iter().map(Into::into).collect(),
            at,
        )
    }

    // ─────────────────────────────────────────────────────────────────────
    // Dispatch
    // ─────────────────────────────────────────────────────────────────────

    /// Dispatches a call: answers it from the pending behaviors and records it
    /// in the scenario, stubbed or not.
    ///
    /// Unstubbed calls return `null`.
    #[track_caller]
    pub fn invoke(&self, method: &str, arguments: Vec<Value>) -> Result<Value, MockError> {
        let invoked_at = Location::caller();
        let behavior = self
            .inner
            .behaviors
            .borrow_mut()
            .take_matching(self.inner.id, method, &arguments);

        let result = match &behavior {
            Some(definition) => definition.response.execute(&arguments),
            None => Ok(Value::Null),
        };
        let outcome = match &result {
            Ok(value) => Outcome::Returned(value.clone()),
            Err(e) => Outcome::Raised(e.to_string()),
        };

        debug!(
            mock = %self.inner.name,
            method,
            stubbed = behavior.is_some(),
            "Observed mock invocation"
        );

        let invocation = ObservedInvocation::new(
            self.inner.id,
            Rc::clone(&self.inner.name),
            method,
            arguments,
            invoked_at,
            behavior.map(|definition| definition.link()),
            outcome,
        );
        self.inner
            .scenario
            .borrow_mut()
            .add_observed_mock_invocation(invocation);

        result
    }

    /// Dispatches a call and converts the answer. `null` becomes `T::default()`.
    #[track_caller]
    pub fn invoke_as<T>(&self, method: &str, arguments: Vec<Value>) -> Result<T, MockError>
    where
        T: DeserializeOwned + Default,
    {
        let value = self.invoke(method, arguments)?;
        if value.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(value).map_err(|e| MockError::ReturnType {
            method: format!("{}.{}", self.inner.name, method),
            expected: std::any::type_name::<T>(),
            reason: e.to_string(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Verification
    // ─────────────────────────────────────────────────────────────────────

    /// Asserts that an unverified call matching the pattern happened.
    #[track_caller]
    pub fn assert_invoked<I>(&self, method: &str, arguments: I) -> Result<(), AssertionFailure>
    where
        I: IntoIterator,
        I::Item: Into<ArgumentMatcher>,
    {
        let at = Location::caller();
        let pattern = self.pattern(method, arguments, at);
        self.inner.scenario.borrow_mut().assert_invoked(&pattern, at)
    }

    /// Asserts that a matching call happened after every call already
    /// asserted in order.
    #[track_caller]
    pub fn assert_invoked_in_order<I>(&self, method: &str, arguments: I) -> Result<(), AssertionFailure>
    where
        I: IntoIterator,
        I::Item: Into<ArgumentMatcher>,
    {
        let at = Location::caller();
        let pattern = self.pattern(method, arguments, at);
        self.inner
            .scenario
            .borrow_mut()
            .assert_invoked_in_order(&pattern, at)
    }

    /// Asserts that no unverified call matches the pattern.
    #[track_caller]
    pub fn assert_not_invoked<I>(&self, method: &str, arguments: I) -> Result<(), AssertionFailure>
    where
        I: IntoIterator,
        I::Item: Into<ArgumentMatcher>,
    {
        let at = Location::caller();
        let pattern = self.pattern(method, arguments, at);
        self.inner.scenario.borrow().assert_not_invoked(&pattern, at)
    }
}

/// A value that cannot be represented as JSON turns the stub into a failing
/// one, so the test sees the problem at the first matching call.
fn return_response(value: impl Serialize) -> Response {
    match serde_json::to_value(value) {
        Ok(value) => Response::Return(value),
        Err(e) => {
            warn!(error = %e, "Stubbed return value cannot be represented as JSON");
            Response::Raise(format!("Cannot serialize stubbed return value: {e}"))
        }
    }
}

/// Pending behavior definition, completed by [`BehaviorBuilder::on`].
#[must_use = "a behavior is only registered once `.on(method, arguments)` is called"]
pub struct BehaviorBuilder<'a> {
    mock: &'a Mock,
    response: Response,
    multiplicity: Multiplicity,
    defined_at: CallSite,
}

impl BehaviorBuilder<'_> {
    /// Binds the response to calls of `method` whose arguments match.
    pub fn on<I>(self, method: &str, arguments: I)
    where
        I: IntoIterator,
        I::Item: Into<ArgumentMatcher>,
    {
        let pattern = self.mock.pattern(method, arguments, self.defined_at);
        debug!(pattern = %pattern, response = ?self.response, "Defined mock behavior");
        self.mock
            .inner
            .behaviors
            .borrow_mut()
            .add(BehaviorDefinition {
                pattern,
                response: self.response,
                multiplicity: self.multiplicity,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{any, eq};
    use crate::scenario::Scenario;
    use serde_json::json;

    const NO_ARGS: [ArgumentMatcher; 0] = [];

    #[test]
    fn test_unstubbed_call_returns_null_and_is_recorded() {
        let scenario = Scenario::shared();
        let mock = Mock::new("rs", &scenario);

        assert_eq!(mock.invoke("next", vec![]).unwrap(), Value::Null);

        let scenario = scenario.borrow();
        assert_eq!(scenario.len(), 1);
        assert!(!scenario.observed_invocations()[0].is_stubbed());
    }

    #[test]
    fn test_returns_and_once_returns() {
        let scenario = Scenario::shared();
        let mock = Mock::new("rs", &scenario);
        mock.returns(false).on("next", NO_ARGS);
        mock.once_returns(true).on("next", NO_ARGS);

        assert!(mock.invoke_as::<bool>("next", vec![]).unwrap());
        assert!(!mock.invoke_as::<bool>("next", vec![]).unwrap());
        assert!(!mock.invoke_as::<bool>("next", vec![]).unwrap());
        assert!(scenario.borrow().observed_invocations().iter().all(|i| i.is_stubbed()));
    }

    #[test]
    fn test_raises() {
        let scenario = Scenario::shared();
        let mock = Mock::new("connection", &scenario);
        mock.raises("connection refused").on("prepare_statement", [any()]);

        let err = mock.invoke("prepare_statement", vec![json!("select 1")]).unwrap_err();
        assert_eq!(err, MockError::raised("connection refused"));
        assert_eq!(
            scenario.borrow().observed_invocations()[0].outcome(),
            &Outcome::Raised("connection refused".into())
        );
    }

    #[test]
    fn test_once_raises_then_falls_through() {
        let scenario = Scenario::shared();
        let mock = Mock::new("connection", &scenario);
        mock.once_raises("timeout").on("ping", NO_ARGS);

        assert!(mock.invoke("ping", vec![]).is_err());
        assert_eq!(mock.invoke("ping", vec![]).unwrap(), Value::Null);
    }

    #[test]
    fn test_performs_delegates_with_arguments() {
        let scenario = Scenario::shared();
        let mock = Mock::new("calculator", &scenario);
        mock.performs(|args| {
            let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
            Ok(json!(sum))
        })
        .on("add", [any(), any()]);

        assert_eq!(mock.invoke_as::<i64>("add", vec![json!(2), json!(3)]).unwrap(), 5);
    }

    #[test]
    fn test_reset_behavior() {
        let scenario = Scenario::shared();
        let mock = Mock::new("rs", &scenario);
        mock.returns("x").on("get_string", [any()]);
        mock.reset_behavior();

        assert_eq!(mock.invoke_as::<String>("get_string", vec![json!(1)]).unwrap(), "");
    }

    #[test]
    fn test_return_type_mismatch() {
        let scenario = Scenario::shared();
        let mock = Mock::new("rs", &scenario);
        mock.returns("not a number").on("get_int", NO_ARGS);

        let err = mock.invoke_as::<i64>("get_int", vec![]).unwrap_err();
        assert!(matches!(err, MockError::ReturnType { .. }));
        assert!(err.to_string().contains("rs.get_int"));
    }

    #[test]
    fn test_unserializable_return_value_fails_the_call() {
        let scenario = Scenario::shared();
        let mock = Mock::new("rs", &scenario);
        let pairs: std::collections::HashMap<(i32, i32), i32> = [((1, 2), 3)].into();
        mock.returns(pairs).on("get_map", NO_ARGS);

        let err = mock.invoke("get_map", vec![]).unwrap_err();
        assert!(matches!(err, MockError::Raised { .. }));
        assert!(err.to_string().contains("Cannot serialize stubbed return value"));
    }

    #[test]
    fn test_mocks_do_not_answer_each_other() {
        let scenario = Scenario::shared();
        let first = Mock::new("first", &scenario);
        let second = Mock::new("second", &scenario);
        first.returns(1).on("value", NO_ARGS);

        assert_eq!(second.invoke("value", vec![]).unwrap(), Value::Null);
        second.assert_invoked("value", NO_ARGS).unwrap();
        assert!(first.assert_invoked("value", NO_ARGS).is_err());
    }

    #[test]
    fn test_call_site_is_the_caller() {
        let scenario = Scenario::shared();
        let mock = Mock::new("rs", &scenario);
        let line = line!() + 1;
        mock.invoke("close", vec![]).unwrap();

        let scenario = scenario.borrow();
        let site = scenario.observed_invocations()[0].invoked_at();
        assert!(site.file().ends_with("mock.rs"));
        assert_eq!(site.line(), line);
    }

    #[test]
    fn test_null_pattern_argument_matches_anything() {
        let scenario = Scenario::shared();
        let mock = Mock::new("connection", &scenario);
        mock.invoke("prepare_statement", vec![json!("select 1")]).unwrap();

        mock.assert_not_invoked("prepare_statement", [eq("select 2")]).unwrap();
        assert!(mock.assert_not_invoked("prepare_statement", [Value::Null]).is_err());
    }

    #[test]
    fn test_behavior_link_points_at_definition() {
        let scenario = Scenario::shared();
        let mock = Mock::new("rs", &scenario);
        let line = line!() + 1;
        mock.once_returns(7).on("get_int", NO_ARGS);
        mock.invoke("get_int", vec![]).unwrap();

        let scenario = scenario.borrow();
        let link = scenario.observed_invocations()[0].behavior().unwrap();
        assert_eq!(link.description, "once returns 7");
        assert_eq!(link.defined_at.line(), line);
    }
}
