//! # rigor-mock
//!
//! Mocks whose every call is recorded in a shared [`Scenario`], verified
//! afterwards with ordered and unordered assertions.
//!
//! - Behaviors are defined with `returns`/`raises`/`performs` (and their
//!   one-shot `once_*` forms), bound to a call pattern with `.on(..)`.
//! - Calls are dispatched through [`Mock::invoke`]; stubbed or not, each one
//!   lands in the scenario.
//! - Assertions return [`AssertionFailure`] carrying a full report of the
//!   observed scenario.

pub mod behavior;
pub mod error;
pub mod invocation;
pub mod matcher;
pub mod mock;
pub mod report;
pub mod scenario;

pub use behavior::{BehaviorDefiningInvocation, BehaviorDefinition, Multiplicity, Response};
pub use error::{AssertionFailure, MockError};
pub use invocation::{BehaviorLink, CallSite, MockId, ObservedInvocation, Outcome};
pub use matcher::{ArgumentMatcher, any, eq, is_null, matching, not_null};
pub use mock::{BehaviorBuilder, Mock};
pub use scenario::{Scenario, SharedScenario, VerificationStatus, assert_no_more_invocations};
