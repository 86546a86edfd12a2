//! The scenario: every call observed on the mocks of one test, and how far
//! each call has been verified.
//!
//! Observed invocations and their verification statuses are kept in two
//! parallel vectors. Both only grow, and index `i` of one always describes
//! index `i` of the other. Statuses move away from `Unverified` only through
//! the assertion methods and are never reset.
//!
//! Each observed call satisfies at most one positive assertion: a successful
//! `assert_invoked` consumes the first unverified match, so asserting the same
//! pattern twice requires two matching calls.

use crate::behavior::BehaviorDefiningInvocation;
use crate::error::AssertionFailure;
use crate::invocation::{CallSite, ObservedInvocation};
use crate::report;
use std::cell::RefCell;
use std::panic::Location;
use std::rc::Rc;
use tracing::debug;

/// Scenario shared by all mocks of a test.
pub type SharedScenario = Rc<RefCell<Scenario>>;

/// How an observed call has been accounted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    Unverified,
    Verified,
    VerifiedInOrder,
}

/// Ordered log of observed invocations plus their verification ledger.
#[derive(Debug, Default)]
pub struct Scenario {
    observed: Vec<ObservedInvocation>,
    statuses: Vec<VerificationStatus>,
}

impl Scenario {
    /// Creates an empty scenario.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty scenario ready to be handed to mocks.
    pub fn shared() -> SharedScenario {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Appends a call with status `Unverified`.
    pub fn add_observed_mock_invocation(&mut self, invocation: ObservedInvocation) {
        self.observed.push(invocation);
        self.statuses.push(VerificationStatus::Unverified);
    }

    pub fn observed_invocations(&self) -> &[ObservedInvocation] {
        &self.observed
    }

    /// Status of the call at `index`, in observation order.
    pub fn verification_status(&self, index: usize) -> Option<VerificationStatus> {
        self.statuses.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.observed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observed.is_empty()
    }

    fn first_unverified_match(&self, pattern: &BehaviorDefiningInvocation) -> Option<usize> {
        self.observed
            .iter()
            .zip(&self.statuses)
            .position(|(invocation, status)| {
                *status == VerificationStatus::Unverified && pattern.matches(invocation)
            })
    }

    /// Marks the first unverified call matching `pattern` as verified.
    ///
    /// Fails when no unverified call matches, including when every matching
    /// call was already consumed by an earlier assertion.
    pub fn assert_invoked(
        &mut self,
        pattern: &BehaviorDefiningInvocation,
        asserted_at: CallSite,
    ) -> Result<(), AssertionFailure> {
        let Some(index) = self.first_unverified_match(pattern) else {
            return Err(self.not_invoked(pattern, asserted_at));
        };
        self.statuses[index] = VerificationStatus::Verified;
        debug!(index, pattern = %pattern, "Verified invocation");
        Ok(())
    }

    /// Like [`Scenario::assert_invoked`], and additionally requires that no
    /// call after the match was already verified in order.
    ///
    /// The match is marked `VerifiedInOrder` before the rest of the log is
    /// checked; an out-of-order failure leaves that mark in place.
    pub fn assert_invoked_in_order(
        &mut self,
        pattern: &BehaviorDefiningInvocation,
        asserted_at: CallSite,
    ) -> Result<(), AssertionFailure> {
        let mut matched: Option<usize> = None;
        for index in 0..self.observed.len() {
            let status = self.statuses[index];
            if matched.is_none()
                && status == VerificationStatus::Unverified
                && pattern.matches(&self.observed[index])
            {
                self.statuses[index] = VerificationStatus::VerifiedInOrder;
                matched = Some(index);
                continue;
            }
            if let Some(matched) = matched
                && status == VerificationStatus::VerifiedInOrder
            {
                return Err(AssertionFailure::InvokedOutOfOrder {
                    method: self.observed[matched].qualified_method(),
                    previous: self.observed[index].qualified_method(),
                    asserted_at,
                    report: self.create_report(),
                });
            }
        }
        match matched {
            Some(index) => {
                debug!(index, pattern = %pattern, "Verified invocation in order");
                Ok(())
            }
            None => Err(self.not_invoked(pattern, asserted_at)),
        }
    }

    /// Fails if any unverified call matches `pattern`. Never changes a status.
    pub fn assert_not_invoked(
        &self,
        pattern: &BehaviorDefiningInvocation,
        asserted_at: CallSite,
    ) -> Result<(), AssertionFailure> {
        match self.first_unverified_match(pattern) {
            Some(index) => Err(AssertionFailure::UnexpectedInvocation {
                method: pattern.qualified_method(),
                invoked_at: self.observed[index].invoked_at(),
                asserted_at,
                report: self.create_report(),
            }),
            None => Ok(()),
        }
    }

    /// Fails if a call is both unverified and unstubbed.
    ///
    /// Calls answered by a behavior definition were set up on purpose and do
    /// not need an explicit assertion.
    pub fn assert_no_more_invocations(&self, asserted_at: CallSite) -> Result<(), AssertionFailure> {
        let unexpected: Vec<&ObservedInvocation> = self
            .observed
            .iter()
            .zip(&self.statuses)
            .filter(|(invocation, status)| {
                **status == VerificationStatus::Unverified && !invocation.is_stubbed()
            })
            .map(|(invocation, _)| invocation)
            .collect();

        if unexpected.is_empty() {
            return Ok(());
        }
        Err(AssertionFailure::NoMoreInvocations {
            calls: report::invocations_view(unexpected),
            asserted_at,
            report: self.create_report(),
        })
    }

    /// Renders the observed log for diagnostics.
    pub fn create_report(&self) -> String {
        report::create_report(&self.observed)
    }

    fn not_invoked(&self, pattern: &BehaviorDefiningInvocation, asserted_at: CallSite) -> AssertionFailure {
        AssertionFailure::NotInvoked {
            method: pattern.qualified_method(),
            asserted_at,
            report: self.create_report(),
        }
    }
}

/// Asserts that no unverified, unstubbed call remains on any mock of `scenario`.
#[track_caller]
pub fn assert_no_more_invocations(scenario: &SharedScenario) -> Result<(), AssertionFailure> {
    scenario.borrow().assert_no_more_invocations(Location::caller())
}
