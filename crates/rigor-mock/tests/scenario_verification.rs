//! End-to-end verification through a hand-written capability adapter.

use rigor_core::init_test_logging;
use rigor_mock::{
    AssertionFailure, Mock, MockError, Scenario, SharedScenario, any, assert_no_more_invocations,
    eq, matching,
};
use serde_json::json;

/// Collaborator of the code under test.
trait Inventory {
    fn reserve(&self, sku: &str, quantity: u32) -> Result<bool, MockError>;
    fn release(&self, sku: &str) -> Result<(), MockError>;
    fn stock(&self, sku: &str) -> Result<u32, MockError>;
}

struct MockInventory {
    mock: Mock,
}

impl MockInventory {
    fn new(scenario: &SharedScenario) -> Self {
        Self {
            mock: Mock::new("inventory", scenario),
        }
    }
}

impl Inventory for MockInventory {
    fn reserve(&self, sku: &str, quantity: u32) -> Result<bool, MockError> {
        self.mock.invoke_as("reserve", vec![json!(sku), json!(quantity)])
    }

    fn release(&self, sku: &str) -> Result<(), MockError> {
        self.mock.invoke("release", vec![json!(sku)]).map(|_| ())
    }

    fn stock(&self, sku: &str) -> Result<u32, MockError> {
        self.mock.invoke_as("stock", vec![json!(sku)])
    }
}

/// Code under test: reserves every line of an order, releasing on failure.
fn place_order(inventory: &dyn Inventory, lines: &[(&str, u32)]) -> Result<bool, MockError> {
    let mut reserved: Vec<&str> = Vec::new();
    for (sku, quantity) in lines {
        if inventory.stock(sku)? < *quantity || !inventory.reserve(sku, *quantity)? {
            for sku in reserved.iter().rev() {
                inventory.release(sku)?;
            }
            return Ok(false);
        }
        reserved.push(*sku);
    }
    Ok(true)
}

#[test]
fn test_successful_order_reserves_each_line() -> anyhow::Result<()> {
    init_test_logging();
    let scenario = Scenario::shared();
    let inventory = MockInventory::new(&scenario);
    inventory.mock.returns(100).on("stock", [any()]);
    inventory.mock.returns(true).on("reserve", [any(), any()]);

    assert!(place_order(&inventory, &[("apple", 3), ("pear", 1)])?);

    inventory.mock.assert_invoked_in_order("reserve", [eq("apple"), eq(3)])?;
    inventory.mock.assert_invoked_in_order("reserve", [eq("pear"), eq(1)])?;
    inventory.mock.assert_not_invoked("release", [any()])?;
    // stock and reserve calls were stubbed, so nothing is left to account for.
    assert_no_more_invocations(&scenario)?;
    Ok(())
}

#[test]
fn test_failed_line_releases_in_reverse_order() -> anyhow::Result<()> {
    let scenario = Scenario::shared();
    let inventory = MockInventory::new(&scenario);
    inventory.mock.returns(100).on("stock", [any()]);
    inventory.mock.returns(true).on("reserve", [any(), any()]);
    inventory.mock.returns(false).on("reserve", [eq("plum"), any()]);

    assert!(!place_order(&inventory, &[("apple", 1), ("pear", 1), ("plum", 1)])?);

    inventory.mock.assert_invoked_in_order("release", ["pear"])?;
    inventory.mock.assert_invoked_in_order("release", ["apple"])?;
    assert_no_more_invocations(&scenario)?;
    Ok(())
}

#[test]
fn test_release_order_reversed_is_reported() {
    let scenario = Scenario::shared();
    let inventory = MockInventory::new(&scenario);
    inventory.mock.returns(100).on("stock", [any()]);
    inventory.mock.once_returns(true).on("reserve", [any(), any()]);
    inventory.mock.once_returns(true).on("reserve", [any(), any()]);

    assert!(!place_order(&inventory, &[("apple", 1), ("pear", 1), ("plum", 1)]).unwrap());

    inventory.mock.assert_invoked_in_order("release", ["apple"]).unwrap();
    let err = inventory
        .mock
        .assert_invoked_in_order("release", ["pear"])
        .unwrap_err();

    assert!(matches!(err, AssertionFailure::InvokedOutOfOrder { .. }));
    let message = err.to_string();
    assert!(message.contains("Invocation of inventory.release was expected to be performed after inventory.release"));
    assert!(message.contains("scenario_verification.rs"));
    assert!(message.contains("Observed scenario:"));
    assert!(message.contains("inventory.reserve(\"plum\", 1)"));
}

#[test]
fn test_unstubbed_calls_must_be_asserted() {
    let scenario = Scenario::shared();
    let inventory = MockInventory::new(&scenario);

    // stock() is unstubbed and yields 0, so the order is rejected up front.
    assert!(!place_order(&inventory, &[("apple", 1)]).unwrap());

    let err = assert_no_more_invocations(&scenario).unwrap_err();
    match &err {
        AssertionFailure::NoMoreInvocations { calls, .. } => {
            assert!(calls.starts_with("1. inventory.stock(\"apple\")  .....  at "));
        }
        other => panic!("Expected NoMoreInvocations, got {other:?}"),
    }

    inventory.mock.assert_invoked("stock", ["apple"]).unwrap();
    assert_no_more_invocations(&scenario).unwrap();
}

#[test]
fn test_each_call_satisfies_one_assertion() {
    let scenario = Scenario::shared();
    let inventory = MockInventory::new(&scenario);
    for _ in 0..3 {
        inventory.stock("apple").unwrap();
    }

    for _ in 0..3 {
        inventory.mock.assert_invoked("stock", ["apple"]).unwrap();
    }
    let err = inventory.mock.assert_invoked("stock", ["apple"]).unwrap_err();
    assert!(matches!(err, AssertionFailure::NotInvoked { .. }));
}

#[test]
fn test_raised_error_reaches_the_caller() {
    let scenario = Scenario::shared();
    let inventory = MockInventory::new(&scenario);
    inventory.mock.raises("warehouse offline").on("stock", [any()]);

    let err = place_order(&inventory, &[("apple", 1)]).unwrap_err();
    assert_eq!(err.to_string(), "warehouse offline");

    let report = scenario.borrow().create_report();
    assert!(report.contains("inventory.stock(\"apple\") raised warehouse offline"));
}

#[test]
fn test_custom_predicate_in_assertion() {
    let scenario = Scenario::shared();
    let inventory = MockInventory::new(&scenario);
    inventory.mock.returns(true).on("reserve", [any(), any()]);
    inventory.reserve("apple", 12).unwrap();

    let bulk = || matching("at least 10", |v| v.as_u64().is_some_and(|q| q >= 10));
    let small = matching("below 10", |v| v.as_u64().is_some_and(|q| q < 10));
    inventory.mock.assert_not_invoked("reserve", [any(), small]).unwrap();
    inventory.mock.assert_invoked("reserve", [any(), bulk()]).unwrap();
    inventory.mock.assert_not_invoked("reserve", [any(), bulk()]).unwrap();
}
