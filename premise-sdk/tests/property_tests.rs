//! Property-based tests for the object cache
//!
//! Pushes are applied through the `SubscriptionTarget` seam, exactly as the
//! read loop delivers them, on an object whose server is never connected.

use std::sync::Arc;

use premise_sdk::{PremiseObject, PremiseServer, PropertyValue, ServerConfig, SubscriptionTarget};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn object() -> Arc<PremiseObject> {
    let server = PremiseServer::new(ServerConfig::for_host("premise", 86));
    PremiseObject::new(&server, "sys://Home/Test")
}

/// Wire strings the server sends for the common property types
fn wire_value_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        (0u32..=100).prop_map(|n| format!("{}%", n)),
        prop_oneof![Just("True"), Just("False"), Just("On"), Just("Off")].prop_map(str::to_string),
        any::<i32>().prop_map(|n| n.to_string()),
        "[A-Za-z ]{1,16}",
    ]
}

// ============================================================================
// Repeated pushes
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Pushing the same value twice changes the object once
    #[test]
    fn prop_repeated_push_notifies_once(value in wire_value_strategy()) {
        let object = object();
        let changes = object.changes();

        object.apply_server_value("Value", &value);
        object.apply_server_value("Value", &value);

        let property_events = changes
            .try_iter()
            .filter(|e| e.property_name() == Some("Value"))
            .count();
        prop_assert_eq!(property_events, 1);
    }

    /// A percent push always lands in the 0..=1 float domain
    #[test]
    fn prop_percent_push(n in 0u32..=100) {
        let object = object();

        object.apply_server_value("Brightness", &format!("{}%", n));

        prop_assert_eq!(
            object.value("Brightness"),
            Some(PropertyValue::Float(f64::from(n) / 100.0))
        );
    }
}
