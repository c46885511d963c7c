//! Property-based tests for the wire codec and correlation ids.

use premise_stream::codec::{encode_fast, subscribe_command, FrameLine, Payload};
use premise_stream::subscription_id;
use proptest::prelude::*;

// ============================================================================
// Fast framing
// ============================================================================

proptest! {
    /// The 8 hex digit prefix is the byte length of the content
    #[test]
    fn fast_frame_prefix_is_content_length(
        path in "[A-Za-z/]{1,20}",
        content in "\\PC{0,64}",
    ) {
        let frame = encode_fast(&format!("sys://Home/{}", path), &content);

        let (prefix, rest) = frame.split_at(8);
        prop_assert_eq!(usize::from_str_radix(prefix, 16).unwrap(), content.len());
        prop_assert!(rest.starts_with(" /sys/Home/"));
        let tail = format!("\r\n\r\n{}", content);
        prop_assert!(rest.ends_with(&tail));
    }
}

// ============================================================================
// Correlation ids
// ============================================================================

proptest! {
    #[test]
    fn subscription_id_is_positive_31_bit(
        location in "sys://Home/[A-Za-z ]{0,30}",
        property in "[A-Za-z]{1,20}",
    ) {
        let id = subscription_id(&location, &property);
        prop_assert!(id > 0);
        prop_assert!(id <= 0x7fff_ffff);
        prop_assert_eq!(id, subscription_id(&location, &property));
    }

    /// The id embedded in a subscribe command reads back from Target-Element
    #[test]
    fn target_element_round_trips_id(property in "[A-Za-z]{1,20}") {
        let id = subscription_id("sys://Home/Kitchen", &property);
        let command = subscribe_command("sys://Home/Kitchen", &property, id);
        let line = format!("Target-Element: {}", id);

        let expected = format!("?a?{}??{}?{}?", id, property, id);
        prop_assert!(command.contains(&expected));
        prop_assert_eq!(FrameLine::parse(&line), FrameLine::TargetElement(id));
    }

    /// Ordinary values on a subscribed target are never protocol signals
    #[test]
    fn values_on_targets_are_values(target in 1u32.., value in "[0-9]{1,3}%?") {
        prop_assert_eq!(Payload::classify(target, &value), Payload::Value { target, value: &value });
    }
}
