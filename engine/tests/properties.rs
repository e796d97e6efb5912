//! Property tests for the round-trips the sync flows depend on.

use proptest::prelude::*;
use serde_json::{Map, Value};
use valsync_engine::{
    flatten, unflatten, CacheEntry, SheetLayout, SheetReadback, ValuationPayload,
};

/// Integers a spreadsheet cell holds exactly.
const SAFE_INT: i64 = 9_007_199_254_740_991;

fn arb_key() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,7}"
}

fn arb_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        (-SAFE_INT..SAFE_INT).prop_map(Value::from),
        "[a-zA-Z0-9 %-]{0,12}".prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        Just(Value::Null),
    ]
}

/// Nested mappings without empty objects, which have no row to live in.
fn arb_tree() -> impl Strategy<Value = Map<String, Value>> {
    let node = arb_leaf().prop_recursive(4, 48, 5, |inner| {
        prop::collection::btree_map(arb_key(), inner, 1..5)
            .prop_map(|m| Value::Object(m.into_iter().collect()))
    });
    prop::collection::btree_map(arb_key(), node, 0..6).prop_map(|m| m.into_iter().collect())
}

fn arb_payload() -> impl Strategy<Value = ValuationPayload> {
    (
        "[A-Za-z0-9-]{1,16}",
        arb_tree(),
        arb_tree(),
        prop::option::of("[a-f0-9]{32}"),
    )
        .prop_map(|(id, inputs, outputs, etag)| {
            let mut payload = ValuationPayload::new(id)
                .with_inputs(inputs)
                .with_outputs(outputs);
            payload.etag = etag;
            payload
        })
}

proptest! {
    #[test]
    fn prop_flatten_round_trip(tree in arb_tree()) {
        prop_assert_eq!(unflatten(flatten(&tree)), tree);
    }

    #[test]
    fn prop_flatten_keys_are_unique(tree in arb_tree()) {
        let rows = flatten(&tree);
        let mut keys: Vec<_> = rows.iter().map(|(k, _)| k.clone()).collect();
        keys.sort();
        keys.dedup();
        prop_assert_eq!(keys.len(), rows.len());
    }

    #[test]
    fn prop_cache_entry_round_trip(payload in arb_payload(), timestamp in any::<u64>()) {
        let entry = CacheEntry::new(payload, timestamp);
        let raw = entry.encode().unwrap();
        prop_assert_eq!(CacheEntry::decode(Some(&raw)).unwrap(), entry);
    }

    #[test]
    fn prop_sheet_round_trip_inputs(payload in arb_payload()) {
        let layout = SheetLayout::project(&payload);
        let back = SheetReadback::scan(&layout.values())
            .unwrap()
            .into_payload()
            .unwrap();

        prop_assert_eq!(&back.id, &payload.id);
        prop_assert_eq!(&back.etag, &payload.etag);
        prop_assert_eq!(&back.inputs, &payload.inputs);
        prop_assert!(back.outputs.is_empty());
    }
}
