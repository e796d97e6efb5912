//! Edge case tests for valsync-engine
//!
//! These tests cover boundary conditions and unusual inputs.

use serde_json::{json, Value};
use valsync_engine::{
    cache_key, flatten, unflatten, CacheEntry, CacheMiss, CellValue, PendingSync, SheetLayout,
    SheetReadback, SyncQueue, ValuationPayload,
};

fn payload(value: Value) -> ValuationPayload {
    ValuationPayload::from_value(value).unwrap()
}

// ============================================================================
// String Edge Cases
// ============================================================================

#[test]
fn unicode_keys_and_values() {
    let p = payload(json!({
        "id": "V1",
        "inputs": {
            "日本語": {"テスト": "値"},
            "émoji": "🎉🚀",
            "tab\tkey": "Hello\nWorld"
        }
    }));

    let layout = SheetLayout::project(&p);
    assert!(layout.find("日本語.テスト").is_some());

    let back = SheetReadback::scan(&layout.values())
        .unwrap()
        .into_payload()
        .unwrap();
    assert_eq!(back.inputs, p.inputs);
}

#[test]
fn empty_string_value_survives_sheet() {
    let p = payload(json!({"id": "V1", "inputs": {"note": ""}}));
    let back = SheetReadback::scan(&SheetLayout::project(&p).values())
        .unwrap()
        .into_payload()
        .unwrap();
    assert_eq!(back.inputs["note"], json!(""));
}

#[test]
fn very_long_string_value() {
    let long = "x".repeat(1024 * 1024);
    let p = payload(json!({"id": "V1", "inputs": {"memo": long.clone()}}));

    let raw = CacheEntry::new(p, 1000).encode().unwrap();
    let entry = CacheEntry::decode(Some(&raw)).unwrap();
    assert_eq!(entry.data.inputs["memo"].as_str().unwrap().len(), long.len());
}

// ============================================================================
// Numeric Edge Cases
// ============================================================================

#[test]
fn integral_floats_read_back_as_integers() {
    let rows = vec![
        vec![CellValue::text("Valuation ID"), CellValue::text("V1")],
        vec![CellValue::text("Assumptions")],
        vec![CellValue::text("x"), CellValue::Number(5.0)],
        vec![CellValue::text("neg"), CellValue::Number(-3.0)],
        vec![CellValue::text("rate"), CellValue::Number(0.085)],
        vec![CellValue::text("huge"), CellValue::Number(1e20)],
    ];

    let inputs = SheetReadback::scan(&rows).unwrap().inputs;
    assert_eq!(inputs["x"], json!(5));
    assert_eq!(inputs["neg"], json!(-3));
    assert_eq!(inputs["rate"], json!(0.085));
    assert_eq!(inputs["huge"], json!(1e20));
}

#[test]
fn non_finite_cells_become_null() {
    assert_eq!(CellValue::Number(f64::INFINITY).to_json(), Value::Null);
    assert_eq!(CellValue::Number(f64::NAN).to_json(), Value::Null);
}

// ============================================================================
// Nesting Edge Cases
// ============================================================================

#[test]
fn deeply_nested_inputs() {
    let mut nested = json!({"value": 1});
    for _ in 0..50 {
        nested = json!({"nested": nested});
    }
    let p = payload(json!({"id": "V1", "inputs": {"root": nested.clone()}}));

    let rows = flatten(&p.inputs);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0.matches('.').count(), 51);
    assert_eq!(Value::Object(unflatten(rows)), json!({"root": nested}));
}

#[test]
fn empty_segments_in_keys() {
    let map = unflatten([("a..b", json!(1)), (".lead", json!(2))]);
    assert_eq!(
        Value::Object(map),
        json!({"a": {"": {"b": 1}}, "": {"lead": 2}})
    );
}

#[test]
fn lists_written_as_json_text() {
    let p = payload(json!({"id": "V1", "inputs": {"years": [2024, 2025]}}));
    let layout = SheetLayout::project(&p);

    let row = layout.find("years").unwrap();
    assert_eq!(row[1].value, CellValue::text("[2024,2025]"));
}

#[test]
fn empty_inputs_and_outputs() {
    let p = payload(json!({"id": "V1"}));
    let layout = SheetLayout::project(&p);

    assert!(layout.input_rows().is_empty());
    assert!(layout.output_rows().is_empty());

    let back = SheetReadback::scan(&layout.values())
        .unwrap()
        .into_payload()
        .unwrap();
    assert!(back.inputs.is_empty());
}

// ============================================================================
// Cache Edge Cases
// ============================================================================

#[test]
fn ids_with_special_characters() {
    let ids = vec![
        "simple",
        "with-dash",
        "with.dots",
        "with/slash",
        "uuid-550e8400-e29b-41d4-a716-446655440000",
        "emoji-🎉",
    ];

    for id in ids {
        assert_eq!(cache_key(id), format!("val_cache_{}", id));
        let entry = CacheEntry::new(ValuationPayload::new(id), 1);
        let raw = entry.encode().unwrap();
        assert_eq!(CacheEntry::decode(Some(&raw)).unwrap().data.id, id);
    }
}

#[test]
fn truncated_cache_entry_is_a_miss() {
    let raw = CacheEntry::new(ValuationPayload::new("V1"), 1)
        .encode()
        .unwrap();
    let truncated = &raw[..raw.len() / 2];

    assert!(matches!(
        CacheEntry::decode(Some(truncated)),
        Err(CacheMiss::Malformed(_))
    ));
    assert!(matches!(
        CacheEntry::decode(Some("")),
        Err(CacheMiss::Malformed(_))
    ));
}

// ============================================================================
// Queue Edge Cases
// ============================================================================

#[test]
fn many_pending_entries() {
    let mut queue = SyncQueue::new();
    for i in 0..1000u64 {
        let p = payload(json!({"id": format!("V{}", i % 10), "inputs": {"x": i}}));
        queue.push(PendingSync::new(format!("e{}", i), p, 1000 + i)).unwrap();
    }

    assert_eq!(queue.len(), 1000);
    assert_eq!(queue.count_for("V3"), 100);

    for i in 0..500u64 {
        assert!(queue.remove_entry(&format!("e{}", i)));
    }
    assert_eq!(queue.len(), 500);
    assert_eq!(queue.entries()[0].entry_id, "e500");
}

#[test]
fn queue_rejects_payload_without_id() {
    let mut queue = SyncQueue::new();
    let result = queue.push(PendingSync::new("e1", ValuationPayload::new(""), 1));
    assert!(result.is_err());
    assert!(queue.is_empty());
}

#[test]
fn queue_survives_persisted_round_trip_with_duplicates() {
    let mut queue = SyncQueue::new();
    queue
        .push(PendingSync::new("e1", payload(json!({"id": "V1", "inputs": {"x": 1}})), 1))
        .unwrap();
    queue
        .push(PendingSync::new("e2", payload(json!({"id": "V1", "inputs": {"x": 2}})), 2))
        .unwrap();

    let restored = SyncQueue::from_json(&queue.to_json().unwrap()).unwrap();
    assert_eq!(restored.count_for("V1"), 2);
    assert_eq!(restored.entries()[1].data.inputs["x"], json!(2));
}
