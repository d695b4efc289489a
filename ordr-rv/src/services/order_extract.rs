//! Order extraction from loosely shaped network payloads
//!
//! The network answers with nested JSON whose layout varies between API
//! versions. Any object carrying an order token is taken as one order; the
//! walk descends through every array and object so wrappers like
//! `{"data": {"orders": [...]}}` need no special casing.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::models::remote::{PaymentStatus, RemoteOrderRecord};

const TOKEN_KEYS: &[&str] = &["ordertoken", "orderToken", "order_token", "orderid", "orderId", "order_id"];
const STATUS_KEYS: &[&str] = &["status", "paymentStatus", "payment_status"];

/// Collect every order record found anywhere in a payload
pub fn extract_orders(payload: &Value) -> Vec<RemoteOrderRecord> {
    let mut orders = Vec::new();
    walk(payload, &mut orders);
    orders
}

fn walk(value: &Value, orders: &mut Vec<RemoteOrderRecord>) {
    match value {
        Value::Array(items) => {
            for item in items {
                walk(item, orders);
            }
        }
        Value::Object(object) => {
            if let Some(record) = record_from_object(object) {
                orders.push(record);
            }
            for child in object.values() {
                if child.is_array() || child.is_object() {
                    walk(child, orders);
                }
            }
        }
        _ => {}
    }
}

fn record_from_object(object: &Map<String, Value>) -> Option<RemoteOrderRecord> {
    let token = TOKEN_KEYS
        .iter()
        .filter_map(|key| object.get(*key))
        .filter_map(scalar_text)
        .map(|token| token.trim().to_string())
        .find(|token| !token.is_empty())?;

    let status = STATUS_KEYS
        .iter()
        .filter_map(|key| object.get(*key))
        .find_map(scalar_text)
        .unwrap_or_default();

    let raw: BTreeMap<String, String> = object
        .iter()
        .filter_map(|(key, value)| scalar_text(value).map(|text| (key.clone(), text)))
        .collect();

    Some(RemoteOrderRecord::new(token, PaymentStatus::parse(&status), raw))
}

/// Text of a scalar; whole floats render without a fraction (`3.0` → `3`)
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                n.as_f64().map(|f| {
                    if f.fract() == 0.0 && f.abs() < 1e15 {
                        format!("{}", f as i64)
                    } else {
                        f.to_string()
                    }
                })
            }
        }
        _ => None,
    }
}
