use serde_json::Value;

use super::scalar;

/// Print just the headline figure of a result.
///
/// Checks well-known fields in priority order, then falls back to the first
/// field in the result object.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    // Solve reports the amount; liquidate and schedule report the bill.
    let priority_keys = [
        "requested_amount",
        "net_installment",
        "installment",
        "default_tier",
    ];

    if let Value::Object(map) = result_obj {
        for key in &priority_keys {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    println!("{}", scalar(val));
                    return;
                }
            }
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, scalar(val));
            return;
        }
    }

    println!("{}", scalar(result_obj));
}
