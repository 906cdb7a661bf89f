use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{scalar, ROW_FIELDS};

/// Format output as field/value tables using the tabled crate. Row-valued
/// fields (schedule, tariff rows) get a table of their own.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => match map.get("result") {
            Some(Value::Object(result)) => print_result(result, map),
            _ => print_fields(map),
        },
        Value::Array(arr) => print_rows(arr),
        _ => println!("{value}"),
    }
}

fn print_result(result: &Map<String, Value>, envelope: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in result {
        if ROW_FIELDS.contains(&key.as_str()) || key == "audit" {
            continue;
        }
        builder.push_record([key.as_str(), &scalar(val)]);
    }
    println!("{}", Table::from(builder));

    if let Some(Value::Object(audit)) = result.get("audit") {
        println!("\nAudit (unrounded):");
        print_fields(audit);
    }

    for field in ROW_FIELDS {
        if let Some(Value::Array(rows)) = result.get(field) {
            if !rows.is_empty() {
                println!("\n{field}:");
                print_rows(rows);
            }
        }
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {w}");
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {meth}");
    }
}

fn print_fields(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        builder.push_record([key.as_str(), &scalar(val)]);
    }
    println!("{}", Table::from(builder));
}

fn print_rows(rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        for item in rows {
            println!("{}", scalar(item));
        }
        return;
    };

    let headers: Vec<String> = first.keys().cloned().collect();
    let mut builder = Builder::default();
    builder.push_record(&headers);
    for item in rows {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(h.as_str()).map(scalar).unwrap_or_default())
                .collect();
            builder.push_record(row);
        }
    }
    println!("{}", Table::from(builder));
}
