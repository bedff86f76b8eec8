//! Input-hint extraction from payment-required metadata.
//!
//! Servers sometimes describe how the paid endpoint wants to be called:
//! the expected method, query parameters, body fields, a resource
//! description, and an output example. Two metadata shapes exist: a
//! `resource` object at the top level together with
//! `extensions.bazaar.info` (V2), or the first accept's
//! `outputSchema.input` (V1). Hints are best-effort; nothing here ever
//! fails a parse.

use serde_json::Value;

use crate::offer::InputHints;
use crate::proto::WireVersion;

/// Extracts whatever call-shape metadata the raw challenge carries.
///
/// Returns `None` when no hint field is present at all.
#[must_use]
pub fn extract(raw: &Value, version: WireVersion) -> Option<InputHints> {
    let mut hints = InputHints::default();

    if let Some(resource) = raw.get("resource").and_then(Value::as_object) {
        hints.description = resource
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
    }

    match version {
        WireVersion::V2 => {
            let info = raw
                .get("extensions")
                .and_then(|v| v.get("bazaar"))
                .and_then(|v| v.get("info"));
            if let Some(info) = info {
                merge_input(&mut hints, info.get("input"));
                merge_output(&mut hints, info.get("output"));
                if hints.description.is_none() {
                    hints.description = info
                        .get("description")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                }
            }
        }
        WireVersion::V1 => {
            let first = raw
                .get("accepts")
                .and_then(Value::as_array)
                .and_then(|a| a.first());
            if let Some(accept) = first {
                if let Some(schema) = accept.get("outputSchema") {
                    merge_input(&mut hints, schema.get("input"));
                    merge_output(&mut hints, schema.get("output"));
                }
                if hints.description.is_none() {
                    hints.description = accept
                        .get("description")
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string);
                }
            }
        }
    }

    if hints.is_empty() { None } else { Some(hints) }
}

fn merge_input(hints: &mut InputHints, input: Option<&Value>) {
    let Some(input) = input else { return };
    hints.method = input
        .get("method")
        .and_then(Value::as_str)
        .map(str::to_string);
    hints.query_params = input.get("queryParams").cloned();
    hints.body_fields = input.get("bodyFields").cloned();
}

fn merge_output(hints: &mut InputHints, output: Option<&Value>) {
    let Some(output) = output else { return };
    hints.output_example = output.get("example").cloned().or_else(|| {
        if output.is_null() {
            None
        } else {
            Some(output.clone())
        }
    });
}
