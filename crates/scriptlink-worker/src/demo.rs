//! Sample actions shipped with the worker binary.
//!
//! These are consumers of the registration API, not part of the RPC core:
//! the binary registers them so a freshly launched worker has something to
//! answer with, and the integration tests drive the full network path
//! through them.
//!
//! Two flavours on purpose:
//!
//! - [`greet`] trusts its payload; a malformed request is logged and
//!   produces no response.
//! - [`greet2`] validates its payload and answers malformed requests with an
//!   `{"error": ...}` payload, so the host sees *why* nothing greeted it.

use serde_json::{json, Value};
use tracing::warn;

use crate::application::context::ActionContext;
use crate::application::registry::ActionRegistry;

/// Registers the sample actions on `registry`.
pub fn register_demo_actions(registry: &mut ActionRegistry) {
    registry.register("greet", greet);
    registry.register("greet2", greet2);
}

/// Greets by name and age, assuming both fields are present.
async fn greet(data: Value, ctx: ActionContext) {
    let (Some(name), Some(age)) = (data.get("name"), data.get("age")) else {
        warn!("greet: payload missing 'name' or 'age'; no response sent");
        return;
    };

    ctx.send(json!({
        "text": format!(
            "Hello {}!, you are {} years old.",
            display_field(name),
            display_field(age)
        ),
        "age": age.clone(),
    }));
}

/// Greets by name and age, validating that `age` is an integer.
///
/// Unlike [`greet`], every request gets a response: either the greeting or
/// an `{"error": ...}` payload describing what was wrong.
async fn greet2(data: Value, ctx: ActionContext) {
    match parse_greet_request(&data) {
        Ok((name, age)) => ctx.send(json!({
            "text": format!("Hello {name}!, you are {age} years old."),
            "age": age,
        })),
        Err(message) => ctx.send(json!({ "error": message })),
    }
}

// ── Payload helpers ───────────────────────────────────────────────────────────

/// Renders a JSON value for interpolation into greeting text: strings drop
/// their quotes, everything else uses its JSON form.
fn display_field(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Extracts and validates the `name` and `age` fields of a greet request.
fn parse_greet_request(data: &Value) -> Result<(String, i64), String> {
    let name = data
        .get("name")
        .map(display_field)
        .ok_or_else(|| "missing field 'name'".to_string())?;

    let age_value = data
        .get("age")
        .ok_or_else(|| "missing field 'age'".to_string())?;
    let age =
        coerce_age(age_value).ok_or_else(|| format!("'age' is not an integer: {age_value}"))?;

    Ok((name, age))
}

/// Coerces an age value to an integer: integers pass through, floats
/// truncate, numeric strings parse.
fn coerce_age(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
