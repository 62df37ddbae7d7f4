//! # Drift Detection
//!
//! Compares the parameters the provider echoes back for a release with the
//! parameters resolved from the desired state.
//!
//! Values are compared in their string form, so the provider may echo `1` for
//! a parameter submitted as `"1"` (or the other way round) without triggering
//! an update. Integral floats render like integers, so `1.0` matches `1` too.

use crate::provider::{ExternalDetail, Params};
use serde_json::{Number, Value};

/// Key under which the provider echoes the last submitted parameters
pub const REQUEST_PARAMS_KEY: &str = "request_params";

/// String form used for comparison
///
/// Strings compare by their raw content; containers by compact JSON.
#[must_use]
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => stringify_number(n),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// `1.0` renders as `1`; other floats keep their fractional part
#[allow(clippy::float_cmp, reason = "exact check for an integral float")]
fn stringify_number(n: &Number) -> String {
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            if f.is_finite() && f.fract() == 0.0 {
                return format!("{f:.0}");
            }
        }
    }
    n.to_string()
}

/// Names of desired parameters whose value differs from the provider's echo
///
/// A parameter missing from the echo counts as drifted. A detail without a
/// `request_params` object is treated as not drifted at all.
#[must_use]
pub fn drifted_params<'a>(desired: &'a Params, detail: &ExternalDetail) -> Vec<&'a str> {
    let Some(Value::Object(echoed)) = detail.get(REQUEST_PARAMS_KEY) else {
        return Vec::new();
    };

    desired
        .iter()
        .filter(|(name, value)| {
            echoed
                .get(name.as_str())
                .is_none_or(|current| stringify(current) != stringify(value))
        })
        .map(|(name, _)| name.as_str())
        .collect()
}
