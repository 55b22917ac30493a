//! Configuration-struct binding.
//!
//! Every component class declares a `#[derive(Deserialize)]` config type
//! with `#[serde(deny_unknown_fields)]`; [`bind_config`] evaluates the raw
//! JSON blob against it once, at construction time, and freezes the
//! result onto the component. Unknown properties are a hard error;
//! `Option<T>` fields already treat a present `null` the same as an
//! absent key, which is exactly the "null means missing" rule this
//! binder needs — no separate validator registry is needed to get there.

use serde::de::DeserializeOwned;

use crate::error::Error;

/// Binds `raw` to `T`, rejecting unknown keys and malformed values alike
/// as [`Error::ConfigInvalid`].
pub fn bind_config<T: DeserializeOwned>(raw: serde_json::Value) -> Result<T, Error> {
    serde_json::from_value(raw).map_err(|e| Error::ConfigInvalid(e.to_string()))
}

#[cfg(test)]
mod tests {
 use serde::Deserialize;

 use super::*;

 #[derive(Debug, Deserialize, PartialEq)]
 #[serde(deny_unknown_fields)]
 struct Example {
 capacity: f64,
 #[serde(default)]
 max_queue: Option<f64>,
 }

 #[test]
 fn unknown_field_is_rejected() {
 let raw = serde_json::json!({"capacity": 5.0, "bogus": true});
 let err = bind_config::<Example>(raw).unwrap_err();
 assert!(matches!(err, Error::ConfigInvalid(_)));
 }

 #[test]
 fn explicit_null_is_treated_as_absent() {
 let raw = serde_json::json!({"capacity": 5.0, "max_queue": null});
 let bound: Example = bind_config(raw).unwrap();
 assert_eq!(bound.max_queue, None);
 }

 #[test]
 fn missing_optional_field_defaults_to_absent() {
 let raw = serde_json::json!({"capacity": 5.0});
 let bound: Example = bind_config(raw).unwrap();
 assert_eq!(bound.max_queue, None);
 assert_eq!(bound.capacity, 5.0);
 }
}
