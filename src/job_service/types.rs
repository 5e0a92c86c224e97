//! Wire formats of the job-tracking service.
//!
//! The fetch endpoint answers with a JSON array of items. When the request
//! and job numbers match nothing it still answers 200, with a single
//! sentinel error object as the first element.

use serde_json::{Map, Value};

use super::error::JobServiceError;
use crate::state_machine::{JobItem, Reading};

/// Message carried by the service's "no data" sentinel.
pub const NO_DATA_MESSAGE: &str = "No data found !! Please Check Your Job no and Req No ";

/// Key under which submitted readings are attached to the machine payload.
pub const READINGS_KEY: &str = "xrfdetail";

/// Whether `value` is the sentinel object `{"Error": NO_DATA_MESSAGE}`.
pub fn is_no_data_sentinel(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.len() == 1 && obj.get("Error") == Some(&Value::from(NO_DATA_MESSAGE)))
}

/// Decodes a fetch response body into items.
///
/// An empty list and the sentinel both mean "no data".
pub fn parse_items(body: Value) -> Result<Vec<JobItem>, JobServiceError> {
    if body
        .as_array()
        .is_some_and(|items| items.first().is_none_or(is_no_data_sentinel))
    {
        return Err(JobServiceError::NoDataFound);
    }
    Ok(serde_json::from_value(body)?)
}

/// Builds the submit body: the machine payload with readings attached.
///
/// A non-object machine payload is wrapped as `{"machine": payload}`.
pub fn submit_payload(
    machine_payload: &Value,
    readings: &[Reading],
) -> Result<Value, JobServiceError> {
    let mut body = match machine_payload {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("machine".into(), other.clone());
            map
        }
    };
    body.insert(READINGS_KEY.into(), serde_json::to_value(readings)?);
    Ok(Value::Object(body))
}
