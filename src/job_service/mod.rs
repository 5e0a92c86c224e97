pub mod client;
pub mod error;
pub mod types;

use serde_json::Value;

pub use client::JobApiClient;
pub use error::JobServiceError;

use crate::state_machine::{JobItem, Reading};

/// Narrow contract the workflow needs from the job-tracking service.
#[allow(async_fn_in_trait)]
pub trait JobService {
    /// Fetches the items of a job. An empty result is `NoDataFound`.
    async fn fetch_items(
        &self,
        request_num: &str,
        job_num: &str,
        machine_payload: &Value,
    ) -> Result<Vec<JobItem>, JobServiceError>;

    /// Submits generated readings, returning the service's response body.
    async fn submit_readings(
        &self,
        request_num: &str,
        job_num: &str,
        machine_payload: &Value,
        readings: &[Reading],
    ) -> Result<Value, JobServiceError>;
}
