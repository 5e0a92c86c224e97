//! Error types for the job-tracking service client.

use thiserror::Error;

/// Failures talking to the job-tracking service.
///
/// - [`Api`](JobServiceError::Api): the service answered with a status other than 200
/// - [`NoDataFound`](JobServiceError::NoDataFound): 200, but the body is the "no data" sentinel
/// - [`Network`](JobServiceError::Network): transport failure, including timeouts
/// - [`Decode`](JobServiceError::Decode): 200 with a body that is not a list of items
#[derive(Debug, Error)]
pub enum JobServiceError {
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("service reported no data for this request and job")]
    NoDataFound,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}
