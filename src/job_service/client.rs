use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tracing::debug;

use super::JobService;
use super::error::JobServiceError;
use super::types::{parse_items, submit_payload};
use crate::config::XrfConfig;
use crate::state_machine::{JobItem, Reading};

/// HTTP client for the job-tracking service.
pub struct JobApiClient {
    client: Client,
    base_url: String,
    fetch_path: String,
    submit_path: String,
}

impl JobApiClient {
    pub fn from_config(config: &XrfConfig) -> Result<Self, JobServiceError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            fetch_path: config.fetch_path.trim_start_matches('/').to_string(),
            submit_path: config.submit_path.trim_start_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

// Anything but 200 is a failure, including other 2xx codes.
async fn ensure_ok(response: Response) -> Result<Response, JobServiceError> {
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    Err(JobServiceError::Api {
        status: status.as_u16(),
        message,
    })
}

impl JobService for JobApiClient {
    async fn fetch_items(
        &self,
        request_num: &str,
        job_num: &str,
        machine_payload: &Value,
    ) -> Result<Vec<JobItem>, JobServiceError> {
        let url = self.url(&self.fetch_path);
        debug!(%url, request_num, job_num, "fetching job items");

        let response = self
            .client
            .get(&url)
            .query(&[("reqno", request_num), ("jobno", job_num)])
            .json(machine_payload)
            .send()
            .await?;
        let text = ensure_ok(response).await?.text().await?;
        parse_items(serde_json::from_str(&text)?)
    }

    async fn submit_readings(
        &self,
        request_num: &str,
        job_num: &str,
        machine_payload: &Value,
        readings: &[Reading],
    ) -> Result<Value, JobServiceError> {
        let url = self.url(&self.submit_path);
        let body = submit_payload(machine_payload, readings)?;
        debug!(%url, request_num, job_num, readings = readings.len(), "submitting readings");

        let response = self
            .client
            .post(&url)
            .query(&[("reqno", request_num), ("jobno", job_num)])
            .json(&body)
            .send()
            .await?;
        let text = ensure_ok(response).await?.text().await?;
        Ok(serde_json::from_str(&text).unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::Composition;
    use crate::job_service::types::NO_DATA_MESSAGE;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> JobApiClient {
        let config = XrfConfig {
            api_base_url: format!("{}/", server.uri()),
            fetch_path: "/MANAK/getxrfJobdetails".into(),
            submit_path: "MANAK/postxrfJobdetails".into(),
            ..XrfConfig::default()
        };
        JobApiClient::from_config(&config).unwrap()
    }

    fn reading() -> Reading {
        let item: JobItem =
            serde_json::from_value(json!({ "tag_id": "T1", "declare_purity": "22K916" })).unwrap();
        Reading::new(
            &item,
            1,
            Composition {
                gold: 917.0,
                silver: 15.0,
                copper: 61.5,
                zinc: 6.5,
            },
        )
    }

    #[tokio::test]
    async fn fetch_sends_query_and_machine_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/MANAK/getxrfJobdetails"))
            .and(query_param("reqno", "R1"))
            .and(query_param("jobno", "J1"))
            .and(body_partial_json(json!({ "xrfmake": "MICROSPEC" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "tag_id": "T1", "declare_purity": "22K916", "date": "2024-01-02" }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let items = client_for(&server)
            .fetch_items("R1", "J1", &json!({ "xrfmake": "MICROSPEC" }))
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].tag_id, "T1");
    }

    #[tokio::test]
    async fn fetch_maps_sentinel_to_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{ "Error": NO_DATA_MESSAGE }])),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_items("R1", "J404", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, JobServiceError::NoDataFound));
    }

    #[tokio::test]
    async fn fetch_non_200_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down for maintenance"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_items("R1", "J1", &json!({}))
            .await
            .unwrap_err();
        match err {
            JobServiceError::Api { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "down for maintenance");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn submit_posts_readings_under_xrfdetail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/MANAK/postxrfJobdetails"))
            .and(query_param("reqno", "R1"))
            .and(query_param("jobno", "J1"))
            .and(body_partial_json(json!({
                "xrfmake": "FISCHER",
                "xrfdetail": [{ "tag_id": "T1", "reading": 1, "gold": 917.0 }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "status": "saved" }])))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server)
            .submit_readings("R1", "J1", &json!({ "xrfmake": "FISCHER" }), &[reading()])
            .await
            .unwrap();
        assert_eq!(response, json!([{ "status": "saved" }]));
    }

    #[tokio::test]
    async fn submit_accepts_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let response = client_for(&server)
            .submit_readings("R1", "J1", &json!({}), &[reading()])
            .await
            .unwrap();
        assert_eq!(response, Value::Null);
    }

    #[tokio::test]
    async fn submit_rejects_other_success_codes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .submit_readings("R1", "J1", &json!({}), &[reading()])
            .await
            .unwrap_err();
        assert!(matches!(err, JobServiceError::Api { status: 202, .. }));
    }
}
