use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde_json::json;

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Submit a background task; the server answers `TaskReady` on the stream when done.
    pub async fn submit_task(&self, session_id: &str, correlation_id: &str) -> Result<()> {
        let url = format!("{}/tasks", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Cookie", format!("id={}", session_id))
            .json(&json!({ "correlation_id": correlation_id }))
            .send()
            .await
            .context("Failed to submit task")?;

        expect_status(response, StatusCode::ACCEPTED, "submit task").await
    }

    /// Log the session out.
    pub async fn logout(&self, session_id: &str) -> Result<()> {
        let url = format!("{}/sessions", self.base_url);

        let response = self
            .client
            .delete(&url)
            .header("Cookie", format!("id={}", session_id))
            .send()
            .await
            .context("Failed to log out")?;

        expect_status(response, StatusCode::NO_CONTENT, "logout").await
    }

    /// Close the session's event stream without logging out.
    pub async fn close_stream(&self, session_id: &str) -> Result<()> {
        let url = format!("{}/events", self.base_url);

        let response = self
            .client
            .delete(&url)
            .header("Cookie", format!("id={}", session_id))
            .send()
            .await
            .context("Failed to close event stream")?;

        expect_status(response, StatusCode::NO_CONTENT, "close stream").await
    }
}

async fn expect_status(
    response: reqwest::Response,
    expected: StatusCode,
    action: &str,
) -> Result<()> {
    let status = response.status();
    if status != expected {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());
        anyhow::bail!("Failed to {}: {} - Response: {}", action, status, body);
    }
    Ok(())
}
