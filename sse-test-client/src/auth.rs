use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    data: CreateSessionData,
}

#[derive(Debug, Deserialize)]
struct CreateSessionData {
    session_id: String,
}

/// Start a new session on the backend.
pub async fn login(client: &Client, base_url: &str) -> Result<AuthenticatedSession> {
    let url = format!("{}/sessions", base_url);

    let response = client
        .post(&url)
        .send()
        .await
        .context("Failed to send login request")?;

    if !response.status().is_success() {
        anyhow::bail!("Login failed: {}", response.status());
    }

    let body: CreateSessionResponse = response
        .json()
        .await
        .context("Failed to parse login response")?;

    Ok(AuthenticatedSession {
        session_id: body.data.session_id,
    })
}
