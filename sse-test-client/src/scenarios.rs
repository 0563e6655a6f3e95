use anyhow::Result;
use colored::*;
use reqwest::Client;
use std::time::{Duration, Instant};

use crate::api_client::ApiClient;
use crate::auth::login;
use crate::output::{print_event, TestResult};
use crate::sse_client::{Connection, WaitError};

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a scenario needs to talk to the backend.
pub struct Harness {
    pub client: Client,
    pub api: ApiClient,
    pub base_url: String,
    /// Upper bound on the wait for a heartbeat; slightly above the server's interval.
    pub heartbeat_timeout: Duration,
}

impl Harness {
    async fn connect(&self, label: &str) -> Result<(String, Connection)> {
        let session = login(&self.client, &self.base_url).await?;
        println!(
            "{} {} logged in (session {})",
            "✓".green(),
            label,
            session.session_id
        );
        let connection =
            Connection::establish(&self.base_url, &session.session_id, label.to_string()).await?;
        Ok((session.session_id, connection))
    }
}

fn describe(err: WaitError, event_type: &str) -> String {
    match err {
        WaitError::Timeout => format!("Timeout waiting for {event_type}"),
        WaitError::Closed => format!("Stream closed before {event_type} arrived"),
    }
}

pub async fn test_connection(harness: &Harness) -> Result<TestResult> {
    let start = Instant::now();
    println!("\n{}", "=== TEST: Connection ===".bright_cyan().bold());

    let (_session, mut sse) = harness.connect("Client 1").await?;

    println!("{} Waiting for a heartbeat...", "→".blue());
    Ok(
        match sse
            .wait_for_event("Heartbeat", harness.heartbeat_timeout)
            .await
        {
            Ok(event) => {
                print_event(&sse.label, &event);
                TestResult::pass("connection", start.elapsed())
            }
            Err(e) => TestResult::fail("connection", describe(e, "Heartbeat"), start.elapsed()),
        },
    )
}

pub async fn test_task_ready(harness: &Harness) -> Result<TestResult> {
    let start = Instant::now();
    println!("\n{}", "=== TEST: Task Ready ===".bright_cyan().bold());

    let (session1, mut sse1) = harness.connect("Client 1").await?;
    let (_session2, mut sse2) = harness.connect("Client 2").await?;

    let correlation_id = format!("search-{}", start.elapsed().as_nanos());
    println!("{} Client 1 submitting task {}...", "→".blue(), correlation_id);
    harness.api.submit_task(&session1, &correlation_id).await?;

    let received = match sse1.wait_for_event("TaskReady", EVENT_TIMEOUT).await {
        Ok(event) => event,
        Err(e) => {
            return Ok(TestResult::fail(
                "task_ready",
                describe(e, "TaskReady"),
                start.elapsed(),
            ))
        }
    };
    print_event(&sse1.label, &received);

    if received.data != correlation_id {
        return Ok(TestResult::fail(
            "task_ready",
            format!(
                "Expected correlation id {}, got {}",
                correlation_id, received.data
            ),
            start.elapsed(),
        ));
    }

    println!("{} Checking Client 2 did not receive it...", "→".blue());
    Ok(
        match sse2.wait_for_event("TaskReady", Duration::from_secs(2)).await {
            Ok(event) => TestResult::fail(
                "task_ready",
                format!("Client 2 received foreign TaskReady {}", event.data),
                start.elapsed(),
            ),
            Err(_) => TestResult::pass("task_ready", start.elapsed()),
        },
    )
}

pub async fn test_logout(harness: &Harness) -> Result<TestResult> {
    let start = Instant::now();
    println!("\n{}", "=== TEST: Logout ===".bright_cyan().bold());

    let (session, mut sse) = harness.connect("Client 1").await?;

    // The first event of a stream is not auth-checked; let it go by first.
    if let Err(e) = sse
        .wait_for_event("Heartbeat", harness.heartbeat_timeout)
        .await
    {
        return Ok(TestResult::fail(
            "logout",
            describe(e, "Heartbeat"),
            start.elapsed(),
        ));
    }

    println!("{} Logging out...", "→".blue());
    harness.api.logout(&session).await?;

    println!("{} Waiting for LoggedOut on next heartbeat...", "→".blue());
    let logged_out = match sse
        .wait_for_event("LoggedOut", harness.heartbeat_timeout)
        .await
    {
        Ok(event) => event,
        Err(e) => {
            return Ok(TestResult::fail(
                "logout",
                describe(e, "LoggedOut"),
                start.elapsed(),
            ))
        }
    };
    print_event(&sse.label, &logged_out);

    Ok(match sse.wait_for_close("Heartbeat", EVENT_TIMEOUT).await {
        Ok(()) => TestResult::pass("logout", start.elapsed()),
        Err(msg) => TestResult::fail("logout", msg, start.elapsed()),
    })
}

pub async fn test_revoke(harness: &Harness) -> Result<TestResult> {
    let start = Instant::now();
    println!("\n{}", "=== TEST: Revoke Stream ===".bright_cyan().bold());

    let (session, mut sse) = harness.connect("Client 1").await?;

    println!("{} Closing the event stream from the server side...", "→".blue());
    harness.api.close_stream(&session).await?;

    println!(
        "{} Waiting for the stream to close on next heartbeat...",
        "→".blue()
    );
    Ok(
        match sse
            .wait_for_close("LoggedOut", harness.heartbeat_timeout + EVENT_TIMEOUT)
            .await
        {
            Ok(()) => TestResult::pass("revoke", start.elapsed()),
            Err(msg) => TestResult::fail("revoke", msg, start.elapsed()),
        },
    )
}
