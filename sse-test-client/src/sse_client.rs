use anyhow::Result;
use eventsource_client::{self as es, Client};
use futures_util::stream::StreamExt;
use log::*;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: String,
    pub data: String,
}

pub struct Connection {
    pub label: String,
    event_rx: mpsc::UnboundedReceiver<Event>,
    _handle: tokio::task::JoinHandle<()>,
}

pub enum WaitError {
    Timeout,
    Closed,
}

impl Connection {
    pub async fn establish(base_url: &str, session_id: &str, label: String) -> Result<Self> {
        let url = format!("{}/events", base_url);
        let (tx, rx) = mpsc::unbounded_channel();

        // The server closes the stream on logout; reconnecting would only hit a 401
        let client = es::ClientBuilder::for_url(&url)?
            .header("Cookie", &format!("id={}", session_id))?
            .reconnect(es::ReconnectOptions::reconnect(false).build())
            .build();

        let stream_label = label.clone();
        let handle = tokio::spawn(async move {
            let mut stream = client.stream();

            loop {
                match stream.next().await {
                    Some(Ok(es::SSE::Event(event))) => {
                        let sse_event = Event {
                            event_type: event.event_type,
                            data: event.data,
                        };

                        if tx.send(sse_event).is_err() {
                            debug!("SSE receiver dropped for {}", stream_label);
                            break;
                        }
                    }
                    Some(Ok(es::SSE::Comment(_))) => {}
                    Some(Err(e)) => {
                        debug!("SSE stream for {} ended with: {}", stream_label, e);
                        break;
                    }
                    None => {
                        debug!("SSE stream ended for {}", stream_label);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            label,
            event_rx: rx,
            _handle: handle,
        })
    }

    /// Wait for an event of the given type, skipping any others (e.g. heartbeats).
    pub async fn wait_for_event(
        &mut self,
        event_type: &str,
        timeout: Duration,
    ) -> std::result::Result<Event, WaitError> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(WaitError::Timeout);
            }

            match tokio::time::timeout(remaining, self.event_rx.recv()).await {
                Ok(Some(event)) if event.event_type == event_type => return Ok(event),
                Ok(Some(event)) => {
                    trace!("{} skipping {} event", self.label, event.event_type);
                }
                Ok(None) => return Err(WaitError::Closed),
                Err(_) => return Err(WaitError::Timeout),
            }
        }
    }

    /// Wait until the server closes the stream, failing if an event of
    /// type `unexpected` arrives first.
    pub async fn wait_for_close(
        &mut self,
        unexpected: &str,
        timeout: Duration,
    ) -> std::result::Result<(), String> {
        match self.wait_for_event(unexpected, timeout).await {
            Ok(event) => Err(format!("received unexpected {} event", event.event_type)),
            Err(WaitError::Closed) => Ok(()),
            Err(WaitError::Timeout) => Err("stream still open".to_string()),
        }
    }
}
