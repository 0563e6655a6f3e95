//! Per-connection delivery: auth gating, sending, and the termination decision.

use crate::message::{Event, EventType, SessionId};
use async_stream::stream;
use async_trait::async_trait;
use futures::{pin_mut, Stream, StreamExt};
use log::*;
use std::fmt;
use std::sync::Arc;

/// Answers whether a session is still authenticated.
#[async_trait]
pub trait AuthChecker: Send + Sync {
    async fn is_authenticated(&self, session_id: &SessionId) -> bool;
}

#[async_trait]
impl<T: AuthChecker + ?Sized> AuthChecker for Arc<T> {
    async fn is_authenticated(&self, session_id: &SessionId) -> bool {
        (**self).is_authenticated(session_id).await
    }
}

/// Writes one event to the client. Returns `false` on any transport failure.
#[async_trait]
pub trait EventSender: Send {
    async fn send(&mut self, event: &Event) -> bool;
}

/// Result of handling a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub delivered: bool,
    pub authenticated: bool,
}

impl Outcome {
    pub fn should_continue(&self) -> bool {
        self.delivered && self.authenticated
    }

    /// The state this outcome moves the pipeline into, if it ends delivery.
    pub fn terminal_state(&self) -> Option<DeliveryState> {
        if !self.authenticated {
            Some(DeliveryState::LoggedOut)
        } else if !self.delivered {
            Some(DeliveryState::Disconnected)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// Still consuming the merged stream.
    Open,
    /// An auth check failed and a `LoggedOut` event was written in its place.
    LoggedOut,
    /// The transport failed, or the session was removed from the registry.
    Disconnected,
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryState::Open => write!(f, "open"),
            DeliveryState::LoggedOut => write!(f, "logged out"),
            DeliveryState::Disconnected => write!(f, "disconnected"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Deliver the first event without re-checking auth, since the
    /// connection was authenticated during the handshake.
    pub skip_first_auth_check: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            skip_first_auth_check: true,
        }
    }
}

pub struct Pipeline<A, S> {
    session_id: SessionId,
    auth_checker: A,
    sender: S,
    options: PipelineOptions,
}

impl<A, S> Pipeline<A, S>
where
    A: AuthChecker,
    S: EventSender,
{
    pub fn new(session_id: SessionId, auth_checker: A, sender: S) -> Self {
        Self {
            session_id,
            auth_checker,
            sender,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Drive `events` through the auth gate and the sender, yielding one
    /// [`Outcome`] per event. The stream ends right after the first outcome
    /// that is not both delivered and authenticated, or when `events` ends.
    pub fn deliver<E>(self, events: E) -> impl Stream<Item = Outcome> + Send
    where
        E: Stream<Item = Event> + Send,
    {
        let Pipeline {
            session_id,
            auth_checker,
            mut sender,
            options,
        } = self;

        stream! {
            pin_mut!(events);
            let mut first = true;

            while let Some(event) = events.next().await {
                let bypass = first && options.skip_first_auth_check;
                first = false;

                let mut authenticated = true;
                let event = if !bypass
                    && event.auth_check_required()
                    && !auth_checker.is_authenticated(&session_id).await
                {
                    info!(
                        "Session {session_id} failed auth check on {}, sending LoggedOut",
                        event.event_type()
                    );
                    authenticated = false;
                    Event::LoggedOut
                } else {
                    event
                };

                let delivered = sender.send(&event).await;
                trace!(
                    "Session {session_id}: {} delivered={delivered} authenticated={authenticated}",
                    event.event_type()
                );

                let outcome = Outcome {
                    delivered,
                    authenticated,
                };
                yield outcome;

                if !outcome.should_continue() {
                    break;
                }
            }
        }
    }

    /// Run the pipeline to completion and report how it ended.
    pub async fn run<E>(self, events: E) -> DeliveryState
    where
        E: Stream<Item = Event> + Send,
    {
        let session_id = self.session_id.clone();
        let outcomes = self.deliver(events);
        pin_mut!(outcomes);

        let mut delivered = 0usize;
        let mut state = DeliveryState::Open;
        while let Some(outcome) = outcomes.next().await {
            match outcome.terminal_state() {
                Some(terminal) => state = terminal,
                None => delivered += 1,
            }
        }

        // The merged stream ran dry: the session was unregistered or the bus closed
        if state == DeliveryState::Open {
            state = DeliveryState::Disconnected;
        }

        info!("Event stream for session {session_id} ended ({state}) after {delivered} event(s)");
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Manager;
    use futures::stream;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::timeout;

    /// Auth checker answering from a script, then `true` once exhausted.
    #[derive(Clone, Default)]
    struct ScriptedAuth {
        answers: Arc<Mutex<VecDeque<bool>>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedAuth {
        fn answering(answers: &[bool]) -> Self {
            Self {
                answers: Arc::new(Mutex::new(answers.iter().copied().collect())),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AuthChecker for ScriptedAuth {
        async fn is_authenticated(&self, _session_id: &SessionId) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answers.lock().unwrap().pop_front().unwrap_or(true)
        }
    }

    /// Sender that records what it was given and fails on the n-th call.
    #[derive(Clone, Default)]
    struct RecordingSender {
        sent: Arc<Mutex<Vec<Event>>>,
        fail_on: Option<usize>,
    }

    impl RecordingSender {
        fn failing_on(n: usize) -> Self {
            Self {
                fail_on: Some(n),
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<Event> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventSender for RecordingSender {
        async fn send(&mut self, event: &Event) -> bool {
            let mut sent = self.sent.lock().unwrap();
            sent.push(event.clone());
            Some(sent.len()) != self.fail_on
        }
    }

    fn heartbeats(n: usize) -> impl Stream<Item = Event> + Send {
        stream::iter(std::iter::repeat(Event::Heartbeat).take(n))
    }

    async fn collect<A: AuthChecker, S: EventSender>(
        pipeline: Pipeline<A, S>,
        events: impl Stream<Item = Event> + Send,
    ) -> Vec<Outcome> {
        pipeline.deliver(events).collect().await
    }

    const OK: Outcome = Outcome {
        delivered: true,
        authenticated: true,
    };

    #[tokio::test]
    async fn test_send_failure_on_eleventh_event_ends_with_eleven_outcomes() {
        let sender = RecordingSender::failing_on(11);
        let pipeline = Pipeline::new("s1".into(), ScriptedAuth::default(), sender.clone());

        let outcomes = collect(pipeline, heartbeats(20)).await;

        assert_eq!(outcomes.len(), 11);
        assert!(outcomes[..10].iter().all(|o| *o == OK));
        assert_eq!(
            outcomes[10],
            Outcome {
                delivered: false,
                authenticated: true
            }
        );
        assert_eq!(sender.sent().len(), 11, "nothing is sent after the failure");
    }

    #[tokio::test]
    async fn test_nth_send_failure_yields_exactly_n_outcomes() {
        for n in 1..=5 {
            let pipeline = Pipeline::new(
                "s1".into(),
                ScriptedAuth::default(),
                RecordingSender::failing_on(n),
            );
            let outcomes = collect(pipeline, heartbeats(8)).await;
            assert_eq!(outcomes.len(), n);
            assert!(!outcomes.last().unwrap().delivered);
        }
    }

    #[tokio::test]
    async fn test_auth_failure_replaces_event_with_logged_out() {
        // first event bypasses the check, so the script covers events 2 and 3
        let auth = ScriptedAuth::answering(&[true, false]);
        let sender = RecordingSender::default();
        let pipeline = Pipeline::new("s1".into(), auth.clone(), sender.clone());

        let outcomes = collect(pipeline, heartbeats(6)).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(
            *outcomes.last().unwrap(),
            Outcome {
                delivered: true,
                authenticated: false
            }
        );
        assert_eq!(
            sender.sent(),
            vec![Event::Heartbeat, Event::Heartbeat, Event::LoggedOut]
        );
        assert_eq!(auth.calls(), 2);
    }

    #[tokio::test]
    async fn test_first_event_skips_auth_check_by_default() {
        let auth = ScriptedAuth::answering(&[false]);
        let sender = RecordingSender::default();
        let pipeline = Pipeline::new("s1".into(), auth.clone(), sender.clone());

        let outcomes = collect(pipeline, heartbeats(1)).await;

        assert_eq!(outcomes, vec![OK]);
        assert_eq!(auth.calls(), 0);
        assert_eq!(sender.sent(), vec![Event::Heartbeat]);
    }

    #[tokio::test]
    async fn test_first_event_is_checked_when_bypass_disabled() {
        let auth = ScriptedAuth::answering(&[false]);
        let sender = RecordingSender::default();
        let pipeline = Pipeline::new("s1".into(), auth.clone(), sender.clone()).with_options(
            PipelineOptions {
                skip_first_auth_check: false,
            },
        );

        let outcomes = collect(pipeline, heartbeats(3)).await;

        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].authenticated);
        assert_eq!(sender.sent(), vec![Event::LoggedOut]);
    }

    #[tokio::test]
    async fn test_task_ready_is_delivered_without_auth_check() {
        let auth = ScriptedAuth::answering(&[false, false, false]);
        let sender = RecordingSender::default();
        let pipeline = Pipeline::new("s1".into(), auth.clone(), sender.clone());

        let events = stream::iter(vec![
            Event::Heartbeat,
            Event::TaskReady {
                correlation_id: "search-42".to_string(),
            },
            Event::Heartbeat,
        ]);
        let outcomes = collect(pipeline, events).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(auth.calls(), 1, "only the trailing heartbeat is checked");
        assert_eq!(
            sender.sent(),
            vec![
                Event::Heartbeat,
                Event::TaskReady {
                    correlation_id: "search-42".to_string()
                },
                Event::LoggedOut,
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_logged_out_send_is_still_logged_out() {
        let auth = ScriptedAuth::answering(&[false]);
        let pipeline = Pipeline::new("s1".into(), auth, RecordingSender::failing_on(2));

        let state = pipeline.run(heartbeats(5)).await;
        assert_eq!(state, DeliveryState::LoggedOut);
    }

    #[tokio::test]
    async fn test_run_reports_terminal_state() {
        let pipeline = Pipeline::new(
            "s1".into(),
            ScriptedAuth::default(),
            RecordingSender::failing_on(3),
        );
        assert_eq!(pipeline.run(heartbeats(5)).await, DeliveryState::Disconnected);

        let pipeline = Pipeline::new(
            "s1".into(),
            ScriptedAuth::answering(&[false]),
            RecordingSender::default(),
        );
        assert_eq!(pipeline.run(heartbeats(5)).await, DeliveryState::LoggedOut);
    }

    #[tokio::test]
    async fn test_exhausted_stream_leaves_open_as_disconnected() {
        assert_eq!(OK.terminal_state(), None, "a successful outcome keeps the pipeline open");

        let sender = RecordingSender::default();
        let pipeline = Pipeline::new("s1".into(), ScriptedAuth::default(), sender.clone());

        assert_eq!(pipeline.run(heartbeats(3)).await, DeliveryState::Disconnected);
        assert_eq!(sender.sent().len(), 3);
        assert_eq!(DeliveryState::Open.to_string(), "open");
    }

    #[tokio::test]
    async fn test_unsubscribed_session_terminates_even_if_send_would_succeed() {
        let manager = Manager::new();
        let subscription = manager.subscribe("s1".into());
        let (events, unsubscribe) = subscription.into_parts();
        let sender = RecordingSender::default();
        let pipeline = Pipeline::new("s1".into(), ScriptedAuth::default(), sender.clone());

        let task = tokio::spawn(pipeline.run(events));

        manager.publish_global(Event::Heartbeat);
        tokio::time::sleep(Duration::from_millis(50)).await;
        unsubscribe.unsubscribe();
        manager.publish_global(Event::Heartbeat);

        let state = timeout(Duration::from_secs(1), task)
            .await
            .expect("pipeline should stop")
            .unwrap();
        assert_eq!(state, DeliveryState::Disconnected);
        assert_eq!(sender.sent(), vec![Event::Heartbeat]);
    }

    #[tokio::test]
    async fn test_task_ready_reaches_only_target_session_pipeline() {
        let manager = Manager::new();
        let (s1_events, s1_unsubscribe) = manager.subscribe("s1".into()).into_parts();
        let (s2_events, s2_unsubscribe) = manager.subscribe("s2".into()).into_parts();
        let s1_sender = RecordingSender::default();
        let s2_sender = RecordingSender::default();

        let s1 = tokio::spawn(
            Pipeline::new("s1".into(), ScriptedAuth::default(), s1_sender.clone()).run(s1_events),
        );
        let s2 = tokio::spawn(
            Pipeline::new("s2".into(), ScriptedAuth::default(), s2_sender.clone()).run(s2_events),
        );

        manager.publish_to_session(
            &"s1".into(),
            Event::TaskReady {
                correlation_id: "search-42".to_string(),
            },
        );
        manager.publish_global(Event::Heartbeat);
        tokio::time::sleep(Duration::from_millis(50)).await;

        s1_unsubscribe.unsubscribe();
        s2_unsubscribe.unsubscribe();
        manager.publish_global(Event::Heartbeat);
        timeout(Duration::from_secs(1), s1).await.unwrap().unwrap();
        timeout(Duration::from_secs(1), s2).await.unwrap().unwrap();

        assert!(s1_sender.sent().contains(&Event::TaskReady {
            correlation_id: "search-42".to_string()
        }));
        assert!(s1_sender.sent().contains(&Event::Heartbeat));
        assert_eq!(s2_sender.sent(), vec![Event::Heartbeat]);
    }

    #[test]
    fn test_outcome_terminal_states() {
        assert_eq!(OK.terminal_state(), None);
        assert!(OK.should_continue());
        assert_eq!(
            Outcome {
                delivered: false,
                authenticated: true
            }
            .terminal_state(),
            Some(DeliveryState::Disconnected)
        );
        assert_eq!(
            Outcome {
                delivered: true,
                authenticated: false
            }
            .terminal_state(),
            Some(DeliveryState::LoggedOut)
        );
    }
}
