use crate::message::{Event, SessionId};
use crate::registry::SessionRegistry;
use futures::future::ready;
use futures::stream::{self, Stream, StreamExt};
use log::*;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

/// Merged view of the global channel and one session's private channel.
pub type EventStream = Pin<Box<dyn Stream<Item = Event> + Send>>;

/// A live subscription: the merged event stream plus the handle that ends it.
pub struct Subscription {
    pub session_id: SessionId,
    pub stream: EventStream,
    pub unsubscribe: Unsubscribe,
}

impl Subscription {
    pub fn into_parts(self) -> (EventStream, Unsubscribe) {
        (self.stream, self.unsubscribe)
    }
}

/// Ends one subscription and releases its claim on the session's registry
/// entry. Clones share state, so only the first call across all clones has
/// any effect.
#[derive(Clone)]
pub struct Unsubscribe {
    session_id: SessionId,
    generation: u64,
    registry: Arc<SessionRegistry>,
    done: Arc<AtomicBool>,
}

impl Unsubscribe {
    pub(crate) fn new(
        session_id: SessionId,
        generation: u64,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            session_id,
            generation,
            registry,
            done: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns `true` only for the call that actually removed the registry
    /// entry, i.e. this was the last subscriber on it.
    pub fn unsubscribe(&self) -> bool {
        if self.done.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.registry.release(&self.session_id, self.generation)
    }

    /// Still subscribed, and the registry entry it was issued for is still in place.
    fn is_live(&self) -> bool {
        !self.done.load(Ordering::Acquire)
            && self.registry.is_current(&self.session_id, self.generation)
    }
}

/// Merge the two receivers into one stream that ends on the first event
/// observed after the subscription was unsubscribed or its registry entry
/// was removed.
pub(crate) fn merged_stream(
    unsubscribe: Unsubscribe,
    global: broadcast::Receiver<Event>,
    private: broadcast::Receiver<Event>,
) -> EventStream {
    let global = lossy(global, unsubscribe.session_id.clone(), "global");
    let private = lossy(private, unsubscribe.session_id.clone(), "session");

    let merged = stream::select(global, private).take_while(move |_| {
        let live = unsubscribe.is_live();
        if !live {
            debug!(
                "Session {} is no longer registered, closing its event stream",
                unsubscribe.session_id
            );
        }
        ready(live)
    });

    Box::pin(merged)
}

/// Adapt a broadcast receiver into a stream that skips over dropped events.
fn lossy(
    receiver: broadcast::Receiver<Event>,
    session_id: SessionId,
    channel: &'static str,
) -> impl Stream<Item = Event> + Send {
    BroadcastStream::new(receiver).filter_map(move |item| {
        let event = match item {
            Ok(event) => Some(event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(
                    "Session {session_id} fell behind on the {channel} channel, {skipped} oldest event(s) dropped"
                );
                None
            }
        };
        ready(event)
    })
}
