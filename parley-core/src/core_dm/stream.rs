/*
    stream.rs - Push callback to async sequence bridge

    The substrate notifies new messages through a synchronous callback. This
    module turns that into a `futures::Stream`:

        substrate callback ──► Outlet (unbounded mpsc) ──► MessageStream
                │                                              │
                └────────── SubscriptionSlot ◄─────── cancel / drop

    Lifecycle: Idle → Starting → Active → Draining → Ended

    - Starting: a task is registering the callback with the substrate
    - Active: callback registered, projected messages are queued in order
    - Draining: nothing more will be queued, buffered items still delivered
    - Ended: subscription closed and buffer empty

    The slot owns the substrate subscription and ends it at most once, whether
    closing is triggered by the consumer, by a newer stream on the same
    channel, or by a failure.

    The callback owns a `Producer` guard. A substrate that stops delivering
    drops the callback, which detaches the outlet and lets the stream drain.
*/

use crate::core_dm::client::Client;
use crate::core_dm::errors::{DmError, DmResult};
use crate::core_dm::message::MessageProjection;
use crate::core_dm::substrate::{Conversation, MessageCallback, RawMessage, Subscription};
use futures::Stream;
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, warn};

/// Observable state of a message stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    /// No stream has been started
    Idle,
    /// Callback registration in progress
    Starting,
    /// Receiving messages
    Active,
    /// No further deliveries; buffered items remain
    Draining,
    Ended,
}

/// Maps one raw record to a stream item
pub(crate) type Projector<T> = fn(MessageProjection<'_>) -> DmResult<T>;

/// Sending half of a stream's queue
///
/// Detaching drops the sender, so the consumer sees the end of the sequence
/// once the buffer is drained.
struct Outlet<T> {
    tx: Mutex<Option<mpsc::UnboundedSender<DmResult<T>>>>,
}

impl<T> Outlet<T> {
    fn new(tx: mpsc::UnboundedSender<DmResult<T>>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<DmResult<T>>>> {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue an item; returns false if the outlet is detached
    fn send(&self, item: T) -> bool {
        match self.lock().as_ref() {
            Some(tx) => tx.send(Ok(item)).is_ok(),
            None => false,
        }
    }

    /// Queue a terminal error and detach
    fn fail(&self, err: DmError) {
        if let Some(tx) = self.lock().take() {
            let _ = tx.send(Err(err));
        }
    }

    fn detach(&self) {
        self.lock().take();
    }

    fn is_detached(&self) -> bool {
        self.lock().is_none()
    }
}

/// Outlet handle owned by the substrate callback
struct Producer<T> {
    outlet: Arc<Outlet<T>>,
}

impl<T> Drop for Producer<T> {
    fn drop(&mut self) {
        if !self.outlet.is_detached() {
            debug!("Substrate released stream callback");
            self.outlet.detach();
        }
    }
}

enum SlotState {
    Starting,
    Active(Box<dyn Subscription>),
    Closed,
}

enum Installed {
    Active,
    /// Slot closed while registration was in flight
    Rejected(Box<dyn Subscription>),
    /// Substrate finished the subscription before handing it over
    Finished,
}

/// Owns the substrate subscription of one stream
pub(crate) struct SubscriptionSlot {
    state: Mutex<SlotState>,
    registration: Mutex<Option<AbortHandle>>,
    detach: Box<dyn Fn() + Send + Sync>,
}

impl SubscriptionSlot {
    fn new(detach: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            state: Mutex::new(SlotState::Starting),
            registration: Mutex::new(None),
            detach: Box::new(detach),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remember the registration task so closing can abort it
    fn track_registration(&self, handle: AbortHandle) {
        if self.is_closed() {
            handle.abort();
            return;
        }
        *self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Hand over a freshly registered subscription
    ///
    /// If the slot was closed while registration was in flight, the
    /// subscription is ended right away.
    fn install(&self, subscription: Box<dyn Subscription>) {
        let outcome = {
            let mut state = self.lock();
            match *state {
                SlotState::Starting if subscription.is_closed() => {
                    *state = SlotState::Closed;
                    Installed::Finished
                }
                SlotState::Starting => {
                    *state = SlotState::Active(subscription);
                    Installed::Active
                }
                SlotState::Active(_) | SlotState::Closed => Installed::Rejected(subscription),
            }
        };

        match outcome {
            Installed::Active => debug!("Stream active"),
            Installed::Rejected(subscription) => {
                debug!("Stream closed during registration");
                subscription.end();
            }
            Installed::Finished => {
                debug!("Substrate closed subscription during registration");
                (self.detach)();
            }
        }
    }

    /// Close the slot; idempotent
    pub(crate) fn close(&self) {
        let previous = std::mem::replace(&mut *self.lock(), SlotState::Closed);

        match previous {
            SlotState::Closed => return,
            SlotState::Active(subscription) => subscription.end(),
            SlotState::Starting => {
                let registration = self
                    .registration
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                if let Some(registration) = registration {
                    registration.abort();
                }
            }
        }
        (self.detach)();
        debug!("Stream subscription closed");
    }

    fn is_closed(&self) -> bool {
        matches!(*self.lock(), SlotState::Closed)
    }

    fn state(&self) -> StreamState {
        match *self.lock() {
            SlotState::Starting => StreamState::Starting,
            SlotState::Active(_) => StreamState::Active,
            SlotState::Closed => StreamState::Draining,
        }
    }
}

/// The at-most-one active stream of a channel
#[derive(Default)]
pub(crate) struct StreamHolder {
    current: Mutex<Option<Arc<SubscriptionSlot>>>,
}

impl StreamHolder {
    fn lock(&self) -> MutexGuard<'_, Option<Arc<SubscriptionSlot>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `slot` current, closing the previous one
    fn replace(&self, slot: Arc<SubscriptionSlot>) {
        let previous = self.lock().replace(slot);
        if let Some(previous) = previous {
            debug!("Closing previous stream");
            previous.close();
        }
    }

    /// Close the current stream, if any
    pub(crate) fn end(&self) {
        let current = self.lock().take();
        if let Some(slot) = current {
            slot.close();
        }
    }

    pub(crate) fn state(&self) -> StreamState {
        match self.lock().as_ref() {
            Some(slot) => match slot.state() {
                StreamState::Draining => StreamState::Ended,
                state => state,
            },
            None => StreamState::Idle,
        }
    }
}

impl fmt::Debug for StreamHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHolder").field("state", &self.state()).finish()
    }
}

/// Start streaming `conversation` into a new [`MessageStream`]
///
/// Must be called from within a Tokio runtime: callback registration runs on
/// a spawned task bounded by `stream.registration_timeout`.
pub(crate) fn start_stream<T: Send + 'static>(
    conversation: Arc<dyn Conversation>,
    client: Arc<Client>,
    holder: &StreamHolder,
    project: Projector<T>,
) -> MessageStream<T> {
    let (tx, rx) = mpsc::unbounded_channel();
    // Reports registration failures; dropped when the task finishes
    let registration_tx = tx.clone();
    let outlet = Arc::new(Outlet::new(tx));

    let slot = {
        let outlet = Arc::clone(&outlet);
        Arc::new(SubscriptionSlot::new(move || outlet.detach()))
    };
    holder.replace(Arc::clone(&slot));

    let callback: MessageCallback = {
        let producer = Producer {
            outlet: Arc::clone(&outlet),
        };
        let client = Arc::clone(&client);
        Box::new(move |raw: RawMessage| {
            let id = hex::encode(&raw.id);
            match project(MessageProjection::new(&client, raw)) {
                Ok(item) => {
                    if !producer.outlet.send(item) {
                        debug!(message = %id, "Dropping message for closed stream");
                    }
                }
                Err(e) => {
                    warn!(message = %id, error = %e, "Ending stream on undecodable message");
                    producer.outlet.fail(e);
                }
            }
        })
    };

    let timeout = client.config().stream.registration_timeout;
    let task = {
        let slot = Arc::clone(&slot);
        tokio::spawn(async move {
            let failure = match tokio::time::timeout(timeout, conversation.stream(callback)).await {
                Ok(Ok(subscription)) => {
                    slot.install(subscription);
                    return;
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Stream registration failed");
                    DmError::from(e)
                }
                Err(_) => {
                    warn!(?timeout, "Stream registration timed out");
                    DmError::StreamRegistrationTimeout(timeout)
                }
            };
            if !slot.is_closed() {
                let _ = registration_tx.send(Err(failure));
            }
            slot.close();
        })
    };
    slot.track_registration(task.abort_handle());

    MessageStream {
        rx,
        outlet,
        slot,
        task: Some(task),
        finished: false,
        cancelled: false,
    }
}

/// Live messages of one channel
///
/// Yields items in the order the substrate emitted them. An `Err` item is
/// always the last one. Dropping the stream cancels it.
pub struct MessageStream<T> {
    rx: mpsc::UnboundedReceiver<DmResult<T>>,
    outlet: Arc<Outlet<T>>,
    slot: Arc<SubscriptionSlot>,
    task: Option<JoinHandle<()>>,
    finished: bool,
    cancelled: bool,
}

impl<T> MessageStream<T> {
    /// Stop receiving new messages
    ///
    /// Aborts a pending registration and ends the substrate subscription.
    /// Items already buffered are still yielded, then the sequence ends
    /// without error.
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.release();
        self.rx.close();
    }

    pub fn state(&self) -> StreamState {
        if self.finished || (self.outlet.is_detached() && self.rx.is_empty()) {
            return StreamState::Ended;
        }
        if self.cancelled || self.outlet.is_detached() {
            return StreamState::Draining;
        }
        self.slot.state()
    }

    fn release(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.slot.close();
    }
}

impl<T> Stream for MessageStream<T> {
    type Item = DmResult<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(Ok(item))) => Poll::Ready(Some(Ok(item))),
            Poll::Ready(Some(Err(e))) => {
                this.finished = true;
                this.release();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finished = true;
                this.release();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for MessageStream<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> fmt::Debug for MessageStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageStream")
            .field("state", &self.state())
            .finish()
    }
}
