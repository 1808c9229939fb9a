//! Sequential consume, process and commit loop.
//!
//! One message is processed end to end before the next is pulled, so two events for the
//! same submission never race inside one process. Offsets are committed whatever the
//! outcome: a failed aggregation is logged and never redelivered.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::events::{Dispatch, DispatchError, EventRouter};
use crate::upstream::{ChallengeApi, SubmissionApi};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MessagePosition {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub position: MessagePosition,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
    #[error("commit failed for {topic}/{partition}@{offset}: {reason}")]
    Commit {
        topic: String,
        partition: i32,
        offset: i64,
        reason: String,
    },
}

/// Delivery seam for a message broker.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Next message, or `None` once the transport is shut down.
    async fn next(&self) -> Option<InboundMessage>;
    async fn commit(&self, position: &MessagePosition) -> Result<(), TransportError>;
    fn is_connected(&self) -> bool;
}

/// In-process transport backed by a bounded channel; partition is always 0.
pub struct ChannelTransport {
    receiver: tokio::sync::Mutex<mpsc::Receiver<InboundMessage>>,
    committed: Mutex<HashMap<(String, i32), i64>>,
    connected: AtomicBool,
}

/// Producing half of a [`ChannelTransport`].
#[derive(Clone)]
pub struct ChannelPublisher {
    sender: mpsc::Sender<InboundMessage>,
    offsets: Arc<Mutex<HashMap<String, i64>>>,
}

impl ChannelTransport {
    pub fn new(capacity: usize) -> (Self, ChannelPublisher) {
        let (sender, receiver) = mpsc::channel(capacity);
        let transport = Self {
            receiver: tokio::sync::Mutex::new(receiver),
            committed: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(true),
        };
        let publisher = ChannelPublisher {
            sender,
            offsets: Arc::new(Mutex::new(HashMap::new())),
        };
        (transport, publisher)
    }

    /// Last committed offset for a topic partition.
    pub fn committed(&self, topic: &str, partition: i32) -> Option<i64> {
        self.committed
            .lock()
            .ok()
            .and_then(|committed| committed.get(&(topic.to_string(), partition)).copied())
    }
}

impl ChannelPublisher {
    pub async fn publish(
        &self,
        topic: &str,
        body: impl Into<String>,
    ) -> Result<MessagePosition, TransportError> {
        let offset = {
            let mut offsets = self.offsets.lock().map_err(|_| TransportError::Closed)?;
            let next = offsets.entry(topic.to_string()).or_insert(0);
            let offset = *next;
            *next += 1;
            offset
        };

        let position = MessagePosition {
            topic: topic.to_string(),
            partition: 0,
            offset,
        };
        self.sender
            .send(InboundMessage {
                position: position.clone(),
                body: body.into(),
            })
            .await
            .map_err(|_| TransportError::Closed)?;
        Ok(position)
    }
}

#[async_trait]
impl MessageTransport for ChannelTransport {
    async fn next(&self) -> Option<InboundMessage> {
        let message = self.receiver.lock().await.recv().await;
        if message.is_none() {
            self.connected.store(false, Ordering::Release);
        }
        message
    }

    async fn commit(&self, position: &MessagePosition) -> Result<(), TransportError> {
        let mut committed = self.committed.lock().map_err(|_| TransportError::Commit {
            topic: position.topic.clone(),
            partition: position.partition,
            offset: position.offset,
            reason: "commit log poisoned".to_string(),
        })?;
        committed.insert(
            (position.topic.clone(), position.partition),
            position.offset,
        );
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

/// Drives the router from a transport.
pub struct ScoringProcessor<T, S, C> {
    transport: Arc<T>,
    router: EventRouter<S, C>,
}

impl<T, S, C> ScoringProcessor<T, S, C>
where
    T: MessageTransport + 'static,
    S: SubmissionApi + 'static,
    C: ChallengeApi + 'static,
{
    pub fn new(transport: Arc<T>, router: EventRouter<S, C>) -> Self {
        Self { transport, router }
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Runs until the transport shuts down.
    pub async fn run(&self) {
        info!(topics = ?self.router.topics().subscriptions(), "scoring processor consuming");
        while let Some(message) = self.transport.next().await {
            let _ = self.handle(&message).await;
            if let Err(err) = self.transport.commit(&message.position).await {
                error!(error = %err, "failed to commit offset");
            }
        }
        info!("transport closed; scoring processor stopped");
    }

    /// Processes one message and logs the result. Never commits.
    pub async fn handle(&self, message: &InboundMessage) -> Result<Dispatch, DispatchError> {
        let MessagePosition {
            topic,
            partition,
            offset,
        } = &message.position;
        info!(
            %topic,
            partition,
            offset,
            message = %message.body,
            "handling event message"
        );

        let result = self.router.dispatch(topic, &message.body).await;
        match &result {
            Ok(Dispatch::Ignored { reason }) => {
                debug!(%topic, offset, ?reason, "event ignored");
            }
            Ok(Dispatch::Processed { outcome }) => {
                info!(%topic, offset, outcome = outcome.summary(), "event processed");
            }
            Err(DispatchError::Parse(err)) => {
                error!(%topic, offset, error = %err, "Invalid message JSON.");
            }
            Err(err @ DispatchError::TopicMismatch { .. }) => {
                warn!(%topic, offset, error = %err, "dropping event");
            }
            Err(DispatchError::Validation(err)) => {
                error!(%topic, offset, details = ?err.details, "{err}");
            }
            Err(DispatchError::Scoring(err)) => {
                error!(%topic, offset, error = %err, "event processing failed");
            }
        }
        result
    }
}
