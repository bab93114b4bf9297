//! MXP message channel carrying UI-originated invocations.
//!
//! A UI `Call` carries `{"name", "arguments", "caller"?}` as JSON. The
//! channel answers with one `StreamChunk` per progress chunk followed by a
//! single `Response` whose payload is the envelope JSON.

use std::sync::Arc;

use async_trait::async_trait;
use forge_primitives::CallerId;
use forge_tools::{ExecutionEnvelope, InvocationContext, InvocationEvent};
use mxp::{Message, MessageType};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::engine::{ExecutionEngine, InvocationRequest};

/// Errors raised while serving a UI message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandlerError {
    /// The message header did not contain a valid message type.
    #[error("message missing type information")]
    MissingMessageType,
    /// The channel only serves `Call` messages.
    #[error("message type {0:?} is not supported")]
    Unsupported(MessageType),
    /// The call payload could not be decoded.
    #[error("invalid call payload: {reason}")]
    Decode {
        /// Decoder failure.
        reason: String,
    },
    /// The envelope could not be encoded for the reply.
    #[error("failed to encode reply: {reason}")]
    Encode {
        /// Encoder failure.
        reason: String,
    },
    /// The invocation stream closed before its final envelope.
    #[error("invocation ended without a result")]
    Incomplete,
    /// The peer went away before the reply was delivered.
    #[error("outbound channel closed")]
    OutboundClosed,
}

/// Result alias for channel operations.
pub type HandlerResult<T = ()> = Result<T, HandlerError>;

/// Destination for messages sent back to the UI.
#[async_trait]
pub trait MessageOutbound: Send + Sync {
    /// Delivers one message.
    async fn send(&self, message: Message) -> HandlerResult;
}

#[async_trait]
impl MessageOutbound for mpsc::Sender<Message> {
    async fn send(&self, message: Message) -> HandlerResult {
        mpsc::Sender::send(self, message)
            .await
            .map_err(|_| HandlerError::OutboundClosed)
    }
}

#[derive(Debug, Deserialize)]
struct UiCall {
    name: String,
    #[serde(default)]
    arguments: Value,
    #[serde(default)]
    caller: Option<CallerId>,
}

/// Runs UI `Call` messages through the execution engine.
///
/// One channel serves one UI session. Every invocation it starts carries the
/// [`forge_primitives::Origin::Ui`] origin.
pub struct UiChannel {
    engine: ExecutionEngine,
    outbound: Arc<dyn MessageOutbound>,
    session: Option<CallerId>,
}

impl UiChannel {
    /// Creates a channel replying through `outbound`.
    #[must_use]
    pub fn new(engine: ExecutionEngine, outbound: Arc<dyn MessageOutbound>) -> Self {
        Self {
            engine,
            outbound,
            session: None,
        }
    }

    /// Attributes calls that name no caller to the session's identity.
    #[must_use]
    pub fn with_session_caller(mut self, caller: CallerId) -> Self {
        self.session = Some(caller);
        self
    }

    /// Returns the engine serving this channel.
    #[must_use]
    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    /// Serves one inbound message.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Unsupported`] for anything but a `Call`. A call
    /// whose payload does not decode is still answered with an error
    /// `Response` before [`HandlerError::Decode`] is returned.
    pub async fn handle(&self, message: &Message) -> HandlerResult {
        match message.message_type() {
            Some(MessageType::Call) => self.handle_call(message.payload()).await,
            Some(other) => Err(HandlerError::Unsupported(other)),
            None => Err(HandlerError::MissingMessageType),
        }
    }

    async fn handle_call(&self, payload: &[u8]) -> HandlerResult {
        let call: UiCall = match serde_json::from_slice(payload) {
            Ok(call) => call,
            Err(err) => {
                let error = HandlerError::Decode {
                    reason: err.to_string(),
                };
                self.reply(&ExecutionEnvelope::error(error.to_string()))
                    .await?;
                return Err(error);
            }
        };

        let mut invocation = InvocationContext::ui();
        if let Some(caller) = call.caller.or(self.session) {
            invocation = invocation.with_caller(caller);
        }
        debug!(
            invocation = %invocation.id(),
            capability = %call.name,
            "ui call received"
        );

        let mut stream = self
            .engine
            .invoke_streaming(InvocationRequest::new(call.name, call.arguments), invocation);

        // Dropping `stream` on a failed send cancels the invocation.
        while let Some(event) = stream.next_event().await {
            match event {
                InvocationEvent::Chunk(chunk) => {
                    self.outbound
                        .send(Message::new(MessageType::StreamChunk, chunk.as_bytes()))
                        .await?;
                }
                InvocationEvent::Finished(envelope) => return self.reply(&envelope).await,
            }
        }

        warn!("invocation stream ended without a final envelope");
        Err(HandlerError::Incomplete)
    }

    async fn reply(&self, envelope: &ExecutionEnvelope) -> HandlerResult {
        let payload = serde_json::to_vec(envelope).map_err(|err| HandlerError::Encode {
            reason: err.to_string(),
        })?;
        self.outbound
            .send(Message::new(MessageType::Response, payload.as_slice()))
            .await
    }
}

impl std::fmt::Debug for UiChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiChannel")
            .field("engine", &self.engine)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
