use std::sync::Arc;

use async_trait::async_trait;
use gamed_types::{GrainAddress, GrainKind};
use tokio::sync::{Notify, oneshot};

use crate::error::GrainError;

/// Lifecycle contract between a grain and the host that runs it.
///
/// The host calls `init` once before any message, hands over messages one at a
/// time, and calls `terminate` once after the last message.
#[async_trait]
pub trait Grain: Send + 'static {
    type Msg: Send + 'static;

    const KIND: GrainKind;

    fn address(&self) -> GrainAddress;

    async fn init(&mut self) -> Result<(), GrainError>;

    async fn receive(&mut self, msg: Self::Msg);

    /// Fallback for message types the grain does not recognise.
    fn receive_default(&mut self, message_kind: &str) {
        tracing::debug!(grain = %self.address(), message_kind, "ignoring unhandled message");
    }

    async fn terminate(&mut self) -> Result<(), GrainError>;

    /// Raised when the grain may have run out of work. The host then checks
    /// `is_idle` and deactivates the grain if it still holds.
    fn idle_signal(&self) -> Option<Arc<Notify>> {
        None
    }

    fn is_idle(&self) -> bool {
        false
    }
}

/// What a host delivers to a grain's mailbox.
#[derive(Debug)]
pub enum Envelope<M> {
    Request(M),
    Unhandled(String),
    Terminate(oneshot::Sender<Result<(), GrainError>>),
}
