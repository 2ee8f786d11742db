//! One activation of a grain: a bounded mailbox and the task that drains it.

use std::time::Duration;

use gamed_grains::{Envelope, Grain, GrainError};
use gamed_types::GrainAddress;
use tokio::sync::{Notify, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::HostError;

/// Sending half of an activated grain's mailbox.
#[derive(Debug)]
pub struct Mailbox<M> {
    address: GrainAddress,
    tx: mpsc::Sender<Envelope<M>>,
}

impl<M> Clone for Mailbox<M> {
    fn clone(&self) -> Self {
        Self {
            address: self.address,
            tx: self.tx.clone(),
        }
    }
}

/// A mailbox together with the task draining it. The task finishes once the
/// grain's `terminate` has returned.
#[derive(Debug)]
pub struct Activation<M> {
    pub mailbox: Mailbox<M>,
    pub task: JoinHandle<()>,
}

impl<M: Send + 'static> Mailbox<M> {
    /// Run `init` on the grain, then spawn its receive loop.
    pub async fn activate<G>(mut grain: G, capacity: usize) -> Result<Activation<M>, HostError>
    where
        G: Grain<Msg = M>,
    {
        let address = grain.address();
        grain
            .init()
            .await
            .map_err(|source| HostError::Grain { address, source })?;
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(run(grain, rx));
        debug!(grain = %address, "activated");
        Ok(Activation {
            mailbox: Self { address, tx },
            task,
        })
    }

    pub fn address(&self) -> GrainAddress {
        self.address
    }

    /// False once the receive loop has stopped taking envelopes.
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Deliver a request built around a fresh reply channel and wait for the
    /// answer. The whole round trip shares one deadline.
    pub async fn call<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<R>) -> M,
        after: Duration,
    ) -> Result<R, HostError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        let round_trip = async {
            self.tx
                .send(Envelope::Request(build(resp_tx)))
                .await
                .map_err(|_| HostError::GrainUnavailable(self.address))?;
            resp_rx
                .await
                .map_err(|_| HostError::GrainUnavailable(self.address))
        };
        timeout(after, round_trip)
            .await
            .map_err(|_| HostError::Timeout {
                address: self.address,
                after,
            })?
    }

    /// Deliver a message kind the grain has no handler for.
    pub async fn unhandled(&self, kind: impl Into<String>) -> Result<(), HostError> {
        self.tx
            .send(Envelope::Unhandled(kind.into()))
            .await
            .map_err(|_| HostError::GrainUnavailable(self.address))
    }

    /// Ask the grain to terminate and wait for it. The loop exits after
    /// answering, so later envelopes are refused.
    pub async fn terminate(&self) -> Result<(), HostError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Envelope::Terminate(done_tx))
            .await
            .map_err(|_| HostError::GrainUnavailable(self.address))?;
        let result = done_rx
            .await
            .map_err(|_| HostError::GrainUnavailable(self.address))?;
        result.map_err(|source| HostError::Grain {
            address: self.address,
            source,
        })
    }
}

async fn run<G: Grain>(mut grain: G, mut rx: mpsc::Receiver<Envelope<G::Msg>>) {
    let address = grain.address();
    let idle = grain.idle_signal();
    loop {
        let envelope = tokio::select! {
            biased;
            envelope = rx.recv() => envelope,
            () = idle_raised(idle.as_deref()) => {
                if grain.is_idle() && rx.is_empty() {
                    debug!(grain = %address, "idle, deactivating");
                    // Refuse new envelopes; anything already queued is still handled.
                    rx.close();
                }
                continue;
            }
        };
        let Some(envelope) = envelope else { break };
        match envelope {
            Envelope::Request(msg) => grain.receive(msg).await,
            Envelope::Unhandled(kind) => grain.receive_default(&kind),
            Envelope::Terminate(done) => {
                let result = grain.terminate().await;
                finish(address, &result);
                let _ = done.send(result);
                return;
            }
        }
    }
    // Idle, or every handle dropped without an explicit terminate.
    let result = grain.terminate().await;
    finish(address, &result);
}

async fn idle_raised(signal: Option<&Notify>) {
    match signal {
        Some(signal) => signal.notified().await,
        None => std::future::pending().await,
    }
}

fn finish(address: GrainAddress, result: &Result<(), GrainError>) {
    match result {
        Ok(()) => debug!(grain = %address, "deactivated"),
        Err(err) => warn!(grain = %address, "terminate failed: {err}"),
    }
}
