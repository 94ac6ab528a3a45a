use std::time::Duration;

use error_stack::Report;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::RequestError;
use crate::host::{ComputeRequest, ExecutionHost, Outcome, PendingTable, Registration};
use crate::indicator::ComputeKernel;

/// Per-kernel host settings.
#[derive(Debug, Clone, Copy)]
pub struct HostOptions {
    pub channel_capacity: usize,
    /// Deadline for each call, covering both enqueueing and the reply.
    pub timeout: Duration,
}

/// Caller-side owner of one kernel's execution host.
///
/// The host is created on the first call and reused after that. Calls are
/// correlated by a fresh request id, so concurrent calls each get their own
/// result regardless of completion order. A faulted host keeps failing calls
/// until [`terminate`](Self::terminate) is called; the next call after that
/// starts a new host.
pub struct RequestManager<K: ComputeKernel> {
    kernel: K,
    options: HostOptions,
    host: Mutex<Option<ExecutionHost<K>>>,
}

impl<K: ComputeKernel> RequestManager<K> {
    pub fn new(kernel: K, options: HostOptions) -> Self {
        Self {
            kernel,
            options,
            host: Mutex::new(None),
        }
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.host.lock().is_some()
    }

    pub fn is_faulted(&self) -> bool {
        self.host.lock().as_ref().is_some_and(|h| h.is_faulted())
    }

    /// Calls still waiting for a response.
    #[cfg(test)]
    pub fn pending_requests(&self) -> usize {
        self.host.lock().as_ref().map_or(0, |h| h.pending_len())
    }

    /// Run `input` through the kernel on the host thread.
    ///
    /// Fails with `Timeout` if no response arrives within the deadline; the
    /// host may still finish the work, and its late response is discarded.
    pub async fn compute(&self, input: K::Input) -> Result<K::Output, Report<RequestError>> {
        let id = Uuid::new_v4();
        let (reply_tx, reply_rx) = oneshot::channel();
        let (requests, pending) = self.register(id, reply_tx)?;
        // Dropped on every exit, including when the caller abandons this future.
        let _entry = PendingEntry { id, pending };
        let timeout = self.options.timeout;
        let timeout_ms = timeout_millis(timeout);

        debug!(kernel = self.kernel.name(), %id, "request submitted");

        let round_trip = async {
            if requests.send(ComputeRequest { id, input }).await.is_err() {
                return Err(Report::new(RequestError::HostFault)
                    .attach("execution host stopped accepting requests"));
            }
            drop(requests);

            match reply_rx.await {
                Ok(outcome) => outcome,
                // Reply sender dropped without an answer: the host was terminated.
                Err(_) => Err(Report::new(RequestError::Terminated)),
            }
        };

        match tokio::time::timeout(timeout, round_trip).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(kernel = self.kernel.name(), %id, timeout_ms, "request timed out");
                Err(Report::new(RequestError::Timeout { timeout_ms }))
            }
        }
    }

    /// Tear down the host and drop every pending call. Outstanding callers
    /// receive `Terminated`. No-op when no host is running.
    pub fn terminate(&self) {
        let host = self.host.lock().take();
        if let Some(host) = host {
            info!(kernel = host.name(), "terminating execution host");
        }
    }

    fn register(
        &self,
        id: Uuid,
        reply: oneshot::Sender<Outcome<K::Output>>,
    ) -> Result<Registration<K::Input, K::Output>, Report<RequestError>> {
        let mut slot = self.host.lock();
        let host = match slot.take() {
            Some(host) => host,
            None => ExecutionHost::spawn(self.kernel.clone(), self.options.channel_capacity)?,
        };
        slot.insert(host).register(id, reply)
    }
}

fn timeout_millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

/// A call's slot in the pending table. Removing an id the dispatcher already
/// delivered is a no-op.
struct PendingEntry<O> {
    id: Uuid,
    pending: PendingTable<O>,
}

impl<O> Drop for PendingEntry<O> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}
