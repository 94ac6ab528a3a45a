pub mod manager;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use error_stack::{Report, ResultExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::RequestError;
use crate::indicator::ComputeKernel;

pub use manager::{HostOptions, RequestManager};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeRequest<I> {
    pub id: Uuid,
    pub input: I,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeResponse<O> {
    pub id: Uuid,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<O>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<O> ComputeResponse<O> {
    pub fn success(id: Uuid, result: O) -> Self {
        Self {
            id,
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Uuid, message: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            result: None,
            error: Some(message.into()),
        }
    }

    fn into_outcome(self) -> Outcome<O> {
        match (self.success, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(Report::new(RequestError::Computation {
                message: self.error.unwrap_or_else(|| "unknown error".into()),
            })),
        }
    }
}

pub(crate) type Outcome<O> = Result<O, Report<RequestError>>;
pub(crate) type PendingTable<O> = Arc<Mutex<HashMap<Uuid, oneshot::Sender<Outcome<O>>>>>;
/// Request sender plus the pending table the entry was registered in.
pub(crate) type Registration<I, O> = (mpsc::Sender<ComputeRequest<I>>, PendingTable<O>);

/// A dedicated thread running one kernel, fed through a bounded channel.
///
/// Requests are computed one at a time, in arrival order. Responses are
/// routed back to waiting callers by request id through the pending table.
/// If the thread dies, every pending call is rejected and the host stays
/// faulted until it is dropped. Dropping the host clears the pending table
/// and lets the thread exit once its current message is done.
pub struct ExecutionHost<K: ComputeKernel> {
    name: String,
    requests: mpsc::Sender<ComputeRequest<K::Input>>,
    pending: PendingTable<K::Output>,
    faulted: Arc<AtomicBool>,
    shutdown: CancellationToken,
}

impl<K: ComputeKernel> ExecutionHost<K> {
    /// Start the host thread and its response dispatcher.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(kernel: K, channel_capacity: usize) -> Result<Self, Report<RequestError>> {
        let name = kernel.name().to_owned();
        let (request_tx, request_rx) = mpsc::channel(channel_capacity.max(1));
        let (response_tx, response_rx) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name(format!("{name}-host"))
            .spawn(move || run_host(kernel, request_rx, response_tx))
            .change_context(RequestError::HostSpawn)
            .attach_with(|| format!("kernel: {name}"))?;

        let pending: PendingTable<K::Output> = Arc::new(Mutex::new(HashMap::new()));
        let faulted = Arc::new(AtomicBool::new(false));
        let shutdown = CancellationToken::new();

        tokio::spawn(dispatch_responses(
            name.clone(),
            response_rx,
            Arc::clone(&pending),
            Arc::clone(&faulted),
            shutdown.clone(),
        ));

        info!(kernel = %name, channel_capacity, "execution host started");

        Ok(Self {
            name,
            requests: request_tx,
            pending,
            faulted,
            shutdown,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Add a pending entry for `id` and hand back what the caller needs to
    /// send the request and later forget it.
    pub(crate) fn register(
        &self,
        id: Uuid,
        reply: oneshot::Sender<Outcome<K::Output>>,
    ) -> Result<Registration<K::Input, K::Output>, Report<RequestError>> {
        self.pending.lock().insert(id, reply);

        // Checked after inserting so a concurrent fault either drains this
        // entry or is observed here.
        if self.is_faulted() {
            self.pending.lock().remove(&id);
            return Err(Report::new(RequestError::HostFault)
                .attach(format!("{} host faulted; terminate it to restart", self.name)));
        }

        Ok((self.requests.clone(), Arc::clone(&self.pending)))
    }
}

impl<K: ComputeKernel> Drop for ExecutionHost<K> {
    fn drop(&mut self) {
        self.shutdown.cancel();
        let cleared = {
            let mut pending = self.pending.lock();
            let n = pending.len();
            pending.clear();
            n
        };
        info!(kernel = %self.name, cleared, "execution host terminated");
    }
}

fn run_host<K: ComputeKernel>(
    kernel: K,
    mut requests: mpsc::Receiver<ComputeRequest<K::Input>>,
    responses: mpsc::UnboundedSender<ComputeResponse<K::Output>>,
) {
    while let Some(ComputeRequest { id, input }) = requests.blocking_recv() {
        let response = match kernel.compute(input) {
            Ok(output) => ComputeResponse::success(id, output),
            Err(report) => {
                warn!(kernel = kernel.name(), %id, error = ?report, "computation failed");
                ComputeResponse::failure(id, report.current_context().to_string())
            }
        };
        if responses.send(response).is_err() {
            break;
        }
    }
    debug!(kernel = kernel.name(), "host thread exiting");
}

async fn dispatch_responses<O>(
    name: String,
    mut responses: mpsc::UnboundedReceiver<ComputeResponse<O>>,
    pending: PendingTable<O>,
    faulted: Arc<AtomicBool>,
    shutdown: CancellationToken,
) {
    loop {
        let response = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!(kernel = %name, "response dispatcher stopped");
                return;
            }
            response = responses.recv() => response,
        };

        let Some(response) = response else {
            break;
        };

        let Some(reply) = pending.lock().remove(&response.id) else {
            debug!(kernel = %name, id = %response.id, "dropping response for expired request");
            continue;
        };
        // The caller may have given up between removal and send.
        let _ = reply.send(response.into_outcome());
    }

    // Response channel closed without a shutdown: the host thread died.
    faulted.store(true, Ordering::SeqCst);
    let drained: Vec<_> = pending.lock().drain().collect();
    error!(kernel = %name, pending = drained.len(), "execution host faulted");
    for (_, reply) in drained {
        let _ = reply.send(Err(Report::new(RequestError::HostFault)));
    }
}
