//! Serial request queue
//!
//! Every lookup in the process goes through one FIFO queue drained by a single
//! worker task, so exactly one resolution runs at a time, in arrival order,
//! whatever its cache key. This keeps outbound provider traffic at one request
//! in flight and stops two callers from resolving the same key concurrently.
//!
//! A failed or panicking resolution becomes a failure payload for its caller;
//! the worker then moves on to the next entry. A caller that goes away before
//! its turn does not cancel the work: the result is still cached.

use crate::resolver::KeyResolver;
use camkey_common::{LookupMessage, LookupRequest, LookupResponse};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

/// One queued lookup and the channel its caller waits on
struct QueuedLookup {
    request: LookupRequest,
    reply: oneshot::Sender<LookupResponse>,
}

/// Handle to the process-wide lookup queue
///
/// Created once at startup; clones share the same queue and worker.
#[derive(Clone)]
pub struct LookupQueue {
    sender: mpsc::UnboundedSender<QueuedLookup>,
    pending: Arc<AtomicUsize>,
}

impl LookupQueue {
    /// Spawn the worker task and return the queue handle
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(resolver: Arc<KeyResolver>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));

        tokio::spawn(run_worker(resolver, receiver, Arc::clone(&pending)));

        Self { sender, pending }
    }

    /// Handle an inbound message
    ///
    /// Incomplete messages are answered with `{ ok: true, data: null }`
    /// without touching the queue.
    pub async fn submit(&self, message: LookupMessage) -> LookupResponse {
        match message.into_request() {
            Some(request) => self.enqueue(request).await,
            None => {
                debug!("Lookup message missing title, artist or cache key");
                LookupResponse::Success(None)
            }
        }
    }

    /// Append a request and wait for its turn to complete
    pub async fn enqueue(&self, request: LookupRequest) -> LookupResponse {
        let (reply, response) = oneshot::channel();

        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(QueuedLookup { request, reply }).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return LookupResponse::Failure("lookup queue is not running".to_string());
        }

        response.await.unwrap_or_else(|_| {
            LookupResponse::Failure("lookup worker dropped the request".to_string())
        })
    }

    /// Lookups queued or in progress
    pub fn depth(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

async fn run_worker(
    resolver: Arc<KeyResolver>,
    mut receiver: mpsc::UnboundedReceiver<QueuedLookup>,
    pending: Arc<AtomicUsize>,
) {
    info!("Lookup queue worker started");

    while let Some(QueuedLookup { request, reply }) = receiver.recv().await {
        let response = process(&resolver, &request).await;
        pending.fetch_sub(1, Ordering::SeqCst);

        if reply.send(response).is_err() {
            debug!(cache_key = %request.cache_key, "Caller gone before lookup settled");
        }
    }

    info!("Lookup queue worker stopped");
}

async fn process(resolver: &KeyResolver, request: &LookupRequest) -> LookupResponse {
    match AssertUnwindSafe(resolver.resolve(request)).catch_unwind().await {
        Ok(Ok(resolved)) => LookupResponse::Success(Some(resolved)),
        Ok(Err(e)) => {
            error!(cache_key = %request.cache_key, error = %e, "Lookup failed");
            LookupResponse::Failure(e.to_string())
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(cache_key = %request.cache_key, panic = %message, "Lookup panicked");
            LookupResponse::Failure(format!("lookup panicked: {}", message))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
