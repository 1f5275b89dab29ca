//! Runs completion polling off the caller's flow of control.
//!
//! Each wait is a tokio task on the dispatcher's runtime. A semaphore sized to the
//! configured pool bounds how many waits poll at once; extra waits queue for a
//! permit instead of failing. One task polls one job, so queries for a given job
//! are strictly sequential.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::Duration as SignedDuration;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use fusionbrain_core::{JobId, StatusResult};

use crate::endpoint::RemoteEndpoint;
use crate::error::{ClientError, ClientResult};
use crate::poller::CompletionPoller;

/// Handle to an in-flight wait.
///
/// Await it for the outcome, call [`WaitHandle::wait_blocking`] from a plain
/// thread, or [`WaitHandle::cancel`] to stop polling. Dropping the handle (or a
/// future awaiting it) cancels the wait and returns its worker to the pool.
#[derive(Debug)]
pub struct WaitHandle {
    job_id: JobId,
    outcome: oneshot::Receiver<ClientResult<StatusResult>>,
    task: JoinHandle<()>,
}

impl WaitHandle {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Stop polling. Takes effect at the next suspension point and releases the
    /// pool permit; a pending `await` then yields [`ClientError::WaitAborted`].
    pub fn cancel(&self) {
        debug!(job_id = %self.job_id, "cancelling wait");
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Block the current thread until the wait finishes.
    ///
    /// # Panics
    ///
    /// Panics when called from inside an async execution context; use `.await`
    /// there instead.
    pub fn wait_blocking(mut self) -> ClientResult<StatusResult> {
        // Swap in an already-closed receiver; `Drop` still owns the task.
        let outcome = std::mem::replace(&mut self.outcome, oneshot::channel().1);
        outcome
            .blocking_recv()
            .unwrap_or_else(|source| Err(ClientError::WaitAborted { source }))
    }
}

impl Drop for WaitHandle {
    fn drop(&mut self) {
        if !self.task.is_finished() {
            trace!(job_id = %self.job_id, "wait handle dropped; aborting poller");
            self.task.abort();
        }
    }
}

impl Future for WaitHandle {
    type Output = ClientResult<StatusResult>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.outcome)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|source| Err(ClientError::WaitAborted { source })))
    }
}

/// Bounded pool of completion pollers.
#[derive(Debug)]
pub struct Dispatcher<E> {
    poller: Arc<CompletionPoller<E>>,
    permits: Arc<Semaphore>,
    runtime: Handle,
}

impl<E> Clone for Dispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            poller: self.poller.clone(),
            permits: self.permits.clone(),
            runtime: self.runtime.clone(),
        }
    }
}

impl<E: RemoteEndpoint + 'static> Dispatcher<E> {
    /// `pool_size` waits may poll concurrently (at least one).
    pub fn new(poller: CompletionPoller<E>, pool_size: usize, runtime: Handle) -> Self {
        Self {
            poller: Arc::new(poller),
            permits: Arc::new(Semaphore::new(pool_size.max(1))),
            runtime,
        }
    }

    /// Use the runtime the caller is currently running on.
    pub fn on_current_runtime(poller: CompletionPoller<E>, pool_size: usize) -> ClientResult<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| ClientError::failure("no tokio runtime available for dispatcher", e))?;
        Ok(Self::new(poller, pool_size, runtime))
    }

    /// Start waiting for `job_id` without blocking the caller.
    pub fn begin_wait(&self, job_id: JobId, initial_delay: SignedDuration) -> WaitHandle {
        let (tx, rx) = oneshot::channel();
        let poller = self.poller.clone();
        let permits = self.permits.clone();

        let task = self.runtime.spawn(async move {
            let outcome = match permits.acquire_owned().await {
                Ok(_permit) => poller.wait(job_id, initial_delay).await,
                Err(closed) => Err(ClientError::failure("worker pool is closed", closed)),
            };

            if tx.send(outcome).is_err() {
                warn!(job_id = %job_id, "wait outcome dropped; handle no longer listening");
            }
        });

        WaitHandle {
            job_id,
            outcome: rx,
            task,
        }
    }

    /// Await-then-unwrap adapter over [`Dispatcher::begin_wait`]. Dropping the
    /// returned future cancels polling.
    pub async fn wait(&self, job_id: JobId, initial_delay: SignedDuration) -> ClientResult<StatusResult> {
        self.begin_wait(job_id, initial_delay).await
    }

    /// Blocking adapter over [`Dispatcher::begin_wait`]; see
    /// [`WaitHandle::wait_blocking`] for the calling constraints.
    pub fn wait_blocking(&self, job_id: JobId, initial_delay: SignedDuration) -> ClientResult<StatusResult> {
        self.begin_wait(job_id, initial_delay).wait_blocking()
    }

    /// Permits currently free in the pool.
    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }
}
