//! Completion polling.
//!
//! ## Schedule
//!
//! - optional one-shot initial delay (not charged to the budget)
//! - one status query; a terminal answer returns immediately
//! - up to `max_retries` retries, each preceded by a fixed `poll_interval` wait
//! - budget exhausted: [`ClientError::Timeout`] with `attempts == max_retries`
//!
//! The interval wait comes before each retry rather than after each query, so the
//! first post-delay query is never followed by an immediate second one and no wait
//! follows the final query. Query count and reported attempts are the same either way.
//!
//! An "attempt" is one retry query, i.e. any query after the first post-delay one.
//! A failing query is never retried: "still running" and "could not ask" are
//! different failure classes and only the former consumes the budget.

use chrono::Duration as SignedDuration;
use tracing::{debug, error, trace};

use fusionbrain_core::{JobId, StatusResult};

use crate::config::PollPolicy;
use crate::endpoint::RemoteEndpoint;
use crate::error::{ClientError, ClientResult};

/// Polls one job until the server reports a terminal status.
#[derive(Debug, Clone)]
pub struct CompletionPoller<E> {
    endpoint: E,
    policy: PollPolicy,
}

impl<E: RemoteEndpoint> CompletionPoller<E> {
    pub fn new(endpoint: E, policy: PollPolicy) -> Self {
        Self { endpoint, policy }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Wait for `job_id` to finish.
    ///
    /// Both waits are `tokio::time::sleep`, so dropping or aborting the returned
    /// future stops polling at the next suspension point.
    pub async fn wait(
        &self,
        job_id: JobId,
        initial_delay: SignedDuration,
    ) -> ClientResult<StatusResult> {
        debug!(
            job_id = %job_id,
            initial_delay_ms = initial_delay.num_milliseconds(),
            max_retries = self.policy.max_retries,
            poll_interval_ms = u64::try_from(self.policy.poll_interval.as_millis()).unwrap_or(u64::MAX),
            "waiting for job completion"
        );

        let initial_delay = initial_delay.to_std().map_err(|_| {
            error!(job_id = %job_id, "negative initial delay");
            ClientError::invalid_argument("initial delay cannot be negative")
        })?;

        if !initial_delay.is_zero() {
            trace!(job_id = %job_id, "sleeping through initial delay");
            tokio::time::sleep(initial_delay).await;
        }

        let first = self.query(job_id).await?;
        if first.is_terminal() {
            debug!(job_id = %job_id, status = ?first.status, "job finished before polling");
            return Ok(first);
        }

        for attempt in 1..=self.policy.max_retries {
            tokio::time::sleep(self.policy.poll_interval).await;

            debug!(
                job_id = %job_id,
                attempt,
                max_retries = self.policy.max_retries,
                "polling job status"
            );
            let status = self.query(job_id).await?;
            trace!(job_id = %job_id, status = ?status.status, "current job status");

            if status.is_terminal() {
                debug!(job_id = %job_id, status = ?status.status, attempt, "job finished");
                return Ok(status);
            }
        }

        error!(
            job_id = %job_id,
            attempts = self.policy.max_retries,
            "timeout waiting for job completion"
        );
        Err(ClientError::Timeout {
            job_id,
            attempts: self.policy.max_retries,
        })
    }

    async fn query(&self, job_id: JobId) -> ClientResult<StatusResult> {
        self.endpoint.status(job_id).await.map_err(|e| {
            error!(job_id = %job_id, error = %e, "failed to get job status");
            ClientError::from_endpoint("failed to get job status", e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use fusionbrain_core::JobStatus;
    use proptest::prelude::*;

    use crate::endpoint::{InMemoryEndpoint, ScriptedFailure, StatusStep};

    fn poller(max_retries: u32) -> (Arc<InMemoryEndpoint>, CompletionPoller<Arc<InMemoryEndpoint>>) {
        let endpoint = Arc::new(InMemoryEndpoint::new());
        let policy = PollPolicy::new(max_retries, Duration::from_millis(1));
        (endpoint.clone(), CompletionPoller::new(endpoint, policy))
    }

    #[tokio::test]
    async fn negative_initial_delay_is_rejected_without_querying() {
        let (endpoint, poller) = poller(3);
        let job = JobId::random();
        endpoint.script_statuses(job, &[JobStatus::Done]);

        let err = poller
            .wait(job, SignedDuration::milliseconds(-1))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::InvalidArgument(_)));
        assert_eq!(endpoint.status_calls(job), 0);
    }

    #[tokio::test]
    async fn terminal_first_answer_uses_a_single_query() {
        let (endpoint, poller) = poller(3);
        let job = JobId::random();
        endpoint.script_statuses(job, &[JobStatus::Failed]);

        let status = poller.wait(job, SignedDuration::zero()).await.unwrap();

        assert_eq!(status.status, JobStatus::Failed);
        assert_eq!(endpoint.status_calls(job), 1);
    }

    #[tokio::test]
    async fn initial_then_done_succeeds_after_two_queries() {
        let (endpoint, poller) = poller(1);
        let job = JobId::random();
        endpoint.script_statuses(job, &[JobStatus::Initial, JobStatus::Done]);

        let status = poller.wait(job, SignedDuration::zero()).await.unwrap();

        assert_eq!(status.status, JobStatus::Done);
        assert!(status.result.is_some());
        assert_eq!(endpoint.status_calls(job), 2);
    }

    #[tokio::test]
    async fn never_terminal_times_out_after_budget() {
        let (endpoint, poller) = poller(1);
        let job = JobId::random();
        endpoint.script_statuses(job, &[JobStatus::Initial]);

        let err = poller.wait(job, SignedDuration::zero()).await.unwrap_err();

        match err {
            ClientError::Timeout { job_id, attempts } => {
                assert_eq!(job_id, job);
                assert_eq!(attempts, 1);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(endpoint.status_calls(job), 2);
    }

    #[tokio::test]
    async fn zero_retries_times_out_after_first_query() {
        let (endpoint, poller) = poller(0);
        let job = JobId::random();
        endpoint.script_statuses(job, &[JobStatus::Processing]);

        let err = poller.wait(job, SignedDuration::zero()).await.unwrap_err();

        assert!(matches!(err, ClientError::Timeout { attempts: 0, .. }));
        assert_eq!(endpoint.status_calls(job), 1);
    }

    #[tokio::test]
    async fn query_failure_propagates_immediately() {
        let (endpoint, poller) = poller(10);
        let job = JobId::random();
        endpoint.script(
            job,
            [
                StatusStep::Status(JobStatus::Initial),
                StatusStep::Fail(ScriptedFailure::Server(502)),
                StatusStep::Status(JobStatus::Done),
            ],
        );

        let err = poller.wait(job, SignedDuration::zero()).await.unwrap_err();

        assert!(matches!(err, ClientError::Server { status: 502, .. }));
        assert_eq!(endpoint.status_calls(job), 2);
    }

    #[tokio::test]
    async fn transport_failure_on_first_query_is_wrapped() {
        let (endpoint, poller) = poller(10);
        let job = JobId::random();
        endpoint.script(
            job,
            [StatusStep::Fail(ScriptedFailure::Transport("dns failure".into()))],
        );

        let err = poller.wait(job, SignedDuration::zero()).await.unwrap_err();

        assert!(matches!(err, ClientError::Failure { ref message, .. } if message == "failed to get job status"));
        assert_eq!(endpoint.status_calls(job), 1);
    }

    #[tokio::test]
    async fn initial_delay_precedes_first_query() {
        let (endpoint, poller) = poller(0);
        let job = JobId::random();
        endpoint.script_statuses(job, &[JobStatus::Done]);

        let started = Instant::now();
        poller
            .wait(job, SignedDuration::milliseconds(40))
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(40));
        assert_eq!(endpoint.status_calls(job), 1);
    }

    #[tokio::test]
    async fn interval_precedes_each_retry_but_not_the_timeout() {
        let endpoint = Arc::new(InMemoryEndpoint::new());
        let poller = CompletionPoller::new(
            endpoint.clone(),
            PollPolicy::new(1, Duration::from_millis(200)),
        );
        let job = JobId::random();
        endpoint.script_statuses(job, &[JobStatus::Processing]);

        let started = Instant::now();
        let err = poller.wait(job, SignedDuration::zero()).await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(err.is_timeout());
        assert_eq!(endpoint.status_calls(job), 2);
        // One interval between the two queries, none after the last.
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(390));
    }

    #[tokio::test]
    async fn huge_poll_interval_is_accepted() {
        let endpoint = Arc::new(InMemoryEndpoint::new());
        let poller = CompletionPoller::new(endpoint.clone(), PollPolicy::new(3, Duration::MAX));
        let job = JobId::random();
        endpoint.script_statuses(job, &[JobStatus::Done]);

        let status = poller.wait(job, SignedDuration::zero()).await.unwrap();

        assert_eq!(status.status, JobStatus::Done);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 32,
            ..ProptestConfig::default()
        })]

        /// Property: a job that never finishes costs exactly `max_retries + 1`
        /// queries and reports `max_retries` attempts.
        #[test]
        fn timeout_attempts_equal_budget(max_retries in 0u32..8) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            let endpoint = Arc::new(InMemoryEndpoint::new());
            let poller = CompletionPoller::new(
                endpoint.clone(),
                PollPolicy::new(max_retries, Duration::ZERO),
            );
            let job = JobId::random();
            endpoint.script_statuses(job, &[JobStatus::Processing]);

            let err = rt.block_on(poller.wait(job, SignedDuration::zero())).unwrap_err();

            let timed_out = matches!(err, ClientError::Timeout { attempts, .. } if attempts == max_retries);
            prop_assert!(timed_out, "expected timeout after {} attempts, got {:?}", max_retries, err);
            prop_assert_eq!(endpoint.status_calls(job), max_retries + 1);
        }
    }
}
