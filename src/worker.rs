//! Worker pool: a fixed number of concurrent executors that claim tasks,
//! acquire rate-limiter permits, drive the resolved adapter through an
//! automation session, and record outcomes. Platforms are partitioned across
//! workers so one throttled platform cannot starve the others.

use serde_json::json;
use tokio::sync::watch;

use crate::adapters::AutomationOutcome;
use crate::db;
use crate::models::{ApplicationTask, FailureKind, Platform, TaskStatus};
use crate::retry::{self, Decision};
use crate::state::SharedState;
use crate::tracker;

/// Tasks claimed per platform per poll.
const CLAIM_BATCH: i64 = 5;

/// Start a worker pool on a dedicated Tokio runtime with its own thread pool.
/// This runs on a separate OS thread and blocks until shutdown is signaled.
pub fn run_pool(
    state: SharedState,
    shutdown: watch::Receiver<bool>,
    worker_count: usize,
) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name("worker-pool".into())
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(worker_count)
                .thread_name("apply-worker")
                .enable_all()
                .build()
                .expect("Failed to build worker runtime");

            runtime.block_on(async {
                let mut handles = Vec::with_capacity(worker_count);

                for id in 0..worker_count {
                    handles.push(tokio::spawn(run(
                        id,
                        worker_count,
                        state.clone(),
                        shutdown.clone(),
                    )));
                }

                tracing::info!("Apply worker pool started ({worker_count} workers)");

                for handle in handles {
                    let _ = handle.await;
                }

                tracing::info!("Apply worker pool stopped");
            });
        })
        .expect("Failed to spawn worker pool thread")
}

/// A single worker loop that polls its platform partition.
async fn run(
    id: usize,
    worker_count: usize,
    state: SharedState,
    mut shutdown: watch::Receiver<bool>,
) {
    let platforms = assigned_platforms(id, worker_count);
    tracing::debug!("Worker {id} started (platforms: {platforms:?})");

    loop {
        if *shutdown.borrow() {
            break;
        }

        // One worker doubles as the lease janitor.
        if id == 0 {
            if let Err(e) = reclaim_expired(&state).await {
                tracing::error!("Lease reclaim failed: {e}");
            }
        }

        match process_ready(&state, &platforms).await {
            Ok(n) if n > 0 => continue,
            Ok(_) => {}
            Err(e) => {
                tracing::error!("Worker {id} error: {e}");
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(state.config.poll_interval) => {}
            _ = shutdown.changed() => {}
        }
    }

    tracing::debug!("Worker {id} stopped");
}

/// Platform partition for one worker. With fewer workers than platforms each
/// worker owns a disjoint subset; with more, workers share platforms (claims
/// stay safe because dequeue is atomic).
pub fn assigned_platforms(worker_id: usize, worker_count: usize) -> Vec<Platform> {
    if worker_count >= Platform::ALL.len() {
        vec![Platform::ALL[worker_id % Platform::ALL.len()]]
    } else {
        Platform::ALL
            .iter()
            .enumerate()
            .filter(|(i, _)| i % worker_count == worker_id)
            .map(|(_, p)| *p)
            .collect()
    }
}

/// Claim and process every currently eligible task for the given platforms.
/// Returns the number of tasks that went through an automation attempt.
pub async fn process_ready(state: &SharedState, platforms: &[Platform]) -> Result<usize, String> {
    let mut processed = 0;

    for &platform in platforms {
        let batch = db::tasks::claim_batch(
            &state.pool,
            platform,
            CLAIM_BATCH,
            state.config.lease_duration.as_secs_f64(),
        )
        .await
        .map_err(|e| format!("Failed to claim batch for {platform}: {e}"))?;

        for task in batch {
            if !state.limiter.try_acquire(platform) {
                // No token: hand the claim back with a short delay. Not an
                // attempt, not an error, no timeline noise.
                tracing::debug!("Rate limited on {platform}, requeueing task {}", task.id);
                db::tasks::release(
                    &state.pool,
                    task.id,
                    state.config.rate_denied_delay.as_secs_f64(),
                )
                .await
                .map_err(|e| format!("Failed to release task {}: {e}", task.id))?;
                continue;
            }

            process_task(state, task).await;
            processed += 1;
        }
    }

    Ok(processed)
}

/// Run one automation attempt for a claimed task and record the outcome.
/// The queue entry is only acknowledged (status leaves `in_progress`) after
/// the outcome is durably recorded, so a crash here leads to lease-based
/// redelivery instead of a lost task.
async fn process_task(state: &SharedState, task: ApplicationTask) {
    tracing::debug!(
        "Processing task {} (user={}, job={}, platform={}, attempt={})",
        task.id,
        task.user_id,
        task.job_id,
        task.platform,
        task.attempt_count + 1
    );

    let detail = json!({ "attempt": task.attempt_count + 1 });
    if let Err(e) =
        db::timeline::append(&state.pool, task.id, TaskStatus::InProgress, Some(&detail)).await
    {
        tracing::error!("Failed to record in-progress entry for {}: {e}", task.id);
    }

    let outcome = attempt(state, &task).await;

    let last_kind = task.last_error_kind.as_deref().and_then(FailureKind::parse);
    let decision = retry::decide(&state.retry, task.attempt_count, last_kind, &outcome);

    match decision {
        Decision::Succeed => {
            let detail = json!({ "platform": task.platform });
            match tracker::record(&state.pool, task.id, TaskStatus::Submitted, Some(detail)).await {
                Ok(updated) => state.notifier.task_terminal(&updated).await,
                Err(e) => tracing::error!("Failed to record submission for {}: {e}", task.id),
            }
        }

        Decision::Retry { delay, kind } => {
            let reason = outcome.reason().unwrap_or("unknown failure");
            let result = tracker::record_retry(
                &state.pool,
                task.id,
                kind,
                reason,
                outcome.screenshot(),
                delay,
            )
            .await;
            if let Err(e) = result {
                tracing::error!("Failed to record retry for {}: {e}", task.id);
            }
        }

        Decision::GiveUp { kind } => {
            let reason = outcome.reason().unwrap_or("unknown failure");
            // Manual review bypasses attempt bookkeeping entirely.
            let consume_attempt = kind != FailureKind::ManualReview;
            let result = tracker::record_failure(
                &state.pool,
                task.id,
                TaskStatus::FailedPermanent,
                kind,
                reason,
                outcome.screenshot(),
                consume_attempt,
            )
            .await;
            match result {
                Ok(updated) => state.notifier.task_terminal(&updated).await,
                Err(e) => {
                    tracing::error!("Failed to record permanent failure for {}: {e}", task.id)
                }
            }
        }
    }
}

/// Prepare the plan, open a session, and execute under the hard timeout.
/// Everything session-shaped is classified into an `AutomationOutcome` here;
/// no raw errors escape. The session is opened outside the timeout and this
/// function keeps the handle, so the session is closed even when the timeout
/// drops the execute future mid-flight.
async fn attempt(state: &SharedState, task: &ApplicationTask) -> AutomationOutcome {
    let adapter = state.adapters.by_platform(task.platform());

    let plan = match adapter.prepare(task) {
        Ok(plan) => plan,
        // A malformed snapshot will not fix itself on retry.
        Err(e) => {
            return AutomationOutcome::PermanentFailure {
                reason: e.to_string(),
                screenshot: None,
            };
        }
    };

    let session = match state.sessions.open(task.platform()).await {
        Ok(session) => session,
        Err(e) => {
            return AutomationOutcome::TransientFailure {
                reason: format!("failed to open automation session: {e}"),
                screenshot: None,
            };
        }
    };

    let timeout = state.config.session_timeout;
    let execute = adapter.execute(&plan, session.as_ref());
    let outcome = match tokio::time::timeout(timeout, execute).await {
        Ok(outcome) => outcome,
        Err(_) => AutomationOutcome::TransientFailure {
            reason: format!("automation attempt timed out after {}s", timeout.as_secs()),
            screenshot: None,
        },
    };
    session.close().await;
    outcome
}

/// Recover tasks whose worker died mid-claim: once the lease expires they
/// return to the queue as a worker-crash transient failure, or fail
/// permanently when attempts are exhausted.
pub async fn reclaim_expired(state: &SharedState) -> Result<usize, String> {
    let reclaimed = db::tasks::reclaim_expired(&state.pool)
        .await
        .map_err(|e| format!("Failed to reclaim expired leases: {e}"))?;

    for task in &reclaimed {
        let status = task.status().unwrap_or(TaskStatus::Queued);
        let detail = json!({
            "kind": FailureKind::WorkerCrash.as_str(),
            "message": "worker lease expired; attempt lost",
            "attempt": task.attempt_count,
        });
        if let Err(e) = db::timeline::append(&state.pool, task.id, status, Some(&detail)).await {
            tracing::error!("Failed to record reclaim entry for {}: {e}", task.id);
        }
        if status == TaskStatus::FailedPermanent {
            state.notifier.task_terminal(task).await;
        }
        tracing::warn!("Reclaimed task {} after lease expiry (now {status})", task.id);
    }

    Ok(reclaimed.len())
}
