//! Start a job on a host and wait for the host to confirm it.
//!
//! The protocol is subscribe-then-submit: the event subscription is live
//! before the job is submitted, so a job that starts (or stops) faster than
//! the submit call returns is still observed. A listener task drains the
//! subscription and reports exactly one outcome through a oneshot channel.
//!
//! | first terminal observation | outcome |
//! |---|---|
//! | `start` or `stop` event | success |
//! | `error` event | host-recorded error detail, or "unknown error from host" |
//! | stream ends | disconnected (last transport error or `EOF`) |

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use host_client::{EventKind, EventStream, Host, Job};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::error::{BootstrapError, Result};

/// Durable result of a confirmed job launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub host_id: String,
    pub job_id: String,
}

/// Submit `job` to `host` and block until the host confirms or rejects it.
///
/// With `timeout` unset this waits for as long as the host keeps the event
/// stream open. The subscription is released on every return path.
pub async fn launch_job(
    host: Arc<dyn Host>,
    job: &Job,
    timeout: Option<Duration>,
) -> Result<JobRecord> {
    let record = JobRecord {
        host_id: host.id().to_string(),
        job_id: job.id.clone(),
    };

    let mut events = host.stream_events(&job.id).await?;
    let (status_tx, status_rx) = oneshot::channel();
    let listener = {
        let host = Arc::clone(&host);
        let job_id = job.id.clone();
        tokio::spawn(async move {
            let outcome = watch_job(host.as_ref(), &job_id, &mut events).await;
            events.close();
            let _ = status_tx.send(outcome);
        })
    };

    if let Err(e) = host.add_job(job).await {
        listener.abort();
        return Err(e.into());
    }
    debug!(host = %record.host_id, job = %record.job_id, "job submitted, awaiting confirmation");

    let outcome = match timeout {
        None => status_rx.await,
        Some(limit) => match tokio::time::timeout(limit, status_rx).await {
            Ok(outcome) => outcome,
            Err(_) => {
                listener.abort();
                return Err(BootstrapError::LaunchTimeout {
                    host_id: record.host_id,
                    job_id: record.job_id,
                    secs: limit.as_secs(),
                });
            }
        },
    };

    match outcome {
        Ok(Ok(())) => {
            info!(host = %record.host_id, job = %record.job_id, "job started");
            Ok(record)
        }
        Ok(Err(e)) => Err(e),
        Err(_) => Err(BootstrapError::StreamDisconnected(
            "event listener stopped".into(),
        )),
    }
}

async fn watch_job(host: &dyn Host, job_id: &str, events: &mut EventStream) -> Result<()> {
    let mut last_err: Option<String> = None;

    while let Some(item) = events.next().await {
        let event = match item {
            Ok(e) => e,
            Err(e) => {
                last_err = Some(e.to_string());
                continue;
            }
        };
        if event.job_id != job_id {
            continue;
        }
        if event.is_launch_confirmation() {
            return Ok(());
        }
        match event.event {
            EventKind::Error => {
                let active = host.get_job(job_id).await?;
                return match active.error {
                    Some(detail) => Err(BootstrapError::HostJobError(detail)),
                    None => Err(BootstrapError::UnknownHostError),
                };
            }
            other => debug!(job = %job_id, event = ?other, "ignoring job event"),
        }
    }

    Err(BootstrapError::StreamDisconnected(
        last_err.unwrap_or_else(|| "EOF".into()),
    ))
}
