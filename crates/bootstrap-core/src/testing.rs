//! In-memory [`Host`] used by unit tests across the crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use host_client::{
    ActiveJob, Event, EventKind, EventStream, Host, HostError, Job, JobStatus, VolumeInfo,
};
use tokio::sync::mpsc;

/// How a [`FakeHost`] reacts to a submitted job.
#[derive(Debug, Clone)]
pub(crate) enum Behavior {
    /// Emit `start` right after submission.
    Start,
    /// Emit `stop` right after submission.
    Stop,
    /// Emit `error`; `get_job` reports the given detail.
    Error(Option<String>),
    /// Surface a transport error, then close the stream.
    Disconnect,
    /// Close the stream without any event.
    Close,
    /// Accept the job and never report anything.
    Silent,
    /// Fail the submission itself.
    RejectSubmit,
}

type Subscriber = mpsc::Sender<host_client::Result<Event>>;

pub(crate) struct FakeHost {
    id: String,
    addr: String,
    behavior: Behavior,
    subscribers: Mutex<HashMap<String, Subscriber>>,
    jobs: Mutex<Vec<Job>>,
    volumes: AtomicUsize,
}

impl FakeHost {
    pub(crate) fn new(id: &str, behavior: Behavior) -> Arc<Self> {
        let digits: String = id.chars().filter(|c| c.is_ascii_digit()).collect();
        let octet = if digits.is_empty() { "1".to_string() } else { digits };
        Arc::new(Self {
            id: id.to_string(),
            addr: format!("10.0.0.{octet}:1113"),
            behavior,
            subscribers: Mutex::new(HashMap::new()),
            jobs: Mutex::new(Vec::new()),
            volumes: AtomicUsize::new(0),
        })
    }

    pub(crate) fn starting(id: &str) -> Arc<Self> {
        Self::new(id, Behavior::Start)
    }

    pub(crate) fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().unwrap().clone()
    }

    pub(crate) fn volumes_created(&self) -> usize {
        self.volumes.load(Ordering::SeqCst)
    }

    /// True once the consumer side of the job's subscription has gone away.
    pub(crate) fn subscription_released(&self, job_id: &str) -> bool {
        self.subscribers
            .lock()
            .unwrap()
            .get(job_id)
            .map(|tx| tx.is_closed())
            .unwrap_or(true)
    }

    fn error_detail(&self) -> Option<String> {
        match &self.behavior {
            Behavior::Error(detail) => detail.clone(),
            _ => None,
        }
    }
}

#[async_trait]
impl Host for FakeHost {
    fn id(&self) -> &str {
        &self.id
    }

    fn addr(&self) -> &str {
        &self.addr
    }

    async fn add_job(&self, job: &Job) -> host_client::Result<()> {
        if matches!(self.behavior, Behavior::RejectSubmit) {
            return Err(HostError::Status {
                method: "PUT",
                url: format!("http://{}/host/jobs/{}", self.addr, job.id),
                status: 500,
            });
        }
        self.jobs.lock().unwrap().push(job.clone());

        if matches!(self.behavior, Behavior::Silent) {
            return Ok(());
        }
        let tx = self.subscribers.lock().unwrap().remove(&job.id);
        let Some(tx) = tx else {
            return Ok(());
        };
        let item = match &self.behavior {
            Behavior::Start => Some(Ok(Event::new(EventKind::Start, &job.id))),
            Behavior::Stop => Some(Ok(Event::new(EventKind::Stop, &job.id))),
            Behavior::Error(_) => Some(Ok(Event::new(EventKind::Error, &job.id))),
            Behavior::Disconnect => Some(Err(HostError::Stream("connection reset".into()))),
            _ => None,
        };
        if let Some(item) = item {
            // Lifecycle noise before the terminal event must be skipped.
            let _ = tx.send(Ok(Event::new(EventKind::Create, &job.id))).await;
            let _ = tx.send(item).await;
        }
        Ok(())
    }

    async fn get_job(&self, id: &str) -> host_client::Result<ActiveJob> {
        let job = self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .find(|j| j.id == id)
            .cloned()
            .ok_or_else(|| HostError::JobNotFound(id.to_string()))?;
        Ok(ActiveJob {
            job,
            host_id: self.id.clone(),
            status: JobStatus::Failed,
            error: self.error_detail(),
            started_at: None,
            ended_at: None,
            exit_status: None,
        })
    }

    async fn stream_events(&self, job_id: &str) -> host_client::Result<EventStream> {
        let (tx, rx) = mpsc::channel(8);
        self.subscribers
            .lock()
            .unwrap()
            .insert(job_id.to_string(), tx);
        Ok(EventStream::from_channel(rx))
    }

    async fn create_volume(&self) -> host_client::Result<VolumeInfo> {
        let n = self.volumes.fetch_add(1, Ordering::SeqCst);
        Ok(VolumeInfo {
            id: format!("{}-vol{n}", self.id),
            ..Default::default()
        })
    }
}
