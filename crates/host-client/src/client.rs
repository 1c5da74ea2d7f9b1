use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{StatusCode, Url};
use tracing::debug;

use crate::host::Host;
use crate::stream::EventStream;
use crate::types::{ActiveJob, Job, VolumeInfo};
use crate::{HostError, Result};

// ─── HostClient ───────────────────────────────────────────────────────────

/// HTTP client for a single host's job API.
///
/// | operation | request |
/// |---|---|
/// | submit | `PUT /host/jobs/:id` |
/// | fetch | `GET /host/jobs/:id` |
/// | events | `GET /host/jobs/:id` with `Accept: text/event-stream` |
/// | volume | `POST /storage/volumes` |
#[derive(Debug, Clone)]
pub struct HostClient {
    id: String,
    url: String,
    addr: String,
    http: reqwest::Client,
}

impl HostClient {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self::with_http(id, url, reqwest::Client::new())
    }

    /// Build a client that shares an existing connection pool.
    pub fn with_http(id: impl Into<String>, url: impl Into<String>, http: reqwest::Client) -> Self {
        let url = url.into().trim_end_matches('/').to_string();
        let addr = host_port(&url);
        Self {
            id: id.into(),
            url,
            addr,
            http,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn job_url(&self, id: &str) -> String {
        format!("{}/host/jobs/{}", self.url, id)
    }
}

/// `http://10.0.0.1:1113/` → `10.0.0.1:1113`. Falls back to the input when
/// it does not parse as a URL.
fn host_port(url: &str) -> String {
    match Url::parse(url) {
        Ok(u) => match (u.host_str(), u.port_or_known_default()) {
            (Some(h), Some(p)) => format!("{h}:{p}"),
            (Some(h), None) => h.to_string(),
            _ => url.to_string(),
        },
        Err(_) => url.to_string(),
    }
}

fn check_status(method: &'static str, url: &str, status: StatusCode) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(HostError::Status {
            method,
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

#[async_trait]
impl Host for HostClient {
    fn id(&self) -> &str {
        &self.id
    }

    fn addr(&self) -> &str {
        &self.addr
    }

    async fn add_job(&self, job: &Job) -> Result<()> {
        let url = self.job_url(&job.id);
        debug!(host = %self.id, job = %job.id, "submitting job");
        let res = self.http.put(&url).json(job).send().await?;
        check_status("PUT", &url, res.status())
    }

    async fn get_job(&self, id: &str) -> Result<ActiveJob> {
        let url = self.job_url(id);
        let res = self.http.get(&url).send().await?;
        if res.status() == StatusCode::NOT_FOUND {
            return Err(HostError::JobNotFound(id.to_string()));
        }
        check_status("GET", &url, res.status())?;
        Ok(res.json().await?)
    }

    async fn stream_events(&self, job_id: &str) -> Result<EventStream> {
        let url = self.job_url(job_id);
        let res = self
            .http
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        check_status("GET", &url, res.status())?;
        debug!(host = %self.id, job = %job_id, "subscribed to job events");
        Ok(EventStream::from_response(res))
    }

    async fn create_volume(&self) -> Result<VolumeInfo> {
        let url = format!("{}/storage/volumes", self.url);
        let res = self
            .http
            .post(&url)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        check_status("POST", &url, res.status())?;
        Ok(res.json().await?)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventKind, JobStatus};
    use futures::StreamExt;

    #[test]
    fn addr_strips_scheme_and_path() {
        let c = HostClient::new("h1", "http://10.0.0.1:1113/");
        assert_eq!(c.addr(), "10.0.0.1:1113");
        assert_eq!(c.url(), "http://10.0.0.1:1113");
    }

    #[test]
    fn addr_uses_default_port() {
        let c = HostClient::new("h1", "http://example.com");
        assert_eq!(c.addr(), "example.com:80");
    }

    #[tokio::test]
    async fn add_job_puts_json() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("PUT", "/host/jobs/h1-j1")
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let c = HostClient::new("h1", server.url());
        let job = Job {
            id: "h1-j1".into(),
            ..Default::default()
        };
        c.add_job(&job).await.unwrap();
        m.assert_async().await;
    }

    #[tokio::test]
    async fn add_job_reports_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", "/host/jobs/h1-j1")
            .with_status(500)
            .create_async()
            .await;

        let c = HostClient::new("h1", server.url());
        let job = Job {
            id: "h1-j1".into(),
            ..Default::default()
        };
        let err = c.add_job(&job).await.unwrap_err();
        assert!(matches!(err, HostError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn get_job_decodes_error_detail() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/host/jobs/h1-j1")
            .with_status(200)
            .with_body(r#"{"job":{"id":"h1-j1"},"host_id":"h1","status":"failed","error":"boom"}"#)
            .create_async()
            .await;

        let c = HostClient::new("h1", server.url());
        let job = c.get_job("h1-j1").await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn get_job_missing_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/host/jobs/nope")
            .with_status(404)
            .create_async()
            .await;

        let c = HostClient::new("h1", server.url());
        let err = c.get_job("nope").await.unwrap_err();
        assert!(matches!(err, HostError::JobNotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn stream_events_decodes_sse_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/host/jobs/h1-j1")
            .match_header("accept", "text/event-stream")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(
                "data: {\"event\":\"create\",\"job_id\":\"h1-j1\"}\n\n\
                 data: {\"event\":\"start\",\"job_id\":\"h1-j1\"}\n\n",
            )
            .create_async()
            .await;

        let c = HostClient::new("h1", server.url());
        let stream = c.stream_events("h1-j1").await.unwrap();
        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 2);
        let kinds: Vec<_> = events
            .into_iter()
            .map(|e| e.unwrap().event)
            .collect();
        assert_eq!(kinds, vec![EventKind::Create, EventKind::Start]);
    }

    #[tokio::test]
    async fn stream_events_accepts_any_line_terminator() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/host/jobs/h1-j1")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(
                ": keepalive\r\r\
                 data: {\"event\":\"create\",\"job_id\":\"h1-j1\"}\r\r\
                 event: message\r\nid: 4\r\n\
                 data: {\"event\":\"start\",\"job_id\":\"h1-j1\"}\r\n\r\n",
            )
            .create_async()
            .await;

        let c = HostClient::new("h1", server.url());
        let stream = c.stream_events("h1-j1").await.unwrap();
        let kinds: Vec<_> = stream.map(|e| e.unwrap().event).collect().await;
        assert_eq!(kinds, vec![EventKind::Create, EventKind::Start]);
    }

    #[tokio::test]
    async fn stream_events_reports_malformed_frame() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/host/jobs/h1-j1")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body("data: not json\n\n")
            .create_async()
            .await;

        let c = HostClient::new("h1", server.url());
        let mut stream = c.stream_events("h1-j1").await.unwrap();
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, HostError::Parse { ref frame, .. } if frame == "not json"));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn create_volume_returns_id() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/storage/volumes")
            .with_status(200)
            .with_body(r#"{"id":"vol-1","type":"zfs"}"#)
            .create_async()
            .await;

        let c = HostClient::new("h1", server.url());
        let vol = c.create_volume().await.unwrap();
        assert_eq!(vol.id, "vol-1");
        assert_eq!(vol.kind.as_deref(), Some("zfs"));
    }
}
