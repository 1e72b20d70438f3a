use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

use crate::core::error::{QueryError, Result, ServiceError};
use crate::core::model::{BtFile, BtFilePayload, ListingMode, TaskPayload, TaskRecord};
use crate::plugins::registry::{ServiceContext, TaskService};

/// JSON task service at `ctx.base_url`.
///
/// `GET tasks`, `GET tasks/{id}/files`, `POST tasks/batch`,
/// `POST tasks/bt/hash`, `POST tasks/bt/torrent`, `POST tasks/magnet`.
pub struct HttpTaskService {
    client: reqwest::Client,
    ctx: ServiceContext,
}

impl HttpTaskService {
    pub fn new(ctx: ServiceContext) -> Result<Self> {
        let headers = Self::build_headers(&ctx).map_err(|e| QueryError::Config(e.to_string()))?;
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .default_headers(headers)
            .build()
            .map_err(ServiceError::Transport)?;
        Ok(Self { client, ctx })
    }

    fn build_headers(ctx: &ServiceContext) -> anyhow::Result<HeaderMap> {
        let mut h = HeaderMap::new();
        h.insert(USER_AGENT, HeaderValue::from_str(&ctx.user_agent)?);
        for (k, v) in &ctx.headers {
            let name = HeaderName::from_bytes(k.as_bytes())?;
            let value = HeaderValue::from_str(v)?;
            h.insert(name, value);
        }
        Ok(h)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.ctx.base_url.trim_end_matches('/'), path)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.ctx.timeout_secs)
    }

    async fn check(action: &str, resp: reqwest::Response) -> std::result::Result<reqwest::Response, ServiceError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ServiceError::Rejected { action: action.to_string(), status: status.as_u16(), body })
    }

    async fn post_json<T: Serialize + ?Sized>(&self, action: &str, path: &str, body: &T) -> std::result::Result<(), ServiceError> {
        let resp = self
            .client
            .post(self.endpoint(path))
            .timeout(self.timeout())
            .json(body)
            .send()
            .await?;
        Self::check(action, resp).await?;
        Ok(())
    }
}

#[async_trait]
impl TaskService for HttpTaskService {
    fn name(&self) -> &'static str { "http" }

    async fn read_tasks(&self, mode: &ListingMode) -> std::result::Result<Vec<TaskRecord>, ServiceError> {
        let mut req = self
            .client
            .get(self.endpoint("tasks"))
            .timeout(self.timeout())
            .query(&[("mode", mode.as_query_value())]);
        if let ListingMode::Category(c) = mode {
            req = req.query(&[("category", c.as_str())]);
        }
        let resp = Self::check("read tasks", req.send().await?).await?;
        let body = resp.bytes().await?;
        let payloads: Vec<TaskPayload> = serde_json::from_slice(&body)?;
        Ok(payloads
            .into_iter()
            .enumerate()
            .map(|(i, p)| p.into_record(i + 1))
            .collect())
    }

    async fn list_bt_files(&self, task: &TaskRecord) -> std::result::Result<Vec<BtFile>, ServiceError> {
        let mut req = self
            .client
            .get(self.endpoint(&format!("tasks/{}/files", task.id)))
            .timeout(self.timeout());
        if let Some(hash) = &task.bt_hash {
            req = req.query(&[("hash", hash.as_str())]);
        }
        let resp = Self::check("list bt files", req.send().await?).await?;
        let body = resp.bytes().await?;
        let payloads: Vec<BtFilePayload> = serde_json::from_slice(&body)?;
        Ok(payloads
            .into_iter()
            .enumerate()
            .map(|(i, p)| p.into_file(i))
            .collect())
    }

    async fn add_batch_tasks(&self, urls: &[String]) -> std::result::Result<(), ServiceError> {
        self.post_json("add url tasks", "tasks/batch", &json!({ "urls": urls })).await
    }

    async fn add_torrent_task_by_info_hash(&self, hash: &str) -> std::result::Result<(), ServiceError> {
        self.post_json("add bt task by hash", "tasks/bt/hash", &json!({ "hash": hash })).await
    }

    async fn add_torrent_task_by_content(&self, content: &[u8], name: &str) -> std::result::Result<(), ServiceError> {
        let resp = self
            .client
            .post(self.endpoint("tasks/bt/torrent"))
            .timeout(self.timeout())
            .header(CONTENT_TYPE, "application/x-bittorrent")
            .query(&[("name", name)])
            .body(content.to_vec())
            .send()
            .await?;
        Self::check("add bt task by content", resp).await?;
        Ok(())
    }

    async fn add_magnet_task(&self, magnet: &str) -> std::result::Result<(), ServiceError> {
        self.post_json("add magnet task", "tasks/magnet", &json!({ "uri": magnet })).await
    }

    async fn fetch_torrent(&self, url: &str) -> std::result::Result<Bytes, ServiceError> {
        let fetch_err = |source: reqwest::Error| ServiceError::TorrentFetch { url: url.to_string(), source };
        let resp = self
            .client
            .get(url)
            .timeout(Duration::from_secs(self.ctx.torrent_timeout_secs))
            .send()
            .await
            .map_err(fetch_err)?;
        let resp = resp.error_for_status().map_err(fetch_err)?;
        resp.bytes().await.map_err(fetch_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::bt_task;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serves one connection with a canned response and reports the request head.
    async fn serve_once(status: &str, body: &str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = sock.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let _ = tx.send(String::from_utf8_lossy(&head).to_string());
            sock.write_all(response.as_bytes()).await.unwrap();
            sock.shutdown().await.unwrap();
        });
        (format!("http://{}/api", addr), rx)
    }

    fn service(base_url: String) -> HttpTaskService {
        HttpTaskService::new(ServiceContext { base_url, ..Default::default() }).unwrap()
    }

    #[test]
    fn endpoints_join_base_url() {
        let ctx = ServiceContext { base_url: "http://svc/api/".into(), ..Default::default() };
        let svc = HttpTaskService::new(ctx).unwrap();
        assert_eq!(svc.endpoint("tasks/1/files"), "http://svc/api/tasks/1/files");
    }

    #[test]
    fn rejects_invalid_header_names() {
        let mut ctx = ServiceContext::default();
        ctx.headers.insert("bad header".into(), "v".into());
        assert!(HttpTaskService::new(ctx).is_err());
    }

    #[tokio::test]
    async fn listing_fills_missing_ordinals_by_position() {
        let body = r##"[
            {"id": "a", "name": "one", "status": 2, "type": "bt", "bt_hash": "3B245504CF5F11BBDBE1201CEA6A6BF45AEE1BC0"},
            {"id": "b", "name": "two", "status": 0, "original_url": "ed2k://|file|x|1|h|/"},
            {"id": "c", "#": 9, "name": "three", "status": 1}
        ]"##;
        let (base_url, head) = serve_once("200 OK", body).await;
        let tasks = service(base_url).read_tasks(&ListingMode::Deleted).await.unwrap();
        assert_eq!(tasks.iter().map(|t| t.ordinal).collect::<Vec<_>>(), vec![1, 2, 9]);
        assert_eq!(tasks[0].bt_hash.as_deref(), Some("3b245504cf5f11bbdbe1201cea6a6bf45aee1bc0"));
        assert!(tasks[0].is_bt());
        assert_eq!(tasks[1].task_type.to_string(), "ed2k");
        assert!(head.await.unwrap().starts_with("GET /api/tasks?mode=deleted "));
    }

    #[tokio::test]
    async fn bt_files_are_indexed_by_position() {
        let body = r#"[
            {"id": "f0", "name": "e1.mkv", "status": 2, "size": 10},
            {"name": "e1.srt", "status": 1}
        ]"#;
        let (base_url, head) = serve_once("200 OK", body).await;
        let task = bt_task("42", 1, "season", "3b245504cf5f11bbdbe1201cea6a6bf45aee1bc0");
        let files = service(base_url).list_bt_files(&task).await.unwrap();
        assert_eq!(files.iter().map(|f| f.index).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(files[0].name, "e1.mkv");
        assert_eq!(files[1].id, "");
        let head = head.await.unwrap();
        assert!(head.starts_with("GET /api/tasks/42/files?hash=3b245504cf5f11bbdbe1201cea6a6bf45aee1bc0 "));
    }

    #[tokio::test]
    async fn rejection_keeps_status_and_body() {
        let (base_url, _head) = serve_once("403 Forbidden", "quota exceeded: 10/10").await;
        let err = service(base_url).add_magnet_task("magnet:?xt=urn:btih:x").await.unwrap_err();
        match err {
            ServiceError::Rejected { action, status, body } => {
                assert_eq!(action, "add magnet task");
                assert_eq!(status, 403);
                assert_eq!(body, "quota exceeded: 10/10");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn silent_torrent_host_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        let ctx = ServiceContext { torrent_timeout_secs: 1, ..Default::default() };
        let svc = HttpTaskService::new(ctx).unwrap();
        let url = format!("http://{}/pack.torrent", addr);
        let started = std::time::Instant::now();
        let err = svc.fetch_torrent(&url).await.unwrap_err();
        assert!(matches!(err, ServiceError::TorrentFetch { url: ref u, ref source } if *u == url && source.is_timeout()));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
