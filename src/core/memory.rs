//! In-process [`TaskService`] that records every call.
//!
//! Created tasks are prepended to the listing (newest first) and ordinals are
//! renumbered, the way the remote listing behaves after a submission.

use async_trait::async_trait;
use crate::core::error::ServiceError;
use crate::core::model::{BtFile, BtFilePayload, ListingMode, TaskRecord, TaskStatus, TaskType};
use crate::core::torrent::{info_hash_from_content, magnet_to_infohash};
use crate::plugins::registry::TaskService;
use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::Mutex;
use url::Url;

#[derive(Debug, Clone, Default)]
pub struct ServiceCalls {
    pub listings: usize,
    pub file_listings: usize,
    pub batch_creations: Vec<Vec<String>>,
    pub hash_creations: Vec<String>,
    pub content_creations: Vec<String>,
    pub magnet_creations: Vec<String>,
    pub torrent_fetches: Vec<String>,
    /// Creation calls across all mechanisms, in the order they arrived.
    pub creation_order: Vec<&'static str>,
}

#[derive(Default)]
struct State {
    tasks: Vec<TaskRecord>,
    files: HashMap<String, Vec<BtFile>>,
    torrents: HashMap<String, Bytes>,
    rejected: Vec<&'static str>,
    next_id: u64,
    calls: ServiceCalls,
}

impl State {
    fn check(&self, action: &'static str) -> std::result::Result<(), ServiceError> {
        if self.rejected.contains(&action) {
            return Err(ServiceError::Rejected {
                action: action.to_string(),
                status: 403,
                body: "rejected by memory service".to_string(),
            });
        }
        Ok(())
    }

    fn push_new(&mut self, task_type: TaskType, name: String, original_url: String, bt_hash: Option<String>) {
        self.next_id += 1;
        let task = TaskRecord {
            id: self.next_id.to_string(),
            ordinal: 0,
            task_type,
            name,
            status: 0,
            status_text: TaskStatus::from_task_code(0),
            size: 0,
            service_url: String::new(),
            dcid: bt_hash.clone(),
            bt_hash,
            original_url,
            date: None,
            index: None,
            files: None,
        };
        self.tasks.insert(0, task);
        for (i, t) in self.tasks.iter_mut().enumerate() {
            t.ordinal = i + 1;
        }
    }
}

pub struct MemoryTaskService {
    state: Mutex<State>,
}

impl MemoryTaskService {
    pub fn new(tasks: Vec<TaskRecord>) -> Self {
        let next_id = tasks
            .iter()
            .filter_map(|t| t.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            .max(1000);
        Self { state: Mutex::new(State { tasks, next_id, ..Default::default() }) }
    }

    /// `(name, status code)` per file, in list order.
    pub async fn set_files(&self, task_id: &str, files: Vec<(&str, i64)>) {
        let files = files
            .into_iter()
            .enumerate()
            .map(|(i, (name, status))| {
                BtFilePayload {
                    id: format!("{}-{}", task_id, i),
                    name: name.to_string(),
                    status,
                    size: 0,
                    service_url: String::new(),
                }
                .into_file(i)
            })
            .collect();
        self.state.lock().await.files.insert(task_id.to_string(), files);
    }

    pub async fn add_torrent(&self, url: &str, content: impl Into<Bytes>) {
        self.state.lock().await.torrents.insert(url.to_string(), content.into());
    }

    /// Makes every later call of `action` fail (e.g. `"add_batch_tasks"`).
    pub async fn reject(&self, action: &'static str) {
        self.state.lock().await.rejected.push(action);
    }

    pub async fn calls(&self) -> ServiceCalls {
        self.state.lock().await.calls.clone()
    }

    pub async fn tasks(&self) -> Vec<TaskRecord> {
        self.state.lock().await.tasks.clone()
    }
}

#[async_trait]
impl TaskService for MemoryTaskService {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn read_tasks(&self, _mode: &ListingMode) -> std::result::Result<Vec<TaskRecord>, ServiceError> {
        let mut s = self.state.lock().await;
        s.check("read_tasks")?;
        s.calls.listings += 1;
        Ok(s.tasks.clone())
    }

    async fn list_bt_files(&self, task: &TaskRecord) -> std::result::Result<Vec<BtFile>, ServiceError> {
        let mut s = self.state.lock().await;
        s.check("list_bt_files")?;
        s.calls.file_listings += 1;
        Ok(s.files.get(&task.id).cloned().unwrap_or_default())
    }

    async fn add_batch_tasks(&self, urls: &[String]) -> std::result::Result<(), ServiceError> {
        let mut s = self.state.lock().await;
        s.check("add_batch_tasks")?;
        s.calls.creation_order.push("add_batch_tasks");
        s.calls.batch_creations.push(urls.to_vec());
        for url in urls {
            let scheme = url.split_once(':').map(|(s, _)| s).unwrap_or("http");
            let name = Url::parse(url)
                .ok()
                .and_then(|u| u.path_segments().and_then(|mut p| p.next_back().map(str::to_string)))
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| url.clone());
            s.push_new(TaskType::from_label(scheme), name, url.clone(), None);
        }
        Ok(())
    }

    async fn add_torrent_task_by_info_hash(&self, hash: &str) -> std::result::Result<(), ServiceError> {
        let mut s = self.state.lock().await;
        s.check("add_torrent_task_by_info_hash")?;
        s.calls.creation_order.push("add_torrent_task_by_info_hash");
        s.calls.hash_creations.push(hash.to_string());
        s.push_new(TaskType::Bt, hash.to_string(), format!("bt://{}", hash), Some(hash.to_string()));
        Ok(())
    }

    async fn add_torrent_task_by_content(&self, content: &[u8], name: &str) -> std::result::Result<(), ServiceError> {
        let mut s = self.state.lock().await;
        s.check("add_torrent_task_by_content")?;
        s.calls.creation_order.push("add_torrent_task_by_content");
        let hash = info_hash_from_content(content).map_err(|e| ServiceError::Rejected {
            action: "add_torrent_task_by_content".to_string(),
            status: 400,
            body: e.to_string(),
        })?;
        s.calls.content_creations.push(name.to_string());
        s.push_new(TaskType::Bt, name.trim_end_matches(".torrent").to_string(), format!("bt://{}", hash), Some(hash));
        Ok(())
    }

    async fn add_magnet_task(&self, magnet: &str) -> std::result::Result<(), ServiceError> {
        let mut s = self.state.lock().await;
        s.check("add_magnet_task")?;
        s.calls.creation_order.push("add_magnet_task");
        let hash = magnet_to_infohash(magnet).map_err(|e| ServiceError::Rejected {
            action: "add_magnet_task".to_string(),
            status: 400,
            body: e.to_string(),
        })?;
        s.calls.magnet_creations.push(magnet.to_string());
        let name = Url::parse(magnet)
            .ok()
            .and_then(|u| u.query_pairs().find(|(k, _)| k == "dn").map(|(_, v)| v.to_string()))
            .unwrap_or_else(|| hash.clone());
        s.push_new(TaskType::Bt, name, magnet.to_string(), Some(hash));
        Ok(())
    }

    async fn fetch_torrent(&self, url: &str) -> std::result::Result<Bytes, ServiceError> {
        let mut s = self.state.lock().await;
        s.calls.torrent_fetches.push(url.to_string());
        s.torrents.get(url).cloned().ok_or_else(|| ServiceError::Rejected {
            action: format!("fetch torrent {}", url),
            status: 404,
            body: String::new(),
        })
    }
}
