use crate::core::error::{QueryError, Result};
use crate::core::merge::merge_tasks;
use crate::core::model::{BtFile, ListingMode, TaskRecord};
use crate::core::normalize::link_normalize;
use crate::core::query::Query;
use crate::plugins::registry::TaskService;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub enum BtJob {
    Hash(String),
    Content { content: Bytes, name: String },
    Magnet(String),
}

/// Creations requested during `prepare`, flushed together by `commit`.
///
/// Requests are keyed by normalized identity, so asking twice for the same
/// task (even through a magnet and a bare hash) queues it once.
#[derive(Debug, Default)]
pub struct JobQueue {
    pub urls: Vec<String>,
    pub bts: Vec<BtJob>,
    keys: HashSet<String>,
}

impl JobQueue {
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty() && self.bts.is_empty()
    }

    fn claim(&mut self, key: String) -> bool {
        self.keys.insert(key)
    }
}

/// Owns the lazily fetched task list, the per-task file cache, the pending
/// creation jobs and the queries of one invocation.
pub struct TaskBase {
    service: Arc<dyn TaskService>,
    mode: ListingMode,
    readonly: bool,
    queries: Vec<Query>,
    tasks: Option<Vec<TaskRecord>>,
    files: HashMap<String, Vec<BtFile>>,
    jobs: JobQueue,
}

impl TaskBase {
    pub fn new(service: Arc<dyn TaskService>, mode: ListingMode, readonly: bool) -> Self {
        Self {
            service,
            mode,
            readonly,
            queries: vec![],
            tasks: None,
            files: HashMap::new(),
            jobs: JobQueue::default(),
        }
    }

    pub fn service(&self) -> &Arc<dyn TaskService> {
        &self.service
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn jobs(&self) -> &JobQueue {
        &self.jobs
    }

    pub fn register_queries(&mut self, queries: Vec<Query>) {
        self.queries.extend(queries);
    }

    pub async fn get_tasks(&mut self) -> Result<&[TaskRecord]> {
        if self.tasks.is_none() {
            return self.refresh_tasks().await;
        }
        Ok(self.tasks.as_deref().unwrap_or_default())
    }

    pub async fn refresh_tasks(&mut self) -> Result<&[TaskRecord]> {
        let tasks = self.service.read_tasks(&self.mode).await?;
        debug!(count = tasks.len(), mode = self.mode.as_query_value(), "task list fetched");
        Ok(self.tasks.insert(tasks).as_slice())
    }

    /// File list of a BT task, fetched at most once per task id.
    pub async fn get_files(&mut self, task: &TaskRecord) -> Result<&[BtFile]> {
        if !self.files.contains_key(&task.id) {
            let files = self.service.list_bt_files(task).await?;
            debug!(task = %task.id, count = files.len(), "bt file list fetched");
            self.files.insert(task.id.clone(), files);
        }
        Ok(self.files.get(&task.id).map(Vec::as_slice).unwrap_or_default())
    }

    /// Matches the opaque id first, then the listing ordinal.
    pub async fn find_task_by_id(&mut self, id: &str) -> Result<Option<TaskRecord>> {
        let ordinal = id.parse::<usize>().ok();
        let tasks = self.get_tasks().await?;
        Ok(tasks
            .iter()
            .find(|t| t.id == id)
            .or_else(|| tasks.iter().find(|t| Some(t.ordinal) == ordinal))
            .cloned())
    }

    pub async fn get_task_by_id(&mut self, id: &str) -> Result<TaskRecord> {
        self.find_task_by_id(id)
            .await?
            .ok_or_else(|| QueryError::TaskNotFound(format!("id {}", id)))
    }

    pub async fn find_task_by_hash(&mut self, hash: &str) -> Result<Option<TaskRecord>> {
        let tasks = self.get_tasks().await?;
        Ok(tasks.iter().find(|t| t.has_hash(hash)).cloned())
    }

    pub async fn get_task_by_hash(&mut self, hash: &str) -> Result<TaskRecord> {
        self.find_task_by_hash(hash)
            .await?
            .ok_or_else(|| QueryError::TaskNotFound(format!("bt://{}", hash)))
    }

    pub async fn find_task_by_url(&mut self, url: &str) -> Result<Option<TaskRecord>> {
        let key = link_normalize(url);
        let tasks = self.get_tasks().await?;
        Ok(tasks
            .iter()
            .find(|t| link_normalize(&t.original_url) == key)
            .cloned())
    }

    pub async fn get_task_by_url(&mut self, url: &str) -> Result<TaskRecord> {
        self.find_task_by_url(url)
            .await?
            .ok_or_else(|| QueryError::TaskNotFound(url.to_string()))
    }

    pub fn add_url_task(&mut self, url: &str) {
        if self.jobs.claim(link_normalize(url)) {
            self.jobs.urls.push(url.to_string());
        }
    }

    pub fn add_bt_task_by_hash(&mut self, hash: &str) {
        if self.jobs.claim(format!("bt://{}", hash.to_ascii_lowercase())) {
            self.jobs.bts.push(BtJob::Hash(hash.to_ascii_lowercase()));
        }
    }

    /// `hash` is the info hash of `content`, used only to dedupe requests.
    pub fn add_bt_task_by_content(&mut self, hash: &str, content: Bytes, name: &str) {
        if self.jobs.claim(format!("bt://{}", hash.to_ascii_lowercase())) {
            self.jobs.bts.push(BtJob::Content { content, name: name.to_string() });
        }
    }

    pub fn add_magnet_task(&mut self, magnet: &str) {
        if self.jobs.claim(link_normalize(magnet)) {
            self.jobs.bts.push(BtJob::Magnet(magnet.to_string()));
        }
    }

    /// Flushes queued creations (one batched URL call, then one call per BT
    /// job in queue order) and re-reads the task list. A failure part way
    /// leaves earlier creations in place on the service.
    pub async fn commit(&mut self) -> Result<()> {
        let jobs = std::mem::take(&mut self.jobs);
        if !jobs.urls.is_empty() {
            info!(count = jobs.urls.len(), "adding url tasks");
            self.service.add_batch_tasks(&jobs.urls).await?;
        }
        for job in &jobs.bts {
            match job {
                BtJob::Hash(hash) => {
                    info!(hash = %hash, "adding bt task");
                    self.service.add_torrent_task_by_info_hash(hash).await?;
                }
                BtJob::Content { content, name } => {
                    info!(name = %name, "adding bt task");
                    self.service.add_torrent_task_by_content(content, name).await?;
                }
                BtJob::Magnet(magnet) => {
                    info!(magnet = %magnet, "adding magnet task");
                    self.service.add_magnet_task(magnet).await?;
                }
            }
        }
        self.refresh_tasks().await?;
        Ok(())
    }

    /// Prepare every query, commit, then collect and merge their results in
    /// registration order. Read-only bases skip prepare and commit.
    pub async fn execute_queries(&mut self) -> Result<Vec<TaskRecord>> {
        let queries = std::mem::take(&mut self.queries);
        let result = self.run_queries(&queries).await;
        self.queries = queries;
        result
    }

    async fn run_queries(&mut self, queries: &[Query]) -> Result<Vec<TaskRecord>> {
        if !self.readonly {
            for query in queries {
                query.prepare(self).await?;
            }
            self.commit().await?;
        }
        let mut tasks = vec![];
        for query in queries {
            tasks.extend(query.get_tasks(self).await?);
        }
        Ok(merge_tasks(tasks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::{bt_task, sample_task};
    use crate::core::memory::MemoryTaskService;

    const HASH: &str = "3b245504cf5f11bbdbe1201cea6a6bf45aee1bc0";

    #[tokio::test]
    async fn task_list_is_fetched_once_until_refresh() {
        let svc = Arc::new(MemoryTaskService::new(vec![sample_task("1", 1, "a")]));
        let mut base = TaskBase::new(svc.clone(), ListingMode::All, false);
        base.get_tasks().await.unwrap();
        base.find_task_by_id("1").await.unwrap();
        assert_eq!(svc.calls().await.listings, 1);
        base.refresh_tasks().await.unwrap();
        assert_eq!(svc.calls().await.listings, 2);
    }

    #[tokio::test]
    async fn file_lists_are_cached_per_task() {
        let task = bt_task("9", 1, "pack", HASH);
        let svc = Arc::new(MemoryTaskService::new(vec![task.clone()]));
        svc.set_files("9", vec![("a.mkv", 2), ("b.mkv", 1)]).await;
        let mut base = TaskBase::new(svc.clone(), ListingMode::All, false);
        assert_eq!(base.get_files(&task).await.unwrap().len(), 2);
        assert_eq!(base.get_files(&task).await.unwrap().len(), 2);
        assert_eq!(svc.calls().await.file_listings, 1);
    }

    #[tokio::test]
    async fn same_torrent_queued_once_across_representations() {
        let svc = Arc::new(MemoryTaskService::new(vec![]));
        let mut base = TaskBase::new(svc.clone(), ListingMode::All, false);
        base.add_bt_task_by_hash(&HASH.to_uppercase());
        base.add_magnet_task(&format!("magnet:?xt=urn:btih:{}", HASH));
        base.add_url_task("http://example.com/a");
        base.add_url_task("http://example.com/%61");
        assert_eq!(base.jobs().bts.len(), 1);
        assert_eq!(base.jobs().urls.len(), 1);

        base.commit().await.unwrap();
        let calls = svc.calls().await;
        assert_eq!(calls.hash_creations, vec![HASH.to_string()]);
        assert_eq!(calls.batch_creations, vec![vec!["http://example.com/a".to_string()]]);
        assert!(base.jobs().is_empty());
        assert!(base.find_task_by_hash(HASH).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn commit_always_refreshes() {
        let svc = Arc::new(MemoryTaskService::new(vec![]));
        let mut base = TaskBase::new(svc.clone(), ListingMode::All, false);
        base.commit().await.unwrap();
        let calls = svc.calls().await;
        assert_eq!(calls.listings, 1);
        assert!(calls.batch_creations.is_empty());
    }

    #[tokio::test]
    async fn commit_sends_urls_first_then_bt_jobs_in_queue_order() {
        let torrent: &[u8] = b"d4:infod6:lengthi12e4:name5:a.mkv12:piece lengthi16384e6:pieces20:aaaaaaaaaaaaaaaaaaaaee";
        let svc = Arc::new(MemoryTaskService::new(vec![]));
        let mut base = TaskBase::new(svc.clone(), ListingMode::All, false);
        base.add_magnet_task(&format!("magnet:?xt=urn:btih:{}", "c".repeat(40)));
        base.add_url_task("http://example.com/a");
        base.add_bt_task_by_hash(&"a".repeat(40));
        base.add_url_task("http://example.com/b");
        base.add_bt_task_by_content(
            "233c4e6f87f4ead7fb86f66489f0655938639f0d",
            Bytes::from_static(torrent),
            "pack.torrent",
        );

        base.commit().await.unwrap();
        let calls = svc.calls().await;
        assert_eq!(calls.batch_creations.len(), 1);
        assert_eq!(calls.batch_creations[0].len(), 2);
        assert_eq!(
            calls.creation_order,
            vec![
                "add_batch_tasks",
                "add_magnet_task",
                "add_torrent_task_by_info_hash",
                "add_torrent_task_by_content",
            ]
        );
        assert_eq!(svc.tasks().await.len(), 5);
    }

    #[tokio::test]
    async fn id_match_beats_earlier_ordinal_match() {
        let svc = Arc::new(MemoryTaskService::new(vec![sample_task("x", 1, "a"), sample_task("1", 2, "b")]));
        let mut base = TaskBase::new(svc, ListingMode::All, true);
        let hit = base.find_task_by_id("1").await.unwrap().unwrap();
        assert_eq!(hit.name, "b");
        let hit = base.find_task_by_id("2").await.unwrap().unwrap();
        assert_eq!(hit.name, "b");
    }
}
