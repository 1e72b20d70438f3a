use async_trait::async_trait;
use crate::core::base::TaskBase;
use crate::core::error::{QueryError, Result, ServiceError};
use crate::core::model::{BtFile, ListingMode, QueryArgs, TaskRecord};
use crate::core::query::Query;
use bytes::Bytes;
use clap::{ArgMatches, Command};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Structural selectors: ids, ranges, sub-files, dates, hashes, local files.
pub const PRIORITY_BUILTIN: u8 = 1;
pub const PRIORITY_MAGNET: u8 = 4;
/// Processors contributed by users and extensions.
pub const PRIORITY_USER: u8 = 5;
pub const PRIORITY_EXTEND: u8 = 6;
pub const PRIORITY_URL: u8 = 7;
/// Free-text search; accepts everything so it must stay last.
pub const PRIORITY_DEFAULT: u8 = 9;

/// Remote task store. Every call is a single blocking round trip from the
/// caller's point of view; nothing here retries.
#[async_trait]
pub trait TaskService: Send + Sync {
    fn name(&self) -> &'static str;

    async fn read_tasks(&self, mode: &ListingMode) -> std::result::Result<Vec<TaskRecord>, ServiceError>;

    async fn list_bt_files(&self, task: &TaskRecord) -> std::result::Result<Vec<BtFile>, ServiceError>;

    async fn add_batch_tasks(&self, urls: &[String]) -> std::result::Result<(), ServiceError>;

    async fn add_torrent_task_by_info_hash(&self, hash: &str) -> std::result::Result<(), ServiceError>;

    async fn add_torrent_task_by_content(&self, content: &[u8], name: &str) -> std::result::Result<(), ServiceError>;

    async fn add_magnet_task(&self, magnet: &str) -> std::result::Result<(), ServiceError>;

    /// Downloads a `.torrent` body with a bounded wait; expiry is fatal.
    async fn fetch_torrent(&self, url: &str) -> std::result::Result<Bytes, ServiceError>;
}

/// Turns one selector into a bound [`Query`], or declines with `Ok(None)`.
#[async_trait]
pub trait QueryProcessor: Send + Sync {
    fn name(&self) -> &'static str;
    async fn process(&self, base: &mut TaskBase, arg: &str) -> Result<Option<Query>>;
}

/// Expands one link into several concrete URLs. Pure: no network access.
pub trait LinkExpander: Send + Sync {
    fn name(&self) -> &'static str;
    fn try_expand(&self, url: &str) -> Option<Vec<String>>;
}

#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub torrent_timeout_secs: u64,
    pub headers: HashMap<String, String>,
}

impl Default for ServiceContext {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080/api".to_string(),
            user_agent: "remote-task-query/0.1".to_string(),
            timeout_secs: 60,
            torrent_timeout_secs: 60,
            headers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryCliConfig {
    pub service: ServiceContext,
    pub args: QueryArgs,
    pub input: Option<PathBuf>,
}

pub trait CliPlugin: Send + Sync {
    fn name(&self) -> &'static str;
    fn augment_command(&self, cmd: Command) -> Command;
    fn apply_matches(&self, matches: &ArgMatches, cfg: &mut QueryCliConfig) -> anyhow::Result<()>;
}

/// Extension hook: called once at startup to add processors.
pub type Extension = fn(&mut ProcessorRegistry);

type Entry = (u8, Arc<dyn QueryProcessor>);

/// Process-wide processor lists, built once at startup and passed by
/// reference. Both lists stay sorted by priority; equal priorities keep
/// registration order.
pub struct ProcessorRegistry {
    processors: Vec<Entry>,
    bt_processors: Vec<Entry>,
    cli_plugins: Vec<Box<dyn CliPlugin>>,
}

impl ProcessorRegistry {
    pub fn empty() -> Self {
        Self { processors: vec![], bt_processors: vec![], cli_plugins: vec![] }
    }

    pub fn with_defaults() -> Self {
        use crate::plugins::bt::resolver::{
            BtHashProcessor, BtUrlProcessor, LocalBtProcessor, MagnetProcessor,
        };
        use crate::plugins::http::expand::NumberedLinkExpander;
        use crate::plugins::http::resolver::{UrlExtendProcessor, UrlProcessor};
        use crate::plugins::task::resolver::{
            DateProcessor, DefaultProcessor, RangeIdProcessor, SingleIdProcessor, SubIdProcessor,
        };

        let mut reg = Self::empty();

        let builtin: Vec<Arc<dyn QueryProcessor>> = vec![
            Arc::new(SingleIdProcessor),
            Arc::new(RangeIdProcessor),
            Arc::new(SubIdProcessor),
            Arc::new(DateProcessor),
            Arc::new(BtHashProcessor),
            Arc::new(LocalBtProcessor),
        ];
        for p in builtin {
            reg.register_both(PRIORITY_BUILTIN, p);
        }
        reg.register_both(PRIORITY_MAGNET, Arc::new(MagnetProcessor));
        reg.register_both(
            PRIORITY_EXTEND,
            Arc::new(UrlExtendProcessor::new(vec![Arc::new(NumberedLinkExpander)])),
        );
        reg.register(PRIORITY_URL, Arc::new(UrlProcessor));
        reg.register_bt(PRIORITY_URL, Arc::new(BtUrlProcessor));
        reg.register_both(PRIORITY_DEFAULT, Arc::new(DefaultProcessor));

        reg.cli_plugins.push(Box::new(crate::plugins::http::cli::ServiceCliPlugin::new()));
        reg.cli_plugins.push(Box::new(crate::plugins::task::cli::SelectorCliPlugin::new()));
        reg
    }

    pub fn with_extensions(extensions: &[Extension]) -> Self {
        let mut reg = Self::with_defaults();
        for ext in extensions {
            ext(&mut reg);
        }
        reg
    }

    pub fn register(&mut self, priority: u8, processor: Arc<dyn QueryProcessor>) {
        insert_sorted(&mut self.processors, priority, processor);
    }

    pub fn register_bt(&mut self, priority: u8, processor: Arc<dyn QueryProcessor>) {
        insert_sorted(&mut self.bt_processors, priority, processor);
    }

    pub fn register_both(&mut self, priority: u8, processor: Arc<dyn QueryProcessor>) {
        self.register(priority, processor.clone());
        self.register_bt(priority, processor);
    }

    pub fn register_user(&mut self, processor: Arc<dyn QueryProcessor>) {
        self.register(PRIORITY_USER, processor);
    }

    pub fn processor_names(&self, torrent: bool) -> Vec<(u8, &'static str)> {
        self.list(torrent).iter().map(|(p, q)| (*p, q.name())).collect()
    }

    fn list(&self, torrent: bool) -> &[Entry] {
        if torrent {
            &self.bt_processors
        } else {
            &self.processors
        }
    }

    /// First processor, in priority order, that accepts the selector wins.
    pub async fn to_query(&self, base: &mut TaskBase, arg: &str, torrent: bool) -> Result<Query> {
        for (priority, processor) in self.list(torrent) {
            if let Some(q) = processor.process(base, arg).await? {
                tracing::debug!(
                    selector = arg,
                    processor = processor.name(),
                    priority,
                    kind = q.kind(),
                    query = %q.identity(),
                    "selector matched"
                );
                return Ok(q);
            }
        }
        Err(QueryError::UnresolvableSelector(arg.to_string()))
    }

    pub async fn parse_queries(&self, base: &mut TaskBase, args: &QueryArgs) -> Result<Vec<Query>> {
        let mut queries = Vec::with_capacity(args.selectors.len());
        for arg in &args.selectors {
            queries.push(self.to_query(base, arg, args.torrent).await?);
        }
        if queries.is_empty() {
            queries.push(Query::default_for(args));
        }
        Ok(queries)
    }

    pub fn augment_command(&self, cmd: Command) -> Command {
        self.cli_plugins
            .iter()
            .fold(cmd, |c, p| p.augment_command(c))
    }

    pub fn apply_matches(&self, matches: &ArgMatches, cfg: &mut QueryCliConfig) -> anyhow::Result<()> {
        for p in &self.cli_plugins {
            p.apply_matches(matches, cfg)?;
        }
        Ok(())
    }
}

fn insert_sorted(list: &mut Vec<Entry>, priority: u8, processor: Arc<dyn QueryProcessor>) {
    let at = list.partition_point(|(p, _)| *p <= priority);
    list.insert(at, (priority, processor));
}
