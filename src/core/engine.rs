use crate::core::base::TaskBase;
use crate::core::error::{QueryError, Result};
use crate::core::expand::{expand_bt_sub_tasks, BtExpansion};
use crate::core::model::{QueryArgs, TaskRecord};
use crate::plugins::registry::{ProcessorRegistry, TaskService};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Resolved tasks together with the base that produced them, so BT
/// expansion can reuse its task list and file caches.
pub struct QueryOutcome {
    pub base: TaskBase,
    pub tasks: Vec<TaskRecord>,
}

impl QueryOutcome {
    pub async fn expand(&mut self, task: &TaskRecord) -> Result<BtExpansion> {
        expand_bt_sub_tasks(&mut self.base, task).await
    }
}

#[derive(Clone)]
pub struct QueryEngine {
    registry: Arc<ProcessorRegistry>,
    service: Arc<dyn TaskService>,
}

impl QueryEngine {
    pub fn new(registry: ProcessorRegistry, service: Arc<dyn TaskService>) -> Self {
        Self { registry: Arc::new(registry), service }
    }

    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    /// Resolves selectors without creating anything on the service.
    pub async fn search_tasks(&self, args: &QueryArgs) -> Result<QueryOutcome> {
        self.query_tasks(args, true).await
    }

    /// Resolves selectors, creating the tasks they name that do not exist yet.
    pub async fn find_tasks_to_download(&self, args: &QueryArgs) -> Result<QueryOutcome> {
        self.query_tasks(args, false).await
    }

    pub async fn query_tasks(&self, args: &QueryArgs, readonly: bool) -> Result<QueryOutcome> {
        let mode = args.listing_mode();
        debug!(service = self.service.name(), mode = mode.as_query_value(), readonly, "resolving selectors");
        let mut base = TaskBase::new(self.service.clone(), mode, readonly);
        let queries = self.registry.parse_queries(&mut base, args).await?;
        base.register_queries(queries);
        let tasks = base.execute_queries().await?;
        info!(selectors = args.selectors.len(), tasks = tasks.len(), "selectors resolved");
        Ok(QueryOutcome { base, tasks })
    }
}

/// Non-blank trimmed lines of a selector file, in file order.
pub async fn read_selector_file(path: &Path) -> Result<Vec<String>> {
    let text = tokio::fs::read_to_string(path).await.map_err(|source| QueryError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Appends the selectors of `input`, if any, after those already in `args`.
pub async fn load_input_selectors(args: &mut QueryArgs, input: Option<&Path>) -> Result<()> {
    if let Some(path) = input {
        let extra = read_selector_file(path).await?;
        debug!(path = %path.display(), count = extra.len(), "selector file read");
        args.selectors.extend(extra);
    }
    Ok(())
}
