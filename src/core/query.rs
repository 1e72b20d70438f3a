use crate::core::base::TaskBase;
use crate::core::error::{QueryError, Result};
use crate::core::model::{QueryArgs, TaskRecord};
use crate::core::normalize::link_normalize;
use bytes::Bytes;
use sanitize_filename::sanitize;
use std::path::PathBuf;

/// One element of a sub-file selector such as `42/[0-2,.srt]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubSelector {
    Index(usize),
    /// Inclusive `a-b`, walked backwards when `a > b`.
    Range(usize, usize),
    Extension(String),
    All,
}

/// Resolution strategy bound to one selector.
///
/// Identity-style variants (ids, hashes, urls, sub-files) fail with
/// `TaskNotFound` when their task is absent after commit; filter-style
/// variants (ranges, dates, free text) may resolve to nothing.
#[derive(Debug, Clone)]
pub enum Query {
    AllTasks,
    CompletedTasks,
    NoTasks,
    SingleTask { id: String },
    MultipleTasks { ids: Vec<String> },
    SubTask { task_id: String, subs: Vec<SubSelector> },
    Date { date: String },
    BtHash { hash: String, exists: bool },
    LocalBt { path: PathBuf, hash: String, torrent: Bytes, exists: bool },
    Magnet { url: String, hash: String, exists: bool },
    BtUrl { url: String, hash: String, torrent: Bytes, exists: bool },
    BatchUrls { urls: Vec<String> },
    Url { url: String, exists: bool },
    Default { text: String },
}

impl Query {
    /// Query used when the command line names no selector at all.
    pub fn default_for(args: &QueryArgs) -> Self {
        if args.category.is_some() || args.deleted || args.expired {
            Query::AllTasks
        } else if args.completed {
            Query::CompletedTasks
        } else if args.all {
            Query::AllTasks
        } else {
            Query::NoTasks
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Query::AllTasks => "all",
            Query::CompletedTasks => "completed",
            Query::NoTasks => "none",
            Query::SingleTask { .. } => "single-task",
            Query::MultipleTasks { .. } => "multiple-tasks",
            Query::SubTask { .. } => "sub-task",
            Query::Date { .. } => "date",
            Query::BtHash { .. } => "bt-hash",
            Query::LocalBt { .. } => "local-bt",
            Query::Magnet { .. } => "magnet",
            Query::BtUrl { .. } => "bt-url",
            Query::BatchUrls { .. } => "batch-urls",
            Query::Url { .. } => "url",
            Query::Default { .. } => "default",
        }
    }

    /// Comparable key of what this query denotes.
    pub fn identity(&self) -> String {
        match self {
            Query::AllTasks => "*".to_string(),
            Query::CompletedTasks => "status:completed".to_string(),
            Query::NoTasks => String::new(),
            Query::SingleTask { id } => id.clone(),
            Query::MultipleTasks { ids } => ids.join(","),
            Query::SubTask { task_id, subs } => format!("{}/{:?}", task_id, subs),
            Query::Date { date } => format!("date:{}", date),
            Query::BtHash { hash, .. }
            | Query::LocalBt { hash, .. }
            | Query::Magnet { hash, .. }
            | Query::BtUrl { hash, .. } => format!("bt://{}", hash),
            Query::BatchUrls { urls } => urls
                .iter()
                .map(|u| link_normalize(u))
                .collect::<Vec<_>>()
                .join("\n"),
            Query::Url { url, .. } => link_normalize(url),
            Query::Default { text } => format!("name:{}", text.to_lowercase()),
        }
    }

    /// Queues a creation when the selected task does not exist yet. Never
    /// creates anything itself.
    pub async fn prepare(&self, base: &mut TaskBase) -> Result<()> {
        match self {
            Query::BtHash { hash, exists: false } => base.add_bt_task_by_hash(hash),
            Query::LocalBt { path, hash, torrent, exists: false } => {
                let name = path
                    .file_name()
                    .map(|n| sanitize(n.to_string_lossy()))
                    .unwrap_or_else(|| format!("{}.torrent", hash));
                base.add_bt_task_by_content(hash, torrent.clone(), &name);
            }
            Query::Magnet { url, exists: false, .. } => base.add_magnet_task(url),
            Query::BtUrl { url, hash, torrent, exists: false } => {
                let name = url
                    .rsplit('/')
                    .next()
                    .filter(|s| !s.is_empty())
                    .map(sanitize)
                    .unwrap_or_else(|| format!("{}.torrent", hash));
                base.add_bt_task_by_content(hash, torrent.clone(), &name);
            }
            Query::BatchUrls { urls } => {
                for url in urls {
                    if base.find_task_by_url(url).await?.is_none() {
                        base.add_url_task(url);
                    }
                }
            }
            Query::Url { url, exists: false } => base.add_url_task(url),
            _ => {}
        }
        Ok(())
    }

    /// Task records this query denotes. Call only after any queued creation
    /// has been committed.
    pub async fn get_tasks(&self, base: &mut TaskBase) -> Result<Vec<TaskRecord>> {
        match self {
            Query::AllTasks => Ok(base.get_tasks().await?.to_vec()),
            Query::CompletedTasks => Ok(base
                .get_tasks()
                .await?
                .iter()
                .filter(|t| t.status_text.is_completed())
                .cloned()
                .collect()),
            Query::NoTasks => Ok(vec![]),
            Query::SingleTask { id } => Ok(vec![base.get_task_by_id(id).await?]),
            Query::MultipleTasks { ids } => {
                let mut out = Vec::with_capacity(ids.len());
                for id in ids {
                    out.push(base.get_task_by_id(id).await?);
                }
                Ok(out)
            }
            Query::SubTask { task_id, subs } => sub_tasks(base, task_id, subs).await,
            Query::Date { date } => Ok(base
                .get_tasks()
                .await?
                .iter()
                .filter(|t| t.date.as_deref() == Some(date.as_str()))
                .cloned()
                .collect()),
            Query::BtHash { hash, .. }
            | Query::LocalBt { hash, .. }
            | Query::Magnet { hash, .. }
            | Query::BtUrl { hash, .. } => Ok(vec![base.get_task_by_hash(hash).await?]),
            Query::BatchUrls { urls } => {
                let mut out = Vec::with_capacity(urls.len());
                for url in urls {
                    out.push(base.get_task_by_url(url).await?);
                }
                Ok(out)
            }
            Query::Url { url, .. } => Ok(vec![base.get_task_by_url(url).await?]),
            Query::Default { text } => {
                let needle = text.to_lowercase();
                Ok(base
                    .get_tasks()
                    .await?
                    .iter()
                    .filter(|t| t.name.to_lowercase().contains(&needle))
                    .cloned()
                    .collect())
            }
        }
    }
}

async fn sub_tasks(base: &mut TaskBase, task_id: &str, subs: &[SubSelector]) -> Result<Vec<TaskRecord>> {
    let task = base.get_task_by_id(task_id).await?;
    if !task.is_bt() {
        return Err(QueryError::NotBtTask(task.name));
    }
    let files = base.get_files(&task).await?;
    let mut out = vec![];
    for sub in subs {
        match sub {
            SubSelector::Index(i) => {
                if *i >= files.len() {
                    return Err(QueryError::SubFileNotFound { task: task.id.clone(), index: *i });
                }
                out.push(task.with_index(*i));
            }
            SubSelector::Range(a, b) => {
                let last = (*a).max(*b);
                if last >= files.len() {
                    return Err(QueryError::SubFileNotFound { task: task.id.clone(), index: last });
                }
                if a <= b {
                    out.extend((*a..=*b).map(|i| task.with_index(i)));
                } else {
                    out.extend((*b..=*a).rev().map(|i| task.with_index(i)));
                }
            }
            SubSelector::Extension(ext) => {
                let ext = ext.to_lowercase();
                out.extend(
                    files
                        .iter()
                        .filter(|f| f.name.to_lowercase().ends_with(&ext))
                        .map(|f| task.with_index(f.index)),
                );
            }
            SubSelector::All => out.extend(files.iter().map(|f| task.with_index(f.index))),
        }
    }
    Ok(out)
}

/// Parses the part after `id/`: a single index, `.ext`, `*`, or a bracketed
/// comma list of indices, `a-b` ranges (reversed when `a > b`) and `.ext`.
pub fn parse_sub_selectors(raw: &str) -> Result<Vec<SubSelector>> {
    let invalid = |reason: &str| QueryError::InvalidSelector {
        selector: raw.to_string(),
        reason: reason.to_string(),
    };

    if let Some(inner) = raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        let mut subs = vec![];
        for part in inner.split(',').map(str::trim) {
            subs.push(parse_sub_part(part).ok_or_else(|| invalid(part))?);
        }
        return Ok(subs);
    }
    if raw == "*" {
        return Ok(vec![SubSelector::All]);
    }
    parse_sub_part(raw.trim())
        .map(|sub| vec![sub])
        .ok_or_else(|| invalid("expected index, range, .ext or *"))
}

fn parse_sub_part(part: &str) -> Option<SubSelector> {
    if let Some(ext) = part.strip_prefix('.') {
        if !ext.is_empty() && ext.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Some(SubSelector::Extension(part.to_string()));
        }
        return None;
    }
    if let Some((a, b)) = part.split_once('-') {
        return Some(SubSelector::Range(a.parse().ok()?, b.parse().ok()?));
    }
    part.parse().ok().map(SubSelector::Index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::{bt_task, sample_task};
    use crate::core::memory::MemoryTaskService;
    use crate::core::model::ListingMode;
    use std::sync::Arc;

    const HASH: &str = "3b245504cf5f11bbdbe1201cea6a6bf45aee1bc0";

    #[test]
    fn parses_bracketed_sub_selectors() {
        let subs = parse_sub_selectors("[0-2, .srt,4]").unwrap();
        assert_eq!(
            subs,
            vec![
                SubSelector::Range(0, 2),
                SubSelector::Extension(".srt".into()),
                SubSelector::Index(4),
            ]
        );
        assert_eq!(parse_sub_selectors("[3-1]").unwrap(), vec![SubSelector::Range(3, 1)]);
        assert_eq!(parse_sub_selectors("*").unwrap(), vec![SubSelector::All]);
        assert!(parse_sub_selectors("[x]").is_err());
        assert!(parse_sub_selectors("abc").is_err());
    }

    #[test]
    fn default_query_follows_flags() {
        let args = QueryArgs { completed: true, ..Default::default() };
        assert!(matches!(Query::default_for(&args), Query::CompletedTasks));
        let args = QueryArgs { completed: true, expired: true, ..Default::default() };
        assert!(matches!(Query::default_for(&args), Query::AllTasks));
        assert!(matches!(Query::default_for(&QueryArgs::default()), Query::NoTasks));
    }

    #[tokio::test]
    async fn sub_task_resolves_indices_and_extensions_in_order() {
        let task = bt_task("42", 1, "season", HASH);
        let svc = Arc::new(MemoryTaskService::new(vec![task]));
        svc.set_files(
            "42",
            vec![("e1.mkv", 2), ("e1.srt", 2), ("e2.mkv", 2), ("e3.mkv", 2), ("e4.mkv", 1)],
        )
        .await;
        let mut base = TaskBase::new(svc, ListingMode::All, true);
        let q = Query::SubTask { task_id: "42".into(), subs: parse_sub_selectors("[0-2,.srt]").unwrap() };
        let indices: Vec<_> = q
            .get_tasks(&mut base)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.index)
            .collect();
        assert_eq!(indices, vec![Some(0), Some(1), Some(2), Some(1)]);
    }

    #[tokio::test]
    async fn sub_task_out_of_range_is_an_error() {
        let svc = Arc::new(MemoryTaskService::new(vec![bt_task("42", 1, "season", HASH)]));
        svc.set_files("42", vec![("a", 2)]).await;
        let mut base = TaskBase::new(svc, ListingMode::All, true);
        let q = Query::SubTask { task_id: "42".into(), subs: vec![SubSelector::Index(3)] };
        let err = q.get_tasks(&mut base).await.unwrap_err();
        assert!(matches!(err, QueryError::SubFileNotFound { index: 3, .. }));
    }

    #[tokio::test]
    async fn reversed_sub_range_walks_backwards() {
        let svc = Arc::new(MemoryTaskService::new(vec![bt_task("42", 1, "season", HASH)]));
        svc.set_files("42", vec![("a", 2), ("b", 2), ("c", 2)]).await;
        let mut base = TaskBase::new(svc, ListingMode::All, true);
        let q = Query::SubTask { task_id: "42".into(), subs: parse_sub_selectors("2-0").unwrap() };
        let indices: Vec<_> = q.get_tasks(&mut base).await.unwrap().into_iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![Some(2), Some(1), Some(0)]);
    }

    #[tokio::test]
    async fn huge_sub_range_fails_without_materializing() {
        let subs = parse_sub_selectors("[0-18446744073709551614]").unwrap();
        assert_eq!(subs, vec![SubSelector::Range(0, 18446744073709551614)]);

        let svc = Arc::new(MemoryTaskService::new(vec![bt_task("42", 1, "season", HASH)]));
        svc.set_files("42", vec![("a", 2), ("b", 2)]).await;
        let mut base = TaskBase::new(svc, ListingMode::All, true);
        let q = Query::SubTask { task_id: "42".into(), subs };
        let err = q.get_tasks(&mut base).await.unwrap_err();
        assert!(matches!(err, QueryError::SubFileNotFound { index: 18446744073709551614, .. }));
    }

    #[tokio::test]
    async fn filters_may_be_empty_but_identities_may_not() {
        let svc = Arc::new(MemoryTaskService::new(vec![sample_task("1", 1, "Alpha")]));
        let mut base = TaskBase::new(svc, ListingMode::All, true);
        let none = Query::Default { text: "beta".into() }.get_tasks(&mut base).await.unwrap();
        assert!(none.is_empty());
        let date = Query::Date { date: "2012.01.01".into() }.get_tasks(&mut base).await.unwrap();
        assert!(date.is_empty());
        let hit = Query::Default { text: "ALP".into() }.get_tasks(&mut base).await.unwrap();
        assert_eq!(hit.len(), 1);
        let err = Query::BtHash { hash: HASH.into(), exists: false }
            .get_tasks(&mut base)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::TaskNotFound(_)));
    }
}
