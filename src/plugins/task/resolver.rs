use async_trait::async_trait;
use crate::core::base::TaskBase;
use crate::core::error::{QueryError, Result};
use crate::core::query::{parse_sub_selectors, Query};
use crate::plugins::registry::QueryProcessor;
use regex::Regex;
use std::sync::OnceLock;

/// `123` or `123/`: a task id or a listing ordinal.
pub struct SingleIdProcessor;

#[async_trait]
impl QueryProcessor for SingleIdProcessor {
    fn name(&self) -> &'static str { "single-id" }

    async fn process(&self, base: &mut TaskBase, arg: &str) -> Result<Option<Query>> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"^\d+/?$").unwrap());
        if !re.is_match(arg) {
            return Ok(None);
        }
        let n = arg.trim_end_matches('/');
        // pin the opaque id now; ordinals shift once new tasks are committed
        let id = match base.find_task_by_id(n).await? {
            Some(t) => t.id,
            None => n.to_string(),
        };
        Ok(Some(Query::SingleTask { id }))
    }
}

/// `a-b` or `#a-b`: every task whose ordinal lies in the inclusive range,
/// listed backwards when `a > b`.
pub struct RangeIdProcessor;

#[async_trait]
impl QueryProcessor for RangeIdProcessor {
    fn name(&self) -> &'static str { "range-id" }

    async fn process(&self, base: &mut TaskBase, arg: &str) -> Result<Option<Query>> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"^#?(\d+)-(\d+)$").unwrap());
        let Some(caps) = re.captures(arg) else {
            return Ok(None);
        };
        let (begin, end) = match (caps[1].parse::<usize>(), caps[2].parse::<usize>()) {
            (Ok(b), Ok(e)) => (b, e),
            _ => return Ok(None),
        };
        let tasks = base.get_tasks().await?;
        let ids: Vec<String> = if begin <= end {
            tasks
                .iter()
                .filter(|t| (begin..=end).contains(&t.ordinal))
                .map(|t| t.id.clone())
                .collect()
        } else {
            tasks
                .iter()
                .rev()
                .filter(|t| (end..=begin).contains(&t.ordinal))
                .map(|t| t.id.clone())
                .collect()
        };
        Ok(Some(Query::MultipleTasks { ids }))
    }
}

/// `id/selector`: sub-files of a BT task.
pub struct SubIdProcessor;

#[async_trait]
impl QueryProcessor for SubIdProcessor {
    fn name(&self) -> &'static str { "sub-id" }

    async fn process(&self, base: &mut TaskBase, arg: &str) -> Result<Option<Query>> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"^#?(\d+)/([-.\w\[\],\s*]+)$").unwrap());
        let Some(caps) = re.captures(arg) else {
            return Ok(None);
        };
        let subs = parse_sub_selectors(&caps[2])?;
        let task_id = match base.find_task_by_id(&caps[1]).await? {
            Some(t) if !t.is_bt() => return Err(QueryError::NotBtTask(t.name)),
            Some(t) => t.id,
            None => caps[1].to_string(),
        };
        Ok(Some(Query::SubTask { task_id, subs }))
    }
}

/// `YYYY.MM.DD`: tasks created on that date.
pub struct DateProcessor;

#[async_trait]
impl QueryProcessor for DateProcessor {
    fn name(&self) -> &'static str { "date" }

    async fn process(&self, _base: &mut TaskBase, arg: &str) -> Result<Option<Query>> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"^\d{4}\.\d{2}\.\d{2}$").unwrap());
        if re.is_match(arg) {
            Ok(Some(Query::Date { date: arg.to_string() }))
        } else {
            Ok(None)
        }
    }
}

/// Case-insensitive name search. Accepts every selector.
pub struct DefaultProcessor;

#[async_trait]
impl QueryProcessor for DefaultProcessor {
    fn name(&self) -> &'static str { "default" }

    async fn process(&self, _base: &mut TaskBase, arg: &str) -> Result<Option<Query>> {
        Ok(Some(Query::Default { text: arg.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::{bt_task, sample_task};
    use crate::core::memory::MemoryTaskService;
    use crate::core::model::ListingMode;
    use std::sync::Arc;

    fn base_with(tasks: Vec<crate::core::model::TaskRecord>) -> TaskBase {
        TaskBase::new(Arc::new(MemoryTaskService::new(tasks)), ListingMode::All, true)
    }

    fn three() -> Vec<crate::core::model::TaskRecord> {
        vec![sample_task("a", 1, "one"), sample_task("b", 2, "two"), sample_task("c", 3, "three")]
    }

    #[tokio::test]
    async fn ranges_follow_direction() {
        let mut base = base_with(three());
        let q = RangeIdProcessor.process(&mut base, "1-3").await.unwrap().unwrap();
        assert!(matches!(q, Query::MultipleTasks { ref ids } if ids == &["a", "b", "c"]));
        let q = RangeIdProcessor.process(&mut base, "#3-1").await.unwrap().unwrap();
        assert!(matches!(q, Query::MultipleTasks { ref ids } if ids == &["c", "b", "a"]));
        let q = RangeIdProcessor.process(&mut base, "7-9").await.unwrap().unwrap();
        assert!(matches!(q, Query::MultipleTasks { ref ids } if ids.is_empty()));
        assert!(RangeIdProcessor.process(&mut base, "1-x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn single_id_pins_opaque_id() {
        let mut base = base_with(three());
        let q = SingleIdProcessor.process(&mut base, "2/").await.unwrap().unwrap();
        assert!(matches!(q, Query::SingleTask { ref id } if id == "b"));
        let q = SingleIdProcessor.process(&mut base, "99").await.unwrap().unwrap();
        assert!(matches!(q, Query::SingleTask { ref id } if id == "99"));
        assert!(SingleIdProcessor.process(&mut base, "2/1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sub_id_requires_bt_task() {
        let mut tasks = three();
        tasks.push(bt_task("d", 4, "pack", "3b245504cf5f11bbdbe1201cea6a6bf45aee1bc0"));
        let mut base = base_with(tasks);
        let q = SubIdProcessor.process(&mut base, "4/[0,.srt]").await.unwrap().unwrap();
        assert!(matches!(q, Query::SubTask { ref task_id, ref subs } if task_id == "d" && subs.len() == 2));
        let err = SubIdProcessor.process(&mut base, "1/0").await.unwrap_err();
        assert!(matches!(err, QueryError::NotBtTask(_)));
        assert!(SubIdProcessor.process(&mut base, "pack").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn date_pattern_only() {
        let mut base = base_with(vec![]);
        assert!(DateProcessor.process(&mut base, "2012.05.06").await.unwrap().is_some());
        assert!(DateProcessor.process(&mut base, "2012-05-06").await.unwrap().is_none());
    }
}
