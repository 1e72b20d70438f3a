use async_trait::async_trait;
use crate::core::base::TaskBase;
use crate::core::error::Result;
use crate::core::normalize::url_unmask;
use crate::core::query::Query;
use crate::plugins::registry::{LinkExpander, QueryProcessor};
use regex::Regex;
use std::sync::{Arc, OnceLock};

/// Any `scheme://` link, unmasked first.
pub struct UrlProcessor;

#[async_trait]
impl QueryProcessor for UrlProcessor {
    fn name(&self) -> &'static str { "url" }

    async fn process(&self, base: &mut TaskBase, arg: &str) -> Result<Option<Query>> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"^\w+://").unwrap());
        if !re.is_match(arg) {
            return Ok(None);
        }
        let url = url_unmask(arg);
        let exists = base.find_task_by_url(&url).await?.is_some();
        Ok(Some(Query::Url { url, exists }))
    }
}

/// Links that one of the expansion rules turns into several URLs.
pub struct UrlExtendProcessor {
    expanders: Vec<Arc<dyn LinkExpander>>,
}

impl UrlExtendProcessor {
    pub fn new(expanders: Vec<Arc<dyn LinkExpander>>) -> Self {
        Self { expanders }
    }
}

#[async_trait]
impl QueryProcessor for UrlExtendProcessor {
    fn name(&self) -> &'static str { "url-extend" }

    async fn process(&self, _base: &mut TaskBase, arg: &str) -> Result<Option<Query>> {
        for expander in &self.expanders {
            if let Some(urls) = expander.try_expand(arg).filter(|u| !u.is_empty()) {
                tracing::debug!(expander = expander.name(), count = urls.len(), "link expanded");
                let urls = urls.iter().map(|u| url_unmask(u)).collect();
                return Ok(Some(Query::BatchUrls { urls }));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::sample_task;
    use crate::core::memory::MemoryTaskService;
    use crate::core::model::ListingMode;
    use crate::plugins::http::expand::NumberedLinkExpander;

    #[tokio::test]
    async fn url_knows_whether_task_exists() {
        let svc = Arc::new(MemoryTaskService::new(vec![sample_task("1", 1, "a")]));
        let mut base = TaskBase::new(svc, ListingMode::All, true);
        let q = UrlProcessor.process(&mut base, "http://example.com/%31").await.unwrap().unwrap();
        assert!(matches!(q, Query::Url { exists: true, .. }));
        let q = UrlProcessor.process(&mut base, "ftp://example.com/x").await.unwrap().unwrap();
        assert!(matches!(q, Query::Url { exists: false, .. }));
        assert!(UrlProcessor.process(&mut base, "not a url").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn extend_declines_plain_links() {
        let svc = Arc::new(MemoryTaskService::new(vec![]));
        let mut base = TaskBase::new(svc, ListingMode::All, true);
        let p = UrlExtendProcessor::new(vec![Arc::new(NumberedLinkExpander)]);
        assert!(p.process(&mut base, "http://h/a.mkv").await.unwrap().is_none());
        let q = p.process(&mut base, "http://h/e[1-2].mkv").await.unwrap().unwrap();
        assert!(matches!(q, Query::BatchUrls { ref urls } if urls.len() == 2));
    }
}
