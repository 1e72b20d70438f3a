use async_trait::async_trait;
use crate::core::base::TaskBase;
use crate::core::error::{QueryError, Result};
use crate::core::query::Query;
use crate::core::torrent::{info_hash_from_content, magnet_to_infohash};
use crate::plugins::registry::QueryProcessor;
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;

/// `bt://<hash>` or a bare 40-char hex info hash.
pub struct BtHashProcessor;

#[async_trait]
impl QueryProcessor for BtHashProcessor {
    fn name(&self) -> &'static str { "bt-hash" }

    async fn process(&self, base: &mut TaskBase, arg: &str) -> Result<Option<Query>> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"(?i)^(?:bt://)?([0-9a-f]{40})$").unwrap());
        let Some(caps) = re.captures(arg) else {
            return Ok(None);
        };
        let hash = caps[1].to_ascii_lowercase();
        let exists = base.find_task_by_hash(&hash).await?.is_some();
        Ok(Some(Query::BtHash { hash, exists }))
    }
}

/// Path of an existing local `.torrent` file.
pub struct LocalBtProcessor;

#[async_trait]
impl QueryProcessor for LocalBtProcessor {
    fn name(&self) -> &'static str { "local-bt" }

    async fn process(&self, base: &mut TaskBase, arg: &str) -> Result<Option<Query>> {
        if !arg.to_lowercase().ends_with(".torrent") {
            return Ok(None);
        }
        let path = PathBuf::from(arg);
        match tokio::fs::metadata(&path).await {
            Ok(m) if m.is_file() => {}
            _ => return Ok(None),
        }
        let torrent = tokio::fs::read(&path).await.map_err(|source| QueryError::Io {
            path: arg.to_string(),
            source,
        })?;
        let hash = info_hash_from_content(&torrent)?;
        let exists = base.find_task_by_hash(&hash).await?.is_some();
        Ok(Some(Query::LocalBt { path, hash, torrent: torrent.into(), exists }))
    }
}

pub struct MagnetProcessor;

#[async_trait]
impl QueryProcessor for MagnetProcessor {
    fn name(&self) -> &'static str { "magnet" }

    async fn process(&self, base: &mut TaskBase, arg: &str) -> Result<Option<Query>> {
        if !arg.get(..7).is_some_and(|p| p.eq_ignore_ascii_case("magnet:")) {
            return Ok(None);
        }
        let hash = magnet_to_infohash(arg)?;
        let exists = base.find_task_by_hash(&hash).await?.is_some();
        Ok(Some(Query::Magnet { url: arg.to_string(), hash, exists }))
    }
}

/// In torrent mode an http(s) link names a remote `.torrent` file. The body
/// is fetched while matching so the info hash can be checked up front.
pub struct BtUrlProcessor;

#[async_trait]
impl QueryProcessor for BtUrlProcessor {
    fn name(&self) -> &'static str { "bt-url" }

    async fn process(&self, base: &mut TaskBase, arg: &str) -> Result<Option<Query>> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"(?i)^https?://").unwrap());
        if !re.is_match(arg) {
            return Ok(None);
        }
        let torrent = base.service().fetch_torrent(arg).await?;
        let hash = info_hash_from_content(&torrent)?;
        tracing::debug!(url = arg, hash = %hash, bytes = torrent.len(), "remote torrent fetched");
        let exists = base.find_task_by_hash(&hash).await?.is_some();
        Ok(Some(Query::BtUrl { url: arg.to_string(), hash, torrent, exists }))
    }
}
