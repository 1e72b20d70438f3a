use serde::Deserialize;
use std::fmt;

/// Which remote listing a task base reads from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ListingMode {
    #[default]
    All,
    Deleted,
    Expired,
    Category(String),
}

impl ListingMode {
    pub fn as_query_value(&self) -> &'static str {
        match self {
            ListingMode::All => "all",
            ListingMode::Deleted => "deleted",
            ListingMode::Expired => "expired",
            ListingMode::Category(_) => "category",
        }
    }
}

/// Selectors plus the boolean mode flags that shape one invocation.
#[derive(Debug, Clone, Default)]
pub struct QueryArgs {
    pub selectors: Vec<String>,
    pub torrent: bool,
    pub all: bool,
    pub completed: bool,
    pub deleted: bool,
    pub expired: bool,
    pub category: Option<String>,
}

impl QueryArgs {
    pub fn listing_mode(&self) -> ListingMode {
        if let Some(c) = &self.category {
            ListingMode::Category(c.clone())
        } else if self.deleted {
            ListingMode::Deleted
        } else if self.expired {
            ListingMode::Expired
        } else {
            // --completed filters client side, the service listing stays full
            ListingMode::All
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    Url,
    Ed2k,
    Bt,
}

impl TaskType {
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "bt" | "magnet" => TaskType::Bt,
            "ed2k" => TaskType::Ed2k,
            _ => TaskType::Url,
        }
    }

    fn from_original_url(url: &str) -> Self {
        match url.split_once(':') {
            Some((scheme, _)) => Self::from_label(scheme),
            None => TaskType::Url,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskType::Url => "url",
            TaskType::Ed2k => "ed2k",
            TaskType::Bt => "bt",
        })
    }
}

/// Human status derived from the numeric code reported by the service.
///
/// Task listings and BT file listings use different code tables; codes
/// outside a table (4 has never been observed) stay `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Waiting,
    Downloading,
    Completed,
    Failed,
    Pending,
    Unknown(i64),
}

impl TaskStatus {
    pub fn from_task_code(code: i64) -> Self {
        match code {
            0 => TaskStatus::Waiting,
            1 => TaskStatus::Downloading,
            2 => TaskStatus::Completed,
            3 => TaskStatus::Failed,
            5 => TaskStatus::Pending,
            other => TaskStatus::Unknown(other),
        }
    }

    pub fn from_bt_file_code(code: i64) -> Self {
        match code {
            0 => TaskStatus::Waiting,
            1 => TaskStatus::Downloading,
            2 => TaskStatus::Completed,
            3 => TaskStatus::Failed,
            other => TaskStatus::Unknown(other),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Waiting => f.write_str("waiting"),
            TaskStatus::Downloading => f.write_str("downloading"),
            TaskStatus::Completed => f.write_str("completed"),
            TaskStatus::Failed => f.write_str("failed"),
            TaskStatus::Pending => f.write_str("pending"),
            TaskStatus::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// Snapshot of one remote task as listed by the service.
///
/// `index` is set on per-file selections before merging; `files` is the
/// accumulated sub-file selection after merging. Neither is ever set by the
/// service itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub id: String,
    pub ordinal: usize,
    pub task_type: TaskType,
    pub name: String,
    pub status: i64,
    pub status_text: TaskStatus,
    pub size: u64,
    pub original_url: String,
    pub service_url: String,
    pub bt_hash: Option<String>,
    pub dcid: Option<String>,
    pub date: Option<String>,
    pub index: Option<usize>,
    pub files: Option<Vec<usize>>,
}

impl TaskRecord {
    pub fn is_bt(&self) -> bool {
        self.task_type == TaskType::Bt
    }

    pub fn has_hash(&self, hash: &str) -> bool {
        self.is_bt()
            && self
                .bt_hash
                .as_deref()
                .is_some_and(|h| h.eq_ignore_ascii_case(hash))
    }

    pub fn with_index(&self, index: usize) -> Self {
        let mut t = self.clone();
        t.index = Some(index);
        t
    }
}

/// Wire shape of a task in a listing response.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskPayload {
    pub id: String,
    #[serde(rename = "#", default)]
    pub ordinal: Option<usize>,
    #[serde(rename = "type", default)]
    pub task_type: Option<String>,
    pub name: String,
    pub status: i64,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub original_url: String,
    #[serde(default)]
    pub service_url: String,
    #[serde(default)]
    pub bt_hash: Option<String>,
    #[serde(default)]
    pub dcid: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

impl TaskPayload {
    /// `position` is the 1-based place in the listing, used when the service
    /// omits the ordinal.
    pub fn into_record(self, position: usize) -> TaskRecord {
        let task_type = match &self.task_type {
            Some(label) => TaskType::from_label(label),
            None => TaskType::from_original_url(&self.original_url),
        };
        TaskRecord {
            ordinal: self.ordinal.unwrap_or(position),
            task_type,
            status_text: TaskStatus::from_task_code(self.status),
            status: self.status,
            id: self.id,
            name: self.name,
            size: self.size,
            original_url: self.original_url,
            service_url: self.service_url,
            bt_hash: self.bt_hash.map(|h| h.to_ascii_lowercase()),
            dcid: self.dcid,
            date: self.date,
            index: None,
            files: None,
        }
    }
}

/// One entry of a BT task's file list; `index` is its list position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BtFile {
    pub index: usize,
    pub id: String,
    pub name: String,
    pub status: i64,
    pub status_text: TaskStatus,
    pub size: u64,
    pub service_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BtFilePayload {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub status: i64,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub service_url: String,
}

impl BtFilePayload {
    pub fn into_file(self, index: usize) -> BtFile {
        BtFile {
            index,
            id: self.id,
            status_text: TaskStatus::from_bt_file_code(self.status),
            status: self.status,
            name: self.name,
            size: self.size,
            service_url: self.service_url,
        }
    }
}
