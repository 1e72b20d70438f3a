//! Task records shared by unit tests.

use crate::core::model::{TaskRecord, TaskStatus, TaskType};

/// Completed plain URL task.
pub fn sample_task(id: &str, ordinal: usize, name: &str) -> TaskRecord {
    TaskRecord {
        id: id.to_string(),
        ordinal,
        task_type: TaskType::Url,
        name: name.to_string(),
        status: 2,
        status_text: TaskStatus::from_task_code(2),
        size: 0,
        original_url: format!("http://example.com/{}", id),
        service_url: String::new(),
        bt_hash: None,
        dcid: None,
        date: None,
        index: None,
        files: None,
    }
}

pub fn bt_task(id: &str, ordinal: usize, name: &str, hash: &str) -> TaskRecord {
    TaskRecord {
        task_type: TaskType::Bt,
        original_url: format!("bt://{}", hash),
        bt_hash: Some(hash.to_ascii_lowercase()),
        dcid: Some(hash.to_ascii_lowercase()),
        ..sample_task(id, ordinal, name)
    }
}
