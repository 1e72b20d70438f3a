use crate::core::base::TaskBase;
use crate::core::error::{QueryError, Result};
use crate::core::model::{BtFile, TaskRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BtExpansion {
    /// Requested files that are completed, in request order; every file
    /// when nothing was requested.
    pub files: Vec<BtFile>,
    /// Requested files that are not completed yet.
    pub not_ready: Vec<BtFile>,
    /// The torrent holds exactly one file named like the task itself.
    pub single_file: bool,
    /// No sub-file selection was made.
    pub all_files: bool,
}

/// Resolves a BT task's requested sub-files against its (cached) file list.
pub async fn expand_bt_sub_tasks(base: &mut TaskBase, task: &TaskRecord) -> Result<BtExpansion> {
    if !task.is_bt() {
        return Err(QueryError::NotBtTask(task.name.clone()));
    }
    let files = base.get_files(task).await?;
    let single_file = files.len() == 1 && files[0].name == task.name;

    let Some(requested) = &task.files else {
        return Ok(BtExpansion {
            files: files.to_vec(),
            not_ready: vec![],
            single_file,
            all_files: true,
        });
    };

    let mut ready = vec![];
    let mut not_ready = vec![];
    for &i in requested {
        let file = files
            .get(i)
            .ok_or_else(|| QueryError::SubFileNotFound { task: task.id.clone(), index: i })?;
        if file.status_text.is_completed() {
            ready.push(file.clone());
        } else {
            not_ready.push(file.clone());
        }
    }
    Ok(BtExpansion { files: ready, not_ready, single_file, all_files: false })
}
