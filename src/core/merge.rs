use crate::core::model::TaskRecord;
use std::collections::HashMap;

/// Collapses results that name the same task id.
///
/// The first record seen for an id is kept. A record carrying a sub-file
/// `index` seeds `files = [index]` when it is first, and appends its index
/// when the kept record is already accumulating files. A whole-task
/// selection that came first absorbs later sub-file selections.
pub fn merge_tasks(tasks: Vec<TaskRecord>) -> Vec<TaskRecord> {
    let mut result: Vec<TaskRecord> = Vec::with_capacity(tasks.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for mut task in tasks {
        match positions.get(&task.id) {
            Some(&at) => {
                if let (Some(index), Some(files)) = (task.index, result[at].files.as_mut()) {
                    files.push(index);
                }
            }
            None => {
                if let Some(index) = task.index.take() {
                    task.files = Some(vec![index]);
                }
                positions.insert(task.id.clone(), result.len());
                result.push(task);
            }
        }
    }
    result
}
