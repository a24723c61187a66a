//! Display labels for task tabs.
//!
//! A tab shows its task's first file name, truncated, so users can tell
//! tasks apart at a glance. Labels are display-only: two tasks can start with
//! the same file, so a [`TabMap`] disambiguates with `" (2)"`, `" (3)"`
//! suffixes and maps each label back to the task it stands for.

use std::path::Path;

use crate::task::{Task, TaskId};

/// Label for one task: first file's name cut to `max_len` characters plus
/// `"..."`, or the task name when the list is empty.
pub fn tab_label(task: &Task, max_len: usize) -> String {
    let Some(first) = task.files.first() else {
        return task.name.clone();
    };
    let name = file_name(first);
    if name.chars().count() <= max_len {
        name
    } else {
        let cut: String = name.chars().take(max_len).collect();
        format!("{cut}...")
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Ordered label ⇄ task mapping for one refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabMap {
    entries: Vec<(String, TaskId)>,
}

impl TabMap {
    pub fn build(tasks: &[Task], max_len: usize) -> Self {
        let mut entries: Vec<(String, TaskId)> = Vec::with_capacity(tasks.len());
        let mut seen: Vec<(String, usize)> = Vec::new();

        for task in tasks {
            let base = tab_label(task, max_len);
            let count = match seen.iter_mut().find(|(label, _)| *label == base) {
                Some((_, n)) => {
                    *n += 1;
                    *n
                }
                None => {
                    seen.push((base.clone(), 1));
                    1
                }
            };
            let label = if count == 1 {
                base
            } else {
                format!("{base} ({count})")
            };
            entries.push((label, task.id));
        }
        Self { entries }
    }

    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(|(l, _)| l.clone()).collect()
    }

    pub fn task_for(&self, label: &str) -> Option<TaskId> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, id)| *id)
    }

    pub fn label_for(&self, id: TaskId) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, t)| *t == id)
            .map(|(l, _)| l.as_str())
    }
}
