use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::Task;

/// Collect source files under `root` whose extension is in `extensions`.
///
/// Honours `.gitignore` and skips hidden entries. Files whose stem already ends
/// with `suffix` are outputs of an earlier run and are left out. Sorted by path.
pub fn discover(root: &Path, extensions: &[String], suffix: &str) -> Vec<PathBuf> {
    let wanted: Vec<String> = extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect();

    let mut files: Vec<PathBuf> = WalkBuilder::new(root)
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(|entry| entry.into_path())
        .filter(|path| has_extension(path, &wanted))
        .filter(|path| !is_generated(path, suffix))
        .collect();
    files.sort();
    files
}

/// Where the result for `input` is written when no explicit output is given.
///
/// `src/app.py` becomes `src/app_commented.py` for the comment task and
/// `src/app_review.md` for a report task.
pub fn derive_output(input: &Path, task: Task, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = if task.produces_report() {
        format!("{stem}_{}.md", task.as_str())
    } else {
        match input.extension() {
            Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
            None => format!("{stem}{suffix}"),
        }
    };
    input.with_file_name(name)
}

fn has_extension(path: &Path, wanted: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| wanted.contains(&e))
}

fn is_generated(path: &Path, suffix: &str) -> bool {
    !suffix.is_empty()
        && path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.ends_with(suffix))
}
