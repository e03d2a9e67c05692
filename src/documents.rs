//! Resolve user-supplied paths into [`Document`]s.
//!
//! Files are taken as given; directories are walked recursively for
//! supported extensions (`.pdf`, `.txt`). Anything else is skipped with a
//! warning.

use std::path::PathBuf;

use anyhow::Result;
use walkdir::WalkDir;

use crate::models::Document;

/// Default excludes when walking a directory.
const SKIP_DIRS: &[&str] = &[".git", "target", "node_modules"];

/// Expand paths into documents, preserving argument order.
///
/// Files inside a directory are sorted by path for deterministic ordering.
/// A named file that does not exist is still returned so that extraction
/// reports it; only unsupported extensions are dropped here.
pub fn collect_documents(paths: &[PathBuf]) -> Result<Vec<Document>> {
    let mut docs = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut found = Vec::new();
            let walker = WalkDir::new(path).into_iter().filter_entry(|e| {
                !(e.file_type().is_dir()
                    && e.depth() > 0
                    && e
                        .file_name()
                        .to_str()
                        .map(|n| SKIP_DIRS.contains(&n))
                        .unwrap_or(false))
            });
            for entry in walker {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }
                if let Some(doc) = Document::from_path(entry.path()) {
                    found.push(doc);
                }
            }
            found.sort_by(|a, b| a.path.cmp(&b.path));
            tracing::debug!(dir = %path.display(), documents = found.len(), "walked directory");
            docs.extend(found);
        } else {
            match Document::from_path(path.clone()) {
                Some(doc) => docs.push(doc),
                None => tracing::warn!(
                    file = %path.display(),
                    "skipping unsupported file (expected .pdf or .txt)"
                ),
            }
        }
    }

    Ok(docs)
}
