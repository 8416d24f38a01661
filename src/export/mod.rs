// src/export/mod.rs
//! Writes one document per node plus an index.

mod html;
mod markdown;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::registry::Snapshot;

pub use html::markdown_to_html;
pub use markdown::{index_page, node_page, TODO_DESC};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DocFormat {
    #[default]
    Markdown,
    Html,
}

impl DocFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            DocFormat::Markdown => "md",
            DocFormat::Html => "html",
        }
    }

    /// File name of the page linking every node.
    pub fn index_file_name(&self) -> &'static str {
        match self {
            DocFormat::Markdown => "README.md",
            DocFormat::Html => "index.html",
        }
    }

    /// Index file name without its extension; no node page may use it.
    fn index_stem(&self) -> &'static str {
        match self {
            DocFormat::Markdown => "README",
            DocFormat::Html => "index",
        }
    }

    fn render(&self, lines: Vec<String>) -> String {
        let lines = match self {
            DocFormat::Markdown => lines,
            DocFormat::Html => markdown_to_html(&lines),
        };
        let mut text = lines.join("\n");
        text.push('\n');
        text
    }
}

#[derive(Debug)]
pub enum ExportError {
    MissingDirectory(PathBuf),
    Write { path: PathBuf, source: std::io::Error },
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::MissingDirectory(dir) => {
                write!(f, "output directory does not exist: {}", dir.display())
            }
            ExportError::Write { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::MissingDirectory(_) => None,
            ExportError::Write { source, .. } => Some(source),
        }
    }
}

/// Path of the page with file stem `stem` inside `output_dir`.
pub fn node_path(output_dir: &Path, stem: &str, format: DocFormat) -> PathBuf {
    output_dir.join(format!("{}.{}", stem, format.extension()))
}

/// File stem of every node page, unique within the snapshot.
///
/// Distinct names can clean to the same stem (`/a/b` and `/a_b`). The first
/// node in name order keeps it and later ones get `_2`, `_3`, ... The index
/// page's stem is never handed out.
pub fn page_stems(snapshot: &Snapshot, format: DocFormat) -> BTreeMap<String, String> {
    let mut taken: BTreeSet<String> = BTreeSet::new();
    taken.insert(format.index_stem().to_string());

    let mut stems = BTreeMap::new();
    for node in snapshot.values() {
        let base = node.clean_name();
        let mut stem = base.clone();
        let mut n = 2;
        while taken.contains(&stem) {
            stem = format!("{}_{}", base, n);
            n += 1;
        }
        if stem != base {
            warn!(node = %node.name, file = %stem, "page name already taken, using a suffix");
        }
        taken.insert(stem.clone());
        stems.insert(node.name.clone(), stem);
    }
    stems
}

/// Write every node in `snapshot` and an index to `output_dir`.
///
/// Returns the paths written, index last. An empty snapshot writes nothing.
/// Files written before a failure are left in place.
pub fn write_docs(
    snapshot: &Snapshot,
    output_dir: &Path,
    format: DocFormat,
) -> Result<Vec<PathBuf>, ExportError> {
    if !output_dir.is_dir() {
        return Err(ExportError::MissingDirectory(output_dir.to_path_buf()));
    }

    if snapshot.is_empty() {
        warn!("no nodes to document");
        return Ok(Vec::new());
    }

    let stems = page_stems(snapshot, format);
    let mut written = Vec::with_capacity(snapshot.len() + 1);
    for node in snapshot.values() {
        let stem = stems
            .get(&node.name)
            .cloned()
            .unwrap_or_else(|| node.clean_name());
        let path = node_path(output_dir, &stem, format);
        info!(node = %node.name, path = %path.display(), "documenting node");
        write_file(&path, format.render(node_page(node)))?;
        written.push(path);
    }

    let index = output_dir.join(format.index_file_name());
    info!(path = %index.display(), nodes = snapshot.len(), "writing index");
    write_file(&index, format.render(index_page(snapshot, &stems, format.extension())))?;
    written.push(index);

    Ok(written)
}

fn write_file(path: &Path, contents: String) -> Result<(), ExportError> {
    std::fs::write(path, contents).map_err(|source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    })
}
