use crate::config::Config;
use crate::error::{AppError, Result};
use crate::policy::{Classification, Exclusion, InclusionReason, PathClassifier};
use crate::tree::compare_paths;
use ignore::WalkBuilder;
use log;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// A discovered filesystem path together with the metadata the policy needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub path: PathBuf,
    /// Path relative to the project root, `/`-separated.
    pub relative_path: String,
    pub size: u64,
    pub is_dir: bool,
    pub extension: Option<String>,
    pub file_name: String,
}

impl FileEntry {
    /// Reads metadata for `path`, following symbolic links.
    pub fn stat(path: &Path, relative_path: &str) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            relative_path: relative_path.to_string(),
            size: metadata.len(),
            is_dir: metadata.is_dir(),
            extension: path
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned()),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExcludedPath {
    pub relative_path: String,
    pub exclusion: Exclusion,
}

#[derive(Debug, Clone, Serialize)]
pub struct IncludedPath {
    pub relative_path: String,
    pub reason: InclusionReason,
}

#[derive(Debug, Default)]
pub struct GatheredFiles {
    /// Accepted files in component-wise lexicographic order.
    pub included: Vec<FileEntry>,
    pub included_reasons: Vec<IncludedPath>,
    pub excluded: Vec<ExcludedPath>,
}

/// Renders `path` relative to `project_root` with `/` separators.
pub fn relative_slash_path(path: &Path, project_root: &Path) -> Option<String> {
    let relative = pathdiff::diff_paths(path, project_root)?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}

/// Fails unless the configured scan directory lies under the project root,
/// exists, and is a directory.
pub fn ensure_scan_root(project_root: &Path, config: &Config) -> Result<PathBuf> {
    let scan_root = config.scan_root(project_root);
    let inside_root = pathdiff::diff_paths(&scan_root, project_root).is_some_and(|relative| {
        relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    });
    if !inside_root {
        return Err(AppError::Config(format!(
            "Scan directory '{}' is not inside the project root '{}'",
            scan_root.display(),
            project_root.display()
        )));
    }
    match fs::metadata(&scan_root) {
        Ok(metadata) if metadata.is_dir() => Ok(scan_root),
        _ => Err(AppError::ScanRootMissing { path: scan_root }),
    }
}

/// Walks the scan root and returns every path below it, unsorted.
pub fn collect_candidates(
    scan_root: &Path,
    config: &Config,
    classifier: &PathClassifier,
) -> Vec<PathBuf> {
    let mut builder = WalkBuilder::new(scan_root);
    builder.standard_filters(false);
    builder.follow_links(config.scan.follow_links);
    builder.hidden(!config.scan.include_hidden);

    let use_gitignore = config.scan.use_gitignore;
    builder.ignore(use_gitignore);
    builder.git_ignore(use_gitignore);
    builder.git_exclude(use_gitignore);
    builder.require_git(false);
    log::debug!(
        "WalkBuilder configured (follow links: {}, hidden: {}, gitignore: {})",
        config.scan.follow_links,
        config.scan.include_hidden,
        use_gitignore
    );

    // Pruning only saves work: the classifier rejects these subtrees anyway.
    let skip_dirs = classifier.skip_dirs().clone();
    builder.filter_entry(move |entry| {
        if entry.depth() == 0 {
            return true;
        }
        let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
        !(is_dir && skip_dirs.contains(entry.file_name().to_string_lossy().as_ref()))
    });

    let mut candidates = Vec::new();
    log::info!("Walking scan directory: {}", scan_root.display());
    for entry_result in builder.build() {
        match entry_result {
            Ok(entry) => {
                if entry.depth() == 0 {
                    continue;
                }
                candidates.push(entry.into_path());
            }
            Err(e) => {
                log::warn!("Error walking directory: {}", e);
            }
        }
    }
    log::info!(
        "Directory walk complete. Found {} potential paths.",
        candidates.len()
    );
    candidates
}

/// Enumerates `scan_root` (as returned by [`ensure_scan_root`]) and
/// classifies every candidate.
pub fn gather_files(
    project_root: &Path,
    scan_root: &Path,
    config: &Config,
    classifier: &PathClassifier,
) -> GatheredFiles {
    let candidates = collect_candidates(scan_root, config, classifier);

    let mut gathered = GatheredFiles::default();
    for path in candidates {
        let Some(relative_path) = relative_slash_path(&path, project_root) else {
            log::warn!("Could not get relative path for: {}", path.display());
            continue;
        };
        match classifier.classify(&path, &relative_path) {
            Classification::Included(entry, reason) => {
                log::trace!("Including {} ({:?})", relative_path, reason);
                gathered.included_reasons.push(IncludedPath {
                    relative_path,
                    reason,
                });
                gathered.included.push(entry);
            }
            Classification::Excluded(exclusion) => {
                log::trace!("Excluding {}: {}", relative_path, exclusion);
                gathered.excluded.push(ExcludedPath {
                    relative_path,
                    exclusion,
                });
            }
        }
    }

    gathered
        .included
        .sort_by(|a, b| compare_paths(&a.relative_path, &b.relative_path));
    gathered
        .included_reasons
        .sort_by(|a, b| compare_paths(&a.relative_path, &b.relative_path));
    gathered
        .excluded
        .sort_by(|a, b| compare_paths(&a.relative_path, &b.relative_path));
    log::debug!(
        "Classification complete: {} included, {} excluded.",
        gathered.included.len(),
        gathered.excluded.len()
    );
    gathered
}
