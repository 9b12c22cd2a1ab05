//! Digest assembly: enumerate, classify, draw the tree, then embed files in
//! sorted order under a global line budget.

use crate::config::{Config, LineCountMode};
use crate::error::{AppError, Result};
use crate::gather::{self, FileEntry};
use crate::policy::PathClassifier;
use crate::tree::{self, FileTree};
use log;
use quick_xml::escape::partial_escape;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Escapes `&`, `<` and `>` for embedding in the digest markup.
pub fn escape_markup(raw: &str) -> String {
    partial_escape(raw).into_owned()
}

/// Running line counter. `consumed` never exceeds `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestBudget {
    consumed: usize,
    max: usize,
}

impl DigestBudget {
    pub fn new(max: usize) -> Self {
        Self { consumed: 0, max }
    }

    /// Consumes `lines` if they fit; a refusal is final for that file.
    pub fn try_consume(&mut self, lines: usize) -> bool {
        match self.consumed.checked_add(lines) {
            Some(total) if total <= self.max => {
                self.consumed = total;
                true
            }
            _ => false,
        }
    }

    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Escaped relative path.
    pub src: String,
    /// Escaped file content.
    pub content: String,
}

impl FileRecord {
    pub fn new(relative_path: &str, raw_content: &str) -> Self {
        Self {
            src: escape_markup(relative_path),
            content: escape_markup(raw_content),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestDocument {
    rendered_tree: String,
    directories: usize,
    files: usize,
    records: Vec<FileRecord>,
}

impl DigestDocument {
    pub fn new(tree: &FileTree) -> Self {
        Self {
            rendered_tree: tree.root.render(),
            directories: tree.directories,
            files: tree.files,
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: FileRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }
}

impl fmt::Display for DigestDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<codebase>\n")?;
        f.write_str("<project_structure>\n")?;
        f.write_str(&self.rendered_tree)?;
        write!(
            f,
            "\n{} directories, {} files\n",
            self.directories, self.files
        )?;
        f.write_str("</project_structure>\n\n")?;
        for record in &self.records {
            write!(
                f,
                "<file src=\"{}\">\n{}\n</file>\n\n",
                record.src, record.content
            )?;
        }
        f.write_str("</codebase>\n")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddedFile {
    pub path: String,
    pub lines: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: String,
    pub lines: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestReport {
    pub project_root: PathBuf,
    pub scan_root: PathBuf,
    pub output_path: PathBuf,
    pub directories: usize,
    pub files: usize,
    pub embedded: Vec<EmbeddedFile>,
    pub skipped_over_budget: Vec<SkippedFile>,
    pub skipped_unreadable: Vec<FailedFile>,
    pub lines_consumed: usize,
    pub max_lines: usize,
    pub output_bytes: u64,
}

fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| AppError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    // Invalid sequences become U+FFFD; the file is still embedded.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn remove_previous_output(output_path: &Path) -> Result<()> {
    match fs::remove_file(output_path) {
        Ok(()) => {
            log::info!("Removed existing {}", output_path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AppError::FileRemove {
            path: output_path.to_path_buf(),
            source: e,
        }),
    }
}

fn write_output(output_path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent).map_err(|e| AppError::FileWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    fs::write(output_path, content).map_err(|e| AppError::FileWrite {
        path: output_path.to_path_buf(),
        source: e,
    })
}

/// Streams `files` into `document` in the given order. Files that do not fit
/// the remaining budget are skipped for good; unreadable files are skipped.
pub fn embed_files(
    files: &[FileEntry],
    budget: &mut DigestBudget,
    line_count: LineCountMode,
    document: &mut DigestDocument,
    report: &mut DigestReport,
) {
    for entry in files {
        let content = match read_text(&entry.path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Skipping {}: {}", entry.relative_path, e);
                report.skipped_unreadable.push(FailedFile {
                    path: entry.relative_path.clone(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        let lines = line_count.count(&content);
        if !budget.try_consume(lines) {
            log::info!(
                "Skipping {} (would exceed {} line limit)",
                entry.relative_path,
                budget.max()
            );
            report.skipped_over_budget.push(SkippedFile {
                path: entry.relative_path.clone(),
                lines,
            });
            continue;
        }

        log::info!("Adding {} ({} lines)", entry.relative_path, lines);
        document.push(FileRecord::new(&entry.relative_path, &content));
        report.embedded.push(EmbeddedFile {
            path: entry.relative_path.clone(),
            lines,
        });
    }
}

/// Performs one digest run for `project_root` and writes the document.
///
/// Fails only when the scan directory is missing (or on configuration and
/// output-write errors); per-file problems shrink the document instead.
pub fn run_digest(project_root: &Path, config: &Config) -> Result<DigestReport> {
    let scan_root = gather::ensure_scan_root(project_root, config)?;
    let output_path = config.output_path(project_root);
    let classifier = PathClassifier::from_config(config, &output_path)?;

    let gathered = gather::gather_files(project_root, &scan_root, config, &classifier);
    log::info!("Generating tree structure for {}...", scan_root.display());
    let relative_paths: Vec<&str> = gathered
        .included
        .iter()
        .map(|entry| entry.relative_path.as_str())
        .collect();
    let file_tree = tree::build_file_tree(project_root, &relative_paths);

    remove_previous_output(&output_path)?;

    let mut report = DigestReport {
        project_root: project_root.to_path_buf(),
        scan_root,
        output_path: output_path.clone(),
        directories: file_tree.directories,
        files: file_tree.files,
        embedded: Vec::new(),
        skipped_over_budget: Vec::new(),
        skipped_unreadable: Vec::new(),
        lines_consumed: 0,
        max_lines: config.budget.max_lines,
        output_bytes: 0,
    };

    log::info!("Processing files...");
    let mut budget = DigestBudget::new(config.budget.max_lines);
    let mut document = DigestDocument::new(&file_tree);
    embed_files(
        &gathered.included,
        &mut budget,
        config.budget.line_count,
        &mut document,
        &mut report,
    );
    report.lines_consumed = budget.consumed();
    log::info!(
        "Total lines processed: {}/{}",
        budget.consumed(),
        budget.max()
    );

    let text = document.to_string();
    write_output(&output_path, &text)?;
    report.output_bytes = text.len() as u64;
    log::info!("Codebase digest saved to {}", output_path.display());
    Ok(report)
}
