//! Inclusion policy: decides which discovered paths belong in a digest.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::gather::FileEntry;
use globset::{Glob, GlobSet, GlobSetBuilder};
use log;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, Deserialize)]
pub struct BuiltinPolicy {
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub important_files: Vec<String>,
    #[serde(default)]
    pub skip_dirs: Vec<String>,
}

impl BuiltinPolicy {
    pub fn parse(yaml: &str) -> Result<Self> {
        Ok(serde_yml::from_str(yaml)?)
    }
}

static BUILTIN_POLICY: Lazy<BuiltinPolicy> = Lazy::new(|| {
    let yaml_content = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../data/default_policy.yaml"
    ));
    BuiltinPolicy::parse(yaml_content).expect("Failed to parse embedded data/default_policy.yaml")
});

pub fn get_builtin_policy() -> &'static BuiltinPolicy {
    &BUILTIN_POLICY
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InclusionReason {
    ImportantFile,
    Extension,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Exclusion {
    OutputDocument,
    SkippedDirectory { name: String },
    ExcludePattern,
    Directory,
    TooLarge { size: u64, limit: u64 },
    Unreadable { message: String },
    UnsupportedType,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exclusion::OutputDocument => write!(f, "output document"),
            Exclusion::SkippedDirectory { name } => {
                write!(f, "inside skipped directory '{}'", name)
            }
            Exclusion::ExcludePattern => write!(f, "matches exclude pattern"),
            Exclusion::Directory => write!(f, "directory"),
            Exclusion::TooLarge { size, limit } => {
                write!(f, "too large ({} bytes > {} bytes)", size, limit)
            }
            Exclusion::Unreadable { message } => write!(f, "unreadable: {}", message),
            Exclusion::UnsupportedType => write!(f, "unsupported file type"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Classification {
    Included(FileEntry, InclusionReason),
    Excluded(Exclusion),
}

impl Classification {
    pub fn is_included(&self) -> bool {
        matches!(self, Classification::Included(..))
    }
}

/// Pure predicate over a path and its metadata. Rules run in a fixed order
/// and the first decisive rule wins.
#[derive(Debug)]
pub struct PathClassifier {
    extensions: HashSet<String>,
    important_files: HashSet<String>,
    skip_dirs: HashSet<String>,
    exclude_set: GlobSet,
    max_file_size: u64,
    output_path: PathBuf,
    canonical_output: Option<PathBuf>,
}

impl PathClassifier {
    pub fn from_config(config: &Config, output_path: &Path) -> Result<Self> {
        let mut extensions = HashSet::new();
        let mut important_files = HashSet::new();
        let mut skip_dirs = HashSet::new();

        if config.filters.builtin_policy {
            let builtin = get_builtin_policy();
            extensions.extend(builtin.extensions.iter().map(|e| normalize_extension(e)));
            important_files.extend(builtin.important_files.iter().cloned());
            skip_dirs.extend(builtin.skip_dirs.iter().cloned());
        } else {
            log::debug!("Built-in policy disabled, using configured lists only.");
        }
        extensions.extend(config.filters.extensions.iter().map(|e| normalize_extension(e)));
        important_files.extend(config.filters.important_files.iter().cloned());
        skip_dirs.extend(config.filters.skip_dirs.iter().cloned());

        log::trace!(
            "Classifier lists: {} extensions, {} important files, {} skip dirs",
            extensions.len(),
            important_files.len(),
            skip_dirs.len()
        );

        Ok(Self {
            extensions,
            important_files,
            skip_dirs,
            exclude_set: build_glob_set_from_vec(&config.filters.exclude)?,
            max_file_size: config.get_max_file_size()?,
            output_path: output_path.to_path_buf(),
            canonical_output: fs::canonicalize(output_path).ok(),
        })
    }

    pub fn skip_dirs(&self) -> &HashSet<String> {
        &self.skip_dirs
    }

    /// Classifies `path`, whose `/`-separated form relative to the project
    /// root is `relative_path`. Metadata failures exclude the path.
    pub fn classify(&self, path: &Path, relative_path: &str) -> Classification {
        if self.is_output_document(path) {
            return Classification::Excluded(Exclusion::OutputDocument);
        }

        if let Some(segment) = relative_path.split('/').find(|s| self.skip_dirs.contains(*s)) {
            return Classification::Excluded(Exclusion::SkippedDirectory {
                name: segment.to_string(),
            });
        }

        if self.exclude_set.is_match(relative_path) {
            return Classification::Excluded(Exclusion::ExcludePattern);
        }

        let entry = match FileEntry::stat(path, relative_path) {
            Ok(entry) => entry,
            Err(e) => {
                log::debug!("Could not stat {}: {}", path.display(), e);
                return Classification::Excluded(Exclusion::Unreadable {
                    message: e.to_string(),
                });
            }
        };

        if entry.is_dir {
            return Classification::Excluded(Exclusion::Directory);
        }

        let important = self.important_files.contains(&entry.file_name);
        if entry.size > self.max_file_size && !important {
            return Classification::Excluded(Exclusion::TooLarge {
                size: entry.size,
                limit: self.max_file_size,
            });
        }

        if important {
            return Classification::Included(entry, InclusionReason::ImportantFile);
        }

        let known_extension = entry
            .extension
            .as_deref()
            .is_some_and(|ext| self.extensions.contains(&ext.to_lowercase()));
        if known_extension {
            return Classification::Included(entry, InclusionReason::Extension);
        }

        Classification::Excluded(Exclusion::UnsupportedType)
    }

    fn is_output_document(&self, path: &Path) -> bool {
        if path == self.output_path {
            return true;
        }
        match &self.canonical_output {
            Some(canonical) => fs::canonicalize(path).is_ok_and(|p| &p == canonical),
            None => false,
        }
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

fn build_glob_set_from_vec(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern_str in patterns {
        let mut processed_pattern = pattern_str.trim().to_string();
        if processed_pattern.ends_with('/') && processed_pattern.len() > 1 {
            processed_pattern.push_str("**");
        }
        match Glob::new(&processed_pattern) {
            Ok(glob) => {
                log::trace!(
                    "Adding glob pattern: {} (processed as {})",
                    pattern_str,
                    processed_pattern
                );
                builder.add(glob);
            }
            Err(e) => {
                log::error!("Invalid glob pattern \"{}\": {}", pattern_str, e);
                return Err(AppError::Glob(format!(
                    "Invalid glob pattern \"{}\" (processed as \"{}\"): {}",
                    pattern_str, processed_pattern, e
                )));
            }
        }
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(root: &Path, rel: &str, content: &[u8]) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn classifier(root: &Path, config: &Config) -> PathClassifier {
        PathClassifier::from_config(config, &root.join("codebase.md")).unwrap()
    }

    #[test]
    fn embedded_policy_parses() {
        let policy = get_builtin_policy();
        assert!(policy.extensions.iter().any(|e| e == "js"));
        assert!(policy.important_files.iter().any(|f| f == "Cargo.toml"));
        assert!(policy.skip_dirs.iter().any(|d| d == "node_modules"));
    }

    #[test]
    fn accepts_known_extensions_case_insensitively() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(tmp.path(), "app/Main.JS", b"x");
        let c = classifier(tmp.path(), &Config::default());
        assert!(matches!(
            c.classify(&path, "app/Main.JS"),
            Classification::Included(_, InclusionReason::Extension)
        ));
    }

    #[test]
    fn rejects_unknown_extensions_and_directories() {
        let tmp = TempDir::new().unwrap();
        let binary = write_file(tmp.path(), "app/logo.png", b"\x89PNG");
        let c = classifier(tmp.path(), &Config::default());
        assert!(matches!(
            c.classify(&binary, "app/logo.png"),
            Classification::Excluded(Exclusion::UnsupportedType)
        ));
        assert!(matches!(
            c.classify(&tmp.path().join("app"), "app"),
            Classification::Excluded(Exclusion::Directory)
        ));
    }

    #[test]
    fn skip_listed_segment_excludes_whole_subtree() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(tmp.path(), "app/node_modules/lib/index.js", b"x");
        let c = classifier(tmp.path(), &Config::default());
        match c.classify(&path, "app/node_modules/lib/index.js") {
            Classification::Excluded(Exclusion::SkippedDirectory { name }) => {
                assert_eq!(name, "node_modules")
            }
            other => panic!("unexpected verdict: {:?}", other),
        }
    }

    #[test]
    fn important_files_bypass_size_ceiling() {
        let tmp = TempDir::new().unwrap();
        let big = vec![b'a'; 200 * 1024];
        let manifest = write_file(tmp.path(), "app/package.json", &big);
        let script = write_file(tmp.path(), "app/bundle.js", &big);
        let c = classifier(tmp.path(), &Config::default());
        assert!(matches!(
            c.classify(&manifest, "app/package.json"),
            Classification::Included(_, InclusionReason::ImportantFile)
        ));
        assert!(matches!(
            c.classify(&script, "app/bundle.js"),
            Classification::Excluded(Exclusion::TooLarge { .. })
        ));
    }

    #[test]
    fn file_exactly_at_ceiling_is_kept() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(tmp.path(), "app/data.json", &vec![b' '; 100 * 1024]);
        let c = classifier(tmp.path(), &Config::default());
        assert!(c.classify(&path, "app/data.json").is_included());
    }

    #[test]
    fn important_file_without_extension_is_included() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(tmp.path(), "app/Dockerfile", b"FROM scratch\n");
        let c = classifier(tmp.path(), &Config::default());
        assert!(matches!(
            c.classify(&path, "app/Dockerfile"),
            Classification::Included(_, InclusionReason::ImportantFile)
        ));
    }

    #[test]
    fn output_document_is_never_included() {
        let tmp = TempDir::new().unwrap();
        let output = write_file(tmp.path(), "app/codebase.md", b"old digest");
        let c = PathClassifier::from_config(&Config::default(), &output).unwrap();
        assert!(matches!(
            c.classify(&output, "app/codebase.md"),
            Classification::Excluded(Exclusion::OutputDocument)
        ));
    }

    #[test]
    fn vanished_path_is_excluded_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let c = classifier(tmp.path(), &Config::default());
        assert!(matches!(
            c.classify(&tmp.path().join("app/gone.js"), "app/gone.js"),
            Classification::Excluded(Exclusion::Unreadable { .. })
        ));
    }

    #[test]
    fn configured_lists_and_patterns_extend_policy() {
        let tmp = TempDir::new().unwrap();
        let rust = write_file(tmp.path(), "app/src/lib.rs", b"fn main() {}\n");
        let generated = write_file(tmp.path(), "app/generated/schema.sql", b"select 1;\n");
        let fixture = write_file(tmp.path(), "app/fixtures/a.json", b"{}");

        let mut config = Config::default();
        config.filters.extensions.push(".RS".to_string());
        config.filters.skip_dirs.push("fixtures".to_string());
        config.filters.exclude.push("app/generated/".to_string());
        let c = classifier(tmp.path(), &config);

        assert!(c.classify(&rust, "app/src/lib.rs").is_included());
        assert!(matches!(
            c.classify(&generated, "app/generated/schema.sql"),
            Classification::Excluded(Exclusion::ExcludePattern)
        ));
        assert!(matches!(
            c.classify(&fixture, "app/fixtures/a.json"),
            Classification::Excluded(Exclusion::SkippedDirectory { .. })
        ));
    }

    #[test]
    fn builtin_policy_can_be_disabled() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(tmp.path(), "app/index.js", b"x");
        let mut config = Config::default();
        config.filters.builtin_policy = false;
        let c = classifier(tmp.path(), &config);
        assert!(matches!(
            c.classify(&path, "app/index.js"),
            Classification::Excluded(Exclusion::UnsupportedType)
        ));
    }

    #[test]
    fn invalid_exclude_pattern_is_an_error() {
        let mut config = Config::default();
        config.filters.exclude.push("app/[".to_string());
        let err = PathClassifier::from_config(&config, Path::new("codebase.md")).unwrap_err();
        assert!(matches!(err, AppError::Glob(_)));
    }
}
