use crate::error::{AppError, Result};
use byte_unit::Byte;
use log;
use parse_duration::parse;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CONFIG_DIR: &str = ".docify";
pub const DEFAULT_CONFIG_FILENAME: &str = "docify.toml";
pub const DEFAULT_SCAN_DIR: &str = "app";
pub const DEFAULT_OUTPUT_FILE: &str = "codebase.md";
pub const DEFAULT_MAX_LINES: usize = 2000;
pub const DEFAULT_MAX_FILE_SIZE: &str = "100 KiB";
pub const DEFAULT_DEPLOY_ATTEMPTS: u32 = 2;
pub const DEFAULT_RETRY_DELAY: &str = "2s";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub filters: FiltersConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub deploy: DeployConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    #[serde(default)]
    pub project_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    #[serde(default = "default_scan_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_true")]
    pub follow_links: bool,
    #[serde(default = "default_false")]
    pub include_hidden: bool,
    #[serde(default = "default_false")]
    pub use_gitignore: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FiltersConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size: String,
    #[serde(default = "default_true")]
    pub builtin_policy: bool,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub important_files: Vec<String>,
    #[serde(default)]
    pub skip_dirs: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BudgetConfig {
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
    #[serde(default)]
    pub line_count: LineCountMode,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_output_file")]
    pub file: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    #[serde(default = "default_deploy_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay: String,
}

/// How a file's content is turned into a line count for the budget.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LineCountMode {
    /// Number of `\n`-delimited segments. A trailing newline adds an empty
    /// final segment, and an empty file counts as one line.
    #[default]
    Segments,
    /// Number of `\n` characters.
    Newlines,
}

impl LineCountMode {
    pub fn count(self, content: &str) -> usize {
        match self {
            LineCountMode::Segments => content.split('\n').count(),
            LineCountMode::Newlines => content.matches('\n').count(),
        }
    }
}

impl FromStr for LineCountMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "segments" => Ok(LineCountMode::Segments),
            "newlines" => Ok(LineCountMode::Newlines),
            other => Err(AppError::InvalidArgument(format!(
                "Unknown line count mode '{}'. Use 'segments' or 'newlines'.",
                other
            ))),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_scan_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SCAN_DIR)
}
fn default_max_file_size() -> String {
    DEFAULT_MAX_FILE_SIZE.to_string()
}
fn default_max_lines() -> usize {
    DEFAULT_MAX_LINES
}
fn default_output_file() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_FILE)
}
fn default_deploy_attempts() -> u32 {
    DEFAULT_DEPLOY_ATTEMPTS
}
fn default_retry_delay() -> String {
    DEFAULT_RETRY_DELAY.to_string()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            dir: default_scan_dir(),
            follow_links: default_true(),
            include_hidden: default_false(),
            use_gitignore: default_false(),
        }
    }
}
impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            builtin_policy: default_true(),
            extensions: Vec::new(),
            important_files: Vec::new(),
            skip_dirs: Vec::new(),
            exclude: Vec::new(),
        }
    }
}
impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_lines: default_max_lines(),
            line_count: LineCountMode::default(),
        }
    }
}
impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file: default_output_file(),
        }
    }
}
impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_deploy_attempts(),
            retry_delay: default_retry_delay(),
        }
    }
}

impl Config {
    /// `--project-root`, else `$PROJECT_ROOT`, else the working directory;
    /// `~` expanded and canonicalized.
    pub fn determine_project_root(cli_project_root: Option<&PathBuf>) -> Result<PathBuf> {
        let requested = cli_project_root
            .map(|p| p.to_string_lossy().into_owned())
            .or_else(|| env::var("PROJECT_ROOT").ok().filter(|s| !s.is_empty()));
        let root = match requested {
            Some(raw) => expand_tilde(&raw),
            None => env::current_dir()?,
        };
        root.canonicalize().map_err(|e| AppError::FileRead { path: root, source: e })
    }

    pub fn default_config_path(project_root: &Path) -> PathBuf {
        project_root
            .join(DEFAULT_CONFIG_DIR)
            .join(DEFAULT_CONFIG_FILENAME)
    }

    /// Locates the config file to load, if any. A bare `--config-file` name
    /// is looked up inside `.docify/` with `.toml` appended when missing; an
    /// explicitly requested file must exist.
    pub fn resolve_config_path(
        project_root: &Path,
        cli_config_file: Option<&String>,
        cli_disable_config: bool,
    ) -> Result<Option<PathBuf>> {
        if cli_disable_config {
            log::debug!("Config file loading disabled via CLI flag.");
            return Ok(None);
        }

        let Some(requested) = cli_config_file else {
            let default_path = Self::default_config_path(project_root);
            if default_path.exists() {
                log::debug!("Using default config file: {}", default_path.display());
                return Ok(Some(default_path));
            }
            log::debug!("No config file at {}", default_path.display());
            return Ok(None);
        };

        let mut path = expand_tilde(requested);
        let bare_name = !path.is_absolute() && !requested.contains(['/', '\\']);
        if bare_name {
            path = project_root.join(DEFAULT_CONFIG_DIR).join(path);
        }
        if path.extension().is_none() && !path.exists() {
            path.set_extension("toml");
        }
        if !path.exists() {
            return Err(AppError::Config(format!(
                "Config file '{}' not found (looked at {})",
                requested,
                path.display()
            )));
        }
        log::debug!("Using requested config file: {}", path.display());
        Ok(Some(path))
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        log::info!("Loading configuration from: {}", config_path.display());
        let toml_content = fs::read_to_string(config_path).map_err(|e| AppError::FileRead {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&toml_content).map_err(|e| {
            AppError::TomlParse(format!(
                "Error parsing config file '{}': {}. Check TOML syntax and structure.",
                config_path.display(),
                e
            ))
        })
    }

    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str::<Config>(content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Size ceiling in bytes, parsed from the human-readable setting.
    pub fn get_max_file_size(&self) -> Result<u64> {
        let byte_value = Byte::from_str(&self.filters.max_file_size).map_err(|e| {
            AppError::InvalidArgument(format!(
                "Invalid max file size '{}': {}. Use B, KiB, MiB, etc.",
                self.filters.max_file_size, e
            ))
        })?;
        let bytes: u128 = byte_value.into();
        u64::try_from(bytes).map_err(|_| {
            AppError::InvalidArgument(format!(
                "Max file size '{}' is too large.",
                self.filters.max_file_size
            ))
        })
    }

    /// Delay between deploy attempts, e.g. `"500ms"` or `"2s"`.
    pub fn get_retry_delay(&self) -> Result<Duration> {
        Ok(parse(&self.deploy.retry_delay)?)
    }

    pub fn scan_root(&self, project_root: &Path) -> PathBuf {
        resolve_against(project_root, &self.scan.dir)
    }

    pub fn output_path(&self, project_root: &Path) -> PathBuf {
        resolve_against(project_root, &self.output.file)
    }

    pub fn get_effective_project_name(&self, project_root: &Path) -> String {
        self.general.project_name.clone().unwrap_or_else(|| {
            project_root
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "UnknownProject".to_string())
        })
    }
}

fn expand_tilde(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

fn resolve_against(project_root: &Path, path: &Path) -> PathBuf {
    let expanded = expand_tilde(&path.to_string_lossy());
    if expanded.is_absolute() {
        expanded
    } else {
        project_root.join(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behaviour() {
        let config = Config::default();
        assert_eq!(config.scan.dir, PathBuf::from("app"));
        assert_eq!(config.output.file, PathBuf::from("codebase.md"));
        assert_eq!(config.budget.max_lines, 2000);
        assert_eq!(config.budget.line_count, LineCountMode::Segments);
        assert_eq!(config.get_max_file_size().unwrap(), 100 * 1024);
        assert!(config.scan.follow_links);
        assert!(!config.scan.include_hidden);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [scan]
            dir = "src"

            [budget]
            max_lines = 500
            line_count = "newlines"
            "#,
        )
        .unwrap();
        assert_eq!(config.scan.dir, PathBuf::from("src"));
        assert_eq!(config.budget.max_lines, 500);
        assert_eq!(config.budget.line_count, LineCountMode::Newlines);
        assert_eq!(config.output, OutputConfig::default());
        assert_eq!(config.filters, FiltersConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::from_toml_str("[scan]\ndepth = 3\n").is_err());
        assert!(Config::from_toml_str("[nonsense]\n").is_err());
    }

    #[test]
    fn default_config_survives_toml_round_trip() {
        let text = Config::default().to_toml_string().unwrap();
        assert_eq!(Config::from_toml_str(&text).unwrap(), Config::default());
    }

    #[test]
    fn line_count_modes_differ_on_trailing_newline() {
        assert_eq!(LineCountMode::Segments.count("a\nb\n"), 3);
        assert_eq!(LineCountMode::Newlines.count("a\nb\n"), 2);
        assert_eq!(LineCountMode::Segments.count(""), 1);
        assert_eq!(LineCountMode::Newlines.count(""), 0);
        assert_eq!(LineCountMode::Segments.count("no newline"), 1);
    }

    #[test]
    fn line_count_mode_parses_from_cli_text() {
        assert_eq!(
            "Newlines".parse::<LineCountMode>().unwrap(),
            LineCountMode::Newlines
        );
        assert!("lines".parse::<LineCountMode>().is_err());
    }

    #[test]
    fn invalid_size_and_delay_are_reported() {
        let mut config = Config::default();
        config.filters.max_file_size = "lots".to_string();
        config.deploy.retry_delay = "soon".to_string();
        assert!(matches!(
            config.get_max_file_size(),
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            config.get_retry_delay(),
            Err(AppError::DurationParse(_))
        ));
    }

    #[test]
    fn relative_paths_resolve_against_project_root() {
        let mut config = Config::default();
        let root = Path::new("/work/project");
        assert_eq!(config.scan_root(root), root.join("app"));
        config.output.file = PathBuf::from("/tmp/digest.md");
        assert_eq!(config.output_path(root), PathBuf::from("/tmp/digest.md"));
    }

    #[test]
    fn config_file_lookup_rules() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        assert_eq!(Config::resolve_config_path(root, None, false).unwrap(), None);

        let config_dir = root.join(DEFAULT_CONFIG_DIR);
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(config_dir.join(DEFAULT_CONFIG_FILENAME), "").unwrap();
        fs::write(config_dir.join("ci.toml"), "").unwrap();
        assert_eq!(
            Config::resolve_config_path(root, None, false).unwrap(),
            Some(Config::default_config_path(root))
        );
        assert_eq!(Config::resolve_config_path(root, None, true).unwrap(), None);

        let bare = "ci".to_string();
        assert_eq!(
            Config::resolve_config_path(root, Some(&bare), false).unwrap(),
            Some(config_dir.join("ci.toml"))
        );

        let explicit = config_dir.join("ci").to_string_lossy().into_owned();
        assert_eq!(
            Config::resolve_config_path(root, Some(&explicit), false).unwrap(),
            Some(config_dir.join("ci.toml"))
        );

        let missing = "release".to_string();
        assert!(matches!(
            Config::resolve_config_path(root, Some(&missing), false),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn project_name_falls_back_to_directory_name() {
        let mut config = Config::default();
        assert_eq!(
            config.get_effective_project_name(Path::new("/work/shop")),
            "shop"
        );
        config.general.project_name = Some("storefront".to_string());
        assert_eq!(
            config.get_effective_project_name(Path::new("/work/shop")),
            "storefront"
        );
    }
}
