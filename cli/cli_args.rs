use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct ProjectConfigOpts {
    #[arg(
        long,
        help = "Specify the project directory (default: current dir).",
        help_heading = "Project Setup",
        value_name = "PATH"
    )]
    pub project_root: Option<PathBuf>,

    #[arg(
        long,
        help = "Specify path/filename of the TOML config file (default: .docify/docify.toml).",
        value_name = "CONFIG_FILE",
        conflicts_with = "no_config_file",
        help_heading = "Project Setup"
    )]
    pub config_file: Option<String>,

    #[arg(
        long,
        help = "Disable loading any TOML config file.",
        conflicts_with = "config_file",
        help_heading = "Project Setup"
    )]
    pub no_config_file: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FormatOutputOpts {
    #[arg(short = 'f', long, help = "Print the report in a structured format instead of a table.", value_name = "FORMAT", value_parser = ["text", "json"], help_heading = "Output Formatting")]
    pub format: Option<String>,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Condense a project's source tree into a single codebase digest.",
    long_about = "docify walks the scan directory, keeps documentation-worthy files, draws the \ndirectory tree and embeds file contents into one document under a global line budget.",
    help_template = "{about-section}\nUsage: {usage}\n\n{all-args}{after-help}",
    after_help = "EXAMPLES:\n  docify\n  docify generate --scan-dir src --max-lines 5000\n  docify debug -f json\n  docify config --save",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[clap(flatten)]
    pub generate: GenerateArgs,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase message verbosity (-v, -vv).")]
    pub verbose: u8,

    #[arg(
        short,
        long,
        global = true,
        help = "Silence progress messages and warnings."
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    #[command(
        visible_alias = "g",
        about = "Generate the codebase digest (default when no command is given)."
    )]
    Generate(GenerateArgs),

    #[command(
        visible_alias = "d",
        about = "Show effective configuration and the verdict for every discovered path."
    )]
    Debug(DebugArgs),

    #[command(about = "Show or save the default configuration file.")]
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct GenerateArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub format_output: FormatOutputOpts,
    #[clap(flatten)]
    pub overrides: OverrideGroup,
}

#[derive(Args, Debug, Clone)]
pub struct DebugArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub format_output: FormatOutputOpts,
    #[clap(flatten)]
    pub overrides: OverrideGroup,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[arg(long, help = "Save the default configuration to .docify/docify.toml.")]
    pub save: bool,

    #[arg(long, requires = "save", help = "Overwrite an existing configuration file.")]
    pub force: bool,

    #[arg(
        long,
        help = "Specify the project directory (default: current dir).",
        value_name = "PATH"
    )]
    pub project_root: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OverrideGroup {
    #[arg(
        long,
        value_name = "DIR",
        help = "Directory to scan, relative to the project root [default: app].",
        help_heading = "Scan"
    )]
    pub scan_dir: Option<PathBuf>,

    #[arg(
        long,
        help = "Discover dot-files and dot-directories.",
        help_heading = "Scan"
    )]
    pub include_hidden: bool,

    #[arg(
        long,
        help = "Respect .gitignore and .ignore files while scanning.",
        help_heading = "Scan"
    )]
    pub gitignore: bool,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Output document path [default: codebase.md].",
        help_heading = "Output Control"
    )]
    pub output: Option<PathBuf>,

    #[arg(
        long,
        value_name = "LINES",
        help = "Global line budget for embedded files [default: 2000].",
        help_heading = "Budget"
    )]
    pub max_lines: Option<usize>,

    #[arg(
        long,
        value_name = "MODE",
        value_parser = ["segments", "newlines"],
        help = "How file lines are counted against the budget [default: segments].",
        help_heading = "Budget"
    )]
    pub line_count: Option<String>,

    #[arg(
        long,
        value_name = "SIZE_STRING",
        help = "Size ceiling for ordinary files (e.g. '100 KiB', '1MiB').",
        help_heading = "Content Filtering"
    )]
    pub max_file_size: Option<String>,

    #[arg(
        long,
        help = "Ignore the built-in extension, important-file and skip lists.",
        help_heading = "Content Filtering"
    )]
    pub no_builtin_policy: bool,

    #[arg(long = "exclude", value_name = "PATTERN", action = clap::ArgAction::Append, help = "Add exclude path/glob pattern (relative to the project root).", help_heading = "Content Filtering")]
    pub exclude: Vec<String>,
}
