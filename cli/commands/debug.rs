use crate::cli_args::DebugArgs;
use crate::load_config_for_command;
use crate::output;
use anyhow::{Context, Result};
use colored::*;
use docify_core::gather::{ExcludedPath, IncludedPath, ensure_scan_root};
use docify_core::policy::InclusionReason;
use docify_core::{self as core, Config, PathClassifier, TreeNode};
use log;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DebugInfo<'a> {
    effective_config: &'a Config,
    included: &'a [IncludedPath],
    excluded: &'a [ExcludedPath],
    tree: &'a TreeNode,
    directories: usize,
    files: usize,
}

pub fn handle_debug_command(args: DebugArgs) -> Result<()> {
    let project_root = Config::determine_project_root(args.project_config.project_root.as_ref())
        .context("Failed to determine project root")?;
    log::debug!("Project root determined: {}", project_root.display());

    let config = load_config_for_command(&project_root, &args.project_config, &args.overrides)
        .context("Failed to load configuration for debug command")?;

    let output_path = config.output_path(&project_root);
    let classifier = PathClassifier::from_config(&config, &output_path)
        .context("Failed to build path classifier")?;

    log::debug!("Debug: Gathering and classifying paths...");
    let scan_root =
        ensure_scan_root(&project_root, &config).context("Failed to locate scan directory")?;
    let gathered = core::gather_files(&project_root, &scan_root, &config, &classifier);
    let relative_paths: Vec<&str> = gathered
        .included
        .iter()
        .map(|e| e.relative_path.as_str())
        .collect();
    let file_tree = core::build_file_tree(&project_root, &relative_paths);

    let debug_data = DebugInfo {
        effective_config: &config,
        included: &gathered.included_reasons,
        excluded: &gathered.excluded,
        tree: &file_tree.root,
        directories: file_tree.directories,
        files: file_tree.files,
    };

    if output::wants_structured(&args.format_output) {
        output::print_structured(&debug_data)
    } else {
        print_debug_info_pretty(&debug_data)
    }
}

fn print_debug_info_pretty(debug_info: &DebugInfo) -> Result<()> {
    println!(
        "{}",
        "\n--- Effective Configuration ---"
            .green()
            .bold()
            .underline()
    );
    let config_toml = debug_info
        .effective_config
        .to_toml_string()
        .context("Failed to serialize effective config to TOML")?;
    println!("{}", config_toml);

    println!("{}", "\n--- Included Files ---".green().bold().underline());
    if debug_info.included.is_empty() {
        println!("{}", "(None)".dimmed());
    }
    for path in debug_info.included {
        let reason = match path.reason {
            InclusionReason::ImportantFile => "important file".magenta(),
            InclusionReason::Extension => "extension".dimmed(),
        };
        println!("+ {} ({})", path.relative_path.cyan(), reason);
    }

    println!("{}", "\n--- Excluded Paths ---".green().bold().underline());
    if debug_info.excluded.is_empty() {
        println!("{}", "(None)".dimmed());
    }
    for path in debug_info.excluded {
        println!(
            "- {} ({})",
            path.relative_path.yellow(),
            path.exclusion.to_string().dimmed()
        );
    }

    println!("{}", "\n--- Tree ---".green().bold().underline());
    print!("{}", debug_info.tree.render());
    println!(
        "\n{} directories, {} files",
        debug_info.directories, debug_info.files
    );

    println!("{}", "\n--- End Debug Info ---".green().bold());
    Ok(())
}
