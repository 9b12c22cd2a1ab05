use crate::cli_args::GenerateArgs;
use crate::load_config_for_command;
use crate::output;
use anyhow::{Context, Result};
use chrono::Local;
use colored::Colorize;
use docify_core::{self as core, Config, DigestReport};
use log;
use std::fs;
use tiktoken_rs::cl100k_base;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn handle_generate_command(args: GenerateArgs, quiet: bool) -> Result<()> {
    log::info!("Starting digest at {}", Local::now().format(TIMESTAMP_FORMAT));

    let project_root = Config::determine_project_root(args.project_config.project_root.as_ref())
        .context("Failed to determine project root")?;
    log::debug!("Project root determined: {}", project_root.display());

    let config = load_config_for_command(&project_root, &args.project_config, &args.overrides)
        .context("Failed to load configuration")?;

    let report = core::run_digest(&project_root, &config)
        .context("Failed to generate codebase digest")?;
    log::info!(
        "File processing completed at {}",
        Local::now().format(TIMESTAMP_FORMAT)
    );

    if output::wants_structured(&args.format_output) {
        return output::print_structured(&report);
    }
    if !quiet {
        let tokens = estimate_tokens(&report);
        output::print_report_table(&report, tokens);
        println!(
            "{} Codebase digest saved to: {}",
            "✅".green(),
            report.output_path.display().to_string().blue()
        );
    }
    Ok(())
}

fn estimate_tokens(report: &DigestReport) -> Option<usize> {
    let content = match fs::read_to_string(&report.output_path) {
        Ok(content) => content,
        Err(e) => {
            log::warn!(
                "Could not read {} for a token estimate: {}",
                report.output_path.display(),
                e
            );
            return None;
        }
    };
    match cl100k_base() {
        Ok(bpe) => Some(bpe.encode_ordinary(&content).len()),
        Err(e) => {
            log::warn!("Token estimate unavailable: {}", e);
            None
        }
    }
}
