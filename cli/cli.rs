mod cli_args;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use log;
use std::path::Path;
use std::process;

use cli_args::{Cli, Commands, OverrideGroup, ProjectConfigOpts};
use docify_core::{AppError, Config, LineCountMode};

fn main() {
    let cli_args = Cli::parse();

    setup_logging(cli_args.quiet, cli_args.verbose);

    let quiet = cli_args.quiet;

    log::debug!("CLI args parsed: {:?}", cli_args);

    let exit_code = match run_app(cli_args, quiet) {
        Ok(_) => {
            log::debug!("Application finished successfully.");
            0
        }
        Err(e) => {
            let exit_code = exit_code_for(&e);
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            exit_code
        }
    };
    log::debug!("Exiting with code {}", exit_code);
    process::exit(exit_code);
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<AppError>() {
        Some(AppError::Config(_)) => 1,
        Some(AppError::TomlParse(_)) => 1,
        Some(AppError::TomlSerialize(_)) => 1,
        Some(AppError::Io(_)) => 2,
        Some(AppError::FileRead { .. }) => 2,
        Some(AppError::FileWrite { .. }) => 2,
        Some(AppError::FileRemove { .. }) => 2,
        Some(AppError::ScanRootMissing { .. }) => 3,
        Some(AppError::Glob(_)) => 5,
        Some(AppError::InvalidArgument(_)) => 5,
        Some(AppError::DurationParse(_)) => 5,
        Some(AppError::DataLoading(_)) => 1,
        Some(AppError::Deploy(_)) => 7,
        Some(_) => 1,
        None => 1,
    }
}

fn setup_logging(quiet: bool, verbose: u8) {
    let log_level = if quiet {
        log::LevelFilter::Off
    } else {
        match verbose {
            0 => log::LevelFilter::Info,  // Default: progress narration
            1 => log::LevelFilter::Debug, // -v
            _ => log::LevelFilter::Trace, // -vv+
        }
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .format_target(false)
        .init();
    log::trace!("Logger initialized with level: {:?}", log_level);
}

fn run_app(cli: Cli, quiet: bool) -> Result<()> {
    match cli.command {
        None => {
            log::debug!("No command given, running 'generate'...");
            commands::generate::handle_generate_command(cli.generate, quiet)?;
        }
        Some(Commands::Generate(args)) => {
            log::debug!("Executing 'generate' command...");
            commands::generate::handle_generate_command(args, quiet)?;
        }
        Some(Commands::Debug(args)) => {
            log::debug!("Executing 'debug' command...");
            commands::debug::handle_debug_command(args)?;
        }
        Some(Commands::Config(args)) => {
            log::debug!("Executing 'config' command...");
            commands::config::handle_config_command(&args, quiet)?;
        }
    }
    Ok(())
}

fn apply_cli_overrides(mut config: Config, overrides: &OverrideGroup) -> Result<Config> {
    log::trace!("Applying CLI overrides to config...");

    if let Some(dir) = &overrides.scan_dir {
        config.scan.dir = dir.clone();
    }
    if overrides.include_hidden {
        config.scan.include_hidden = true;
    }
    if overrides.gitignore {
        config.scan.use_gitignore = true;
    }
    if let Some(output) = &overrides.output {
        config.output.file = output.clone();
    }
    if let Some(max_lines) = overrides.max_lines {
        config.budget.max_lines = max_lines;
    }
    if let Some(mode) = &overrides.line_count {
        config.budget.line_count = mode.parse::<LineCountMode>()?;
    }
    if let Some(size) = &overrides.max_file_size {
        config.filters.max_file_size = size.clone();
    }
    if overrides.no_builtin_policy {
        config.filters.builtin_policy = false;
    }
    if !overrides.exclude.is_empty() {
        config.filters.exclude.extend(overrides.exclude.iter().cloned());
    }

    log::trace!("Config after CLI overrides: {:?}", config);
    Ok(config)
}

pub fn load_config_for_command(
    project_root: &Path,
    project_opts: &ProjectConfigOpts,
    overrides: &OverrideGroup,
) -> Result<Config> {
    let config_path = Config::resolve_config_path(
        project_root,
        project_opts.config_file.as_ref(),
        project_opts.no_config_file,
    )
    .context("Failed to resolve configuration path")?;

    let config = match &config_path {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    apply_cli_overrides(config, overrides)
}
