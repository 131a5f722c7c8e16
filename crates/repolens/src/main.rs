// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! repolens: analyze a repository and print a Markdown digest
//!
//! Logs go to stderr; the digest (or JSON) goes to stdout or `--output`.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use repolens::config::{AnalyzeArgs, Command, Config, OutputFormat, ScanArgs};
use repolens::context::render_structure;
use repolens::pipeline::Analyzer;
use repolens_git::WorkingCopyManager;
use tracing::{debug, info};

fn main() -> Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(config.log_level().into()),
        )
        .init();

    config.validate()?;
    debug!(?config, "parsed configuration");

    match &config.command {
        Some(Command::Analyze(args)) => run_analyze(&config, args),
        Some(Command::Scan(args)) => run_scan(args),
        None => {
            Config::command().print_help()?;
            Ok(())
        }
    }
}

fn run_analyze(config: &Config, args: &AnalyzeArgs) -> Result<()> {
    let work_dir = config.work_dir_path();
    let analyzer = Analyzer::new(config.backend.build(), WorkingCopyManager::new(&work_dir));
    info!(
        repository = %args.repository,
        work_dir = %work_dir.display(),
        backend = analyzer.backend().name(),
        "starting analysis"
    );

    let analysis = analyzer
        .analyze(&args.to_request(), &args.cancellation())
        .with_context(|| format!("failed to analyze {}", args.repository))?;

    let text = match args.format {
        OutputFormat::Markdown => analysis.context.digest_markdown,
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(&analysis)?;
            json.push('\n');
            json
        }
    };
    write_output(args.output.as_deref(), &text)
}

fn run_scan(args: &ScanArgs) -> Result<()> {
    let tree = repolens_tree::scan(&args.path, &args.scan_options())
        .with_context(|| format!("failed to scan {}", args.path.display()))?;
    let text = if args.json {
        let mut json = serde_json::to_string_pretty(&tree)?;
        json.push('\n');
        json
    } else {
        render_structure(&tree)
    };
    write_output(None, &text)
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), bytes = text.len(), "wrote output");
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}
