use anyhow::{Context, Result};
use clap::Parser;
use mixsize::document::{Position, TextBuffer};
use mixsize::pipeline::{self, InsertRequest};
use mixsize::resolver::{DeclinePicker, Disambiguator, FsResolver};
use mixsize::scale::Mode;
use mixsize::{config, diff};
use std::fs;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod cli;
mod ui;

/// Environment variable holding the log filter; `RUST_LOG` is read as well.
const LOG_ENV: &str = "MIXSIZE_LOG";

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = cli::Cli::parse();
    init_tracing(cli.verbose);

    let (mode, args) = cli.command.into_parts();
    run(mode, &args)
}

fn run(mode: Mode, args: &cli::InsertArgs) -> Result<ExitCode> {
    let root = match &args.root {
        Some(root) => root.clone(),
        None => std::env::current_dir()?,
    };
    // Read fresh on every run so configuration edits apply immediately.
    let config = config::load(&root, args.config.as_deref())?;
    let registry = config.rules();
    debug!(rules = ?registry.candidate_names(), root = %root.display(), "loaded rules");

    let mut buffer = TextBuffer::open(&args.file)?;
    let cursor = Position::new(
        args.line.checked_sub(1).context("--line is 1-based")?,
        args.column.checked_sub(1).context("--column is 1-based")?,
    );

    let picker: Box<dyn Disambiguator> = if args.json {
        Box::new(DeclinePicker)
    } else {
        Box::new(ui::pick_from_terminal)
    };
    let mut resolver = FsResolver::new(&root, &config, picker);

    let request = InsertRequest {
        cursor,
        mode,
        overwrite: args.overwrite(config.overwrite_existing),
        extra_names: args.mixins.clone(),
    };

    let edit = match pipeline::plan_insert(&buffer, &request, &registry, &mut resolver) {
        Ok(edit) => edit,
        Err(e) if e.is_informational() => {
            if args.json {
                eprintln!("{e}");
            } else {
                println!("{e}");
            }
            return Ok(ExitCode::SUCCESS);
        }
        Err(e) => {
            ui::print_error(&e.to_string());
            return Ok(ExitCode::FAILURE);
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&edit)?);
        return Ok(ExitCode::SUCCESS);
    }

    let before = buffer.text().to_string();
    pipeline::apply(&mut buffer, &edit)?;
    println!("{}", diff::render_diff(&before, buffer.text()));

    if !args.dry_run {
        fs::write(&args.file, buffer.text())
            .with_context(|| format!("Failed to write '{}'", args.file.display()))?;
    }

    Ok(ExitCode::SUCCESS)
}
