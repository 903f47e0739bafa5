mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Args, Commands, FixArgs, Selection};
use colored::Colorize;
use dialoguer::Confirm;
use jsfix::config::Config;
use jsfix::driver::{self, BatchOptions};
use jsfix::registry;
use jsfix::report::{FileReport, FileStatus, RunReport};
use jsfix::rules::RuleKind;
use jsfix::scanner;
use similar::TextDiff;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    install_subscriber();
    let args = Args::parse();

    match args.command {
        Commands::Fix(fix) => cmd_fix(fix),
        Commands::Census { selection, json } => cmd_census(selection, json),
        Commands::Scan { selection } => cmd_scan(selection),
        Commands::Rules => cmd_rules(),
        Commands::Externals { file, depth } => cmd_externals(file, depth),
    }
}

/// Library logs go to stderr, and only when `JSFIX_LOG` or `RUST_LOG` asks
/// for them.
fn install_subscriber() {
    let filter = EnvFilter::try_from_env("JSFIX_LOG").or_else(|_| EnvFilter::try_from_default_env());
    if let Ok(filter) = filter {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
}

fn batch_options(config: &Config) -> Result<BatchOptions> {
    Ok(BatchOptions {
        roots: config.roots(),
        ignore: config.ignore_patterns()?,
        write: false,
    })
}

fn cmd_fix(args: FixArgs) -> Result<()> {
    let mut config = args.selection.resolve()?;
    if let Some(mode) = args.split_mode {
        config.split_mode = mode;
    }
    config.fix_exposed_functions |= args.fix_exposed_functions;
    config.fix_dependencies |= args.fix_dependencies;
    config.ignore_names.extend(args.ignore_names);

    let settings = config.settings()?;
    let options = BatchOptions {
        write: args.write || args.interactive,
        ..batch_options(&config)?
    };

    let interactive = args.interactive;
    let report = driver::run(args.rule, &options, &settings, |path, original, output| {
        if !interactive {
            return true;
        }
        print_diff(path, original, output);
        Confirm::new()
            .with_prompt(format!("Apply changes to {}?", path.display()))
            .default(false)
            .interact()
            .unwrap_or(false)
    })
    .with_context(|| format!("{} did not run", args.rule))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_run_report(&report, options.write, args.diff && !interactive, args.verbose);
    }

    if report.summary.files_failed > 0 {
        anyhow::bail!("{} file(s) could not be processed", report.summary.files_failed);
    }
    Ok(())
}

fn print_run_report(report: &RunReport, write: bool, diff: bool, verbose: bool) {
    for file in &report.files {
        match file.status {
            FileStatus::Failed => eprintln!(
                "{} {}",
                "error:".red().bold(),
                file.error.as_deref().unwrap_or("failed")
            ),
            FileStatus::Unchanged if !verbose || file.diagnostics.is_empty() => continue,
            status => print_file(file, status, write, diff, verbose),
        }
    }

    let summary = &report.summary;
    println!(
        "\n{} {}: {} files scanned, {} changed, {} written, {} failed, {} diagnostics",
        "info:".blue().bold(),
        report.rule,
        summary.files_scanned,
        summary.files_changed,
        summary.files_written,
        summary.files_failed,
        summary.diagnostics
    );
    if !write && summary.files_changed > 0 {
        println!("{} Use --write to apply changes", "hint:".cyan().bold());
    }
}

fn print_file(file: &FileReport, status: FileStatus, write: bool, diff: bool, verbose: bool) {
    let label = match status {
        FileStatus::Written => "Updated:".green().bold(),
        FileStatus::Changed if write => "Skipped:".yellow().bold(),
        FileStatus::Changed => "Would update:".yellow().bold(),
        FileStatus::WriteFailed => "Not written:".red().bold(),
        _ => "Checked:".normal(),
    };
    println!("\n{} {}", label, file.path.display());
    if let Some(error) = &file.error {
        eprintln!("  {} {}", "error:".red().bold(), error);
    }

    let shown = file
        .diagnostics
        .iter()
        .filter(|d| verbose || d.kind.left_unfixed());
    for diagnostic in shown {
        println!("  {} {}", "warn:".yellow().bold(), diagnostic);
    }

    if diff
        && let (Some(original), Some(output)) = (&file.original, &file.output)
    {
        print_diff(&file.path, original, output);
    }
}

fn print_diff(path: &Path, original: &str, output: &str) {
    let diff = TextDiff::from_lines(original, output)
        .unified_diff()
        .header(
            &format!("{} (original)", path.display()),
            &format!("{} (fixed)", path.display()),
        )
        .to_string();
    for line in diff.lines() {
        if line.starts_with("+++") || line.starts_with("---") {
            println!("{}", line.bold());
        } else if line.starts_with('+') {
            println!("{}", line.green());
        } else if line.starts_with('-') {
            println!("{}", line.red());
        } else if line.starts_with("@@") {
            println!("{}", line.cyan());
        } else {
            println!("{}", line);
        }
    }
}

fn cmd_census(selection: Selection, json: bool) -> Result<()> {
    let config = selection.resolve()?;
    let settings = config.settings()?;
    let census = driver::census(&batch_options(&config)?, &settings).context("Census failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&census)?);
        return Ok(());
    }

    println!(
        "{} Census over {} files",
        "info:".blue().bold(),
        census.files()
    );
    print_names("Exposed top-level names", census.exposed());
    print_names("Implicit globals", census.implicit_globals());
    print_names("Globals read", census.global_reads());
    Ok(())
}

fn print_names(title: &str, names: &BTreeSet<String>) {
    println!("\n{} ({})", title.bold(), names.len());
    for name in names {
        println!("  {}", name);
    }
}

fn cmd_scan(selection: Selection) -> Result<()> {
    let config = selection.resolve()?;
    let options = batch_options(&config)?;
    let files = scanner::collect_js_files(&options.roots, &options.ignore)?;

    println!("Would scan {} files:", files.len());
    for file in files {
        println!("  {}", file.display());
    }

    Ok(())
}

fn cmd_rules() -> Result<()> {
    for rule in RuleKind::ALL {
        let census = if rule.needs_census() {
            " (census)".dimmed().to_string()
        } else {
            String::new()
        };
        println!("{:<22} {}{}", rule.name().bold(), rule.description(), census);
    }
    Ok(())
}

fn cmd_externals(file: Option<PathBuf>, depth: Option<usize>) -> Result<()> {
    let value = match file {
        Some(path) => registry::load(&path)?,
        None => registry::builtin()?,
    };
    registry::print_tree(&value, depth.unwrap_or(usize::MAX), 0);
    Ok(())
}
