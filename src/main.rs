use anyhow::{Context, Result};
use arch_patcher::config::{
    default_config, load_from_path, select_targets, MigratorConfig, DEFAULT_CONFIG,
};
use arch_patcher::engine::{FragmentStatus, PatchSpec};
use arch_patcher::report::{ChangeReport, FileReport};
use arch_patcher::runner::{run_all, RunOptions};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "arch-patcher")]
#[command(about = "Patch CI pipelines, Dockerfiles and values files for multi-arch builds", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TargetArgs {
    /// Project root to search (defaults to ARCH_PATCHER_ROOT, config root, or cwd)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Config file (built-in policy if not specified)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only run these targets (comma separated, e.g. docker,ci)
    #[arg(long, value_delimiter = ',')]
    only: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the policy to a project
    Apply {
        #[command(flatten)]
        targets: TargetArgs,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Show per-fragment status without writing; exits 1 if anything is pending
    Status {
        #[command(flatten)]
        targets: TargetArgs,
    },

    /// Print the built-in policy as TOML
    Defaults,

    /// List configured targets
    List {
        /// Config file (built-in policy if not specified)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Apply {
            targets,
            dry_run,
            diff,
        } => cmd_apply(targets, dry_run, diff),

        Commands::Status { targets } => cmd_status(targets),

        Commands::Defaults => {
            print!("{DEFAULT_CONFIG}");
            Ok(())
        }

        Commands::List { config } => cmd_list(config),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<MigratorConfig> {
    match path {
        Some(path) => Ok(load_from_path(path)?),
        None => Ok(default_config()?),
    }
}

/// Resolve the search root
///
/// Priority order:
/// 1. Explicit --root flag
/// 2. ARCH_PATCHER_ROOT environment variable
/// 3. `root` from the config file
/// 4. Current directory
fn resolve_root(cli_root: Option<PathBuf>, config: &MigratorConfig) -> Result<PathBuf> {
    let root = if let Some(path) = cli_root {
        path
    } else if let Ok(env_root) = env::var("ARCH_PATCHER_ROOT") {
        PathBuf::from(env_root)
    } else if let Some(path) = &config.root {
        path.clone()
    } else {
        env::current_dir().context("failed to read current directory")?
    };

    root.canonicalize()
        .with_context(|| format!("root {} does not exist", root.display()))
}

fn run(args: TargetArgs, options: RunOptions) -> Result<(PathBuf, ChangeReport)> {
    let config = load_config(args.config.as_deref())?;
    let root = resolve_root(args.root, &config)?;
    let targets = select_targets(&config, &args.only)?;
    let report = run_all(&root, &targets, options);
    Ok((root, report))
}

fn display_path<'a>(root: &Path, path: &'a Path) -> std::path::Display<'a> {
    path.strip_prefix(root).unwrap_or(path).display()
}

/// Helper: Show unified diff between original and modified content
fn display_diff(root: &Path, file: &FileReport) {
    let shown = display_path(root, &file.path);
    println!("\n{}", format!("--- {} (original)", shown).dimmed());
    println!("{}", format!("+++ {} (patched)", shown).dimmed());

    let diff = TextDiff::from_lines(&file.original, &file.outcome.content);
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => continue,
        };
        print!("{}", sign);
    }
}

fn print_failures(root: &Path, report: &ChangeReport) {
    for (name, err) in &report.target_failures {
        eprintln!("{} {}: {}", "✗".red(), name, err);
    }
    for target in &report.targets {
        for failure in &target.failures {
            eprintln!(
                "{} {}: {}",
                "✗".red(),
                display_path(root, failure.path()),
                failure
            );
        }
    }
}

fn cmd_apply(args: TargetArgs, dry_run: bool, show_diff: bool) -> Result<()> {
    let (root, report) = run(args, RunOptions { dry_run })?;

    println!("Root: {}", root.display());
    if dry_run {
        println!("{}", "[DRY RUN - nothing is written]".cyan());
    }
    println!();

    for target in &report.targets {
        println!("{} {}", "Target".bold(), target.name.bold());
        if target.skipped {
            println!(
                "  {} {} not found, skipped",
                "⊘".cyan(),
                display_path(&root, &target.dir)
            );
            continue;
        }

        let changed = target.changed_paths();
        if changed.is_empty() {
            println!("  {}", "No changes.".yellow());
        } else {
            println!("  Changed files:");
            for path in &changed {
                let verb = if dry_run { "would update" } else { "updated" };
                println!("  {} {} {}", "✓".green(), verb, display_path(&root, path));
            }
        }

        if show_diff {
            for file in target.files.iter().filter(|file| file.changed()) {
                display_diff(&root, file);
            }
        }
        println!();
    }

    print_failures(&root, &report);

    let changed_total = report.changed_paths().len();
    let unchanged_total: usize = report.targets.iter().map(|t| t.unchanged()).sum();
    let failed_total = report.file_failures() + report.target_failures.len();

    println!("{}", "Summary:".bold());
    println!("  {} changed", format!("{}", changed_total).green());
    println!("  {} unchanged", format!("{}", unchanged_total).yellow());
    println!("  {} failed", format!("{}", failed_total).red());

    if report.has_failures() {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_status(args: TargetArgs) -> Result<()> {
    let (root, report) = run(args, RunOptions { dry_run: true })?;

    println!("{}", "Patch Status Report".bold());
    println!("Root: {}", root.display());
    println!();

    let mut pending = 0;
    for target in &report.targets {
        println!("{} {}", "Target".bold(), target.name.bold());
        if target.skipped {
            println!("  {} directory not found, skipped", "⊘".cyan());
            continue;
        }
        for file in &target.files {
            println!("  {}", display_path(&root, &file.path));
            for fragment in &file.outcome.fragments {
                let marker = match fragment.status {
                    FragmentStatus::Present | FragmentStatus::NoMatch => "✓".green(),
                    FragmentStatus::Applied | FragmentStatus::Rewritten => {
                        pending += 1;
                        "⊙".yellow()
                    }
                    FragmentStatus::NoTarget => "⊘".cyan(),
                };
                let status = match fragment.status {
                    FragmentStatus::Applied => "missing".to_string(),
                    FragmentStatus::Rewritten => "lines need rewriting".to_string(),
                    other => other.to_string(),
                };
                println!("    {} {} ({})", marker, fragment.id, status.dimmed());
            }
        }
        println!();
    }

    print_failures(&root, &report);

    if pending > 0 || report.has_failures() {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_list(config: Option<PathBuf>) -> Result<()> {
    let config = load_config(config.as_deref())?;

    for target in &config.targets {
        let patch = &target.patch;
        println!(
            "{} ({} mode) under {}",
            target.name.bold(),
            patch.mode(),
            target.subpath.display()
        );

        let mut patterns: Vec<String> = target.matcher.names.clone();
        patterns.extend(target.matcher.suffixes.iter().map(|s| format!("*{s}")));
        println!("  files: {}", patterns.join(", "));

        match patch {
            PatchSpec::Line {
                fragments,
                substitutions,
            } => {
                for fragment in fragments {
                    println!("  - {}: ensure {:?}", fragment.id, fragment.marker);
                }
                for substitution in substitutions {
                    println!(
                        "  - {}: rewrite lines matching {} lacking {:?}",
                        substitution.id, substitution.when, substitution.unless_contains
                    );
                }
            }
            PatchSpec::Structured { fragments } => {
                for fragment in fragments {
                    let policy = if fragment.force {
                        "set"
                    } else {
                        "add if missing"
                    };
                    println!("  - {}: {} {}", fragment.id, policy, fragment.path);
                }
            }
        }
    }

    Ok(())
}
