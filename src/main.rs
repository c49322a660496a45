use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use cursor_gui_patch::{
    discover_all, engine, AdHocCodesign, DiscoveryConfig, Installation, PatchKind, PatchOptions,
};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cgp")]
#[command(about = "Patch Cursor's bundled extensions (and undo it)", long_about = None)]
#[command(version)]
struct Cli {
    /// Cursor server installation root (skips auto-discovery of servers)
    #[arg(long, global = true)]
    server_dir: Option<PathBuf>,

    /// Cursor desktop app root, e.g. .../resources/app (skips auto-discovery)
    #[arg(long, global = true)]
    gui_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply patches to all discovered installations
    Patch {
        /// Show what would be patched without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Rescan every file, ignoring the patch cache
        #[arg(short, long)]
        force: bool,

        /// Apply only these patches (repeatable or comma-separated)
        #[arg(long, value_delimiter = ',')]
        only: Vec<PatchKind>,
    },

    /// Restore original files from backups
    Unpatch {
        /// Show what would be restored without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Show which patches are present in each target file
    Status {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = DiscoveryConfig::resolve(cli.server_dir, cli.gui_dir);

    match cli.command {
        Commands::Patch {
            dry_run,
            force,
            only,
        } => cmd_patch(&config, dry_run, force, only),

        Commands::Unpatch { dry_run } => cmd_unpatch(&config, dry_run),

        Commands::Status { json } => cmd_status(&config, json),
    }
}

/// Logs go to stderr. `CGP_LOG` takes precedence over `-v`.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "cursor_gui_patch=debug",
        _ => "cursor_gui_patch=trace",
    };
    let filter = EnvFilter::try_from_env("CGP_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn discover(config: &DiscoveryConfig) -> Vec<Installation> {
    let installations = discover_all(config);
    if installations.is_empty() {
        println!("{}", "No Cursor installations found.".yellow());
    }
    for inst in &installations {
        println!(
            "{}",
            format!("[{}] {} (version: {})", inst.kind, inst.root.display(), inst.version_id)
                .dimmed()
        );
    }
    installations
}

fn cmd_patch(
    config: &DiscoveryConfig,
    dry_run: bool,
    force: bool,
    only: Vec<PatchKind>,
) -> Result<()> {
    if dry_run {
        println!("{}", "[DRY RUN]".cyan());
    }
    let installations = discover(config);

    let options = PatchOptions {
        dry_run,
        force,
        only: (!only.is_empty()).then(|| only.into_iter().collect::<BTreeSet<_>>()),
    };
    let report = engine::patch(&installations, &options, &AdHocCodesign);

    for path in &report.patched {
        let verb = if dry_run { "Would patch" } else { "Patched" };
        println!("{} {} {}", "✓".green(), verb, path.display());
    }
    println!();
    print!("{report}");

    if !report.ok() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_unpatch(config: &DiscoveryConfig, dry_run: bool) -> Result<()> {
    if dry_run {
        println!("{}", "[DRY RUN]".cyan());
    }
    let installations = discover(config);
    let report = engine::unpatch(&installations, dry_run, &AdHocCodesign);

    for path in &report.restored {
        let verb = if dry_run { "Would restore" } else { "Restored" };
        println!("{} {} {}", "✓".green(), verb, path.display());
    }
    println!();
    print!("{report}");

    if !report.ok() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_status(config: &DiscoveryConfig, json: bool) -> Result<()> {
    let report = engine::status(&discover_all(config));

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", "Patch Status Report".bold());
        print!("{report}");
    }

    if report.files.iter().any(|f| f.error.is_some()) {
        std::process::exit(1);
    }
    Ok(())
}
