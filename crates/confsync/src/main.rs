use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use confsync_core::config::{CONFIG_FILENAME, write_starter_config};
use confsync_core::status::collect_status;
use confsync_core::sync::{SyncOptions, SyncReport, run_sync};

#[derive(Debug, Parser)]
#[command(
    name = "confsync",
    version,
    about = "Two-phase markdown-to-wiki reference synchronizer"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Materialize a starter confsync.toml")]
    Init(InitArgs),
    #[command(about = "Report per-document publish state without publishing")]
    Status(StatusArgs),
    #[command(about = "Run one two-phase publish cycle")]
    Sync(SyncArgs),
}

#[derive(Debug, Args)]
struct InitArgs {
    #[arg(long, value_name = "PATH", default_value = ".")]
    dir: PathBuf,
    #[arg(long, help = "Overwrite an existing configuration file")]
    force: bool,
}

#[derive(Debug, Args)]
struct StatusArgs {
    #[arg(long, value_name = "PATH", default_value = ".")]
    dir: PathBuf,
    #[arg(long, help = "Emit the report as JSON")]
    json: bool,
}

#[derive(Debug, Args)]
struct SyncArgs {
    #[arg(long, value_name = "PATH", default_value = ".")]
    dir: PathBuf,
    #[arg(long, help = "Rewrite references in the mirror but skip publishing")]
    dry_run: bool,
    #[arg(long, help = "Emit the report as JSON")]
    json: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    match Cli::parse().command {
        Commands::Init(args) => run_init(&args),
        Commands::Status(args) => run_status(&args),
        Commands::Sync(args) => run_sync_command(&args),
    }
}

fn run_init(args: &InitArgs) -> Result<()> {
    let config_path = args.dir.join(CONFIG_FILENAME);
    if write_starter_config(&config_path, args.force)? {
        println!("wrote {}", config_path.display());
    } else {
        println!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    Ok(())
}

fn run_status(args: &StatusArgs) -> Result<()> {
    let report = collect_status(&args.dir)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!(
        "{} documents ({} published, {} pending)",
        report.total, report.with_page_id, report.without_page_id
    );
    for document in &report.documents {
        let id = document.page_id.as_deref().unwrap_or("-");
        println!(
            "  {:<40} {:<10} {:<8} {}",
            document.relative_path, id, document.content_type, document.title
        );
    }
    Ok(())
}

fn run_sync_command(args: &SyncArgs) -> Result<()> {
    let options = SyncOptions {
        dry_run: args.dry_run,
    };
    let report = run_sync(&args.dir, &options)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    print_sync_report(&report);
    Ok(())
}

fn print_sync_report(report: &SyncReport) {
    if report.dry_run {
        println!("dry run: no publish performed");
    }
    println!("published: {}", report.published);
    println!("new page ids: {}", report.new_ids);
    println!("links rewritten: {}", report.links_rewritten);
    println!(
        "second pass: {}",
        if report.second_pass { "yes" } else { "no" }
    );
    for warning in &report.warnings {
        println!("warning: {warning}");
    }
}
