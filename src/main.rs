use std::collections::HashMap;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use blogport::parser::{hugo, ParseOptions, SourceFormat};
use blogport::tasks::{build_tasks, TaskContext};
use blogport::{logging, runner, HttpClient, MigrateData};

#[derive(Debug, Parser)]
#[command(name = "blogport", about = "Migrates blog exports to a Halo instance", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Parse an export and report what it contains without touching any server.
    Inspect {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// List the content sections inside a Hugo archive.
    Sections {
        /// Path to the ZIP archive.
        input: PathBuf,
    },
    /// Parse an export and create its resources on the target instance.
    Run {
        #[command(flatten)]
        source: SourceArgs,

        /// Target instance base URL, e.g. https://blog.example.com
        #[arg(long)]
        url: String,

        /// Personal access token with resource-creation scopes.
        #[arg(long, env = "BLOGPORT_TOKEN")]
        token: String,

        /// Target-side user that owns created attachments and moments.
        #[arg(long, default_value = "admin")]
        owner: String,

        /// Folder under the local storage policy for migrated files.
        #[arg(long, default_value = "migrated")]
        attachment_folder: String,

        /// Attachment storage type to policy name mapping, e.g. ALIOSS=oss.
        #[arg(long = "policy", value_parser = parse_policy)]
        policies: Vec<(String, String)>,

        /// Tasks executed concurrently within one tier.
        #[arg(long, default_value_t = 4)]
        concurrency: usize,

        /// Build and print the task plan without executing it.
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Debug, Args)]
struct SourceArgs {
    /// Source platform the export came from.
    #[arg(long, value_enum)]
    format: SourceFormat,

    /// Path to the export file.
    input: PathBuf,

    /// Hugo section treated as posts (repeatable).
    #[arg(long = "post-section")]
    post_sections: Vec<String>,

    /// Hugo section treated as pages (repeatable).
    #[arg(long = "page-section")]
    page_sections: Vec<String>,
}

impl SourceArgs {
    fn options(&self) -> ParseOptions {
        let mut options = ParseOptions::default();
        if !self.post_sections.is_empty() {
            options.post_sections = self.post_sections.clone();
        }
        if !self.page_sections.is_empty() {
            options.page_sections = self.page_sections.clone();
        }
        options
    }

    fn parse(&self) -> Result<MigrateData> {
        let bytes = std::fs::read(&self.input)
            .with_context(|| format!("read {}", self.input.display()))?;
        self.format
            .parse(&bytes, &self.options())
            .with_context(|| format!("parse {} as {:?}", self.input.display(), self.format))
    }
}

fn parse_policy(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(kind, policy)| (kind.to_string(), policy.to_string()))
        .ok_or_else(|| format!("expected TYPE=policy, got '{raw}'"))
}

#[tokio::main]
async fn main() {
    logging::init();

    let cli = Cli::parse();
    match handle_cli(cli.command).await {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(1);
        }
    }
}

async fn handle_cli(command: Commands) -> Result<i32> {
    match command {
        Commands::Inspect { source } => {
            let data = source.parse()?;
            print_counts(&data);
            Ok(0)
        }
        Commands::Sections { input } => {
            let bytes =
                std::fs::read(&input).with_context(|| format!("read {}", input.display()))?;
            for section in hugo::sections(&bytes).context("list archive sections")? {
                println!("{section}");
            }
            Ok(0)
        }
        Commands::Run {
            source,
            url,
            token,
            owner,
            attachment_folder,
            policies,
            concurrency,
            dry_run,
        } => {
            let data = source.parse()?;
            let context = TaskContext {
                owner_name: owner,
                attachment_folder,
                policy_map: policies.into_iter().collect::<HashMap<_, _>>(),
            };
            let plan = build_tasks(&data, &context);

            if dry_run {
                for tier in &plan.tiers {
                    println!("{:<14} {}", tier.label, tier.tasks.len());
                }
                println!("total          {}", plan.total());
                return Ok(0);
            }

            let cancel = Arc::new(AtomicBool::new(false));
            let cancel_on_signal = Arc::clone(&cancel);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, stopping at the next task boundary");
                    cancel_on_signal.store(true, Ordering::Relaxed);
                }
            });

            let client = HttpClient::new(url, token);
            let report = runner::run_plan(&plan, &client, concurrency, cancel).await;

            println!(
                "migrated {} of {} resources ({} failed){}",
                report.succeeded,
                plan.total(),
                report.failed(),
                if report.cancelled { ", cancelled" } else { "" }
            );
            for failure in &report.failures {
                println!("  {} {}: {}", failure.tier, failure.task, failure.error);
            }
            Ok(if report.failed() == 0 && !report.cancelled {
                0
            } else {
                1
            })
        }
    }
}

fn print_counts(data: &MigrateData) {
    let rows = [
        ("tags", data.tags.len()),
        ("categories", data.categories.len()),
        ("posts", data.posts.len()),
        ("pages", data.pages.len()),
        ("comments", data.comments.len()),
        ("menu items", data.menu_items.len()),
        ("moments", data.moments.len()),
        ("photos", data.photos.len()),
        ("links", data.links.len()),
        ("attachments", data.attachments.len()),
    ];
    for (label, count) in rows {
        println!("{label:<12} {count}");
    }
    println!("{:<12} {}", "total", data.total());
}
