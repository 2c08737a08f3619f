//! edr-printer - fetch, render and print Event Detail Reports from the command line

use chrono::NaiveDate;
use clap::Parser;
use edr_printer::config::ENV_AUTH_TOKEN;
use edr_printer::{
    BatchEvent, BatchOrchestrator, BrowseQuery, Config, ConsolePrompt, Error, ErrorCode, EventId,
    EventSummary, PortalClient, Result, RunOptions,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Some events failed
const EXIT_PARTIAL_FAILURE: u8 = 1;
/// Configuration or authentication failed; nothing was processed
const EXIT_SETUP_FAILURE: u8 = 2;

/// Fetch Event Detail Reports and print or save them
#[derive(Parser, Debug)]
#[command(name = "edr-printer")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Event ids to process (defaults to `batch.default_event_ids`)
    event_ids: Vec<String>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Merge all reports into one document with a cover page
    #[arg(long)]
    consolidate: bool,

    /// Send documents to the printer
    #[arg(long)]
    print: bool,

    /// Do not keep a copy of printed documents
    #[arg(long)]
    no_save: bool,

    /// Open the finished document in the system viewer
    #[arg(long)]
    open: bool,

    /// Directory for saved and retained documents
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Pre-issued bearer token; skips the login handshake
    #[arg(long, env = ENV_AUTH_TOKEN, hide_env_values = true)]
    token: Option<String>,

    /// Never run the login handshake; requires --token
    #[arg(long)]
    no_auth: bool,

    /// Print the result as JSON instead of a summary
    #[arg(long)]
    json: bool,

    /// List events for a store instead of printing reports
    #[arg(long)]
    list: bool,

    /// First day of the listing (YYYY-MM-DD, default: first of this month)
    #[arg(long, requires = "list")]
    from: Option<NaiveDate>,

    /// Last day of the listing (YYYY-MM-DD, default: today)
    #[arg(long, requires = "list")]
    to: Option<NaiveDate>,

    /// Store number for the listing (default: `portal.default_store_number`)
    #[arg(long, requires = "list")]
    store: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Flags win over file and environment settings
    fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.output_dir {
            config.output.output_dir = dir.clone();
        }
        if self.consolidate {
            config.batch.consolidate = true;
        }
        if self.print {
            config.batch.print = true;
        }
        if self.no_save {
            config.batch.save_copy = false;
        }
        if self.open {
            config.batch.open_after = true;
        }
    }

    fn token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "edr_printer=debug"
    } else {
        "edr_printer=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // A missing .env file is normal
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(code = e.error_code(), error = %e, "edr-printer failed");
            eprintln!("error: {e}");
            ExitCode::from(EXIT_SETUP_FAILURE)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    let client = PortalClient::new(&config.portal)?;
    let mut orchestrator =
        BatchOrchestrator::from_config(&config, client.clone(), Box::new(ConsolePrompt));
    if let Some(token) = cli.token() {
        orchestrator.inject_token(token);
    }

    if cli.list {
        return list(&cli, &config, &client, &mut orchestrator).await;
    }

    let ids: Vec<EventId> = if cli.event_ids.is_empty() {
        config
            .batch
            .default_event_ids
            .iter()
            .map(|id| EventId::from(id.as_str()))
            .collect()
    } else {
        cli.event_ids
            .iter()
            .map(|id| EventId::from(id.trim()))
            .collect()
    };
    if ids.is_empty() {
        return Err(Error::config(
            "no event ids given and none configured",
            "batch.default_event_ids",
        ));
    }

    let progress = (!cli.json).then(|| tokio::spawn(report_progress(orchestrator.subscribe())));

    let options = RunOptions {
        authenticate: !cli.no_auth,
        consolidate: config.batch.consolidate,
        print_requested: config.batch.print,
        save_copy: config.batch.save_copy,
        open_after: config.batch.open_after,
    };
    let result = orchestrator.run(&ids, options).await;

    // Closing the channel ends the progress task
    drop(orchestrator);
    if let Some(handle) = progress {
        handle.await.ok();
    }
    let result = result?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", result.summary());
    }

    Ok(if result.overall_success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_PARTIAL_FAILURE)
    })
}

async fn list(
    cli: &Cli,
    config: &Config,
    client: &PortalClient,
    orchestrator: &mut BatchOrchestrator,
) -> Result<ExitCode> {
    let store = cli
        .store
        .clone()
        .or_else(|| config.portal.default_store_number.clone())
        .ok_or_else(|| {
            Error::config(
                "a store number is required to list events (--store)",
                "portal.default_store_number",
            )
        })?;

    let mut query = BrowseQuery::current_month(store);
    if let Some(from) = cli.from {
        query.start_date = from;
    }
    if let Some(to) = cli.to {
        query.end_date = to;
    }
    if query.start_date > query.end_date {
        return Err(Error::Config {
            message: format!(
                "listing range starts after it ends ({} > {})",
                query.start_date, query.end_date
            ),
            key: None,
        });
    }

    let credential = orchestrator.ensure_credential(!cli.no_auth).await?;
    let events = client.browse_events(&credential, &query).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&events)?);
    } else {
        print_listing(&query, &events);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_listing(query: &BrowseQuery, events: &[EventSummary]) {
    println!(
        "Events for store {} from {} to {}: {}",
        query.store_number,
        query.start_date,
        query.end_date,
        events.len()
    );
    for event in events {
        println!(
            "  {:<10} {:<10} {:<24} {:<20} {}",
            event.event_id,
            event.date.as_deref().unwrap_or("-"),
            event.type_label,
            event.status_label,
            event.name.as_deref().unwrap_or("-"),
        );
    }
}

async fn report_progress(mut events: broadcast::Receiver<BatchEvent>) {
    loop {
        match events.recv().await {
            Ok(BatchEvent::AuthenticationStarted) => {
                eprintln!("Signing in to the portal...");
            }
            Ok(BatchEvent::FetchStarted {
                event_id,
                index,
                total,
            }) => {
                eprintln!("[{index}/{total}] fetching event {event_id}");
            }
            Ok(BatchEvent::FetchFailed { event_id, error }) => {
                eprintln!("  event {event_id} failed: {error}");
            }
            Ok(BatchEvent::RenderFailed { event_ids, error }) => {
                eprintln!("  rendering {} event(s) failed: {error}", event_ids.len());
            }
            Ok(BatchEvent::CopySaved { event_id, path }) => {
                eprintln!("  event {event_id} also saved to {}", path.display());
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "progress output fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
