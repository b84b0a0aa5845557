mod cli;
mod error;
mod progress;

use crate::cli::Args;
use crate::error::{ErrorKind, Result};
use crate::progress::Reporter;
use booru_api::Client;
use booru_cache::{Database, Repository};
use booru_config::Config;
use booru_library::error::{Error as LibraryError, ErrorKind as LibraryErrorKind};
use booru_library::{CatalogueOptions, FixOptions, SyncOptions, catalogue, fix_names, sync};
use booru_storage::BackendHandle;
use booru_storage::backend::LocalBackend;
use clap::Parser;
use exn::{Exn, ResultExt};
use futures::{Stream, StreamExt};
use std::path::Path;
use std::pin::pin;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args);
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if *e != ErrorKind::Interrupted {
                eprintln!("{e:?}");
            }
            ExitCode::from(e.exit_code())
        },
    }
}

fn init_tracing(args: &Args) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load(args.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    args.override_download(&mut config.download);
    config.validate().or_raise(|| ErrorKind::Config)?;

    let client = Client::new(&config.api).or_raise(|| ErrorKind::Client)?;
    let db = Database::connect(&config.database).await.or_raise(|| ErrorKind::Database)?;
    let cache = Repository::new(db.pool().clone(), args.simulate);

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_interrupt(cancel.clone()));

    let mut reporter = Reporter::default();
    let outcome = drive(&args, &config, &client, &cache, &cancel, &mut reporter).await;
    reporter.clear_bar();

    let tally = reporter.tally;
    tracing::info!(
        changes = cache.session_changes(),
        downloaded = tally.downloaded,
        skipped = tally.skipped,
        recorded = tally.recorded,
        renamed = tally.renamed,
        removed = tally.removed,
        simulate = args.simulate,
        "Session finished"
    );
    db.close().await;
    outcome
}

/// The first interrupt asks the running operation to stop cleanly; a second
/// one exits immediately.
async fn cancel_on_interrupt(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = ?e, "Unable to listen for interrupts");
        return;
    }
    tracing::warn!("Interrupt received, stopping (press Ctrl-C again to quit now)");
    cancel.cancel();
    if tokio::signal::ctrl_c().await.is_ok() {
        std::process::exit(i32::from(ErrorKind::Interrupted.exit_code()));
    }
}

/// Catalogue directories, then fix names, then synchronize tags.
async fn drive(
    args: &Args,
    config: &Config,
    client: &Client,
    cache: &Repository,
    cancel: &CancellationToken,
    reporter: &mut Reporter,
) -> Result<()> {
    let mut failed = false;

    let options = CatalogueOptions { filter: !args.no_filter, simulate: args.simulate };
    for dir in &args.catalogue {
        stop_if_cancelled(cancel)?;
        let Some(backend) = open_existing(dir)? else {
            continue;
        };
        tracing::info!(target = backend.name(), "Cataloguing directory");
        let events = catalogue(&backend, cache, client, options, cancel);
        failed |= consume(events, reporter, Reporter::catalogue).await?;
    }

    let options = FixOptions { simulate: args.simulate };
    for dir in &args.fix {
        stop_if_cancelled(cancel)?;
        let Some(backend) = open_existing(dir)? else {
            continue;
        };
        tracing::info!(target = backend.name(), "Fixing file names");
        let events = fix_names(&backend, cache, options, cancel);
        failed |= consume(events, reporter, Reporter::fix).await?;
    }

    if !args.tags.is_empty() {
        stop_if_cancelled(cancel)?;
        let cwd = std::env::current_dir().or_raise(|| ErrorKind::Storage)?;
        let root = args.destination(&cwd);
        let backend: BackendHandle = Arc::new(
            LocalBackend::new(root.display().to_string(), &root).or_raise(|| ErrorKind::Storage)?,
        );
        let options = SyncOptions {
            tags: args.tags.clone(),
            rating: config.download.rating,
            limit: config.download.limit,
            offset: config.download.offset,
            refresh: args.refresh,
            check_duplicates: !args.no_db,
            simulate: args.simulate,
        };
        tracing::info!(target = backend.name(), tags = %options.tags.join(" "), "Synchronizing");
        let events = sync(&backend, cache, client, &options, cancel);
        failed |= consume(events, reporter, Reporter::sync).await?;
    }

    if failed {
        exn::bail!(ErrorKind::Incomplete);
    }
    Ok(())
}

fn stop_if_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        exn::bail!(ErrorKind::Interrupted);
    }
    Ok(())
}

/// A backend for a directory given on the command line, or `None` (with a
/// warning) if it isn't a directory.
fn open_existing(dir: &Path) -> Result<Option<BackendHandle>> {
    if !dir.is_dir() {
        tracing::warn!(path = %dir.display(), "Skipping, not a directory");
        return Ok(None);
    }
    let root = std::path::absolute(dir).or_raise(|| ErrorKind::Storage)?;
    let backend = LocalBackend::new(dir.display().to_string(), root).or_raise(|| ErrorKind::Storage)?;
    Ok(Some(Arc::new(backend)))
}

/// Drain an event stream into the reporter. Returns whether any error was
/// reported; an interrupt ends the run.
async fn consume<T>(
    events: impl Stream<Item = std::result::Result<T, LibraryError>>,
    reporter: &mut Reporter,
    report: fn(&mut Reporter, &T),
) -> Result<bool> {
    let mut events = pin!(events);
    let mut failed = false;
    while let Some(event) = events.next().await {
        match event {
            Ok(event) => report(reporter, &event),
            Err(e) => {
                reporter.clear_bar();
                if *e == LibraryErrorKind::Interrupted {
                    tracing::warn!("Interrupted");
                    return Err(Exn::from(ErrorKind::Interrupted));
                }
                tracing::error!(error = ?e, "Operation failed");
                failed = true;
            },
        }
    }
    Ok(failed)
}
