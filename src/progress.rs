//! Turns library events into log lines and a transfer progress bar.

use booru_library::catalogue::Action;
use booru_library::sync::{SkipReason, Termination};
use booru_library::{CatalogueEvent, FixEvent, SyncEvent};
use indicatif::{ProgressBar, ProgressStyle};

const TRANSFER_TEMPLATE: &str = "{msg} [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({binary_bytes_per_sec}, {eta})";
const UNSIZED_TEMPLATE: &str = "{spinner:.green} {msg} {bytes} ({binary_bytes_per_sec})";

/// Totals for one run, reported when it ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub downloaded: u64,
    pub skipped: u64,
    pub recorded: u64,
    pub renamed: u64,
    pub removed: u64,
}

#[derive(Default)]
pub struct Reporter {
    bar: Option<ProgressBar>,
    pub tally: Tally,
}

impl Reporter {
    pub fn sync(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::Started { cursor: Some(cursor) } => tracing::info!(cursor, "Fetching posts newer than cursor"),
            SyncEvent::Started { cursor: None } => tracing::info!("Fetching all posts"),
            SyncEvent::PageFetched { offset, returned } => tracing::info!(offset, returned, "Fetched page"),
            SyncEvent::PageFiltered { returned, unseen } => {
                tracing::info!(returned, unseen, "Filtered page against post record")
            },
            SyncEvent::TransferStarted { id, name, length } => {
                let bar = transfer_bar(*length);
                bar.set_message(format!("{id}"));
                tracing::debug!(id, name = %name.display(), length, "Downloading");
                self.bar = Some(bar);
            },
            SyncEvent::TransferProgress { bytes, .. } => {
                if let Some(bar) = &self.bar {
                    bar.set_position(*bytes);
                }
            },
            SyncEvent::Downloaded { id, name, bytes } => {
                self.clear_bar();
                self.tally.downloaded += 1;
                tracing::info!(id, name = %name.display(), bytes, "Downloaded");
            },
            SyncEvent::Skipped { id, reason } => {
                self.tally.skipped += 1;
                match reason {
                    SkipReason::NoFileUrl => tracing::warn!(id, "Skipped post without a file"),
                    SkipReason::AlreadyExists => tracing::info!(id, "Skipped post already on disk"),
                }
            },
            SyncEvent::Committed { inserted } => {
                self.tally.recorded += inserted;
                tracing::info!(inserted, "Recorded posts");
            },
            SyncEvent::Pruned => tracing::info!("Removed empty target directory"),
            SyncEvent::Finished(Termination::Exhausted { returned }) => {
                tracing::info!(returned, "No more posts available")
            },
            SyncEvent::Finished(Termination::CeilingReached) => tracing::info!("Reached the post limit"),
        }
    }

    pub fn catalogue(&mut self, event: &CatalogueEvent) {
        match event {
            CatalogueEvent::Started => {},
            CatalogueEvent::Hashed { files, pending } => tracing::info!(files, pending, "Recovered content hashes"),
            CatalogueEvent::LookedUp { requested, found } => tracing::info!(requested, found, "Looked up hashes"),
            CatalogueEvent::Committed { inserted } => {
                self.tally.recorded += inserted;
                tracing::info!(inserted, "Recorded posts");
            },
            CatalogueEvent::Complete { found } => tracing::info!(found, "Catalogue complete"),
        }
    }

    pub fn fix(&mut self, event: &FixEvent) {
        match event {
            FixEvent::Started | FixEvent::Complete => {},
            FixEvent::Hashed { files, matched } => tracing::info!(files, matched, "Matched files to recorded posts"),
            FixEvent::Fixed(Action::AlreadyCanonical(path)) => {
                tracing::debug!(path = %path.display(), "Already canonical")
            },
            FixEvent::Fixed(Action::RemovedDuplicate { from, to }) => {
                self.tally.removed += 1;
                tracing::info!(from = %from.display(), to = %to.display(), "Removed duplicate");
            },
            FixEvent::Fixed(Action::Renamed { from, to }) => {
                self.tally.renamed += 1;
                tracing::info!(from = %from.display(), to = %to.display(), "Renamed");
            },
        }
    }

    /// Drop a transfer bar left behind by a failed or interrupted transfer.
    pub fn clear_bar(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

fn transfer_bar(length: Option<u64>) -> ProgressBar {
    match length {
        Some(length) => {
            let bar = ProgressBar::new(length);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template(TRANSFER_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
            bar
        },
        None => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::default_spinner()
                    .template(UNSIZED_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar
        },
    }
}
