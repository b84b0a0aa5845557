use booru_api::models::Rating;
use booru_config::DownloadSettings;
use clap::Parser;
use std::path::{Path, PathBuf};

/// Download posts matching a tag expression, or catalogue existing
/// collections against the post record.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Tags to synchronize; nothing is downloaded when none are given.
    pub tags: Vec<String>,

    /// Stop paging at this position in the results.
    #[arg(short, long, value_name = "NUM")]
    pub limit: Option<u32>,

    /// Start paging at this position in the results.
    #[arg(short, long, value_name = "NUM")]
    pub offset: Option<u32>,

    /// Only download posts with this rating.
    #[arg(short, long, value_parser = parse_rating)]
    pub rating: Option<Rating>,

    /// Destination directory (default: the tags joined by `+`).
    #[arg(short, long, value_name = "PATH")]
    pub folder: Option<PathBuf>,

    /// Ignore the highest identifier already in the destination.
    #[arg(short = 'i', long)]
    pub refresh: bool,

    /// Neither filter against nor add to the post record.
    #[arg(short = 'n', long)]
    pub no_db: bool,

    /// Record the posts behind the files in these directories.
    #[arg(short, long, value_name = "PATH", num_args = 1..)]
    pub catalogue: Vec<PathBuf>,

    /// Look up every file while cataloguing, even ones already recorded.
    #[arg(long)]
    pub no_filter: bool,

    /// Rename recorded files in these directories to their canonical names.
    #[arg(short = 'x', long, value_name = "PATH", num_args = 1..)]
    pub fix: Vec<PathBuf>,

    /// Report what would happen without downloading, recording or renaming.
    #[arg(short = 'e', long)]
    pub simulate: bool,

    /// Settings file to use instead of the default location.
    #[arg(long, value_name = "PATH", env = "BOORU_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log more (repeat for more detail).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Apply command line overrides on top of the loaded settings.
    pub fn override_download(&self, settings: &mut DownloadSettings) {
        if let Some(limit) = self.limit {
            settings.limit = limit;
        }
        if let Some(offset) = self.offset {
            settings.offset = offset;
        }
        if self.rating.is_some() {
            settings.rating = self.rating;
        }
    }

    /// Where synchronized posts are saved, relative to `cwd` unless absolute.
    pub fn destination(&self, cwd: &Path) -> PathBuf {
        let folder = self.folder.clone().unwrap_or_else(|| PathBuf::from(self.tags.join("+")));
        cwd.join(folder)
    }

    /// Log filter directive for the requested verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

fn parse_rating(value: &str) -> Result<Rating, String> {
    value.parse().map_err(|_| format!("unknown rating `{value}` (expected safe, questionable or explicit)"))
}
