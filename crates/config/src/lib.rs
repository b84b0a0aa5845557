//! Configuration loading and validation.
//!
//! Settings are layered, lowest priority first:
//!
//! 1. built-in defaults;
//! 2. a TOML file (`--config PATH`, otherwise `config.toml` in the
//!    platform configuration directory, if it exists);
//! 3. environment variables prefixed with `BOORU_`, using `__` to reach
//!    nested keys (`BOORU_API__BASE_URL`, `BOORU_DOWNLOAD__LIMIT`).
//!
//! Command-line flags are applied on top of the result by the binary.

pub mod error;

use crate::error::{ErrorKind, Result};
use booru_api::ApiSettings;
use booru_api::models::Rating;
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "BOORU_";
const CONFIG_FILE: &str = "config.toml";
const DATABASE_FILE: &str = "booru.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Location of the SQLite post record.
    pub database: PathBuf,
    pub api: ApiSettings,
    pub download: DownloadSettings,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            database: project_dirs()
                .map(|dirs| dirs.data_dir().join(DATABASE_FILE))
                .unwrap_or_else(|| PathBuf::from(DATABASE_FILE)),
            api: ApiSettings::default(),
            download: DownloadSettings::default(),
        }
    }
}

/// Defaults for the synchronizer's paging window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadSettings {
    /// Absolute position (in results) at which paging stops.
    pub limit: u32,
    /// Absolute position (in results) at which paging starts.
    pub offset: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
}
impl Default for DownloadSettings {
    fn default() -> Self {
        Self { limit: 1000, offset: 0, rating: None }
    }
}

impl Config {
    /// Load the configuration.
    ///
    /// An explicit `path` must exist; the default location is optional. The
    /// result is not validated, since command line overrides still apply on
    /// top of it: call [`validate`](Self::validate) once they have been.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => default_config_file().filter(|path| path.is_file()),
        };
        let config = Self::figment(file.as_deref()).extract::<Self>().or_raise(|| ErrorKind::Load)?;
        tracing::debug!(file = ?file, database = %config.database.display(), "Loaded configuration");
        Ok(config)
    }

    fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.download.offset > self.download.limit {
            exn::bail!(ErrorKind::Invalid(format!(
                "download.offset ({}) is past download.limit ({})",
                self.download.offset, self.download.limit
            )));
        }
        for (key, value) in [
            ("api.base_url", &self.api.base_url),
            ("api.content_url", &self.api.content_url),
            ("api.user_agent", &self.api.user_agent),
        ] {
            if value.trim().is_empty() {
                exn::bail!(ErrorKind::Invalid(format!("{key} must not be empty")));
            }
        }
        if self.database.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("database must not be empty".to_string()));
        }
        Ok(())
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "booru")
}

/// The configuration file read when `--config` isn't given.
pub fn default_config_file() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.download.limit, 1000);
        assert_eq!(config.download.offset, 0);
        assert_eq!(config.download.rating, None);
        assert!(config.database.ends_with(DATABASE_FILE));
        config.validate().unwrap();
    }

    #[test]
    fn test_file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "booru.toml",
                r#"
                    database = "/srv/booru/posts.sqlite3"

                    [api]
                    base_url = "https://booru.example.com/"

                    [download]
                    limit = 300
                    rating = "questionable"
                "#,
            )?;
            jail.set_env("BOORU_DOWNLOAD__LIMIT", "500");
            jail.set_env("BOORU_API__USER_AGENT", "tester/1.0");
            let config = Config::load(Some(Path::new("booru.toml"))).unwrap();
            assert_eq!(config.database, PathBuf::from("/srv/booru/posts.sqlite3"));
            assert_eq!(config.api.base_url, "https://booru.example.com/");
            assert_eq!(config.api.content_url, ApiSettings::default().content_url);
            assert_eq!(config.api.user_agent, "tester/1.0");
            assert_eq!(config.download.limit, 500);
            assert_eq!(config.download.rating, Some(Rating::Questionable));
            Ok(())
        });
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("missing.toml");
        let err = Config::load(Some(&missing)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(path) if path == &missing));
    }

    #[test]
    fn test_malformed_file() {
        Jail::expect_with(|jail| {
            jail.create_file("booru.toml", "[download]\nlimit = \"lots\"\n")?;
            let err = Config::load(Some(Path::new("booru.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Load));
            Ok(())
        });
    }

    #[test]
    fn test_load_leaves_validation_to_caller() {
        Jail::expect_with(|jail| {
            jail.create_file("booru.toml", "[download]\nlimit = 100\noffset = 500\n")?;
            let mut config = Config::load(Some(Path::new("booru.toml"))).unwrap();
            assert!(matches!(&*config.validate().unwrap_err(), ErrorKind::Invalid(_)));
            // A larger limit from the command line makes it usable.
            config.download.limit = 1000;
            config.validate().unwrap();
            Ok(())
        });
    }

    #[rstest]
    #[case::offset_past_limit(|c: &mut Config| c.download.offset = 2000)]
    #[case::empty_base_url(|c: &mut Config| c.api.base_url = " ".to_string())]
    #[case::empty_content_url(|c: &mut Config| c.api.content_url = String::new())]
    #[case::empty_database(|c: &mut Config| c.database = PathBuf::new())]
    fn test_validate_rejects(#[case] modify: fn(&mut Config)) {
        let mut config = Config::default();
        modify(&mut config);
        assert!(matches!(&*config.validate().unwrap_err(), ErrorKind::Invalid(_)));
    }
}
