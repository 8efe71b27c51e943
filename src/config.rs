// src/config.rs
//! Resolver configuration.
//!
//! Values are layered: built-in defaults, then an optional `oca-resolver`
//! config file (any format the `config` crate understands), then `OCA_*`
//! environment variables, e.g. `OCA_BASE_URL` or `OCA_RETRY_FAILED_OPERATIONS`.

use crate::error::Result;
use crate::models::overlay::BrandingRevision;
use crate::resolver::accessor::ResolverOptions;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "oca-resolver";
pub const ENV_PREFIX: &str = "OCA";

pub const DEFAULT_BASE_URL: &str = "https://raw.githubusercontent.com/bcgov/aries-oca-bundles/main";
pub const DEFAULT_INDEX_FILE_NAME: &str = "ocabundles.json";
pub const DEFAULT_CACHE_DATA_FILE_NAME: &str = "oca-cache-data.json";
pub const DEFAULT_CACHE_DIR: &str = "oca-cache";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Settings for the remote bundle resolver.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Origin serving the index and the bundle files
    pub base_url: String,
    pub index_file_name: String,
    /// Local working directory for cached bundles
    pub cache_dir: PathBuf,
    pub cache_data_file_name: String,
    /// Default language for resolved bundles
    pub language: String,
    pub branding_revision: BrandingRevision,
    /// Treat `W/"x"` and `"x"` as the same index version
    pub weak_etag_comparison: bool,
    /// Reject downloaded bundles whose sha256 differs from the index
    pub verify_content_hash: bool,
    /// Keep failed cache operations and retry them on the next sync
    pub retry_failed_operations: bool,
    /// Hydrate every indexed bundle after each sync
    pub preload: bool,
    pub request_timeout_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            index_file_name: DEFAULT_INDEX_FILE_NAME.to_string(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            cache_data_file_name: DEFAULT_CACHE_DATA_FILE_NAME.to_string(),
            language: ResolverOptions::default().language,
            branding_revision: BrandingRevision::default(),
            weak_etag_comparison: false,
            verify_content_hash: false,
            retry_failed_operations: false,
            preload: false,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ResolverConfig {
    /// Loads configuration from the default file and the process environment.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::Config`] for unreadable files or values
    /// of the wrong type.
    pub fn load() -> Result<Self> {
        Self::load_with(
            Some(CONFIG_FILE_NAME),
            Environment::with_prefix(ENV_PREFIX).try_parsing(true),
        )
    }

    /// Loads configuration from an optional file and a given environment
    /// source.
    ///
    /// # Arguments
    /// * `file` - Config file name without extension; missing files are skipped
    /// * `environment` - Environment source layered on top of the file
    pub fn load_with(file: Option<&str>, environment: Environment) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("base_url", defaults.base_url)?
            .set_default("index_file_name", defaults.index_file_name)?
            .set_default("cache_dir", defaults.cache_dir.to_string_lossy().into_owned())?
            .set_default("cache_data_file_name", defaults.cache_data_file_name)?
            .set_default("language", defaults.language)?
            .set_default("branding_revision", "current")?
            .set_default("weak_etag_comparison", defaults.weak_etag_comparison)?
            .set_default("verify_content_hash", defaults.verify_content_hash)?
            .set_default("retry_failed_operations", defaults.retry_failed_operations)?
            .set_default("preload", defaults.preload)?
            .set_default("request_timeout_secs", defaults.request_timeout_secs as i64)?;
        if let Some(file) = file {
            builder = builder.add_source(File::with_name(file).required(false));
        }
        let settings = builder.add_source(environment).build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            language: self.language.clone(),
            branding_revision: self.branding_revision,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
