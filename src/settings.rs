use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::source::DocumentFilter;

const CONFIG_FILE: &str = "integration-features";
const ENV_PREFIX: &str = "INTEGRATION_FEATURES";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub db_path: PathBuf,
    pub post_type: String,
    pub post_status: String,
    pub site_url: Option<String>,
    /// REST collection for the post type; defaults to the post type's plural.
    pub rest_base: Option<String>,
    pub username: Option<String>,
    pub app_password: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            db_path: PathBuf::from("data/integrations.sqlite"),
            post_type: "integration".to_string(),
            post_status: "publish".to_string(),
            site_url: None,
            rest_base: None,
            username: None,
            app_password: None,
        }
    }
}

impl Settings {
    /// `integration-features.toml` (optional), then `INTEGRATION_FEATURES_*` env vars.
    pub fn load() -> Result<Self> {
        Self::from_builder(
            Config::builder()
                .add_source(File::with_name(CONFIG_FILE).required(false))
                .add_source(Environment::with_prefix(ENV_PREFIX)),
        )
    }

    fn from_builder(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn filter(&self) -> DocumentFilter {
        DocumentFilter {
            post_type: self.post_type.clone(),
            status: self.post_status.clone(),
        }
    }

    pub fn rest_base(&self) -> String {
        self.rest_base
            .clone()
            .unwrap_or_else(|| format!("{}s", self.post_type))
    }
}
