//! 🔧 App Configuration — the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." — every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.
//!
//! Layering, lowest to highest:
//!   1. `BULKLOAD_*` environment variables (`__` separates nesting: `BULKLOAD_RUNTIME__WORKERS=8`)
//!   2. an optional TOML file
//!   3. whatever the operator typed on the command line
//!
//! The merged `AppConfig` is then checked once and frozen into an `ImportJob`.
//! Nothing mutates the job after that. It's read-only for the whole run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backends::ElasticsearchSinkConfig;
use crate::error::LoadError;
use crate::sink::RetryPolicy;

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// 📂 the NDJSON file. Optional here so a missing value is OUR error message, not serde's.
    #[serde(default)]
    pub data: Option<PathBuf>,
    /// 🔎 run the validation pass
    #[serde(default)]
    pub check: bool,
    /// 🚚 run the import
    #[serde(default)]
    pub import: bool,
    /// 📡 where the documents go
    #[serde(default, alias = "bulk")]
    pub destination: ElasticsearchSinkConfig,
    /// 🧵 how hard to push
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// 🧵 Runtime knobs. All of them have defaults, because nobody wants to write
/// a 40-line TOML block just to import a file.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// 👷 requested worker count. 1 = sequential.
    #[serde(default = "default_workers", alias = "thread")]
    pub workers: usize,
    /// 📏 below this many lines, partitioning isn't worth the ceremony and we go sequential
    #[serde(default = "default_min_partition_lines")]
    pub min_partition_lines: u64,
    /// 🪣 actions per bulk request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// 🔁 attempts per batch, first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// ⏱️ pause between attempts
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,
}

fn default_workers() -> usize {
    1
}

// -- 📏 1024 lines. smaller than that and the threads spend more time saying hello than working.
fn default_min_partition_lines() -> u64 {
    1024
}

fn default_batch_size() -> usize {
    5000
}

fn default_max_attempts() -> usize {
    5
}

fn default_retry_backoff_secs() -> u64 {
    5
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            min_partition_lines: default_min_partition_lines(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            retry_backoff_secs: default_retry_backoff_secs(),
        }
    }
}

/// 🎛️ What the operator typed. Only the things they actually typed get merged,
/// so an absent flag never stomps on a value from the file or the environment.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub data: Option<PathBuf>,
    pub check: bool,
    pub import: bool,
    pub url: Option<String>,
    pub index: Option<String>,
    pub doc_type: Option<String>,
    pub workers: Option<usize>,
}

impl ConfigOverrides {
    fn apply(&self, mut figment: Figment) -> Figment {
        if let Some(ref data) = self.data {
            figment = figment.merge(Serialized::default("data", data));
        }
        // -- 🚩 flags can only switch things ON. `--check` absent means "no opinion", not "false".
        if self.check {
            figment = figment.merge(Serialized::default("check", true));
        }
        if self.import {
            figment = figment.merge(Serialized::default("import", true));
        }
        if let Some(ref url) = self.url {
            figment = figment.merge(Serialized::default("destination.url", url));
        }
        if let Some(ref index) = self.index {
            figment = figment.merge(Serialized::default("destination.index", index));
        }
        if let Some(ref doc_type) = self.doc_type {
            figment = figment.merge(Serialized::default("destination.doc_type", doc_type));
        }
        if let Some(workers) = self.workers {
            figment = figment.merge(Serialized::default("runtime.workers", workers));
        }
        figment
    }
}

/// 🚀 Load the config — from env vars, an optional file, and the command line.
///
/// 📐 DESIGN NOTE (no cap, this is tribal knowledge):
///   - `config_file_name` None → env vars + CLI only. No file. No assumptions.
///   - `config_file_name` Some → env vars, then the TOML on top, then CLI on top of that.
pub fn load_config(
    config_file_name: Option<&Path>,
    overrides: &ConfigOverrides,
) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("BULKLOAD_").split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };
    let config = overrides.apply(config);

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}', environment variables (BULKLOAD_*) and flags. \
             The file exists in our hearts, but apparently not in valid TOML.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (BULKLOAD_*) and flags. \
                 No file was provided — this one's all on the environment. Classic."
            .to_string(),
    };

    config.extract().context(context_msg)
}

/// 🧊 The frozen, validated run configuration. Built once, read by everyone, changed by no one.
#[derive(Debug, Clone)]
pub struct ImportJob {
    pub data: PathBuf,
    pub check: bool,
    pub import: bool,
    pub destination: ElasticsearchSinkConfig,
    pub index: String,
    pub doc_type: Option<String>,
    pub workers: usize,
    pub min_partition_lines: u64,
    pub batch_size: usize,
    pub retry: RetryPolicy,
}

impl AppConfig {
    /// 🔒 Check everything that can be checked before touching the network, then freeze.
    ///
    /// Every failure here is a `LoadError::Config`: fail fast, tell the operator, go home.
    pub fn into_job(self) -> Result<ImportJob, LoadError> {
        let data = match self.data {
            Some(ref data) if !data.as_os_str().is_empty() => data.clone(),
            _ => return Err(LoadError::Config("No JSON file was input (--data)".to_string())),
        };
        if !data.is_file() {
            return Err(LoadError::Config(format!(
                "Can not open the file '{}': it does not exist or is not a regular file",
                data.display()
            )));
        }
        if !self.check && !self.import {
            return Err(LoadError::Config(
                "Nothing to do: ask for --check, --import, or both".to_string(),
            ));
        }

        let index = self.destination.index.clone().unwrap_or_default();
        if self.import {
            if self.destination.url.trim().is_empty() {
                return Err(LoadError::Config(
                    "Import requested without a destination (--bulk <url>)".to_string(),
                ));
            }
            if index.trim().is_empty() {
                return Err(LoadError::Config(
                    "Import requested without an index name (--index <name>)".to_string(),
                ));
            }
        }
        if self.runtime.batch_size == 0 {
            return Err(LoadError::Config("batch_size must be at least 1".to_string()));
        }

        Ok(ImportJob {
            data,
            check: self.check,
            import: self.import,
            doc_type: self.destination.doc_type.clone(),
            destination: self.destination,
            index,
            workers: self.runtime.workers.max(1),
            min_partition_lines: self.runtime.min_partition_lines,
            batch_size: self.runtime.batch_size,
            retry: RetryPolicy {
                max_attempts: self.runtime.max_attempts.max(1),
                backoff: Duration::from_secs(self.runtime.retry_backoff_secs),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_test_config(contents: &str) -> NamedTempFile {
        // 🧪 We write a real file here because Figment wants TOML from disk, like it's method acting.
        let mut file = NamedTempFile::new()
            .expect("💀 Failed to create test config. The filesystem said 'new phone who dis'.");
        file.write_all(contents.as_bytes())
            .expect("💀 Failed to write test config. Even the trash has trust issues.");
        file
    }

    fn a_data_file() -> NamedTempFile {
        write_test_config("{\"doc\":1}\n")
    }

    #[test]
    fn the_one_where_the_toml_file_fills_in_every_knob() {
        let data = a_data_file();
        let config_file = write_test_config(&format!(
            r#"
            data = "{}"
            import = true

            [destination]
            url = "http://localhost:9200"
            index = "books"
            type = "novel"

            [runtime]
            workers = 4
            min_partition_lines = 10
            batch_size = 250
            max_attempts = 3
            retry_backoff_secs = 1
            "#,
            data.path().display()
        ));

        let app_config = load_config(Some(config_file.path()), &ConfigOverrides::default())
            .expect("💀 A perfectly good TOML should parse. The schema drift goblin does not get this win.");
        let job = app_config.into_job().expect("💀 and it should freeze into a job");

        assert!(job.import);
        assert!(!job.check);
        assert_eq!(job.index, "books");
        assert_eq!(job.doc_type.as_deref(), Some("novel"));
        assert_eq!(job.workers, 4);
        assert_eq!(job.min_partition_lines, 10);
        assert_eq!(job.batch_size, 250);
        assert_eq!(job.retry.max_attempts, 3);
        assert_eq!(job.retry.backoff, Duration::from_secs(1));
    }

    #[test]
    fn the_one_where_defaults_show_up_uninvited_but_helpful() {
        let runtime = RuntimeConfig::default();
        assert_eq!(runtime.workers, 1);
        assert_eq!(runtime.min_partition_lines, 1024);
        assert_eq!(runtime.batch_size, 5000);
        assert_eq!(runtime.max_attempts, 5);
        assert_eq!(runtime.retry_backoff_secs, 5);
    }

    #[test]
    fn the_one_where_the_command_line_outranks_the_file() {
        let data = a_data_file();
        let config_file = write_test_config(
            r#"
            [destination]
            url = "http://file-says:9200"
            index = "from-file"

            [runtime]
            workers = 2
            "#,
        );
        let overrides = ConfigOverrides {
            data: Some(data.path().to_path_buf()),
            check: true,
            import: true,
            url: Some("http://cli-says:9200".to_string()),
            workers: Some(8),
            ..Default::default()
        };

        let job = load_config(Some(config_file.path()), &overrides)
            .unwrap()
            .into_job()
            .unwrap();

        assert_eq!(job.destination.url, "http://cli-says:9200");
        assert_eq!(job.index, "from-file", "untyped flags leave the file's values alone");
        assert_eq!(job.workers, 8);
        assert!(job.check && job.import);
    }

    #[test]
    fn the_one_where_config_errors_fail_fast_and_say_why() {
        let data = a_data_file();

        let no_data = AppConfig {
            check: true,
            ..Default::default()
        };
        assert!(matches!(no_data.into_job(), Err(LoadError::Config(_))));

        let ghost_file = AppConfig {
            data: Some(PathBuf::from("/this/file/is/a/ghost.ndjson")),
            check: true,
            ..Default::default()
        };
        assert!(ghost_file.into_job().unwrap_err().is_config());

        let idle = AppConfig {
            data: Some(data.path().to_path_buf()),
            ..Default::default()
        };
        assert!(idle.into_job().unwrap_err().to_string().contains("Nothing to do"));

        let nowhere_to_go = AppConfig {
            data: Some(data.path().to_path_buf()),
            import: true,
            ..Default::default()
        };
        assert!(nowhere_to_go.into_job().unwrap_err().to_string().contains("--bulk"));

        let no_index = AppConfig {
            data: Some(data.path().to_path_buf()),
            import: true,
            destination: ElasticsearchSinkConfig {
                url: "http://localhost:9200".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(no_index.into_job().unwrap_err().to_string().contains("--index"));
    }

    #[test]
    fn the_one_where_check_only_needs_no_destination_at_all() {
        let data = a_data_file();
        let job = AppConfig {
            data: Some(data.path().to_path_buf()),
            check: true,
            ..Default::default()
        }
        .into_job()
        .expect("💀 validation doesn't need a cluster");

        assert!(job.check);
        assert!(!job.import);
        assert_eq!(job.workers, 1);
    }
}
