//! Worker configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use formref_core::config::TemplateConfig;
use formref_pipeline::batch::{BatchOptions, DEFAULT_MAX_PARALLEL_CLIPS};
use formref_pipeline::document::RunConfig;

/// Default reference directory, relative to the working directory.
pub const DEFAULT_REFERENCE_DIR: &str = "reference";

/// Output file name inside the reference directory.
pub const DEFAULT_OUTPUT_FILE: &str = "reference_templates.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a valid {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Log output style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub run: RunConfig,
    /// Where the reference document is written.
    pub output_path: PathBuf,
    pub log_format: LogFormat,
}

impl WorkerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var              | Default                                  |
    /// |----------------------|------------------------------------------|
    /// | `REFERENCE_DIR`      | `reference`                              |
    /// | `FRONT_DIR`          | `<REFERENCE_DIR>/front`                  |
    /// | `SIDE_DIR`           | `<REFERENCE_DIR>/side`                   |
    /// | `OUTPUT_PATH`        | `<REFERENCE_DIR>/reference_templates.json` |
    /// | `CANONICAL_LENGTH`   | `60`                                     |
    /// | `DROP_WORST_PCT`     | `0.2`                                    |
    /// | `USE_MEDIAN`         | `true`                                   |
    /// | `MAX_PARALLEL_CLIPS` | `4`                                      |
    /// | `CLIP_TIMEOUT_SECS`  | unset (no timeout)                       |
    /// | `LOG_FORMAT`         | `pretty` (`json` for structured output)  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a
    /// variable or `None` when it is unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let reference_dir =
            PathBuf::from(var("REFERENCE_DIR").unwrap_or_else(|| DEFAULT_REFERENCE_DIR.into()));
        let mut run = RunConfig::for_reference_dir(&reference_dir);
        if let Some(dir) = var("FRONT_DIR") {
            run.front_dir = dir.into();
        }
        if let Some(dir) = var("SIDE_DIR") {
            run.side_dir = dir.into();
        }

        let output_path = var("OUTPUT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| reference_dir.join(DEFAULT_OUTPUT_FILE));

        let defaults = TemplateConfig::default();
        run.template = TemplateConfig {
            canonical_length: parse_or(
                &var,
                "CANONICAL_LENGTH",
                "integer",
                defaults.canonical_length,
            )?,
            drop_worst_pct: parse_or(&var, "DROP_WORST_PCT", "number", defaults.drop_worst_pct)?,
            use_median: parse_bool_or(&var, "USE_MEDIAN", defaults.use_median)?,
            ..defaults
        };

        let timeout_secs: Option<u64> = var("CLIP_TIMEOUT_SECS")
            .map(|v| parse("CLIP_TIMEOUT_SECS", "integer", &v))
            .transpose()?;
        run.batch = BatchOptions {
            max_parallel_clips: parse_or(
                &var,
                "MAX_PARALLEL_CLIPS",
                "integer",
                DEFAULT_MAX_PARALLEL_CLIPS,
            )?,
            clip_timeout: timeout_secs.map(Duration::from_secs),
        };

        let log_format = var("LOG_FORMAT").map(|v| v.to_ascii_lowercase());
        let log_format = match log_format.as_deref() {
            None | Some("pretty") | Some("text") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "LOG_FORMAT",
                    expected: "log format (pretty or json)",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            run,
            output_path,
            log_format,
        })
    }
}

fn parse<T: FromStr>(
    var: &'static str,
    expected: &'static str,
    value: &str,
) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        expected,
        value: value.to_string(),
    })
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        Some(value) => parse(var, expected, &value),
        None => Ok(default),
    }
}

fn parse_bool_or(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value) = lookup(var) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            expected: "boolean",
            value,
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
