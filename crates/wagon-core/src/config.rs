use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/pypi";
pub const DEFAULT_MAX_CAPTURE_BYTES: usize = 1024 * 1024;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    #[must_use]
    pub fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    #[must_use]
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    #[must_use]
    pub fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) python: PythonConfig,
    pub(crate) network: NetworkConfig,
    pub(crate) process: ProcessConfig,
    pub(crate) scratch_dir: Option<PathBuf>,
}

impl Config {
    /// Builds a configuration snapshot from the current process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_snapshot(&EnvSnapshot::capture())
    }

    #[must_use]
    pub fn from_snapshot(snapshot: &EnvSnapshot) -> Self {
        Self {
            python: PythonConfig {
                interpreter: snapshot.var("WAGON_PYTHON").map(ToOwned::to_owned),
            },
            network: NetworkConfig {
                index_url: snapshot
                    .var("WAGON_INDEX_URL")
                    .map_or(DEFAULT_INDEX_URL, |raw| raw.trim())
                    .trim_end_matches('/')
                    .to_string(),
                timeout: Duration::from_secs(
                    parse_positive(snapshot.var("WAGON_HTTP_TIMEOUT_SECS"))
                        .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
                ),
            },
            process: ProcessConfig {
                max_capture_bytes: parse_positive(snapshot.var("WAGON_MAX_CAPTURE_BYTES"))
                    .and_then(|value| usize::try_from(value).ok())
                    .unwrap_or(DEFAULT_MAX_CAPTURE_BYTES),
            },
            scratch_dir: snapshot.var("WAGON_TMPDIR").map(PathBuf::from),
        }
    }

    #[must_use]
    pub fn python(&self) -> &PythonConfig {
        &self.python
    }

    #[must_use]
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    #[must_use]
    pub fn process(&self) -> &ProcessConfig {
        &self.process
    }

    /// Parent directory for staging and extraction; the system temp dir when unset.
    #[must_use]
    pub fn scratch_dir(&self) -> Option<&PathBuf> {
        self.scratch_dir.as_ref()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_snapshot(&EnvSnapshot::testing(&[]))
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
}

#[derive(Debug, Clone)]
pub struct PythonConfig {
    pub interpreter: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub index_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct ProcessConfig {
    pub max_capture_bytes: usize,
}
