//! Agent configuration from the process environment.
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `CALLSITE_PROFILER_PROCESSES` | `;`-separated process names to attach to. Unset or empty attaches to every process. |
//! | `CALLSITE_INTEGRATIONS` | `;`-separated paths of integration JSON files. |

use std::path::PathBuf;

use crate::error::ConfigError;
use crate::integration::Integration;
use crate::loader;

pub const PROCESSES_ENV: &str = "CALLSITE_PROFILER_PROCESSES";
pub const INTEGRATIONS_ENV: &str = "CALLSITE_INTEGRATIONS";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentConfig {
    /// Process names the agent may attach to. Empty means any process.
    pub processes: Vec<String>,
    pub integration_paths: Vec<PathBuf>,
}

fn split_values(value: &str) -> impl Iterator<Item = &str> {
    value.split(';').map(str::trim).filter(|s| !s.is_empty())
}

impl AgentConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let processes: Vec<String> = lookup(PROCESSES_ENV)
            .map(|v| split_values(&v).map(str::to_owned).collect())
            .unwrap_or_default();
        let integration_paths: Vec<PathBuf> = lookup(INTEGRATIONS_ENV)
            .map(|v| split_values(&v).map(PathBuf::from).collect())
            .unwrap_or_default();
        Self {
            processes,
            integration_paths,
        }
    }

    /// Whether the agent should attach to `process_name` (an executable file
    /// name such as `dotnet.exe`).
    pub fn should_attach(&self, process_name: &str) -> bool {
        self.processes.is_empty() || self.processes.iter().any(|p| p == process_name)
    }

    /// Loads every configured integration file, in order.
    pub fn load_integrations(&self) -> Result<Vec<Integration>, ConfigError> {
        loader::load_integrations(&self.integration_paths)
    }
}
