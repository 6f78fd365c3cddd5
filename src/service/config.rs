// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

extern crate config as _;

use std::path::Path;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use super::{AppError, AppResult};

pub static GLOBAL_CONFIG: OnceCell<ClientConfig> = OnceCell::new();

/// Returns the process-wide configuration, or the defaults if nothing was installed.
pub fn global_config() -> &'static ClientConfig {
    GLOBAL_CONFIG.get_or_init(ClientConfig::default)
}

/// Prefix of the environment variables that override file values,
/// e.g. `NUMCLIENT__NETWORK__PORT=9000`.
pub const ENV_PREFIX: &str = "NUMCLIENT";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted incoming frame, newline included.
    pub max_frame_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            host: "127.0.0.1".to_string(),
            port: 8001,
            max_frame_size: 1024,
        }
    }
}

impl NetworkConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Timer settings of a connection, all in milliseconds.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TimingConfig {
    /// Delay between an acknowledgment and the next `num` message.
    pub number_interval_ms: u64,
    /// How often the cancellation watcher looks at its source.
    pub watcher_poll_interval_ms: u64,
    /// Wait after sending `stop` before the socket is closed.
    pub stop_grace_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            number_interval_ms: 1500,
            watcher_poll_interval_ms: 150,
            stop_grace_ms: 900,
        }
    }
}

impl TimingConfig {
    pub fn number_interval(&self) -> Duration {
        Duration::from_millis(self.number_interval_ms)
    }
    pub fn watcher_poll_interval(&self) -> Duration {
        Duration::from_millis(self.watcher_poll_interval_ms)
    }
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// Directory of the rolling log files.
    pub dir: String,
    /// File name prefix, the client identity is appended to it.
    pub file_prefix: String,
    /// Also write log lines to stdout.
    pub console: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            dir: "logs".to_string(),
            file_prefix: "async_client_uid".to_string(),
            console: true,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    pub network: NetworkConfig,
    pub timing: TimingConfig,
    pub log: LogConfig,
}

impl ClientConfig {
    /// Loads the configuration from an optional toml file, then applies the
    /// `NUMCLIENT__*` environment overrides. Missing keys keep their defaults.
    pub fn set_up_config<P: AsRef<Path>>(path: P) -> AppResult<ClientConfig> {
        let path_str = path
            .as_ref()
            .to_str()
            .ok_or(AppError::InvalidValue(format!(
                "config file path: {}",
                path.as_ref().to_string_lossy()
            )))?;
        let config = config::Config::builder()
            .add_source(config::File::with_name(path_str).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let client_config: ClientConfig = config.try_deserialize()?;
        client_config.validate()?;
        Ok(client_config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.network.host.is_empty() {
            return Err(AppError::InvalidValue("network.host is empty".into()));
        }
        // a frame must at least hold "num\n"
        if self.network.max_frame_size < 4 {
            return Err(AppError::InvalidValue(format!(
                "network.max_frame_size {} is too small",
                self.network.max_frame_size
            )));
        }
        let timing = &self.timing;
        if timing.number_interval_ms == 0
            || timing.watcher_poll_interval_ms == 0
            || timing.stop_grace_ms == 0
        {
            return Err(AppError::InvalidValue(format!(
                "timing intervals must be positive: {:?}",
                timing
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let config = ClientConfig::default();
        assert_eq!(config.network.address(), "127.0.0.1:8001");
        assert_eq!(config.network.max_frame_size, 1024);
        assert_eq!(config.timing.number_interval(), Duration::from_millis(1500));
        assert_eq!(config.timing.watcher_poll_interval(), Duration::from_millis(150));
        assert_eq!(config.timing.stop_grace(), Duration::from_millis(900));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut config = ClientConfig::default();
        config.timing.stop_grace_ms = 0;
        assert!(matches!(config.validate(), Err(AppError::InvalidValue(_))));
    }

    #[test]
    fn tiny_frame_size_is_rejected() {
        let mut config = ClientConfig::default();
        config.network.max_frame_size = 2;
        assert!(config.validate().is_err());
    }
}
