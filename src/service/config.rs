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

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{AppError, AppResult};

/// Pending connection queue length handed to `listen(2)`.
pub const DEFAULT_BACKLOG: u32 = 10;
/// Program launched for every accepted connection unless configured otherwise.
pub const DEFAULT_HANDLER_COMMAND: &str = "simple_message_server_logic";
/// Prefix of environment variables overriding file settings, e.g. `SMS_HANDLER__COMMAND`.
pub const ENV_PREFIX: &str = "SMS";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Host to bind; the wildcard address when absent.
    pub bind_address: Option<String>,
    pub port: u16,
    pub backlog: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            bind_address: None,
            port: 0,
            backlog: DEFAULT_BACKLOG,
        }
    }
}

/// The external program that owns an accepted connection as its stdin/stdout.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct HandlerConfig {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        HandlerConfig {
            command: DEFAULT_HANDLER_COMMAND.to_string(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// When set, logs are also written to a daily rolling file in this directory.
    pub directory: Option<String>,
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            directory: None,
            file_prefix: "simple_message_server.log".to_string(),
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub network: NetworkConfig,
    pub handler: HandlerConfig,
    pub log: LogConfig,
}

impl ServerConfig {
    /// Layers the optional config file, `SMS_*` environment variables and the
    /// command line port on top of the built-in defaults.
    pub fn set_up_config<P: AsRef<Path>>(path: Option<P>, port: u16) -> AppResult<ServerConfig> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            let path_str = path
                .as_ref()
                .to_str()
                .ok_or_else(|| {
                    AppError::InvalidValue(format!(
                        "config file path: {}",
                        path.as_ref().to_string_lossy()
                    ))
                })?;
            builder = builder.add_source(config::File::with_name(path_str));
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_override("network.port", i64::from(port))?
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        if server_config.handler.command.is_empty() {
            return Err(AppError::InvalidValue(
                "handler.command must not be empty".to_string(),
            ));
        }

        Ok(server_config)
    }
}
