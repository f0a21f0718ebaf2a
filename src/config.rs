// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the tool configuration file to simplify the process
//! of serialization and deserialization.
//!
//! # General Layout
//!
//! The configuration file lists known servers, each with the state directory
//! that holds its deployment preferences:
//!
//! ```toml
//! [[server]]
//! name = "eap-local"
//! state_dir = "$HOME/.local/share/asdeploy/servers/eap-local"
//! ```
//!
//! State directories go through shell expansion, so environment variables and
//! a leading tilde are allowed. Servers that are not listed fall back to the
//! default state directory from [`crate::path::default_server_state_dir`].

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Tool configuration layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ToolConfig {
    /// Listing of known servers.
    #[serde(rename = "server")]
    pub servers: Option<Vec<ServerEntry>>,
}

impl ToolConfig {
    /// Load tool configuration from file.
    ///
    /// A missing configuration file yields the default configuration.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if file exists but cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file content is invalid.
    /// - Return [`ConfigError::ShellExpansion`] if a state directory cannot
    ///   be expanded.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match read_to_string(path) {
            Ok(data) => data.parse(),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no configuration at {:?}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                source,
                path: path.to_path_buf(),
            }),
        }
    }

    /// Lookup server entry by name.
    pub fn server(&self, name: &str) -> Option<&ServerEntry> {
        self.servers
            .as_ref()
            .and_then(|servers| servers.iter().find(|entry| entry.name == name))
    }
}

impl FromStr for ToolConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: ToolConfig = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every state directory.
        for entry in config.servers.iter_mut().flatten() {
            entry.state_dir = StateDir::new(
                shellexpand::full(entry.state_dir.to_string().as_str())
                    .map_err(ConfigError::ShellExpansion)?
                    .into_owned(),
            );
        }

        Ok(config)
    }
}

impl Display for ToolConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Server entry of tool configuration.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ServerEntry {
    /// Name of the server.
    pub name: String,

    /// Directory holding state of the server.
    pub state_dir: StateDir,
}

/// Path acting as the state directory of a server.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct StateDir(PathBuf);

impl StateDir {
    /// Construct new state directory.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Treat state directory as [`Path`] slice.
    pub fn as_path(&self) -> &Path {
        self.0.as_path()
    }
}

impl Display for StateDir {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_path().to_string_lossy().as_ref())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Failed to read configuration file.
    #[error("failed to read configuration at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
