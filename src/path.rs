// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine where configuration and per-server state live when the caller
//! does not say otherwise.

use std::path::PathBuf;

/// Fixed name of the deployment preference file in a server state directory.
pub const PREFERENCES_FILE_NAME: &str = "deploymentPreferences.xml";

/// Determine default absolute path to the tool configuration file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/asdeploy/config.toml`. Does
/// not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if configuration directory cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_config_file() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("asdeploy").join("config.toml"))
        .ok_or(NoWayHome)
}

/// Determine default absolute path to state directory of a server.
///
/// Uses XDG Base Directory path `$XDG_DATA_HOME/asdeploy/servers/<name>`.
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if data directory cannot be determined.
pub fn default_server_state_dir(server_name: impl AsRef<str>) -> Result<PathBuf> {
    dirs::data_dir()
        .map(|path| {
            path.join("asdeploy")
                .join("servers")
                .join(server_name.as_ref())
        })
        .ok_or(NoWayHome)
}

/// No way to determine user's base directories.
///
/// # See Also
///
/// - [`dirs::data_dir`](https://docs.rs/dirs/latest/dirs/fn.data_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's base directories")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
