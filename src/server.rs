// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Per-server state.
//!
//! Each server managed by the tool gets its own __state directory__. The
//! state directory houses the server's deployment preferences under the fixed
//! file name [`PREFERENCES_FILE_NAME`].
//!
//! # State Directory Layout
//!
//! The state directory can be placed anywhere on the user's file system by
//! listing the server in the tool configuration. Otherwise, the default
//! location is `$XDG_DATA_HOME/asdeploy/servers/<name>`. So,
//! `$XDG_DATA_HOME/asdeploy/servers/eap-local/deploymentPreferences.xml` holds
//! the deployment preferences of a server named "eap-local".

use crate::{
    config::ToolConfig,
    path::{default_server_state_dir, NoWayHome, PREFERENCES_FILE_NAME},
    prefs::{DeploymentPreferences, PrefsError},
};

use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// State of a single server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerState {
    name: String,
    state_dir: PathBuf,
}

impl ServerState {
    /// Construct new server state at explicit state directory.
    pub fn new(name: impl Into<String>, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            state_dir: state_dir.into(),
        }
    }

    /// Resolve server state through tool configuration.
    ///
    /// Uses the state directory listed for the server in the configuration,
    /// or the default state directory if the server is not listed.
    ///
    /// # Errors
    ///
    /// - Return [`ServerError::NoWayHome`] if default state directory cannot
    ///   be determined.
    pub fn resolve(name: impl Into<String>, config: &ToolConfig) -> Result<Self> {
        let name = name.into();
        let state_dir = match config.server(&name) {
            Some(entry) => entry.state_dir.as_path().to_path_buf(),
            None => default_server_state_dir(&name)?,
        };
        debug!("server {name:?} keeps state at {:?}", state_dir.display());

        Ok(Self { name, state_dir })
    }

    /// Name of server.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// State directory of server.
    pub fn state_dir(&self) -> &Path {
        self.state_dir.as_path()
    }

    /// Path to deployment preference file of server.
    pub fn preferences_path(&self) -> PathBuf {
        self.state_dir.join(PREFERENCES_FILE_NAME)
    }

    /// Load deployment preferences of server.
    ///
    /// A server without a preference file yet gets an empty tree.
    ///
    /// # Errors
    ///
    /// - Return [`ServerError::Prefs`] if preference file cannot be read or
    ///   parsed.
    #[instrument(skip(self), fields(server = %self.name), level = "debug")]
    pub fn load_preferences(&self) -> Result<DeploymentPreferences> {
        Ok(DeploymentPreferences::load_from_file(self.preferences_path())?)
    }

    /// Save deployment preferences of server.
    ///
    /// Creates the state directory if it does not exist yet.
    ///
    /// # Errors
    ///
    /// - Return [`ServerError::Prefs`] if preference file cannot be written.
    #[instrument(skip(self, prefs), fields(server = %self.name), level = "debug")]
    pub fn save_preferences(&self, prefs: &DeploymentPreferences) -> Result<()> {
        let path = self.preferences_path();
        prefs.save_to_file(&path)?;
        info!("saved deployment preferences of {:?}", self.name);

        Ok(())
    }
}

/// All possible error types for server state interaction.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Deployment preferences cannot be loaded or saved.
    #[error(transparent)]
    Prefs(#[from] PrefsError),

    /// Default state directory cannot be determined.
    #[error(transparent)]
    NoWayHome(#[from] NoWayHome),
}

/// Friendly result alias :3
type Result<T, E = ServerError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ServerEntry, StateDir};
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[test]
    fn resolve_uses_configured_state_dir() -> anyhow::Result<()> {
        let config = ToolConfig {
            servers: Some(vec![ServerEntry {
                name: "eap-local".into(),
                state_dir: StateDir::new("/srv/eap/state"),
            }]),
        };

        let server = ServerState::resolve("eap-local", &config)?;
        assert_eq!(server.name(), "eap-local");
        assert_eq!(
            server.preferences_path(),
            PathBuf::from("/srv/eap/state/deploymentPreferences.xml")
        );

        Ok(())
    }

    #[cfg(target_os = "linux")]
    #[sealed_test(env = [("XDG_DATA_HOME", "/xdg/data")])]
    fn resolve_falls_back_to_default_state_dir() -> anyhow::Result<()> {
        let server = ServerState::resolve("wildfly", &ToolConfig::default())?;
        assert_eq!(
            server.state_dir(),
            Path::new("/xdg/data/asdeploy/servers/wildfly")
        );

        Ok(())
    }

    #[sealed_test]
    fn preferences_survive_save_and_load() -> anyhow::Result<()> {
        let server = ServerState::new("eap-local", "state/eap-local");
        let mut prefs = server.load_preferences()?;
        assert!(prefs.deployment_types().is_empty());

        prefs
            .get_or_create_preferences("local")
            .get_or_create_module_prefs("app.war")
            .set_property("outputName", "app.war");
        server.save_preferences(&prefs)?;

        assert!(Path::new("state/eap-local/deploymentPreferences.xml").is_file());
        assert_eq!(server.load_preferences()?, prefs);

        Ok(())
    }
}
