// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Deployment support for application server tooling.
//!
//! Two independent pieces live here:
//!
//! - [`prefs`]: per-server __deployment preference__ trees, grouping
//!   key-value properties by deployment type and module, persisted as XML.
//! - [`fsutil`]: recursive delete, copy, and touch helpers used to publish
//!   modules onto the local filesystem.
//!
//! The remaining modules glue these into a command line tool: [`config`] and
//! [`path`] decide where things live, and [`server`] ties a server name to
//! its preference file.

pub mod config;
pub mod fsutil;
pub mod path;
pub mod prefs;
pub mod server;

pub use crate::{
    fsutil::{complete_delete, file_safe_copy, safe_delete, touch, FileUtilListener},
    prefs::{DeploymentModulePrefs, DeploymentPreferences, DeploymentTypePrefs},
    server::ServerState,
};
