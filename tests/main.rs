// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use asdeploy::{
    complete_delete, file_safe_copy,
    fsutil::{get_contents, set_contents, ErrorCollector},
    safe_delete, DeploymentPreferences, ServerState,
};

use anyhow::Result;
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Directory tree with known file content.
pub(crate) struct TreeFixture {
    root: PathBuf,
}

impl TreeFixture {
    pub(crate) fn new(root: impl Into<PathBuf>, files: &[(&str, &str)]) -> Result<Self> {
        let root = root.into();
        for (path, contents) in files {
            set_contents(root.join(path), contents)?;
        }

        Ok(Self { root })
    }

    pub(crate) fn path(&self) -> &Path {
        self.root.as_path()
    }

    /// Relative file paths mapped to their content.
    pub(crate) fn snapshot(&self) -> Result<BTreeMap<PathBuf, String>> {
        snapshot(&self.root)
    }
}

fn snapshot(root: &Path) -> Result<BTreeMap<PathBuf, String>> {
    let mut files = BTreeMap::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_file() {
            let relative = entry.path().strip_prefix(root)?.to_path_buf();
            files.insert(relative, get_contents(entry.path())?);
        }
    }

    Ok(files)
}

#[sealed_test]
fn copied_module_tree_matches_source() -> Result<()> {
    let fixture = TreeFixture::new(
        "workspace/app.war",
        &[
            ("index.html", "<h1>hello</h1>"),
            ("WEB-INF/web.xml", "<web-app/>"),
            ("WEB-INF/lib/util.jar", "jar bytes"),
        ],
    )?;
    TreeFixture::new("deploy/app.war", &[("old.html", "stale")])?;

    let mut collector = ErrorCollector::new();
    assert!(file_safe_copy(fixture.path(), "deploy/app.war", &mut collector));
    assert!(!collector.has_errors());

    assert_eq!(snapshot(Path::new("deploy/app.war"))?, fixture.snapshot()?);

    Ok(())
}

#[sealed_test]
fn undeploy_prunes_archive_back_to_root() -> Result<()> {
    TreeFixture::new(
        "deploy",
        &[("apps/app.war/index.html", "hi"), ("keep.txt", "keep")],
    )?;

    assert!(complete_delete(
        "deploy/apps/app.war",
        Some(Path::new("deploy")),
        &mut ()
    ));

    assert!(!Path::new("deploy/apps").exists());
    assert_eq!(
        snapshot(Path::new("deploy"))?.into_keys().collect::<Vec<_>>(),
        vec![PathBuf::from("keep.txt")]
    );

    Ok(())
}

#[sealed_test]
fn delete_whole_tree_leaves_nothing() -> Result<()> {
    let fixture = TreeFixture::new("doomed", &[("a/b/c.txt", "c"), ("d.txt", "d")])?;

    let mut collector = ErrorCollector::new();
    assert!(safe_delete(fixture.path(), &mut collector));
    assert!(collector.errors().is_empty());
    assert!(!fixture.path().exists());

    Ok(())
}

#[sealed_test]
fn server_preferences_persist_between_loads() -> Result<()> {
    let server = ServerState::new("eap-local", "state");

    let mut prefs = server.load_preferences()?;
    let mut local = prefs.get_or_create_preferences("local");
    local.set_property("deployDir", "/srv/deploy");
    local
        .get_or_create_module_prefs("app.war")
        .set_property("outputName", "app.war");
    server.save_preferences(&prefs)?;

    let mut reloaded = server.load_preferences()?;
    assert_eq!(reloaded, prefs);

    reloaded
        .get_or_create_preferences("local")
        .set_property("deployDir", "/srv/other");
    server.save_preferences(&reloaded)?;

    let result = DeploymentPreferences::load_from_file(server.preferences_path())?;
    let local = result.get_preferences("local").unwrap();
    assert_eq!(local.properties(), vec![("deployDir", "/srv/other")]);
    assert_eq!(local.module_ids(), vec!["app.war"]);

    Ok(())
}
