// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Filesystem helpers for publishing modules.
//!
//! Recursive delete, copy, and touch operations over the local filesystem.
//! Operations that visit many nodes do not stop on the first failure. Instead
//! each node's outcome is handed to a [`FileUtilListener`], and the caller
//! decides what a failure means. Pass `&mut ()` to ignore per-node outcomes.
//!
//! Paths handed to one call should share the same form. Mixing relative and
//! absolute paths, e.g., for [`complete_delete`] and its archive root, makes
//! ancestor checks come up empty.

use filetime::{set_file_mtime, FileTime};
use mkdirp::mkdirp;
use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

/// Observe per-node outcome of filesystem operations.
///
/// All methods default to doing nothing.
pub trait FileUtilListener {
    /// File was copied, or failed to be copied, from source to destination.
    fn file_copied(
        &mut self,
        _src: &Path,
        _dest: &Path,
        _outcome: std::result::Result<(), &io::Error>,
    ) {
    }

    /// File was deleted, or failed to be deleted.
    fn file_deleted(&mut self, _path: &Path, _outcome: std::result::Result<(), &io::Error>) {}

    /// Directory was deleted, or failed to be deleted.
    fn folder_deleted(&mut self, _path: &Path, _outcome: std::result::Result<(), &io::Error>) {}
}

impl FileUtilListener for () {}

/// Collect every failure reported by filesystem operations.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Vec<Error>,
}

impl ErrorCollector {
    /// Construct new empty error collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Failures collected so far.
    pub fn errors(&self) -> &[Error] {
        self.errors.as_slice()
    }

    /// Check if any failure was collected.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Take all collected failures.
    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }
}

impl FileUtilListener for ErrorCollector {
    fn file_copied(&mut self, src: &Path, dest: &Path, outcome: std::result::Result<(), &io::Error>) {
        if let Err(err) = outcome {
            self.errors.push(Error::Copy {
                source: detach(err),
                src: src.to_path_buf(),
                dest: dest.to_path_buf(),
            });
        }
    }

    fn file_deleted(&mut self, path: &Path, outcome: std::result::Result<(), &io::Error>) {
        if let Err(err) = outcome {
            self.errors.push(Error::Delete {
                source: detach(err),
                path: path.to_path_buf(),
            });
        }
    }

    fn folder_deleted(&mut self, path: &Path, outcome: std::result::Result<(), &io::Error>) {
        self.file_deleted(path, outcome);
    }
}

/// Log every outcome of filesystem operations.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl FileUtilListener for TracingListener {
    fn file_copied(&mut self, src: &Path, dest: &Path, outcome: std::result::Result<(), &io::Error>) {
        match outcome {
            Ok(()) => info!("copied {:?} to {:?}", src.display(), dest.display()),
            Err(err) => warn!(
                "failed to copy {:?} to {:?}: {err}",
                src.display(),
                dest.display()
            ),
        }
    }

    fn file_deleted(&mut self, path: &Path, outcome: std::result::Result<(), &io::Error>) {
        match outcome {
            Ok(()) => info!("deleted {:?}", path.display()),
            Err(err) => warn!("failed to delete {:?}: {err}", path.display()),
        }
    }

    fn folder_deleted(&mut self, path: &Path, outcome: std::result::Result<(), &io::Error>) {
        match outcome {
            Ok(()) => info!("deleted directory {:?}", path.display()),
            Err(err) => warn!("failed to delete directory {:?}: {err}", path.display()),
        }
    }
}

/// Delete file or directory tree.
///
/// Directory contents are deleted bottom-up before the directory itself.
/// Symbolic links are deleted, never followed. Every node's outcome goes to
/// the listener, and deletion carries on past failures. A path that does not
/// exist is left alone.
///
/// Returns `true` if every node was deleted.
#[instrument(skip(path, listener), level = "debug")]
pub fn safe_delete<L>(path: impl AsRef<Path>, listener: &mut L) -> bool
where
    L: FileUtilListener + ?Sized,
{
    let path = path.as_ref();
    if let Err(err) = fs::symlink_metadata(path) {
        if err.kind() == ErrorKind::NotFound {
            debug!("nothing to delete at {:?}", path.display());
            return true;
        }
    }

    let mut success = true;
    let walker = WalkDir::new(path)
        .follow_root_links(false)
        .contents_first(true);
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let failed = err.path().unwrap_or(path).to_path_buf();
                let err = io::Error::from(err);
                listener.file_deleted(&failed, Err(&err));
                success = false;
                continue;
            }
        };

        let outcome = if entry.file_type().is_dir() {
            let outcome = fs::remove_dir(entry.path());
            listener.folder_deleted(entry.path(), borrowed(&outcome));
            outcome
        } else {
            let outcome = fs::remove_file(entry.path());
            listener.file_deleted(entry.path(), borrowed(&outcome));
            outcome
        };
        success &= outcome.is_ok();
    }

    success
}

/// Delete file or directory tree, then prune emptied ancestors.
///
/// After [`safe_delete`], walks upward from the parent of `path`, deleting
/// each directory that is now empty. Stops at `archive_root` (which is never
/// deleted), at the first non-empty ancestor, or at an ancestor outside of
/// `archive_root`. Without an archive root, pruning only stops at the first
/// non-empty ancestor or when no parent is left.
///
/// Returns `true` if every deletion attempted succeeded.
#[instrument(skip(path, archive_root, listener), level = "debug")]
pub fn complete_delete<L>(
    path: impl AsRef<Path>,
    archive_root: Option<&Path>,
    listener: &mut L,
) -> bool
where
    L: FileUtilListener + ?Sized,
{
    let path = path.as_ref();
    let mut success = safe_delete(path, listener);

    let mut current = path.parent();
    while let Some(dir) = current {
        if let Some(root) = archive_root {
            if dir == root || !dir.starts_with(root) {
                break;
            }
        }

        if !is_empty_dir(dir) {
            break;
        }

        debug!("prune empty directory {:?}", dir.display());
        let outcome = fs::remove_dir(dir);
        listener.folder_deleted(dir, borrowed(&outcome));
        if outcome.is_err() {
            success = false;
            break;
        }

        current = dir.parent();
    }

    success
}

/// Copy file or directory tree from source to destination.
///
/// A destination that already exists is cleared through [`safe_delete`]
/// first. Missing parent directories of the destination are created. Plain
/// files are copied through buffered byte streams. Every file's outcome goes
/// to the listener, and copying carries on past failures.
///
/// Returns `true` if the destination was cleared and every part of the tree
/// was copied.
#[instrument(skip(src, dest, listener), level = "debug")]
pub fn file_safe_copy<L>(src: impl AsRef<Path>, dest: impl AsRef<Path>, listener: &mut L) -> bool
where
    L: FileUtilListener + ?Sized,
{
    let src = src.as_ref();
    let dest = dest.as_ref();
    let mut success = true;
    if fs::symlink_metadata(dest).is_ok() {
        debug!("clear existing destination {:?}", dest.display());
        success = safe_delete(dest, listener);
    }

    copy_tree(src, dest, listener) && success
}

fn copy_tree<L>(src: &Path, dest: &Path, listener: &mut L) -> bool
where
    L: FileUtilListener + ?Sized,
{
    if !src.is_dir() {
        let outcome = copy_file(src, dest);
        listener.file_copied(src, dest, borrowed(&outcome));
        return outcome.is_ok();
    }

    let entries = match mkdirp(dest).and_then(|_| fs::read_dir(src)) {
        Ok(entries) => entries,
        Err(err) => {
            listener.file_copied(src, dest, Err(&err));
            return false;
        }
    };

    let mut success = true;
    for entry in entries {
        match entry {
            Ok(entry) => {
                success &= copy_tree(&entry.path(), &dest.join(entry.file_name()), listener);
            }
            Err(err) => {
                listener.file_copied(src, dest, Err(&err));
                success = false;
            }
        }
    }

    success
}

fn copy_file(src: &Path, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        mkdirp(parent)?;
    }

    let mut reader = BufReader::new(File::open(src)?);
    let mut writer = BufWriter::new(File::create(dest)?);
    io::copy(&mut reader, &mut writer)?;
    writer.flush()
}

/// Update modification time of paths matching filter.
///
/// Visits `root` alone, or `root` and the whole tree below it when `recurse`
/// is set. The filter sees every visited path, directories included, and each
/// accepted path gets its modification time set to now.
///
/// Returns number of paths touched.
///
/// # Errors
///
/// - Return [`Error::Walk`] if directory tree cannot be traversed.
/// - Return [`Error::Touch`] if modification time cannot be set.
#[instrument(skip(filter, root), level = "debug")]
pub fn touch<F>(filter: F, root: impl AsRef<Path>, recurse: bool) -> Result<usize>
where
    F: Fn(&Path) -> bool,
{
    let root = root.as_ref();
    let walker = WalkDir::new(root).max_depth(if recurse { usize::MAX } else { 0 });
    let now = FileTime::now();
    let mut touched = 0;

    for entry in walker {
        let entry = entry.map_err(|source| Error::Walk {
            path: source.path().unwrap_or(root).to_path_buf(),
            source,
        })?;

        if !filter(entry.path()) {
            continue;
        }

        set_file_mtime(entry.path(), now).map_err(|source| Error::Touch {
            source,
            path: entry.path().to_path_buf(),
        })?;
        debug!("touched {:?}", entry.path().display());
        touched += 1;
    }

    Ok(touched)
}

/// Read entire file as UTF-8 text.
///
/// # Errors
///
/// - Return [`Error::Read`] if file cannot be read.
pub fn get_contents(path: impl AsRef<Path>) -> Result<String> {
    fs::read_to_string(path.as_ref()).map_err(|source| Error::Read {
        source,
        path: path.as_ref().to_path_buf(),
    })
}

/// Replace entire file content with text.
///
/// Creates missing parent directories of the file first.
///
/// # Errors
///
/// - Return [`Error::Write`] if parent directories cannot be created, or
///   file cannot be written.
pub fn set_contents(path: impl AsRef<Path>, contents: impl AsRef<str>) -> Result<()> {
    let path = path.as_ref();
    let to_error = |source: io::Error| Error::Write {
        source,
        path: path.to_path_buf(),
    };

    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        mkdirp(parent).map_err(to_error)?;
    }

    fs::write(path, contents.as_ref()).map_err(to_error)
}

fn is_empty_dir(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

fn borrowed(outcome: &io::Result<()>) -> std::result::Result<(), &io::Error> {
    outcome.as_ref().map(|_| ())
}

// io::Error is not Clone, so keep its kind and message.
fn detach(err: &io::Error) -> io::Error {
    io::Error::new(err.kind(), err.to_string())
}

/// Filesystem operation error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File cannot be copied.
    #[error("failed to copy {:?} to {:?}", src.display(), dest.display())]
    Copy {
        #[source]
        source: io::Error,
        src: PathBuf,
        dest: PathBuf,
    },

    /// File or directory cannot be deleted.
    #[error("failed to delete {:?}", path.display())]
    Delete {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Directory tree cannot be traversed.
    #[error("failed to walk {:?}", path.display())]
    Walk {
        #[source]
        source: walkdir::Error,
        path: PathBuf,
    },

    /// Modification time cannot be set.
    #[error("failed to touch {:?}", path.display())]
    Touch {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// File cannot be read.
    #[error("failed to read {:?}", path.display())]
    Read {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// File cannot be written.
    #[error("failed to write {:?}", path.display())]
    Write {
        #[source]
        source: io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    #[derive(Debug, Default)]
    struct Recorder {
        copied: Vec<(PathBuf, PathBuf, bool)>,
        deleted: Vec<(PathBuf, bool)>,
        folders: Vec<(PathBuf, bool)>,
    }

    impl FileUtilListener for Recorder {
        fn file_copied(&mut self, src: &Path, dest: &Path, outcome: std::result::Result<(), &io::Error>) {
            self.copied.push((src.into(), dest.into(), outcome.is_ok()));
        }

        fn file_deleted(&mut self, path: &Path, outcome: std::result::Result<(), &io::Error>) {
            self.deleted.push((path.into(), outcome.is_ok()));
        }

        fn folder_deleted(&mut self, path: &Path, outcome: std::result::Result<(), &io::Error>) {
            self.folders.push((path.into(), outcome.is_ok()));
        }
    }

    fn backdate(path: &Path) -> anyhow::Result<SystemTime> {
        let past = UNIX_EPOCH + Duration::from_secs(1_000_000);
        set_file_mtime(path, FileTime::from_system_time(past))?;
        Ok(past)
    }

    #[sealed_test]
    fn safe_delete_removes_tree_bottom_up() -> anyhow::Result<()> {
        set_contents("tree/a.txt", "a")?;
        set_contents("tree/sub/b.txt", "b")?;
        set_contents("tree/sub/deeper/c.txt", "c")?;

        let mut recorder = Recorder::default();
        assert!(safe_delete("tree", &mut recorder));
        assert!(!Path::new("tree").exists());

        assert_eq!(recorder.deleted.len(), 3);
        assert!(recorder.deleted.iter().all(|(_, ok)| *ok));

        // INVARIANT: Children always go before their parent.
        let folders: Vec<_> = recorder.folders.iter().map(|(path, _)| path.clone()).collect();
        let position = |dir: &str| folders.iter().position(|path| path == Path::new(dir));
        assert!(position("tree/sub/deeper") < position("tree/sub"));
        assert!(position("tree/sub") < position("tree"));
        assert_eq!(folders.last().map(PathBuf::as_path), Some(Path::new("tree")));

        Ok(())
    }

    #[sealed_test]
    fn safe_delete_plain_file() -> anyhow::Result<()> {
        set_contents("lonely.txt", "bye")?;

        let mut recorder = Recorder::default();
        assert!(safe_delete("lonely.txt", &mut recorder));
        assert!(!Path::new("lonely.txt").exists());
        assert_eq!(recorder.deleted, vec![(PathBuf::from("lonely.txt"), true)]);
        assert!(recorder.folders.is_empty());

        Ok(())
    }

    #[sealed_test]
    fn safe_delete_missing_path_reports_nothing() {
        let mut recorder = Recorder::default();
        assert!(safe_delete("does-not-exist", &mut recorder));
        assert!(recorder.deleted.is_empty());
        assert!(recorder.folders.is_empty());
    }

    #[cfg(unix)]
    #[sealed_test]
    fn safe_delete_does_not_follow_symlinks() -> anyhow::Result<()> {
        set_contents("keep/precious.txt", "keep me")?;
        fs::create_dir("doomed")?;
        std::os::unix::fs::symlink(fs::canonicalize("keep")?, "doomed/link")?;

        assert!(safe_delete("doomed", &mut ()));
        assert!(!Path::new("doomed").exists());
        assert_eq!(get_contents("keep/precious.txt")?, "keep me");

        Ok(())
    }

    #[sealed_test]
    fn complete_delete_prunes_empty_ancestors() -> anyhow::Result<()> {
        set_contents("archive/x/y/z/module.jar", "jar")?;
        set_contents("archive/other.txt", "other")?;

        let mut recorder = Recorder::default();
        assert!(complete_delete(
            "archive/x/y/z/module.jar",
            Some(Path::new("archive")),
            &mut recorder
        ));

        assert!(!Path::new("archive/x").exists());
        assert!(Path::new("archive").exists());
        assert!(Path::new("archive/other.txt").exists());

        let folders: Vec<_> = recorder.folders.into_iter().map(|(path, _)| path).collect();
        assert_eq!(
            folders,
            vec![
                PathBuf::from("archive/x/y/z"),
                PathBuf::from("archive/x/y"),
                PathBuf::from("archive/x"),
            ]
        );

        Ok(())
    }

    #[sealed_test]
    fn complete_delete_stops_at_non_empty_ancestor() -> anyhow::Result<()> {
        set_contents("archive/x/y/module.jar", "jar")?;
        set_contents("archive/x/sibling.txt", "stay")?;

        assert!(complete_delete(
            "archive/x/y/module.jar",
            Some(Path::new("archive")),
            &mut ()
        ));

        assert!(!Path::new("archive/x/y").exists());
        assert!(Path::new("archive/x/sibling.txt").exists());

        Ok(())
    }

    #[sealed_test]
    fn complete_delete_without_root_prunes_to_non_empty_ancestor() -> anyhow::Result<()> {
        set_contents("outer/inner/file.txt", "data")?;
        set_contents("outer/keep.txt", "keep")?;

        let mut recorder = Recorder::default();
        assert!(complete_delete("outer/inner/file.txt", None, &mut recorder));

        assert!(!Path::new("outer/inner").exists());
        assert!(Path::new("outer/keep.txt").exists());
        assert_eq!(recorder.folders, vec![(PathBuf::from("outer/inner"), true)]);

        Ok(())
    }

    #[sealed_test]
    fn complete_delete_without_root_prunes_until_no_parent() -> anyhow::Result<()> {
        set_contents("outer/inner/file.txt", "data")?;

        assert!(complete_delete("outer/inner/file.txt", None, &mut ()));
        assert!(!Path::new("outer").exists());

        Ok(())
    }

    #[sealed_test]
    fn file_safe_copy_reproduces_tree() -> anyhow::Result<()> {
        set_contents("src/a.txt", "alpha")?;
        set_contents("src/nested/b.txt", "beta")?;
        fs::create_dir_all("src/empty")?;

        let mut recorder = Recorder::default();
        assert!(file_safe_copy("src", "out/dest", &mut recorder));

        assert_eq!(get_contents("out/dest/a.txt")?, "alpha");
        assert_eq!(get_contents("out/dest/nested/b.txt")?, "beta");
        assert!(Path::new("out/dest/empty").is_dir());
        assert_eq!(recorder.copied.len(), 2);
        assert!(recorder.copied.iter().all(|(_, _, ok)| *ok));

        Ok(())
    }

    #[sealed_test]
    fn file_safe_copy_clears_existing_destination() -> anyhow::Result<()> {
        set_contents("src/fresh.txt", "fresh")?;
        set_contents("dest/stale.txt", "stale")?;

        let mut recorder = Recorder::default();
        assert!(file_safe_copy("src", "dest", &mut recorder));

        assert!(!Path::new("dest/stale.txt").exists());
        assert_eq!(get_contents("dest/fresh.txt")?, "fresh");
        assert_eq!(recorder.deleted, vec![(PathBuf::from("dest/stale.txt"), true)]);

        Ok(())
    }

    #[cfg(unix)]
    #[sealed_test]
    fn file_safe_copy_reports_failed_clear() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        set_contents("src/fresh.txt", "fresh")?;
        set_contents("dest/locked/stale.txt", "stale")?;
        fs::set_permissions("dest/locked", fs::Permissions::from_mode(0o555))?;

        // Privileged users ignore directory permissions.
        let privileged = File::create("dest/locked/canary").is_ok();

        let mut collector = ErrorCollector::new();
        let result = file_safe_copy("src", "dest", &mut collector);
        fs::set_permissions("dest/locked", fs::Permissions::from_mode(0o755))?;
        if privileged {
            return Ok(());
        }

        assert!(!result);
        assert!(collector
            .errors()
            .iter()
            .any(|err| matches!(err, Error::Delete { path, .. } if path == Path::new("dest/locked/stale.txt"))));
        assert_eq!(get_contents("dest/fresh.txt")?, "fresh");

        Ok(())
    }

    #[sealed_test]
    fn file_safe_copy_single_file_creates_parents() -> anyhow::Result<()> {
        set_contents("module.war", "war bytes")?;

        assert!(file_safe_copy("module.war", "deploy/apps/module.war", &mut ()));
        assert_eq!(get_contents("deploy/apps/module.war")?, "war bytes");

        Ok(())
    }

    #[sealed_test]
    fn file_safe_copy_missing_source_fails() {
        let mut collector = ErrorCollector::new();
        assert!(!file_safe_copy("missing.war", "deploy/missing.war", &mut collector));
        assert!(collector.has_errors());
        assert!(matches!(
            collector.errors(),
            [Error::Copy { src, .. }] if src == Path::new("missing.war")
        ));
    }

    #[sealed_test]
    fn touch_updates_matching_paths_only() -> anyhow::Result<()> {
        set_contents("root/a.xml", "a")?;
        set_contents("root/b.txt", "b")?;
        set_contents("root/sub/c.xml", "c")?;
        let past = backdate(Path::new("root/a.xml"))?;
        backdate(Path::new("root/b.txt"))?;
        backdate(Path::new("root/sub/c.xml"))?;

        let is_xml = |path: &Path| path.extension().is_some_and(|ext| ext == "xml");
        assert_eq!(touch(is_xml, "root", true)?, 2);

        assert!(fs::metadata("root/a.xml")?.modified()? > past);
        assert!(fs::metadata("root/sub/c.xml")?.modified()? > past);
        assert_eq!(fs::metadata("root/b.txt")?.modified()?, past);

        Ok(())
    }

    #[sealed_test]
    fn touch_without_recurse_visits_root_alone() -> anyhow::Result<()> {
        set_contents("root/a.txt", "a")?;
        let past = backdate(Path::new("root/a.txt"))?;
        backdate(Path::new("root"))?;

        assert_eq!(touch(|_| true, "root", false)?, 1);
        assert!(fs::metadata("root")?.modified()? > past);
        assert_eq!(fs::metadata("root/a.txt")?.modified()?, past);

        assert_eq!(touch(|_| true, "root/a.txt", false)?, 1);
        assert!(fs::metadata("root/a.txt")?.modified()? > past);

        Ok(())
    }

    #[sealed_test]
    fn touch_filter_sees_directories() -> anyhow::Result<()> {
        set_contents("root/sub/a.txt", "a")?;
        let past = backdate(Path::new("root/sub"))?;
        backdate(Path::new("root/sub/a.txt"))?;

        let is_dir = |path: &Path| path.is_dir();
        assert_eq!(touch(is_dir, "root", true)?, 2);

        assert!(fs::metadata("root/sub")?.modified()? > past);
        assert_eq!(fs::metadata("root/sub/a.txt")?.modified()?, past);

        Ok(())
    }

    #[sealed_test]
    fn touch_missing_root_fails() {
        let result = touch(|_| true, "missing", true);
        assert!(matches!(result, Err(Error::Walk { .. })));
    }
}
