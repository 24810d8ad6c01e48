//! Remote file server capability.
//!
//! The engine only needs three things from a remote source: move a stateful
//! cursor between directories, list the cursor's directory, and fetch one
//! file as text. [`RemoteIO`] captures exactly that, so traversal code works
//! against any transport. [`FakeRemoteIO`] is the in-memory implementation
//! used by the test suites.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::bail;

// ============================================================================
// Entries
// ============================================================================

/// What a listed name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
}

/// One name in a directory listing, relative to the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub kind: EntryKind,
    pub name: String,
}

impl RemoteEntry {
    #[must_use]
    pub fn dir(name: &str) -> Self {
        Self {
            kind: EntryKind::Dir,
            name: name.to_string(),
        }
    }

    #[must_use]
    pub fn file(name: &str) -> Self {
        Self {
            kind: EntryKind::File,
            name: name.to_string(),
        }
    }
}

// ============================================================================
// RemoteIO
// ============================================================================

/// A connection to a remote file tree with a single movable cursor.
///
/// The cursor starts at the server root. `".."` moves one level up; paths
/// starting with `/` are absolute; anything else is relative to the cursor.
pub trait RemoteIO: Send {
    /// Move the cursor to `path`.
    ///
    /// # Errors
    ///
    /// Fails when `path` does not name a directory.
    fn cwd(&mut self, path: &str) -> anyhow::Result<()>;

    /// List the entries of the cursor's directory.
    ///
    /// # Errors
    ///
    /// Fails when the listing cannot be retrieved.
    fn list(&mut self) -> anyhow::Result<Vec<RemoteEntry>>;

    /// Fetch one file as text, resolved against the cursor.
    ///
    /// # Errors
    ///
    /// Fails when `path` does not name a file.
    fn read_text(&mut self, path: &str) -> anyhow::Result<String>;
}

// ============================================================================
// FakeRemoteIO
// ============================================================================

/// In-memory [`RemoteIO`] backed by a set of absolute paths.
#[derive(Debug, Clone)]
pub struct FakeRemoteIO {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, String>,
    cursor: String,
}

impl Default for FakeRemoteIO {
    fn default() -> Self {
        let mut dirs = BTreeSet::new();
        dirs.insert("/".to_string());
        Self {
            dirs,
            files: BTreeMap::new(),
            cursor: "/".to_string(),
        }
    }
}

impl FakeRemoteIO {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a directory, creating any missing ancestors.
    pub fn add_dir(&mut self, path: &str) {
        let mut acc = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            acc.push('/');
            acc.push_str(part);
            self.dirs.insert(acc.clone());
        }
    }

    /// Register a file with the given text, creating any missing ancestors.
    pub fn add_file(&mut self, path: &str, text: &str) {
        let full = self.resolve(path);
        if let Some(idx) = full.rfind('/') {
            self.add_dir(&full[..idx]);
        }
        self.files.insert(full, text.to_string());
    }

    /// Current cursor position.
    #[must_use]
    pub fn cursor(&self) -> &str {
        &self.cursor
    }

    fn resolve(&self, path: &str) -> String {
        let mut parts: Vec<&str> = if path.starts_with('/') {
            Vec::new()
        } else {
            self.cursor.split('/').filter(|p| !p.is_empty()).collect()
        };
        for part in path.split('/').filter(|p| !p.is_empty()) {
            match part {
                "." => {}
                ".." => {
                    parts.pop();
                }
                other => parts.push(other),
            }
        }
        if parts.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", parts.join("/"))
        }
    }
}

impl RemoteIO for FakeRemoteIO {
    fn cwd(&mut self, path: &str) -> anyhow::Result<()> {
        let target = self.resolve(path);
        if !self.dirs.contains(&target) {
            bail!("no such directory: {target}");
        }
        self.cursor = target;
        Ok(())
    }

    fn list(&mut self) -> anyhow::Result<Vec<RemoteEntry>> {
        let base = if self.cursor == "/" {
            ""
        } else {
            self.cursor.as_str()
        };
        let mut entries = Vec::new();
        for dir in &self.dirs {
            if let Some(name) = child_name(base, dir) {
                entries.push(RemoteEntry::dir(name));
            }
        }
        for file in self.files.keys() {
            if let Some(name) = child_name(base, file) {
                entries.push(RemoteEntry::file(name));
            }
        }
        Ok(entries)
    }

    fn read_text(&mut self, path: &str) -> anyhow::Result<String> {
        let target = self.resolve(path);
        match self.files.get(&target) {
            Some(text) => Ok(text.clone()),
            None => bail!("no such file: {target}"),
        }
    }
}

fn child_name<'a>(base: &str, path: &'a str) -> Option<&'a str> {
    let rest = path.strip_prefix(base)?.strip_prefix('/')?;
    if rest.is_empty() || rest.contains('/') {
        return None;
    }
    Some(rest)
}
