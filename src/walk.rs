//! Recursive traversal of a remote file tree.
//!
//! [`RemoteTreeWalker`] drives a [`RemoteIO`] cursor through every directory
//! reachable from the server root and records one listing per directory, in
//! pre-order. Selection is a separate step: [`RemoteTreeWalker::get_files`]
//! filters the recorded listings down to the sorted set of full file paths
//! the engine will import.

use regex::Regex;

use crate::remote::{EntryKind, RemoteIO};

/// One visited directory: its full path plus the names listed inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirListing {
    pub path: String,
    pub dirs: Vec<String>,
    pub files: Vec<String>,
}

/// Depth-first walker over a remote tree.
pub struct RemoteTreeWalker<'a> {
    remote: &'a mut dyn RemoteIO,
}

impl<'a> RemoteTreeWalker<'a> {
    #[must_use]
    pub fn new(remote: &'a mut dyn RemoteIO) -> Self {
        Self { remote }
    }

    /// Visit every directory under the root and return their listings in
    /// pre-order. The cursor is stepped back up after each subtree so the
    /// connection ends where it started.
    ///
    /// # Errors
    ///
    /// Fails when the remote refuses a cursor move or a listing.
    pub fn walk(&mut self) -> anyhow::Result<Vec<DirListing>> {
        let mut listings = Vec::new();
        self.descend("/", &mut listings)?;
        Ok(listings)
    }

    /// Walk the tree and keep the files whose directory matches
    /// `dir_pattern` and whose name matches `file_pattern`, both as prefix
    /// matches. Returns full paths in lexicographic order.
    ///
    /// # Errors
    ///
    /// Fails when the underlying walk fails.
    pub fn get_files(
        &mut self,
        dir_pattern: &Regex,
        file_pattern: &Regex,
    ) -> anyhow::Result<Vec<String>> {
        let mut selected = Vec::new();
        for listing in self.walk()? {
            if !dir_pattern.is_match(&listing.path) {
                continue;
            }
            for name in &listing.files {
                if file_pattern.is_match(name) {
                    selected.push(join(&listing.path, name));
                }
            }
        }
        selected.sort();
        Ok(selected)
    }

    fn descend(&mut self, path: &str, listings: &mut Vec<DirListing>) -> anyhow::Result<()> {
        let (dirs, files) = self.listdir(path)?;
        listings.push(DirListing {
            path: path.to_string(),
            dirs: dirs.clone(),
            files,
        });
        for name in &dirs {
            self.descend(&join(path, name), listings)?;
            self.remote.cwd("..")?;
        }
        Ok(())
    }

    fn listdir(&mut self, path: &str) -> anyhow::Result<(Vec<String>, Vec<String>)> {
        self.remote.cwd(path)?;
        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for entry in self.remote.list()? {
            match entry.kind {
                EntryKind::Dir => dirs.push(entry.name),
                EntryKind::File => files.push(entry.name),
            }
        }
        Ok((dirs, files))
    }
}

fn join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}
