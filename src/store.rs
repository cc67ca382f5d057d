//! Directory-backed image enumeration.
//!
//! The store never caches its listing: every advance works on a fresh
//! [`Listing`] snapshot so files dropped into (or removed from) the directory
//! are picked up on the next tick.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::error::{Error, Result};

/// Immutable snapshot of a directory's entry names, in filesystem order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    names: Vec<OsString>,
}

impl Listing {
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&OsStr> {
        self.names.get(index).map(OsString::as_os_str)
    }
}

impl<S: Into<OsString>> FromIterator<S> for Listing {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Position within a listing. Starts at 0; the first advance yields index 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    index: usize,
}

impl Cursor {
    #[must_use]
    pub const fn new() -> Self {
        Self { index: 0 }
    }

    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Step forward over `listing`, wrapping to the first entry once the
    /// cursor sits on (or past) the last one.
    ///
    /// Returns `None` only for an empty listing; the cursor is left untouched.
    pub fn advance<'a>(&mut self, listing: &'a Listing) -> Option<&'a OsStr> {
        self.index = next_index(self.index, listing.len())?;
        listing.get(self.index)
    }
}

/// Cyclic successor of `index` in a listing of `len` entries.
///
/// An index at or beyond `len - 1` resets to 0, which also covers a listing
/// that shrank underneath the cursor.
#[must_use]
pub const fn next_index(index: usize, len: usize) -> Option<usize> {
    if len == 0 {
        None
    } else if index >= len - 1 {
        Some(0)
    } else {
        Some(index + 1)
    }
}

/// Forward-cyclic enumerator over the entries of one directory.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    cursor: Cursor,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cursor: Cursor::new(),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub const fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Read the directory's entry names (non-recursive, unfiltered).
    ///
    /// # Errors
    /// Returns [`Error::StoreUnreadable`] if the directory cannot be read.
    pub fn list(&self) -> Result<Listing> {
        let unreadable = |source| Error::StoreUnreadable {
            path: self.dir.clone(),
            source,
        };
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(unreadable)? {
            names.push(entry.map_err(unreadable)?.file_name());
        }
        trace!(dir = %self.dir.display(), entries = names.len(), "listed image store");
        Ok(Listing { names })
    }

    /// Re-list the directory and advance to the next entry.
    ///
    /// # Errors
    /// Returns [`Error::StoreUnreadable`] if listing fails and
    /// [`Error::NoImages`] if the directory is empty.
    pub fn advance(&mut self) -> Result<PathBuf> {
        let listing = self.list()?;
        self.advance_within(&listing)
    }

    /// Advance over a snapshot the caller already holds.
    ///
    /// # Errors
    /// Returns [`Error::NoImages`] if `listing` is empty.
    pub fn advance_within(&mut self, listing: &Listing) -> Result<PathBuf> {
        let name = self
            .cursor
            .advance(listing)
            .ok_or_else(|| Error::NoImages(self.dir.clone()))?;
        Ok(self.dir.join(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(names: &[&str]) -> Listing {
        names.iter().copied().collect()
    }

    #[test]
    fn advances_from_zero_and_wraps() {
        let names = listing(&["a.jpg", "b.jpg", "c.jpg"]);
        let mut cursor = Cursor::new();
        let seen: Vec<_> = (0..5)
            .map(|_| cursor.advance(&names).unwrap().to_owned())
            .collect();
        assert_eq!(seen, ["b.jpg", "c.jpg", "a.jpg", "b.jpg", "c.jpg"]);
    }

    #[test]
    fn single_entry_repeats() {
        let names = listing(&["only.png"]);
        let mut cursor = Cursor::new();
        for _ in 0..4 {
            assert_eq!(cursor.advance(&names), Some(OsStr::new("only.png")));
            assert_eq!(cursor.index(), 0);
        }
    }

    #[test]
    fn full_cycle_visits_every_index_once() {
        for len in 1..=9 {
            let names: Listing = (0..len).map(|i| format!("{i}.jpg")).collect();
            let mut cursor = Cursor::new();
            let mut hits = vec![0usize; len];
            for _ in 0..len {
                cursor.advance(&names).unwrap();
                hits[cursor.index()] += 1;
            }
            assert!(hits.iter().all(|&n| n == 1), "len {len}: {hits:?}");
        }
    }

    #[test]
    fn empty_listing_leaves_cursor_alone() {
        let mut cursor = Cursor::new();
        cursor.advance(&listing(&["a", "b", "c"])).unwrap();
        assert_eq!(cursor.advance(&Listing::default()), None);
        assert_eq!(cursor.index(), 1);
    }

    #[test]
    fn shrunk_listing_resets_instead_of_overrunning() {
        let mut cursor = Cursor::new();
        let long = listing(&["a", "b", "c", "d"]);
        cursor.advance(&long);
        cursor.advance(&long);
        cursor.advance(&long);
        assert_eq!(cursor.index(), 3);

        let short = listing(&["a", "b"]);
        assert_eq!(cursor.advance(&short), Some(OsStr::new("a")));
        assert_eq!(cursor.index(), 0);
    }

    #[test]
    fn store_reports_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ImageStore::new(dir.path());
        assert!(matches!(store.advance(), Err(Error::NoImages(_))));
    }

    #[test]
    fn store_reports_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ImageStore::new(dir.path().join("missing"));
        assert!(matches!(
            store.advance(),
            Err(Error::StoreUnreadable { .. })
        ));
    }
}
