//! On-disk tile tree laid out as `{root}/{zoom}/{x}/{y}.png`.
//!
//! An empty leaf is a placeholder waiting to be fetched. A non-empty leaf is
//! fetched content. Leaves are never deleted.

use std::cmp::Ordering;
use std::ffi::OsStr;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::StoreError;
use crate::slippy::TileId;

const TILE_SUFFIX: &str = ".png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState {
    Placeholder,
    Fetched { bytes: u64 },
}

impl TileState {
    fn from_len(len: u64) -> Self {
        if len == 0 {
            TileState::Placeholder
        } else {
            TileState::Fetched { bytes: len }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileEntry {
    pub tile: TileId,
    pub path: PathBuf,
    pub state: TileState,
}

#[derive(Debug, Clone)]
pub struct TileStore {
    root: PathBuf,
}

impl TileStore {
    /// Opens an existing tree, failing if `root` cannot be listed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        match fs::read_dir(&root) {
            Ok(_) => Ok(TileStore { root }),
            Err(source) => Err(StoreError::RootInaccessible { path: root, source }),
        }
    }

    /// Creates `root` if it is missing, then opens it.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        if let Err(source) = fs::create_dir_all(&root) {
            return Err(StoreError::RootInaccessible { path: root, source });
        }
        TileStore::open(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, tile: TileId) -> PathBuf {
        self.root.join(relative_path(tile))
    }

    pub fn exists(&self, tile: TileId) -> bool {
        self.path_for(tile).is_file()
    }

    pub fn state(&self, tile: TileId) -> Result<Option<TileState>, StoreError> {
        let path = self.path_for(tile);
        match fs::metadata(&path) {
            Ok(metadata) => Ok(Some(TileState::from_len(metadata.len()))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    /// Creates an empty leaf for `tile` unless one is already there.
    ///
    /// Returns `true` when a new placeholder was written.
    pub fn create_placeholder(&self, tile: TileId) -> Result<bool, StoreError> {
        let path = self.path_for(tile);
        create_parent(&path)?;
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => {
                debug!(path = %path.display(), "created placeholder");
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    /// Replaces the leaf for `tile` with `bytes`.
    ///
    /// The content goes to a sibling temp file first and is renamed into
    /// place, so an interrupted write leaves the previous leaf intact.
    pub fn write(&self, tile: TileId, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(tile);
        create_parent(&path)?;
        let temp_path = path.with_extension("png.part");
        let io_err = |source| StoreError::Io {
            path: temp_path.clone(),
            source,
        };
        let mut file = fs::File::create(&temp_path).map_err(io_err)?;
        file.write_all(bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);
        fs::rename(&temp_path, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })
    }

    /// Lazily walks every leaf currently on disk, ordered numerically by
    /// zoom, then x, then y. Each call walks the disk again.
    pub fn enumerate(&self) -> impl Iterator<Item = Result<TileEntry, StoreError>> {
        WalkDir::new(&self.root)
            .max_depth(3)
            .sort_by(numeric_order)
            .into_iter()
            .filter_entry(is_tile_path)
            .filter_map(|entry| match entry {
                Ok(entry) if entry.depth() == 3 => to_tile_entry(&entry).map(Ok),
                Ok(_) => None,
                Err(err) => Some(Err(StoreError::Walk(err))),
            })
    }
}

fn create_parent(path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: parent.to_path_buf(),
            source,
        }),
        None => Ok(()),
    }
}

/// Directories are named by their number, leaves by `{number}.png`.
fn parse_name<T: FromStr>(name: &OsStr, is_leaf: bool) -> Option<T> {
    let name = name.to_str()?;
    let name = if is_leaf {
        name.strip_suffix(TILE_SUFFIX)?
    } else {
        name
    };
    name.parse().ok()
}

fn numeric_key(entry: &DirEntry) -> Option<u64> {
    parse_name(entry.file_name(), entry.file_type().is_file())
}

fn numeric_order(a: &DirEntry, b: &DirEntry) -> Ordering {
    match (numeric_key(a), numeric_key(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.file_name().cmp(b.file_name()),
    }
}

fn is_tile_path(entry: &DirEntry) -> bool {
    match entry.depth() {
        0 => true,
        1 | 2 => entry.file_type().is_dir() && numeric_key(entry).is_some(),
        _ => entry.file_type().is_file() && numeric_key(entry).is_some(),
    }
}

fn relative_path(tile: TileId) -> PathBuf {
    Path::new(&tile.zoom.to_string())
        .join(tile.x.to_string())
        .join(format!("{}{}", tile.y, TILE_SUFFIX))
}

fn to_tile_entry(entry: &DirEntry) -> Option<TileEntry> {
    let path = entry.path();
    let x_dir = path.parent()?;
    let zoom_dir = x_dir.parent()?;
    let tile = TileId::new(
        parse_name(zoom_dir.file_name()?, false)?,
        parse_name(x_dir.file_name()?, false)?,
        parse_name(path.file_name()?, true)?,
    );
    let axis = 1_u64 << tile.zoom.min(63);
    if u64::from(tile.x) >= axis || u64::from(tile.y) >= axis {
        warn!(path = %path.display(), "skipping leaf outside its zoom level");
        return None;
    }
    // `09/150/0200.png` parses to a tile whose writes land elsewhere.
    if !path.ends_with(relative_path(tile)) {
        warn!(path = %path.display(), "skipping leaf with non-canonical name");
        return None;
    }
    let len = match entry.metadata() {
        Ok(metadata) => metadata.len(),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "skipping unreadable leaf");
            return None;
        }
    };
    Some(TileEntry {
        tile,
        path: path.to_path_buf(),
        state: TileState::from_len(len),
    })
}
