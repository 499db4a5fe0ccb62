//! Non-recursive directory listing.
//!
//! Lists the immediate children of one directory in byte-wise name order,
//! leaving out the reserved `.treeseal` marker folder. Symbolic links are
//! reported as such and never followed.

use crate::generation_file::MARKER_DIR;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum DirListError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
}

fn map_io(path: &Path, e: std::io::Error) -> DirListError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        DirListError::PermissionDenied(path.to_path_buf())
    } else {
        DirListError::Io(e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEntry {
    /// Name as recorded in generations; lossy for non UTF-8 names.
    pub name: String,
    /// Name as found on disk, for reaching the entry.
    pub file_name: OsString,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    File { size: u64 },
    Dir,
    Symlink,
    /// Sockets, fifos, device nodes.
    Special,
}

pub fn list_directory(dir: &Path) -> Result<Vec<FsEntry>, DirListError> {
    let read_dir = std::fs::read_dir(dir).map_err(|e| map_io(dir, e))?;

    let mut entries = Vec::new();

    for entry in read_dir {
        let entry = entry.map_err(DirListError::Io)?;
        let path = entry.path();

        let file_name = entry.file_name();
        if file_name == MARKER_DIR {
            continue;
        }
        let name = match file_name.to_str() {
            Some(name) => name.to_string(),
            None => {
                let lossy = file_name.to_string_lossy().into_owned();
                warn!("Non UTF-8 file name {}, recording as {}", path.display(), lossy);
                lossy
            }
        };

        let metadata = std::fs::symlink_metadata(&path).map_err(|e| map_io(&path, e))?;
        let file_type = metadata.file_type();

        let kind = if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Dir
        } else if file_type.is_file() {
            EntryKind::File { size: metadata.len() }
        } else {
            EntryKind::Special
        };

        entries.push(FsEntry {
            name,
            file_name,
            kind,
        });
    }

    entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));

    Ok(entries)
}
