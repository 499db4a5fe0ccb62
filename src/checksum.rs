use crate::hashing::{Digest, HashFormat, Hasher};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, info};

const CHUNK_SIZE: usize = 8192;

#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("File modified during checksumming: {0}")]
    ConcurrentModification(PathBuf),
}

#[derive(Debug, Clone)]
pub struct FileChecksum {
    /// One digest per requested format, in request order.
    pub digests: Vec<Digest>,
    /// Modification time captured after checksumming, in nanoseconds since
    /// the Unix epoch.
    pub mtime_nanos: u64,
    /// File size in bytes.
    pub size: u64,
}

#[cfg(test)]
impl FileChecksum {
    pub fn digest(&self, format: HashFormat) -> Option<&Digest> {
        self.digests.iter().find(|d| d.format() == format)
    }
}

fn map_open_error(path: &Path, e: std::io::Error) -> ChecksumError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        ChecksumError::PermissionDenied(path.to_path_buf())
    } else {
        ChecksumError::Io(e)
    }
}

pub(crate) fn mtime_nanos(mtime: std::time::SystemTime) -> u64 {
    mtime
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Computes digests of a file in every requested format, reading it once.
///
/// # Behavior
/// - Records the file's modification time before reading
/// - Reads the file in fixed-size chunks, feeding every hasher, so memory use
///   does not depend on file size
/// - Verifies the modification time hasn't changed after reading
///
/// # Errors (may be changed in the future)
/// - `ChecksumError::Io`: File doesn't exist or other I/O errors
/// - `ChecksumError::PermissionDenied`: Insufficient permissions to read the file
/// - `ChecksumError::ConcurrentModification`: File was detected as being modified while
///   checksumming. Note that the absence of this error is *not* a guarantee that the
///   file was *not* modified.
pub fn checksum_file(path: &Path, formats: &[HashFormat]) -> Result<FileChecksum, ChecksumError> {
    info!("Checksumming {}", path.display());

    let metadata_before = std::fs::metadata(path).map_err(|e| map_open_error(path, e))?;
    let mtime_before = metadata_before.modified().map_err(ChecksumError::Io)?;

    let mut file = File::open(path).map_err(|e| map_open_error(path, e))?;
    let mut hashers: Vec<Hasher> = formats.iter().map(|&f| Hasher::new(f)).collect();
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(ChecksumError::Io)?;
        if bytes_read == 0 {
            break;
        }
        for hasher in &mut hashers {
            hasher.update(&buffer[..bytes_read]);
        }
    }

    let metadata_after = std::fs::metadata(path).map_err(ChecksumError::Io)?;
    let mtime_after = metadata_after.modified().map_err(ChecksumError::Io)?;

    if mtime_before != mtime_after {
        return Err(ChecksumError::ConcurrentModification(path.to_path_buf()));
    }

    let digests: Vec<Digest> = hashers.into_iter().map(Hasher::finalize).collect();
    for digest in &digests {
        debug!("Checksum of {} is {}", path.display(), digest);
    }

    Ok(FileChecksum {
        digests,
        mtime_nanos: mtime_nanos(mtime_after),
        size: metadata_after.len(),
    })
}

/// Digest of a single file in a single format.
pub fn digest_file(path: &Path, format: HashFormat) -> Result<Digest, ChecksumError> {
    let mut checksum = checksum_file(path, &[format])?;
    checksum
        .digests
        .pop()
        .ok_or_else(|| ChecksumError::Io(std::io::Error::other("no digest produced")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_checksum_simple_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"Hello, world!").unwrap();
        temp_file.flush().unwrap();

        let result = digest_file(temp_file.path(), HashFormat::Sha256).unwrap();

        assert_eq!(
            result.as_str(),
            "315f5bdb76d078c43b8ac0064e4a0164612b1fce77c869345bfc94c75894edd3"
        );
    }

    #[test]
    fn test_checksum_empty_file() {
        let temp_file = NamedTempFile::new().unwrap();

        let result = checksum_file(temp_file.path(), &[HashFormat::Sha256]).unwrap();

        assert_eq!(
            result.digest(HashFormat::Sha256).unwrap().as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(result.size, 0);
    }

    #[test]
    fn test_checksum_all_formats_match_in_memory_digests() {
        let mut temp_file = NamedTempFile::new().unwrap();
        // Spans several chunks and ends mid-chunk.
        let content: Vec<u8> = (0..3 * CHUNK_SIZE + 17).map(|i| (i % 251) as u8).collect();
        temp_file.write_all(&content).unwrap();
        temp_file.flush().unwrap();

        let result = checksum_file(temp_file.path(), &HashFormat::ALL).unwrap();

        assert_eq!(result.digests.len(), HashFormat::ALL.len());
        for format in HashFormat::ALL {
            assert_eq!(
                result.digest(format).unwrap(),
                &format.digest_bytes(&content),
                "{format}"
            );
        }
        assert_eq!(result.size, content.len() as u64);
    }

    #[test]
    fn test_checksum_nonexistent_file() {
        let result = checksum_file(Path::new("/nonexistent/file.txt"), &[HashFormat::Sha256]);

        match result {
            Err(ChecksumError::Io(_)) => {}
            _ => panic!("Expected IO error for nonexistent file"),
        }
    }

    #[test]
    fn test_checksum_deterministic() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"test content").unwrap();
        temp_file.flush().unwrap();

        let result1 = checksum_file(temp_file.path(), &[HashFormat::Xxh3]).unwrap();
        let result2 = checksum_file(temp_file.path(), &[HashFormat::Xxh3]).unwrap();

        assert_eq!(result1.digests, result2.digests);
        assert_eq!(result1.mtime_nanos, result2.mtime_nanos);
    }

    #[test]
    #[cfg(unix)]
    fn test_checksum_permission_denied() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"test content").unwrap();
        temp_file.flush().unwrap();

        let mut perms = fs::metadata(temp_file.path()).unwrap().permissions();
        perms.set_mode(0o000);
        fs::set_permissions(temp_file.path(), perms).unwrap();

        // Root can read regardless of mode bits.
        if fs::File::open(temp_file.path()).is_ok() {
            return;
        }

        let result = checksum_file(temp_file.path(), &[HashFormat::Sha256]);

        match result {
            Err(ChecksumError::PermissionDenied(_)) => {}
            _ => panic!("Expected PermissionDenied error for permission denied"),
        }
    }

    #[test]
    fn test_checksum_concurrent_modification() {
        // Races a background thread that keeps bumping the mtime against the
        // checksum. Non-deterministic, but with a 5MB file and 100 attempts a
        // miss is extremely unlikely.
        use filetime::{FileTime, set_file_mtime};
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::thread;
        use std::time::Duration;

        let mut temp_file = NamedTempFile::new().unwrap();
        let content = vec![b'X'; 5 * 1024 * 1024];
        temp_file.write_all(&content).unwrap();
        temp_file.flush().unwrap();

        let path = temp_file.path().to_path_buf();
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_flag_clone = stop_flag.clone();

        let modifier_handle = thread::spawn(move || {
            let mut counter = 0u64;
            while !stop_flag_clone.load(Ordering::Relaxed) {
                counter = counter.wrapping_add(1);
                let mtime = FileTime::from_unix_time(1_000_000_000 + (counter as i64), 0);
                let _ = set_file_mtime(&path, mtime);
            }
        });

        let mut got_concurrent_modification = false;
        for _ in 0..100 {
            match checksum_file(temp_file.path(), &[HashFormat::Sha256]) {
                Err(ChecksumError::ConcurrentModification(_)) => {
                    got_concurrent_modification = true;
                    break;
                }
                Ok(_) => {
                    thread::sleep(Duration::from_millis(1));
                }
                Err(e) => panic!("Unexpected error: {}", e),
            }
        }

        stop_flag.store(true, Ordering::Relaxed);
        modifier_handle.join().unwrap();

        assert!(
            got_concurrent_modification,
            "Expected to detect concurrent modification at least once in 100 attempts"
        );
    }
}
