//! Byte container for input file data.
//!
//! The aggregation engine addresses the whole input as one immutable byte
//! range. This type provides that view, backed by either an mmap (production)
//! or owned in-memory bytes (tests and synthetic inputs), so the splitter and
//! workers never care which one they are reading.
//!
//! Clones are cheap: the underlying bytes are reference-counted and treated
//! as immutable for the lifetime of any `BytesView`. No thread ever writes to
//! the mapping, so concurrent readers need no coordination.

use std::fs::File;
use std::sync::Arc;

use memmap2::Mmap;

use crate::errors::OpenError;

/// Read-only byte view over the input file.
#[derive(Clone, Debug)]
pub struct BytesView {
    inner: BytesInner,
}

#[derive(Clone, Debug)]
enum BytesInner {
    Mmap(Arc<Mmap>),
    Owned(Arc<[u8]>),
}

impl BytesView {
    /// Opens and memory-maps the file at `path`.
    ///
    /// Zero-length files are represented as owned empty bytes rather than a
    /// mapping: mapping an empty file fails on some platforms, and an empty
    /// input is a valid (if trivial) aggregation run.
    pub fn map_path(path: &std::path::Path) -> Result<Self, OpenError> {
        let file = File::open(path).map_err(OpenError::Io)?;
        let meta = file.metadata().map_err(OpenError::Io)?;
        if !meta.is_file() {
            return Err(OpenError::NotAFile);
        }
        if meta.len() == 0 {
            return Ok(Self::from_vec(Vec::new()));
        }

        // SAFETY: the input file is treated as immutable for the duration of
        // the run; the engine never writes through the mapping.
        let mmap = unsafe { Mmap::map(&file).map_err(OpenError::Io)? };
        advise_sequential(&file, &mmap);

        Ok(Self {
            inner: BytesInner::Mmap(Arc::new(mmap)),
        })
    }

    /// Wrap shared, in-memory bytes.
    #[must_use]
    pub fn from_arc(bytes: Arc<[u8]>) -> Self {
        Self {
            inner: BytesInner::Owned(bytes),
        }
    }

    /// Wrap owned bytes.
    #[must_use]
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self::from_arc(Arc::from(bytes))
    }

    /// Returns the underlying bytes as a slice.
    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        match &self.inner {
            BytesInner::Mmap(mmap) => mmap.as_ref(),
            BytesInner::Owned(bytes) => bytes.as_ref(),
        }
    }

    /// Returns the length of the byte view.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Returns true if the view is empty.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl AsRef<[u8]> for BytesView {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// Hints the kernel that the mapping will be read front to back.
///
/// Both calls are advisory; errors are silently ignored.
#[cfg(unix)]
fn advise_sequential(file: &File, mapped: &Mmap) {
    use std::os::fd::AsRawFd;

    // SAFETY: the file descriptor is valid for the duration of `fadvise`,
    // and the mmap pointer/length are valid for `madvise`.
    unsafe {
        #[cfg(target_os = "linux")]
        let _ = libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_SEQUENTIAL);
        #[cfg(not(target_os = "linux"))]
        let _ = file;
        let _ = libc::madvise(
            mapped.as_ptr() as *mut libc::c_void,
            mapped.len(),
            libc::MADV_SEQUENTIAL,
        );
    }
}

#[cfg(not(unix))]
fn advise_sequential(_file: &File, _mapped: &Mmap) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn owned_bytes_round_trip() {
        let view = BytesView::from_vec(vec![1u8, 2, 3]);
        assert_eq!(view.len(), 3);
        assert_eq!(view.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn maps_regular_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"Berlin;5.5\n").unwrap();
        tmp.flush().unwrap();

        let view = BytesView::map_path(tmp.path()).unwrap();
        assert_eq!(view.as_slice(), b"Berlin;5.5\n");
    }

    #[test]
    fn empty_file_maps_to_empty_view() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let view = BytesView::map_path(tmp.path()).unwrap();
        assert!(view.is_empty());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = BytesView::map_path(std::path::Path::new("/nonexistent/input.txt")).unwrap_err();
        match err {
            OpenError::Io(io) => assert_eq!(io.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn directory_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = BytesView::map_path(dir.path()).unwrap_err();
        assert!(matches!(err, OpenError::NotAFile));
    }
}
