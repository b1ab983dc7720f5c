//! Byte sources: anything with a name, a length, and byte-range reads.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A raw book file the pipeline can slice by byte range.
pub trait ByteSource: Send {
    /// File name, used for book name / author inference.
    fn name(&self) -> &str;

    /// Total length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read `range`, clamped to the source length.
    fn read_range(&self, range: Range<u64>) -> std::io::Result<Vec<u8>>;
}

/// A file on disk. Reads seek the shared handle, so a source is used by one
/// session at a time.
pub struct FileSource {
    path: PathBuf,
    name: String,
    len: u64,
    file: Mutex<File>,
}

impl FileSource {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();
        Ok(Self {
            path: path.to_path_buf(),
            name,
            len,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn read_range(&self, range: Range<u64>) -> std::io::Result<Vec<u8>> {
        let start = range.start.min(self.len);
        let end = range.end.clamp(start, self.len);
        let mut file = self
            .file
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "file handle poisoned"))?;
        file.seek(SeekFrom::Start(start))?;
        let mut buf = vec![0u8; (end - start) as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// An in-memory book, e.g. bytes handed over from a browser `File`.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

impl ByteSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_range(&self, range: Range<u64>) -> std::io::Result<Vec<u8>> {
        let len = self.data.len();
        let start = (range.start as usize).min(len);
        let end = (range.end as usize).clamp(start, len);
        Ok(self.data[start..end].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_clamps_ranges() {
        let src = MemorySource::new("a.txt", b"hello".to_vec());
        assert_eq!(src.len(), 5);
        assert_eq!(src.read_range(1..3).unwrap(), b"el");
        assert_eq!(src.read_range(3..100).unwrap(), b"lo");
        assert!(src.read_range(10..20).unwrap().is_empty());
    }

    #[test]
    fn file_source_reads_slices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.txt");
        std::fs::write(&path, b"0123456789").unwrap();
        let src = FileSource::open(&path).unwrap();
        assert_eq!(src.name(), "book.txt");
        assert_eq!(src.len(), 10);
        assert_eq!(src.read_range(2..5).unwrap(), b"234");
        assert_eq!(src.read_range(8..50).unwrap(), b"89");
    }
}
