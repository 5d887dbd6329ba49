use std::fs::File;
use std::io::{self, Read};
use std::ops::Deref;
use std::path::Path;

use memmap2::{Mmap, MmapOptions};

/// Holds file data — either zero-copy mmap or an owned Vec.
/// Dereferences to `&[u8]` for transparent use.
pub enum FileData {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

impl Deref for FileData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            FileData::Mmap(m) => m,
            FileData::Owned(v) => v,
        }
    }
}

/// Threshold below which we use read() instead of mmap.
/// For files under 1MB the mmap setup/teardown overhead exceeds the
/// zero-copy benefit.
const MMAP_THRESHOLD: u64 = 1024 * 1024;

/// Read a file with zero-copy mmap for large regular files or read() for
/// small and non-regular ones. Falls back to read() if mmap fails.
pub fn read_file(path: &Path) -> io::Result<FileData> {
    let file = File::open(path)?;
    let metadata = file.metadata()?;
    let len = metadata.len();

    if len == 0 {
        return Ok(FileData::Owned(Vec::new()));
    }

    if !metadata.file_type().is_file() {
        // Special files don't report a usable length — plain read.
        let mut buf = Vec::new();
        let mut reader = file;
        reader.read_to_end(&mut buf)?;
        return Ok(FileData::Owned(buf));
    }

    if len < MMAP_THRESHOLD {
        // Exact-size read into a pre-sized buffer, avoiding the
        // grow-and-probe pattern of read_to_end.
        let mut buf = vec![0u8; len as usize];
        let n = read_full(&mut &file, &mut buf)?;
        buf.truncate(n);
        return Ok(FileData::Owned(buf));
    }

    // SAFETY: read-only mapping of a regular file.
    match unsafe { MmapOptions::new().map(&file) } {
        Ok(mmap) => {
            #[cfg(target_os = "linux")]
            {
                let _ = mmap.advise(memmap2::Advice::Sequential);
            }
            Ok(FileData::Mmap(mmap))
        }
        Err(_) => {
            let mut buf = vec![0u8; len as usize];
            let n = read_full(&mut &file, &mut buf)?;
            buf.truncate(n);
            Ok(FileData::Owned(buf))
        }
    }
}

/// Read as many bytes as possible into buf, retrying on partial reads.
/// Regular-file reads usually fill the whole buffer on the first call;
/// the retry loop covers pipes and slow devices.
#[inline]
pub(crate) fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let n = reader.read(buf)?;
    if n == buf.len() || n == 0 {
        return Ok(n);
    }
    let mut total = n;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_read_file_small() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello ascii85").unwrap();
        let data = read_file(tmp.path()).unwrap();
        assert_eq!(&*data, b"hello ascii85");
    }

    #[test]
    fn test_read_file_empty() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let data = read_file(tmp.path()).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn test_read_file_large_uses_mmap() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        let payload: Vec<u8> = (0..2 * 1024 * 1024).map(|i| (i % 256) as u8).collect();
        tmp.write_all(&payload).unwrap();
        let data = read_file(tmp.path()).unwrap();
        assert!(matches!(data, FileData::Mmap(_)));
        assert_eq!(&*data, &payload[..]);
    }

    #[test]
    fn test_read_file_missing() {
        assert!(read_file(Path::new("/nonexistent/ascii85-input")).is_err());
    }
}
