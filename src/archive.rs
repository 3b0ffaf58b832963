use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{CorpusError, Result};
use crate::validator::SyntaxValidator;

/// Upper bound on the buffer reserved up front for one entry. The declared
/// size comes from the archive and is not trusted beyond this.
const MAX_PREALLOCATION: u64 = 1 << 20;

/// One file (or directory) stored in an archive
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Slash separated path, starting with the archive's wrapper directory
    pub path: String,
    pub content: Vec<u8>,
}

/// Walks the entries of an in-memory archive in stored order
pub trait ArchiveReader: Send + Sync {
    fn for_each_entry(
        &self,
        archive: &[u8],
        visit: &mut dyn FnMut(ArchiveEntry) -> Result<()>,
    ) -> Result<()>;
}

/// [`ArchiveReader`] for zip archives, the format GitHub serves
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiveReader;

impl ArchiveReader for ZipArchiveReader {
    fn for_each_entry(
        &self,
        archive: &[u8],
        visit: &mut dyn FnMut(ArchiveEntry) -> Result<()>,
    ) -> Result<()> {
        let mut zip = zip::ZipArchive::new(Cursor::new(archive))
            .map_err(|e| CorpusError::Archive(format!("failed to read ZIP archive: {}", e)))?;

        for index in 0..zip.len() {
            let entry = {
                let mut file = zip.by_index(index).map_err(|e| {
                    CorpusError::Archive(format!("failed to read ZIP entry {}: {}", index, e))
                })?;
                let mut content = Vec::with_capacity(entry_capacity(file.size()));
                file.read_to_end(&mut content).map_err(|e| {
                    CorpusError::Archive(format!("failed to extract {}: {}", file.name(), e))
                })?;
                ArchiveEntry {
                    path: file.name().to_string(),
                    content,
                }
            };
            visit(entry)?;
        }

        Ok(())
    }
}

fn entry_capacity(declared_size: u64) -> usize {
    declared_size.min(MAX_PREALLOCATION) as usize
}

/// Path of an entry below the wrapper directory, e.g. `pkg-master/src/a.py` -> `src/a.py`.
///
/// Entries with nothing below the wrapper, or with `.`/`..` segments, are malformed.
pub fn mirrored_path(entry_path: &str) -> Result<PathBuf> {
    let malformed = || CorpusError::MalformedArchiveEntry {
        path: entry_path.to_string(),
    };

    let mut path = PathBuf::new();
    for segment in entry_path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .skip(1)
    {
        if segment == "." || segment == ".." || segment.contains('\\') {
            return Err(malformed());
        }
        path.push(segment);
    }

    if path.as_os_str().is_empty() {
        return Err(malformed());
    }
    Ok(path)
}

/// Copies the entries of an archive that pass a [`SyntaxValidator`] into a
/// directory tree, dropping the archive's wrapper directory.
#[derive(Clone)]
pub struct ArchiveFilter {
    reader: Arc<dyn ArchiveReader>,
    validator: Arc<dyn SyntaxValidator>,
}

impl ArchiveFilter {
    pub fn new(reader: Arc<dyn ArchiveReader>, validator: Arc<dyn SyntaxValidator>) -> Self {
        Self { reader, validator }
    }

    /// Zip archives checked by `validator`
    pub fn zip(validator: impl SyntaxValidator + 'static) -> Self {
        Self::new(Arc::new(ZipArchiveReader), Arc::new(validator))
    }

    /// Write every non-empty, valid entry under `destination_root` and return
    /// how many files were written. Existing files are overwritten.
    pub fn extract_valid(&self, archive: &[u8], destination_root: &Path) -> Result<usize> {
        let mut written = 0;
        self.reader.for_each_entry(archive, &mut |entry: ArchiveEntry| {
            if self.keep_entry(&entry, destination_root)? {
                written += 1;
            }
            Ok(())
        })?;

        info!(
            "Kept {} valid files under {}",
            written,
            destination_root.display()
        );
        Ok(written)
    }

    fn keep_entry(&self, entry: &ArchiveEntry, destination_root: &Path) -> Result<bool> {
        if entry.content.is_empty() {
            return Ok(false);
        }

        let relative = match mirrored_path(&entry.path) {
            Ok(relative) => relative,
            Err(e) => {
                debug!("Skipping entry: {}", e);
                return Ok(false);
            }
        };

        if !self.validator.parses(&entry.content)? {
            debug!("Dropping {}: does not parse", entry.path);
            return Ok(false);
        }

        let target = destination_root.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CorpusError::io(parent, e))?;
        }
        std::fs::write(&target, &entry.content).map_err(|e| CorpusError::io(&target, e))?;

        debug!("Wrote {}", target.display());
        Ok(true)
    }
}
