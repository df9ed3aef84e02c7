//! CBZ archive packaging.
//!
//! An episode's pages become one deflate-compressed zip whose entries are
//! named `<name>_page_NNN.jpg`, numbered from `001` in page order.

use std::io::{Cursor, Write};

use thiserror::Error;
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::catalog::PageImage;

/// Packaging failures. All of them are fatal to a batch.
#[derive(Debug, Error)]
pub enum PackageError {
    /// No pages were supplied.
    #[error("no pages to package for {name}")]
    NoPages {
        /// Archive name.
        name: String,
    },

    /// The zip writer refused a new entry.
    #[error("error creating archive entry {entry}: {source}")]
    Entry {
        /// Entry name.
        entry: String,
        /// Underlying zip error.
        #[source]
        source: zip::result::ZipError,
    },

    /// Writing page bytes failed.
    #[error("error writing image data for {entry}: {source}")]
    Write {
        /// Entry name.
        entry: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The writer accepted fewer bytes than the page holds.
    #[error("incomplete write for {entry}: wrote {written} of {expected} bytes")]
    Incomplete {
        /// Entry name.
        entry: String,
        /// Bytes accepted.
        written: usize,
        /// Bytes in the page.
        expected: usize,
    },

    /// Finalizing the central directory failed.
    #[error("error closing archive {name}: {source}")]
    Finish {
        /// Archive name.
        name: String,
        /// Underlying zip error.
        #[source]
        source: zip::result::ZipError,
    },

    /// The finished archive had no bytes.
    #[error("created archive {name} is empty")]
    EmptyArchive {
        /// Archive name.
        name: String,
    },
}

/// Entry name for the page at 0-based `index`.
///
/// ```
/// assert_eq!(courier_core::archive::entry_name("Chapter 3", 4), "Chapter 3_page_005.jpg");
/// ```
#[must_use]
pub fn entry_name(name: &str, index: usize) -> String {
    format!("{name}_page_{:03}.jpg", index + 1)
}

/// Builds an in-memory CBZ from `pages`, in slice order.
///
/// # Errors
///
/// Returns [`PackageError`] when `pages` is empty, an entry cannot be
/// created or fully written, or the finished archive is empty.
pub fn build_archive(name: &str, pages: &[PageImage]) -> Result<Vec<u8>, PackageError> {
    if pages.is_empty() {
        return Err(PackageError::NoPages {
            name: name.to_string(),
        });
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (position, page) in pages.iter().enumerate() {
        let entry = entry_name(name, position);
        writer
            .start_file(entry.as_str(), options)
            .map_err(|source| PackageError::Entry {
                entry: entry.clone(),
                source,
            })?;
        write_entry(&mut writer, &entry, &page.bytes)?;
    }

    let bytes = writer
        .finish()
        .map_err(|source| PackageError::Finish {
            name: name.to_string(),
            source,
        })?
        .into_inner();

    if bytes.is_empty() {
        return Err(PackageError::EmptyArchive {
            name: name.to_string(),
        });
    }
    debug!(name, pages = pages.len(), bytes = bytes.len(), "archive built");
    Ok(bytes)
}

/// Writes `data` in full, reporting how far a stalled writer got.
fn write_entry<W: Write>(writer: &mut W, entry: &str, data: &[u8]) -> Result<(), PackageError> {
    let mut written = 0;
    while written < data.len() {
        let n = writer
            .write(&data[written..])
            .map_err(|source| PackageError::Write {
                entry: entry.to_string(),
                source,
            })?;
        if n == 0 {
            return Err(PackageError::Incomplete {
                entry: entry.to_string(),
                written,
                expected: data.len(),
            });
        }
        written += n;
    }
    Ok(())
}
