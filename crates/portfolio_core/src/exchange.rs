//! JSON import and export.
//!
//! Exports use the same pretty-printed current-schema JSON every store
//! writes, so an export can be imported again or dropped in as a data file.

use std::path::{Path, PathBuf};

use crate::error::{PortfolioError, Result};
use crate::fs::FileSystem;
use crate::migrate::parse_document;
use crate::model::PortfolioDocument;
use crate::store::encode_document;

/// Default name of an exported backup.
pub const EXPORT_FILE_NAME: &str = "portfolio-data.json";

/// Parse an exported (or legacy) payload.
pub fn import_json(text: &str) -> Result<PortfolioDocument> {
    let doc = parse_document(text)?;
    log::info!(
        "Imported {} topics with {} entries",
        doc.topics.len(),
        doc.entry_count()
    );
    Ok(doc)
}

pub fn export_json(doc: &PortfolioDocument) -> Result<String> {
    encode_document(doc)
}

/// Write `<dir>/portfolio-data.json` and return its path.
pub fn export_to<FS: FileSystem + ?Sized>(
    fs: &FS,
    dir: &Path,
    doc: &PortfolioDocument,
) -> Result<PathBuf> {
    let path = dir.join(EXPORT_FILE_NAME);
    let text = export_json(doc)?;
    fs.create_dir_all(dir)?;
    fs.write_file(&path, &text)
        .map_err(|source| PortfolioError::FileWrite {
            path: path.clone(),
            source,
        })?;
    log::info!("Exported portfolio to {}", path.display());
    Ok(path)
}
