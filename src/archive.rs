use crate::errors::ExtractionError;
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// Suffix of the payload entry the destination accepts.
pub const FIT_EXTENSION: &str = ".fit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPayload {
    pub entry_name: String,
    pub bytes: Vec<u8>,
}

/// Pull the first entry whose name ends with `extension` (case-sensitive) out of a zip
/// archive, in archive order. Directory entries are skipped; nothing else about the
/// entry name is assumed.
pub fn extract_payload(archive: &[u8], extension: &str) -> Result<ExtractedPayload, ExtractionError> {
    let mut zip = ZipArchive::new(Cursor::new(archive))
        .map_err(|e| ExtractionError::InvalidArchive(e.to_string()))?;

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|e| ExtractionError::Read {
            entry: format!("#{index}"),
            detail: e.to_string(),
        })?;

        if entry.is_dir() || !entry.name().ends_with(extension) {
            continue;
        }

        let entry_name = entry.name().to_string();
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| ExtractionError::Read {
                entry: entry_name.clone(),
                detail: e.to_string(),
            })?;

        if bytes.is_empty() {
            return Err(ExtractionError::EmptyPayload { entry: entry_name });
        }

        return Ok(ExtractedPayload { entry_name, bytes });
    }

    Err(ExtractionError::NoPayload)
}
