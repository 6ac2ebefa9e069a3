//! Reading and rewriting parts of the zip package.

use std::io::{Cursor, Read, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::RevisionError;

pub(crate) const DOCUMENT_PART: &str = "word/document.xml";

/// Local file header magic that every zip package starts with.
pub const ZIP_SIGNATURE: &[u8; 4] = b"PK\x03\x04";

pub fn has_zip_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_SIGNATURE)
}

/// Read one part of the package as UTF-8 text.
pub(crate) fn read_part(package: &[u8], name: &'static str) -> Result<String, RevisionError> {
    let mut archive = ZipArchive::new(Cursor::new(package))?;
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Err(RevisionError::MissingPart(name)),
        Err(e) => return Err(e.into()),
    };
    let mut raw = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut raw)?;
    Ok(std::str::from_utf8(&raw)?.to_string())
}

/// Copy the package, swapping the contents of `name`.
///
/// Every other entry keeps its name, order, compression method and
/// timestamp; the replaced part is deflated.
pub(crate) fn replace_part(
    package: &[u8],
    name: &str,
    contents: &[u8],
) -> Result<Vec<u8>, RevisionError> {
    rewrite(package, name, contents).map_err(|e| RevisionError::Serialization(e.to_string()))
}

fn rewrite(package: &[u8], name: &str, contents: &[u8]) -> zip::result::ZipResult<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(package))?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(package.len())));

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let entry_name = file.name().to_string();
        let options = FileOptions::default()
            .compression_method(file.compression())
            .last_modified_time(file.last_modified());

        if file.is_dir() {
            writer.add_directory(entry_name, options)?;
            continue;
        }

        if entry_name == name {
            writer.start_file(
                entry_name,
                options.compression_method(CompressionMethod::Deflated),
            )?;
            writer.write_all(contents)?;
        } else {
            let mut buf = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut buf)?;
            writer.start_file(entry_name, options)?;
            writer.write_all(&buf)?;
        }
    }

    Ok(writer.finish()?.into_inner())
}
