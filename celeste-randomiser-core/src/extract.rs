use std::fs;
use std::io;
use std::path::Path;

use zip::result::ZipError;
use zip::ZipArchive;

use crate::{IoResultExt, RandomiserError, Result};

/// Extracts every entry of `archive` into `target`, then deletes `archive`.
///
/// Returns the number of files written. Nothing is rolled back on error.
pub fn extract_archive(archive: &Path, target: &Path) -> Result<usize> {
    let extraction = |source: ZipError| RandomiserError::Extraction {
        path: archive.to_path_buf(),
        source,
    };

    let file = fs::File::open(archive).map_err(|e| extraction(ZipError::Io(e)))?;
    let mut zip = ZipArchive::new(io::BufReader::new(file)).map_err(extraction)?;

    fs::create_dir_all(target).at(target)?;

    let mut written = 0usize;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(extraction)?;
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            log::warn!("skipping unsafe zip entry {:?}", entry.name());
            continue;
        };

        let out_path = target.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&out_path).at(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }

        let mut out_file = fs::File::create(&out_path).at(&out_path)?;
        io::copy(&mut entry, &mut out_file).map_err(|e| extraction(ZipError::Io(e)))?;
        written += 1;
    }

    drop(zip);
    fs::remove_file(archive).at(archive)?;
    Ok(written)
}
