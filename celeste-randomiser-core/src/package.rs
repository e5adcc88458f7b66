use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::{IoResultExt, RandomiserError, Result};

pub const MANIFEST_FILE: &str = "everest.yaml";
pub const MOD_NAME: &str = "Celeste Randomized Textures";
pub const MOD_VERSION: &str = "1.0.0";
pub const LOADER_NAME: &str = "Everest";
pub const LOADER_MIN_VERSION: &str = "1.4961.0";

/// One entry of `everest.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModManifest {
    pub name: String,
    pub version: String,
    pub dependencies: Vec<ModDependency>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModDependency {
    pub name: String,
    pub version: String,
}

impl Default for ModManifest {
    fn default() -> Self {
        Self {
            name: MOD_NAME.to_string(),
            version: MOD_VERSION.to_string(),
            dependencies: vec![ModDependency {
                name: LOADER_NAME.to_string(),
                version: LOADER_MIN_VERSION.to_string(),
            }],
        }
    }
}

/// Writes `everest.yaml` into `mod_folder`. Everest expects a list of mods.
pub fn write_manifest(mod_folder: &Path) -> Result<PathBuf> {
    let path = mod_folder.join(MANIFEST_FILE);
    let yaml = serde_yaml::to_string(&vec![ModManifest::default()])?;
    fs::write(&path, yaml).at(&path)?;
    Ok(path)
}

/// Moves every top-level entry of `from` into `to`. Returns how many moved.
pub fn move_contents(from: &Path, to: &Path) -> Result<usize> {
    let mut moved = 0usize;
    for entry in fs::read_dir(from).at(from)? {
        let entry = entry.at(from)?;
        let source = entry.path();
        let destination = to.join(entry.file_name());
        // `rename` would silently replace an existing file on Unix.
        if fs::symlink_metadata(&destination).is_ok() {
            return Err(RandomiserError::Filesystem {
                path: destination,
                source: io::Error::new(io::ErrorKind::AlreadyExists, "destination already exists"),
            });
        }
        fs::rename(&source, &destination).at(&source)?;
        moved += 1;
    }
    Ok(moved)
}

/// Zips `mod_folder` into `<mod_folder>.zip` beside it, then removes the folder.
///
/// Entry names are relative to the folder, so the archive root holds the
/// manifest and the top-level asset folders.
pub fn package_folder(mod_folder: &Path) -> Result<PathBuf> {
    let archive_path = archive_path_for(mod_folder)?;
    let packaging = |source: ZipError| RandomiserError::Packaging {
        path: archive_path.clone(),
        source,
    };

    let file = fs::File::create(&archive_path).at(&archive_path)?;
    let mut zip = ZipWriter::new(io::BufWriter::new(file));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(mod_folder).sort_by_file_name() {
        let entry = entry.map_err(|e| packaging(ZipError::Io(e.into())))?;
        let relative = match entry.path().strip_prefix(mod_folder) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel,
            _ => continue,
        };
        let name = zip_entry_name(relative);

        if entry.file_type().is_dir() {
            zip.add_directory(name, options).map_err(packaging)?;
        } else {
            zip.start_file(name, options).map_err(packaging)?;
            let mut source = fs::File::open(entry.path()).at(entry.path())?;
            io::copy(&mut source, &mut zip).map_err(|e| packaging(ZipError::Io(e)))?;
        }
    }

    let mut writer = zip.finish().map_err(packaging)?;
    writer.flush().at(&archive_path)?;
    drop(writer);

    fs::remove_dir_all(mod_folder).at(mod_folder)?;
    Ok(archive_path)
}

/// `<parent>/<folder name>.zip`, keeping any dots in the folder name.
fn archive_path_for(mod_folder: &Path) -> Result<PathBuf> {
    let name = mod_folder.file_name().ok_or_else(|| RandomiserError::Filesystem {
        path: mod_folder.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "mod folder has no name"),
    })?;
    let mut archive_name = name.to_os_string();
    archive_name.push(".zip");
    Ok(mod_folder.with_file_name(archive_name))
}

/// Zip entry names always use `/`.
fn zip_entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
