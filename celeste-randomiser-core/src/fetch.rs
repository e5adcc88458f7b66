use std::fs;
use std::path::{Path, PathBuf};

use crate::{AssetSource, RandomiserError, Result};

const USER_AGENT: &str = concat!("celeste-randomiser/", env!("CARGO_PKG_VERSION"));

/// Brings the graphics dump into `destination` and returns its local path.
///
/// A remote source is downloaded to `destination/<file_name>`. A local
/// source is copied next to the output so the extractor may delete it.
pub fn fetch_archive(source: &AssetSource, destination: &Path) -> Result<PathBuf> {
    match source {
        AssetSource::Remote { url, file_name } => {
            let target = destination.join(file_name);
            download(url, &target)?;
            Ok(target)
        }
        AssetSource::Local(path) => copy_local(path, destination),
    }
}

fn download(url: &str, target: &Path) -> Result<()> {
    let transfer = |reason: String| RandomiserError::Transfer {
        url: url.to_string(),
        reason,
    };

    log::info!("downloading {url}");
    let client = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| transfer(format!("http client error: {e}")))?;

    let mut resp = client
        .get(url)
        .send()
        .map_err(|e| transfer(format!("request failed: {e}")))?;
    if !resp.status().is_success() {
        return Err(transfer(format!("download status {}", resp.status())));
    }

    let mut file = fs::File::create(target)
        .map_err(|e| transfer(format!("cannot create {}: {e}", target.display())))?;
    let bytes = resp
        .copy_to(&mut file)
        .map_err(|e| transfer(format!("read body failed: {e}")))?;

    log::info!("saved {bytes} bytes to {}", target.display());
    Ok(())
}

fn copy_local(path: &Path, destination: &Path) -> Result<PathBuf> {
    let transfer = |reason: String| RandomiserError::Transfer {
        url: path.display().to_string(),
        reason,
    };

    let file_name = path
        .file_name()
        .ok_or_else(|| transfer("not a file path".to_string()))?;
    let target = destination.join(file_name);

    if target.exists() && fs::canonicalize(path).ok() == fs::canonicalize(&target).ok() {
        return Err(transfer(
            "archive already lives in the output directory and would be deleted".to_string(),
        ));
    }

    log::info!("copying {} to {}", path.display(), target.display());
    fs::copy(path, &target).map_err(|e| transfer(e.to_string()))?;
    Ok(target)
}
