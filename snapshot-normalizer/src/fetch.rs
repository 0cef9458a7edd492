use std::path::Path;

use tokio::fs;
use tracing::info;

use crate::error::NormalizeError;

/// Make sure a raw snapshot exists at `raw_path`, downloading it from
/// `raw_url` when there is no usable cached copy. A present but empty file
/// counts as missing. No snapshot and no URL is fatal, there is nothing to
/// normalize from.
pub async fn ensure_raw_snapshot(
    raw_path: &str,
    raw_url: Option<&str>,
) -> Result<(), NormalizeError> {
    let path = Path::new(raw_path);
    if let Ok(meta) = fs::metadata(path).await {
        if meta.len() > 0 {
            info!(path = raw_path, "reusing cached raw snapshot");
            return Ok(());
        }
    }

    let url = raw_url.ok_or_else(|| NormalizeError::MissingSource {
        path: raw_path.to_owned(),
    })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    info!(url, "downloading raw snapshot");
    let body = reqwest::get(url).await?.error_for_status()?.bytes().await?;
    fs::write(path, &body).await?;
    info!(path = raw_path, bytes = body.len(), "raw snapshot downloaded");

    Ok(())
}
