//! Write the event collection to its published location.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use eventfeed_shared::{EventCollection, EventFeedError, Result};

/// What was written by [`publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub path: PathBuf,
    pub size_bytes: usize,
    pub sha256: String,
    pub event_count: usize,
}

/// Serialize `collection` as pretty JSON and replace the file at `path`.
///
/// The bytes go to a hidden sibling first and are renamed over the target,
/// so readers never see a partial file.
#[instrument(skip_all, fields(path = %path.display(), events = collection.len()))]
pub fn publish(collection: &EventCollection, path: &Path) -> Result<PublishReport> {
    let json = serde_json::to_string_pretty(collection)
        .map_err(|e| EventFeedError::validation(format!("JSON serialization failed: {e}")))?;

    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        std::fs::create_dir_all(parent).map_err(|e| EventFeedError::io(parent, e))?;
    }

    let filename = path
        .file_name()
        .ok_or_else(|| EventFeedError::config(format!("output path {} has no file name", path.display())))?;
    let temp = path.with_file_name(format!(".{}.tmp", filename.to_string_lossy()));

    std::fs::write(&temp, &json).map_err(|e| EventFeedError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| EventFeedError::io(path, e))?;
    debug!(temp = %temp.display(), "renamed into place");

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    let sha256 = format!("{:x}", hasher.finalize());

    let report = PublishReport {
        path: path.to_path_buf(),
        size_bytes: json.len(),
        sha256,
        event_count: collection.len(),
    };

    info!(size = report.size_bytes, sha256 = %report.sha256, "events published");
    Ok(report)
}
