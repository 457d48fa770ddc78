//! Local marker of the last full run, used to refuse a second run on the
//! same day.

use std::fs;
use std::io::Write;
use std::path::Path;

use bot_logging::bot_warn;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::settings::SettingsError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LastRunMarker {
    date: NaiveDate,
}

/// Date of the last recorded full run; unreadable markers count as absent.
pub fn read_last_run(path: &Path) -> Option<NaiveDate> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            bot_warn!("Failed to read last run marker {:?}: {}", path, err);
            return None;
        }
    };
    match ron::from_str::<LastRunMarker>(&content) {
        Ok(marker) => Some(marker.date),
        Err(err) => {
            bot_warn!("Failed to parse last run marker {:?}: {}", path, err);
            None
        }
    }
}

pub fn already_ran_on(path: &Path, today: NaiveDate) -> bool {
    read_last_run(path) == Some(today)
}

/// Atomically replaces the marker with `date`.
pub fn write_last_run(path: &Path, date: NaiveDate) -> Result<(), SettingsError> {
    let write_err = |source| SettingsError::Write {
        path: path.to_path_buf(),
        source,
    };
    let content = ron::ser::to_string_pretty(&LastRunMarker { date }, ron::ser::PrettyConfig::new())
        .map_err(|err| SettingsError::Invalid(err.to_string()))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(content.as_bytes()).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.persist(path).map_err(|err| write_err(err.error))?;
    Ok(())
}
