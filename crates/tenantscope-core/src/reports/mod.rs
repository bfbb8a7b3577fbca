//! Report builders: CSV exports and PowerShell remediation scripts.

pub mod csv;
pub mod powershell;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

pub use self::csv::{
    devices_csv, groups_csv, json_csv, licenses_csv, secure_score_actions_csv, sites_csv,
    users_csv, CsvTable,
};
pub use powershell::{build_script, RemediationAction};

/// Write a generated report, creating parent directories as needed.
pub fn write_report(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), bytes = contents.len(), "Report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_report_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exports/2024/users.csv");
        write_report(&path, "\"a\"\r\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "\"a\"\r\n");
    }
}
