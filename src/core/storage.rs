use crate::error::{Error, Result};
use std::fs as std_fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::fs;

const REPORTS_DIR: &str = "reports";
const REPORT_PREFIX: &str = "report_";
const REPORT_SUFFIX: &str = ".md";

#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub modified: std::time::SystemTime,
}

/// Saved consulting reports under a base directory (`./reports` by default).
pub struct StorageService {
    reports_dir: PathBuf,
}

impl Default for StorageService {
    fn default() -> Self {
        Self::new(REPORTS_DIR)
    }
}

impl StorageService {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
        }
    }

    /// Writes `content` to a fresh timestamped file and returns its path.
    pub async fn save_report(&self, content: &str) -> Result<PathBuf> {
        ensure_directory(&self.reports_dir)?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let mut path = self
            .reports_dir
            .join(format!("{REPORT_PREFIX}{stamp}{REPORT_SUFFIX}"));
        let mut n = 1;
        while fs::try_exists(&path).await? {
            n += 1;
            path = self
                .reports_dir
                .join(format!("{REPORT_PREFIX}{stamp}_{n}{REPORT_SUFFIX}"));
        }

        fs::write(&path, content).await?;
        tracing::info!(path = %path.display(), "report saved");
        Ok(path)
    }

    /// Writes `content` to an explicit path, creating parent directories.
    pub async fn save_report_to(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, content).await?;
        tracing::info!(path = %path.display(), "report saved");
        Ok(())
    }

    /// Saved reports, newest first.
    pub fn list_reports(&self) -> Result<Vec<ReportEntry>> {
        if !self.reports_dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in std_fs::read_dir(&self.reports_dir)? {
            let entry = entry?;
            let path = entry.path();

            if let Some(name) = path.file_name().and_then(|n| n.to_str())
                && name.starts_with(REPORT_PREFIX)
                && name.ends_with(REPORT_SUFFIX)
            {
                let metadata = entry.metadata()?;
                files.push(ReportEntry {
                    path: path.clone(),
                    name: name.to_string(),
                    size: metadata.len(),
                    modified: metadata.modified()?,
                });
            }
        }

        files.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.name.cmp(&a.name)));

        Ok(files)
    }
}

fn ensure_directory(path: &Path) -> Result<()> {
    std_fs::create_dir_all(path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let metadata = std_fs::metadata(path)?;
        let mut permissions = metadata.permissions();
        if permissions.mode() & 0o777 != 0o700 {
            permissions.set_mode(0o700);
            std_fs::set_permissions(path, permissions)?;
        }
    }

    if !path.is_dir() {
        return Err(Error::custom(format!(
            "{} exists but is not a directory",
            path.display()
        )));
    }

    Ok(())
}
