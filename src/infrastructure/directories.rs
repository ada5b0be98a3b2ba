use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};

use crate::config::DirectoryConfig;

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub logs_dir: PathBuf,
    pub data_dir: PathBuf,
    pub report_path: PathBuf,
}

/// Creates the log and data directories up front so a bad path fails at
/// startup rather than when the report is written on exit.
pub fn ensure_directories(cfg: &DirectoryConfig) -> Result<ResolvedPaths> {
    let logs_dir = ensure_dir(&cfg.logs_dir)?;
    let data_dir = ensure_dir(&cfg.data_dir)?;
    let report_path = report_path(&data_dir, &cfg.report_filename)?;

    let scratch = data_dir.join(".feed-guard-write");
    fs::write(&scratch, b"ok")
        .with_context(|| format!("data directory {} is not writable", data_dir.display()))?;
    fs::remove_file(&scratch)?;
    Ok(ResolvedPaths {
        logs_dir,
        data_dir,
        report_path,
    })
}

fn ensure_dir(path: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(path);
    fs::create_dir_all(&dir).with_context(|| format!("failed to create directory {path}"))?;
    Ok(dir.canonicalize().unwrap_or(dir))
}

// The report always lands directly inside the data directory.
fn report_path(data_dir: &Path, filename: &str) -> Result<PathBuf> {
    let name = Path::new(filename);
    if name.file_name() != Some(name.as_os_str()) {
        bail!("REPORT_FILENAME must be a plain file name, got {filename:?}");
    }
    Ok(data_dir.join(name))
}
