//! best-effort persistence of the shell's line history.
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;

pub(crate) const HISTORY_FILE: &str = ".beanstalk_cli_history";

/// Entries kept in the file; older lines age out on save.
pub(crate) const MAX_HISTORY: usize = 1000;

/// The per-user history file, when a home directory can be resolved.
pub(crate) fn history_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(HISTORY_FILE))
}

/// Lines from earlier sessions. A missing file is a first run, not an
/// error.
pub(crate) async fn load(path: &Path) -> io::Result<Vec<String>> {
    match fs::read_to_string(path).await {
        Ok(text) => Ok(text.lines().map(str::to_owned).collect()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Appends this session's lines to the file, trimming it to its newest
/// `MAX_HISTORY` entries.
pub(crate) async fn append(path: &Path, lines: &[String]) -> io::Result<()> {
    if lines.is_empty() {
        return Ok(());
    }

    let mut all = load(path).await?;
    all.extend(lines.iter().cloned());

    let keep = all.len().saturating_sub(MAX_HISTORY);
    let text: String = all[keep..]
        .iter()
        .map(|line| format!("{line}\n"))
        .collect();

    fs::write(path, text).await
}
