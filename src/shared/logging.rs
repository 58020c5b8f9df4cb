use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn session_log_path(state_root: &Path) -> PathBuf {
    state_root.join("logs/session.log")
}

pub fn append_session_log_line(state_root: &Path, line: &str) -> std::io::Result<()> {
    let path = session_log_path(state_root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;
    writeln!(file, "{line}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn appends_lines_and_creates_parent_directories() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("state");
        append_session_log_line(&root, "first").expect("append");
        append_session_log_line(&root, "second").expect("append");
        let body = fs::read_to_string(session_log_path(&root)).expect("read log");
        assert_eq!(body, "first\nsecond\n");
    }
}
