//! Fake git binaries for process tests

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use super::{Git, GitBinary};

/// ETXTBSY: another test thread forked while the script was open for writing
const TEXT_FILE_BUSY: i32 = 26;

/// Write `body` as an executable shell script at `path`
pub(crate) fn write_script(path: &Path, body: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();

    // Run it once so later spawns cannot race a leaked write handle
    for _ in 0..50 {
        match std::process::Command::new(path)
            .arg("__warmup")
            .stdin(std::process::Stdio::null())
            .output()
        {
            Err(e) if e.raw_os_error() == Some(TEXT_FILE_BUSY) => {
                std::thread::sleep(Duration::from_millis(10));
            }
            _ => return,
        }
    }
}

/// Write `body` as a fake git in `dir` and return a handle on it
pub(crate) fn fake_git(dir: &Path, body: &str) -> Git {
    let path = dir.join("fake-git");
    write_script(&path, body);

    Git::new(GitBinary {
        path,
        version: "0.0.0-test".to_string(),
    })
}
