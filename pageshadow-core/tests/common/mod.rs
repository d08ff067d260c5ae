//! Common test utilities for integration tests.

#![allow(dead_code)]

use chrono::NaiveDateTime;
use pageshadow_core::interceptor::FaultInterceptor;
use pageshadow_core::journal::{JournalConfig, LogEntry, LogFileName, WriteLogger, process_dir_name};
use pageshadow_core::redirect::{PageRedirector, RemapRebinder};
use pageshadow_core::workspace::Workspace;
use std::path::PathBuf;
use tempfile::TempDir;

/// Content of every demo file.
pub const DEMO: &[u8] = b"------------ Hello World! ------------";

/// The process-wide interceptor, rebinding with `mremap`.
pub fn interceptor() -> &'static FaultInterceptor {
    FaultInterceptor::install(PageRedirector::new(Box::new(RemapRebinder::new())))
        .expect("install interceptor")
}

/// A fresh workspace holding `files/file0` and `files/file1`.
pub fn demo_workspace() -> (TempDir, Workspace) {
    let dir = tempfile::tempdir().unwrap();
    let ws = Workspace::new(dir.path());
    ws.initialize(2, DEMO).unwrap();
    (dir, ws)
}

/// A file of `len` bytes where byte `i` is `i % 251`.
pub fn patterned_file(ws: &Workspace, name: &str, len: usize) -> PathBuf {
    let path = ws.files_dir().join(name);
    let content: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, content).unwrap();
    path
}

/// A logger writing under the workspace's log root as `pid`.
pub fn test_logger(ws: &Workspace, pid: u32) -> WriteLogger {
    WriteLogger::new(
        JournalConfig::default()
            .with_log_root(ws.logs_dir())
            .with_pid(pid)
            .with_sync(false),
    )
}

/// Write a log file by hand: `logs/logs_<pid>/log_<target>_<stamp>.log`.
pub fn write_log(
    ws: &Workspace,
    pid: u32,
    target: &str,
    stamp: &str,
    entries: &[(u64, &[u8])],
) -> PathBuf {
    let timestamp = NaiveDateTime::parse_from_str(stamp, "%Y%m%d_%H%M%S").unwrap();
    let dir = ws.logs_dir().join(process_dir_name(pid));
    std::fs::create_dir_all(&dir).unwrap();

    let path = dir.join(LogFileName::new(target, timestamp).to_string());
    let mut content = Vec::new();
    for (offset, data) in entries {
        content.extend(LogEntry::new(*offset, *data).unwrap().encode());
    }
    std::fs::write(&path, content).unwrap();
    path
}

/// `original` with `writes` applied in order.
pub fn apply_writes(original: &[u8], writes: &[(u64, &[u8])]) -> Vec<u8> {
    let mut expected = original.to_vec();
    for (offset, data) in writes {
        let start = *offset as usize;
        expected[start..start + data.len()].copy_from_slice(data);
    }
    expected
}
