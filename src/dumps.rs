//! Minidumps waiting in the dump directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// File extension Breakpad uses for minidumps.
pub const DUMP_EXTENSION: &str = "dmp";

/// A minidump found on disk.
#[derive(Debug, Clone)]
pub struct DumpInfo {
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

impl DumpInfo {
    /// File name as reported to the crash handler.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Lists `*.dmp` files in `dir`, newest first.
///
/// A missing directory yields an empty list.
pub fn list_dumps<P: AsRef<Path>>(dir: P) -> io::Result<Vec<DumpInfo>> {
    let entries = match fs::read_dir(dir.as_ref()) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut dumps = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(DUMP_EXTENSION) {
            continue;
        }
        // Follows symlinks; dangling links are skipped.
        let metadata = match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => continue,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        dumps.push(DumpInfo {
            path,
            size: metadata.len(),
            modified: metadata.modified()?.into(),
        });
    }

    dumps.sort_by(|a, b| b.modified.cmp(&a.modified));
    Ok(dumps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    #[test]
    fn lists_only_dump_files_newest_first() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("old.dmp");
        let new = dir.path().join("new.dmp");
        fs::write(&old, b"MDMP").unwrap();
        fs::write(&new, b"MDMP\x00\x00").unwrap();
        fs::write(dir.path().join("notes.txt"), b"not a dump").unwrap();
        fs::create_dir(dir.path().join("dir.dmp")).unwrap();

        let past = SystemTime::now() - Duration::from_secs(3600);
        fs::File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(past)
            .unwrap();

        let dumps = list_dumps(dir.path()).unwrap();
        assert_eq!(dumps.len(), 2);
        assert_eq!(dumps[0].name(), "new.dmp");
        assert_eq!(dumps[0].size, 6);
        assert_eq!(dumps[1].name(), "old.dmp");
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_dumps_are_listed() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("real.bin");
        fs::write(&target, b"MDMP").unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("linked.dmp")).unwrap();

        let dumps = list_dumps(dir.path()).unwrap();
        assert_eq!(dumps.len(), 1);
        assert_eq!(dumps[0].name(), "linked.dmp");
        assert_eq!(dumps[0].size, 4);
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let dumps = list_dumps(dir.path().join("nope")).unwrap();
        assert!(dumps.is_empty());
    }
}
