//! Backup store: byte-exact snapshots taken immediately before a file is
//! overwritten.
//!
//! A backup of `config.json` taken at 2024-05-01 12:00:00 UTC is written as
//! `config.json.20240501T120000.bak`, next to the original or inside the
//! configured backup directory. When that name is taken, a counter is added
//! (`config.json.20240501T120000.1.bak`). Backups are created with
//! `create_new` and never overwritten or pruned.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::config::Settings;
use crate::files::atomic_write;
use crate::{Error, Result};

/// Timestamp layout used in backup file names
const STAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Extension shared by every backup file
const BACKUP_EXT: &str = "bak";

/// Give up after this many same-second collisions
const MAX_COLLISIONS: u32 = 1000;

/// A persisted snapshot of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    /// The file that was backed up
    pub original: PathBuf,
    /// Where the snapshot was written
    pub backup: PathBuf,
    /// Exact bytes of the original at backup time
    pub content: Vec<u8>,
    /// When the snapshot was taken
    pub created_at: DateTime<Utc>,
}

/// An existing backup found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    /// Collision counter; 0 for the first backup in a given second
    pub sequence: u32,
}

/// Writes and finds backups.
#[derive(Debug, Clone, Default)]
pub struct BackupStore {
    dir: Option<PathBuf>,
}

impl BackupStore {
    /// Store backups in `dir`, or next to each original when `None`.
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.backup_dir.clone())
    }

    /// Directory that holds backups of `original`.
    fn dir_for(&self, original: &Path) -> PathBuf {
        match &self.dir {
            Some(dir) => dir.clone(),
            None => match original.parent() {
                Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                _ => PathBuf::from("."),
            },
        }
    }

    /// Leading part of every backup name for `original`.
    ///
    /// In a shared backup directory the full path is encoded so that
    /// `a/config.json` and `b/config.json` do not mix.
    fn stem_for(&self, original: &Path) -> String {
        match &self.dir {
            None => original
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "file".to_string()),
            Some(_) => {
                let absolute =
                    std::path::absolute(original).unwrap_or_else(|_| original.to_path_buf());
                absolute
                    .to_string_lossy()
                    .replace(['/', '\\', ':'], "_")
                    .trim_start_matches('_')
                    .to_string()
            }
        }
    }

    /// Snapshot `content` (the current bytes of `original`).
    pub fn backup(&self, original: &Path, content: &[u8]) -> Result<BackupRecord> {
        self.backup_at(original, content, Utc::now())
    }

    fn backup_at(
        &self,
        original: &Path,
        content: &[u8],
        now: DateTime<Utc>,
    ) -> Result<BackupRecord> {
        let failed = |source: io::Error| Error::BackupFailed {
            path: original.to_path_buf(),
            source,
        };

        let dir = self.dir_for(original);
        if self.dir.is_some() {
            fs::create_dir_all(&dir).map_err(failed)?;
        }

        let stem = self.stem_for(original);
        let stamp = now.format(STAMP_FORMAT).to_string();

        for sequence in 0..MAX_COLLISIONS {
            let name = if sequence == 0 {
                format!("{}.{}.{}", stem, stamp, BACKUP_EXT)
            } else {
                format!("{}.{}.{}.{}", stem, stamp, sequence, BACKUP_EXT)
            };
            let path = dir.join(name);

            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(failed(e)),
            };

            if let Err(e) = file.write_all(content).and_then(|_| file.sync_all()) {
                drop(file);
                let _ = fs::remove_file(&path);
                return Err(failed(e));
            }

            tracing::info!(original = %original.display(), backup = %path.display(), bytes = content.len(), "backup written");
            return Ok(BackupRecord {
                original: original.to_path_buf(),
                backup: path,
                content: content.to_vec(),
                created_at: now,
            });
        }

        Err(failed(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "too many backups within one second",
        )))
    }

    /// Existing backups of `original`, oldest first.
    pub fn list(&self, original: &Path) -> Result<Vec<BackupEntry>> {
        let dir = self.dir_for(original);
        let prefix = format!("{}.", self.stem_for(original));

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::from_io(&dir, e)),
        };

        let mut backups: Vec<BackupEntry> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                let rest = name.strip_prefix(&prefix)?;
                let (created_at, sequence) = parse_suffix(rest)?;
                Some(BackupEntry {
                    path: e.path(),
                    created_at,
                    sequence,
                })
            })
            .collect();

        backups.sort_by(|a, b| (a.created_at, a.sequence).cmp(&(b.created_at, b.sequence)));
        Ok(backups)
    }

    /// The newest backup of `original`, if any.
    pub fn latest(&self, original: &Path) -> Result<Option<BackupEntry>> {
        Ok(self.list(original)?.pop())
    }

    /// Write the bytes of `backup` back over `target`.
    ///
    /// This does not snapshot the current `target` first; go through the
    /// edit applier for that.
    pub fn restore(&self, backup: &Path, target: &Path) -> Result<()> {
        let content = fs::read(backup).map_err(|e| Error::from_io(backup, e))?;
        atomic_write(target, &content).map_err(|e| Error::from_io(target, e))?;
        tracing::info!(backup = %backup.display(), target = %target.display(), "backup restored");
        Ok(())
    }
}

/// Parse `<stamp>.bak` or `<stamp>.<n>.bak`.
fn parse_suffix(rest: &str) -> Option<(DateTime<Utc>, u32)> {
    let rest = rest.strip_suffix(&format!(".{}", BACKUP_EXT))?;
    let (stamp, sequence) = match rest.split_once('.') {
        Some((stamp, n)) => (stamp, n.parse().ok()?),
        None => (rest, 0),
    };
    let naive = NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).ok()?;
    Some((naive.and_utc(), sequence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestEnv;
    use chrono::TimeZone;

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, secs).unwrap()
    }

    #[test]
    fn test_backup_next_to_original() {
        let env = TestEnv::new();
        let original = env.write("config.json", r#"{"a":1}"#);
        let store = BackupStore::default();

        let record = store.backup_at(&original, br#"{"a":1}"#, at(0)).unwrap();

        assert_eq!(
            record.backup.file_name().unwrap(),
            "config.json.20240501T120000.bak"
        );
        assert_eq!(fs::read(&record.backup).unwrap(), br#"{"a":1}"#);
        assert_eq!(record.content, br#"{"a":1}"#);
    }

    #[test]
    fn test_same_second_backups_get_counter() {
        let env = TestEnv::new();
        let original = env.write("a.txt", "v1");
        let store = BackupStore::default();

        let first = store.backup_at(&original, b"v1", at(0)).unwrap();
        let second = store.backup_at(&original, b"v2", at(0)).unwrap();
        let third = store.backup_at(&original, b"v3", at(0)).unwrap();

        assert_ne!(first.backup, second.backup);
        assert_eq!(
            second.backup.file_name().unwrap(),
            "a.txt.20240501T120000.1.bak"
        );
        assert_eq!(
            third.backup.file_name().unwrap(),
            "a.txt.20240501T120000.2.bak"
        );
        assert_eq!(fs::read(&first.backup).unwrap(), b"v1");
    }

    #[test]
    fn test_list_sorted_oldest_first() {
        let env = TestEnv::new();
        let original = env.write("a.txt", "x");
        env.write("a.txt.notes", "not a backup");
        env.write("b.txt.20240501T120000.bak", "other file");
        let store = BackupStore::default();

        store.backup_at(&original, b"2", at(5)).unwrap();
        store.backup_at(&original, b"1", at(1)).unwrap();
        store.backup_at(&original, b"3", at(5)).unwrap();

        let list = store.list(&original).unwrap();
        let contents: Vec<Vec<u8>> = list.iter().map(|e| fs::read(&e.path).unwrap()).collect();
        assert_eq!(contents, vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]);
        assert_eq!(list[2].sequence, 1);

        let latest = store.latest(&original).unwrap().unwrap();
        assert_eq!(fs::read(latest.path).unwrap(), b"3");
    }

    #[test]
    fn test_backup_dir_encodes_full_path() {
        let env = TestEnv::new();
        fs::create_dir(env.path().join("one")).unwrap();
        fs::create_dir(env.path().join("two")).unwrap();
        let a = env.path().join("one").join("config.json");
        let b = env.path().join("two").join("config.json");
        fs::write(&a, "a").unwrap();
        fs::write(&b, "b").unwrap();

        let store = BackupStore::new(Some(env.path().join("backups")));
        store.backup_at(&a, b"a", at(0)).unwrap();
        store.backup_at(&b, b"b", at(0)).unwrap();

        assert_eq!(store.list(&a).unwrap().len(), 1);
        assert_eq!(store.list(&b).unwrap().len(), 1);
        assert_eq!(fs::read_dir(env.path().join("backups")).unwrap().count(), 2);
    }

    #[test]
    fn test_backup_failure_reports_and_leaves_nothing() {
        let env = TestEnv::new();
        let original = env.write("a.txt", "keep");
        // A regular file where the backup directory should be
        let blocker = env.write("backups", "");
        let store = BackupStore::new(Some(blocker));

        let err = store.backup(&original, b"keep").unwrap_err();

        assert!(matches!(err, Error::BackupFailed { .. }));
        assert_eq!(env.read("a.txt"), "keep");
        assert_eq!(env.entries(), vec!["a.txt".to_string(), "backups".to_string()]);
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let env = TestEnv::new();
        let store = BackupStore::new(Some(env.path().join("nope")));
        assert!(store.list(&env.path().join("a.txt")).unwrap().is_empty());
    }

    #[test]
    fn test_restore_writes_backup_bytes() {
        let env = TestEnv::new();
        let original = env.write("a.txt", "old");
        let store = BackupStore::default();
        let record = store.backup(&original, b"old").unwrap();
        fs::write(&original, "new").unwrap();

        store.restore(&record.backup, &original).unwrap();

        assert_eq!(env.read("a.txt"), "old");
    }

    #[test]
    fn test_restore_missing_backup() {
        let env = TestEnv::new();
        let store = BackupStore::default();
        let err = store
            .restore(&env.path().join("gone.bak"), &env.path().join("a.txt"))
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[test]
    fn test_parse_suffix() {
        assert_eq!(parse_suffix("20240501T120000.bak"), Some((at(0), 0)));
        assert_eq!(parse_suffix("20240501T120000.7.bak"), Some((at(0), 7)));
        assert_eq!(parse_suffix("garbage.bak"), None);
        assert_eq!(parse_suffix("20240501T120000.txt"), None);
    }
}
