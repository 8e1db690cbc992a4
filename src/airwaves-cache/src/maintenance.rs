//! Housekeeping for the episodes directory.
//!
//! Expired files are never deleted by the serving path (they stay usable as a
//! stale fallback), so disk usage is managed here instead.

use crate::layout::{is_temp_file, CacheLayout, AUDIO_EXTENSION};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MaintenanceError {
    #[error("failed to read cache directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type MaintenanceResult<T> = Result<T, MaintenanceError>;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub total_size: u64,
    pub file_count: u64,
    pub oldest_file: Option<SystemTime>,
    pub newest_file: Option<SystemTime>,
}

#[derive(Debug, Clone)]
pub struct CacheMaintenance {
    layout: CacheLayout,
}

struct Entry {
    path: PathBuf,
    modified: SystemTime,
    size: u64,
    temp: bool,
}

impl CacheMaintenance {
    pub fn new(layout: CacheLayout) -> Self {
        Self { layout }
    }

    /// Usage of published audio files; staging files are not counted.
    pub fn stats(&self) -> MaintenanceResult<CacheStats> {
        let entries: Vec<_> = self.entries()?.into_iter().filter(|e| !e.temp).collect();
        Ok(CacheStats {
            total_size: entries.iter().map(|e| e.size).sum(),
            file_count: entries.len() as u64,
            oldest_file: entries.iter().map(|e| e.modified).min(),
            newest_file: entries.iter().map(|e| e.modified).max(),
        })
    }

    /// Remove staging files untouched for at least `min_age`.
    ///
    /// Run at startup to clear leftovers from a crash mid-download; `min_age`
    /// keeps a concurrently running process's downloads intact.
    pub fn sweep_temp_files(&self, min_age: Duration) -> MaintenanceResult<Vec<PathBuf>> {
        let now = SystemTime::now();
        let stale: Vec<_> = self
            .entries()?
            .into_iter()
            .filter(|e| e.temp && age(now, e.modified) >= min_age)
            .collect();
        Ok(remove_all(stale, "removed leftover partial download"))
    }

    /// Delete published files older than `max_age`.
    pub fn prune(&self, max_age: Duration) -> MaintenanceResult<Vec<PathBuf>> {
        let now = SystemTime::now();
        let expired: Vec<_> = self
            .entries()?
            .into_iter()
            .filter(|e| !e.temp && age(now, e.modified) > max_age)
            .collect();
        Ok(remove_all(expired, "pruned expired cache file"))
    }

    fn entries(&self) -> MaintenanceResult<Vec<Entry>> {
        let dir = self.layout.episodes_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir)
            .map_err(|source| MaintenanceError::ReadDir {
                path: dir.clone(),
                source,
            })?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                let metadata = entry.metadata().ok()?;
                if !metadata.is_file() {
                    return None;
                }
                let temp = is_temp_file(&path);
                if !temp && !has_audio_extension(&path) {
                    return None;
                }
                Some(Entry {
                    modified: metadata.modified().ok()?,
                    size: metadata.len(),
                    path,
                    temp,
                })
            })
            .collect();
        Ok(entries)
    }
}

fn has_audio_extension(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(AUDIO_EXTENSION)
}

fn age(now: SystemTime, modified: SystemTime) -> Duration {
    now.duration_since(modified).unwrap_or_default()
}

fn remove_all(entries: Vec<Entry>, what: &str) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    for entry in entries {
        match fs::remove_file(&entry.path) {
            Ok(()) => {
                tracing::info!(path = %entry.path.display(), bytes = entry.size, "{what}");
                removed.push(entry.path);
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %entry.path.display(), "failed to remove cache file")
            }
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};

    fn write_aged(path: &Path, contents: &[u8], age: Duration) {
        fs::write(path, contents).unwrap();
        let mtime = SystemTime::now() - age;
        set_file_mtime(path, FileTime::from_system_time(mtime)).unwrap();
    }

    fn setup() -> (tempfile::TempDir, CacheMaintenance, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let layout = CacheLayout::new(dir.path());
        let episodes = layout.episodes_dir();
        fs::create_dir_all(&episodes).unwrap();
        (dir, CacheMaintenance::new(layout), episodes)
    }

    #[test]
    fn stats_ignore_temp_and_foreign_files() {
        let (_dir, maintenance, episodes) = setup();
        fs::write(episodes.join("1.audio"), b"1234").unwrap();
        fs::write(episodes.join("2.audio"), b"123456").unwrap();
        fs::write(episodes.join("3.audio.tmp"), b"partial").unwrap();
        fs::write(episodes.join("notes.txt"), b"x").unwrap();

        let stats = maintenance.stats().unwrap();
        assert_eq!(stats.file_count, 2);
        assert_eq!(stats.total_size, 10);
        assert!(stats.oldest_file.is_some());
    }

    #[test]
    fn stats_on_missing_directory_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let maintenance = CacheMaintenance::new(CacheLayout::new(dir.path().join("absent")));
        assert_eq!(maintenance.stats().unwrap(), CacheStats::default());
    }

    #[test]
    fn sweep_only_removes_old_temp_files() {
        let (_dir, maintenance, episodes) = setup();
        write_aged(
            &episodes.join("1.audio.tmp"),
            b"old",
            Duration::from_secs(7200),
        );
        write_aged(&episodes.join("2.audio.tmp"), b"new", Duration::ZERO);
        write_aged(&episodes.join("3.audio"), b"done", Duration::from_secs(7200));

        let removed = maintenance
            .sweep_temp_files(Duration::from_secs(3600))
            .unwrap();

        assert_eq!(removed, vec![episodes.join("1.audio.tmp")]);
        assert!(episodes.join("2.audio.tmp").exists());
        assert!(episodes.join("3.audio").exists());
    }

    #[test]
    fn prune_removes_expired_audio() {
        let (_dir, maintenance, episodes) = setup();
        write_aged(
            &episodes.join("old.audio"),
            b"old",
            Duration::from_secs(10 * 24 * 3600),
        );
        write_aged(&episodes.join("new.audio"), b"new", Duration::from_secs(60));

        let removed = maintenance
            .prune(Duration::from_secs(7 * 24 * 3600))
            .unwrap();

        assert_eq!(removed, vec![episodes.join("old.audio")]);
        assert!(episodes.join("new.audio").exists());
    }
}
