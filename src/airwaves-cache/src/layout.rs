//! Deterministic mapping from episode ids to cache paths.

use airwaves_core::EpisodeId;
use std::path::{Path, PathBuf};

pub const EPISODES_DIR: &str = "episodes";
pub const AUDIO_EXTENSION: &str = "audio";
pub const TEMP_SUFFIX: &str = ".tmp";

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
///
/// Ids that differ only in replaced characters share a file name.
pub fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn episodes_dir(&self) -> PathBuf {
        self.root.join(EPISODES_DIR)
    }

    /// `<root>/episodes/<sanitized-id>.audio`
    pub fn episode_path(&self, id: &EpisodeId) -> PathBuf {
        self.episodes_dir()
            .join(format!("{}.{AUDIO_EXTENSION}", sanitize_id(id.as_str())))
    }
}

/// Sibling path a download is staged at before being renamed into place.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}

pub fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(&format!(".{AUDIO_EXTENSION}{TEMP_SUFFIX}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_unsafe_characters() {
        assert_eq!(sanitize_id("123456"), "123456");
        assert_eq!(sanitize_id("a-b_c"), "a-b_c");
        assert_eq!(sanitize_id("../../etc/passwd"), "______etc_passwd");
        assert_eq!(sanitize_id("ep 1:2"), "ep_1_2");
        assert_eq!(sanitize_id("åäö"), "___");
    }

    #[test]
    fn episode_path_is_under_episodes_dir() {
        let layout = CacheLayout::new("/var/cache/airwaves");
        let path = layout.episode_path(&EpisodeId::new("2264815"));
        assert_eq!(
            path,
            PathBuf::from("/var/cache/airwaves/episodes/2264815.audio")
        );
    }

    #[test]
    fn traversal_cannot_escape_root() {
        let layout = CacheLayout::new("/cache");
        let path = layout.episode_path(&EpisodeId::new("../secret"));
        assert_eq!(path.parent(), Some(Path::new("/cache/episodes")));
    }

    #[test]
    fn temp_path_is_a_sibling() {
        let path = PathBuf::from("/cache/episodes/7.audio");
        let temp = temp_path_for(&path);
        assert_eq!(temp, PathBuf::from("/cache/episodes/7.audio.tmp"));
        assert!(is_temp_file(&temp));
        assert!(!is_temp_file(&path));
    }
}
