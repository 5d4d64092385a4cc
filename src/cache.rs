//! Locating item directories and fragment files inside a download cache.
//!
//! Cache layouts differ between client versions (flat files, quality-numbered
//! subfolders, legacy segment folders), so fragments are matched by file-name
//! substring anywhere below the item directory.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub const DESCRIPTOR_FRAGMENT: &str = "entry.json";
pub const VIDEO_FRAGMENT: &str = "video.m4s";
pub const AUDIO_FRAGMENT: &str = "audio.m4s";
pub const SUBTITLE_SOURCE_FRAGMENT: &str = "danmaku.xml";
/// Legacy FLV-segment caches store video as `0.blv`, `1.blv`, ...
pub const ALTERNATE_VIDEO_FRAGMENT: &str = ".blv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentSet {
    Absent,
    Single(PathBuf),
    /// More than one match, in discovery order.
    Multiple(Vec<PathBuf>),
}

impl FragmentSet {
    fn from_matches(mut matches: Vec<PathBuf>) -> Self {
        match matches.len() {
            0 => FragmentSet::Absent,
            1 => FragmentSet::Single(matches.remove(0)),
            _ => FragmentSet::Multiple(matches),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, FragmentSet::Absent)
    }

    pub fn first(&self) -> Option<&Path> {
        match self {
            FragmentSet::Absent => None,
            FragmentSet::Single(p) => Some(p.as_path()),
            FragmentSet::Multiple(list) => list.first().map(PathBuf::as_path),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FragmentSet::Absent => 0,
            FragmentSet::Single(_) => 1,
            FragmentSet::Multiple(list) => list.len(),
        }
    }

    pub fn into_paths(self) -> Vec<PathBuf> {
        match self {
            FragmentSet::Absent => Vec::new(),
            FragmentSet::Single(p) => vec![p],
            FragmentSet::Multiple(list) => list,
        }
    }
}

/// Immediate subdirectories of `root`, ordered by [`compare_dir_names`].
///
/// A missing or unreadable root is logged and yields an empty list.
pub fn list_item_directories(root: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(root) {
        Ok(v) => v,
        Err(e) => {
            warn!(root = %root.display(), error = %e, "cache directory not readable, skipping");
            return Vec::new();
        }
    };

    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort_by(|a, b| compare_dir_names(a, b));
    dirs
}

/// Numeric directory names sort by value and before non-numeric ones; the rest sort by name.
/// Cache folders are usually part or episode ids, so this keeps `-P{n}` numbering stable.
pub fn compare_dir_names(a: &Path, b: &Path) -> Ordering {
    let name_a = a.file_name().map(|s| s.to_string_lossy()).unwrap_or_default();
    let name_b = b.file_name().map(|s| s.to_string_lossy()).unwrap_or_default();
    match (name_a.parse::<u64>(), name_b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| name_a.cmp(&name_b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => name_a.cmp(&name_b),
    }
}

/// Recursively finds files under `item_dir` whose name contains `name_contains`.
pub fn find_fragment(item_dir: &Path, name_contains: &str) -> FragmentSet {
    let mut matches = Vec::new();
    for entry in WalkDir::new(item_dir)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(v) => v,
            Err(e) => {
                debug!(item = %item_dir.display(), error = %e, "skipping unreadable cache entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().contains(name_contains) {
            matches.push(entry.into_path());
        }
    }
    FragmentSet::from_matches(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdir");
        }
        std::fs::write(path, b"x").expect("write");
    }

    #[test]
    fn find_fragment_distinguishes_absent_single_multiple() {
        let dir = tempfile::tempdir().expect("tempdir");
        let item = dir.path();
        touch(&item.join("entry.json"));
        touch(&item.join("80").join("video.m4s"));
        touch(&item.join("lua.flv.bili2api.64").join("0.blv"));
        touch(&item.join("lua.flv.bili2api.64").join("1.blv"));

        assert_eq!(find_fragment(item, AUDIO_FRAGMENT), FragmentSet::Absent);
        assert_eq!(
            find_fragment(item, VIDEO_FRAGMENT),
            FragmentSet::Single(item.join("80").join("video.m4s"))
        );
        assert_eq!(
            find_fragment(item, ALTERNATE_VIDEO_FRAGMENT),
            FragmentSet::Multiple(vec![
                item.join("lua.flv.bili2api.64").join("0.blv"),
                item.join("lua.flv.bili2api.64").join("1.blv"),
            ])
        );
    }

    #[test]
    fn substring_match_ignores_directory_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(&dir.path().join("video.m4s.d").join("index.txt"));
        assert!(find_fragment(dir.path(), VIDEO_FRAGMENT).is_absent());
    }

    #[test]
    fn list_item_directories_skips_files_and_orders_numerically() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["10", "2", "c_99", "1"] {
            std::fs::create_dir(dir.path().join(name)).expect("mkdir");
        }
        touch(&dir.path().join("stray.txt"));

        let names: Vec<String> = list_item_directories(dir.path())
            .iter()
            .map(|p| p.file_name().expect("name").to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["1", "2", "10", "c_99"]);
    }

    #[test]
    fn missing_root_yields_empty_list() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(list_item_directories(&dir.path().join("absent")).is_empty());
    }

    #[test]
    fn fragment_set_accessors() {
        let multi = FragmentSet::Multiple(vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert_eq!(multi.len(), 2);
        assert_eq!(multi.first(), Some(Path::new("a")));
        assert_eq!(FragmentSet::Absent.into_paths(), Vec::<PathBuf>::new());
    }
}
