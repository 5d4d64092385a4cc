//! Output naming for merged items.
//!
//! Flat layout puts every file directly in the output root; per-item-folder layout
//! creates one folder per collection title.

use crate::config::ConvertConfig;
use crate::metadata::ItemMetadata;
use crate::naming::{display_name, fit_bytes, resolve_title, MAX_NAME_BYTES};
use std::path::PathBuf;

/// Cache type tag of single-part collections; flat names drop the collection title for these.
pub const SINGLE_PART_TYPE_TAG: &str = "64";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    Flat,
    PerItemFolder,
}

impl LayoutMode {
    pub fn from_config(config: &ConvertConfig) -> Self {
        if config.per_item_folder {
            LayoutMode::PerItemFolder
        } else {
            LayoutMode::Flat
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub layout: LayoutMode,
    pub dir: PathBuf,
    /// File name without extension. May contain dots, so never use `set_extension` on it.
    pub stem: String,
    /// Sanitized collection title.
    pub title_name: String,
}

impl OutputTarget {
    pub fn with_extension(&self, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{ext}", self.stem))
    }

    pub fn media_path(&self) -> PathBuf {
        self.with_extension("mp4")
    }

    pub fn sidecar_path(&self) -> PathBuf {
        self.with_extension("nfo")
    }

    pub fn cover_path(&self, ext: &str) -> PathBuf {
        match self.layout {
            LayoutMode::PerItemFolder => self.dir.join(format!("cover.{ext}")),
            LayoutMode::Flat => self.dir.join(format!("{}-cover.{ext}", self.title_name)),
        }
    }

    /// Folder that has to exist before anything is written into it.
    pub fn ensure_dir(&self) -> std::io::Result<()> {
        // `create_dir_all` tolerates concurrent creation of the same folder.
        std::fs::create_dir_all(&self.dir)
    }
}

/// `position` is the 1-based index within the group; `None` when the group has one item.
pub fn output_target(
    config: &ConvertConfig,
    meta: &ItemMetadata,
    position: Option<usize>,
) -> OutputTarget {
    let max_len = config.name_max_len;
    let layout = LayoutMode::from_config(config);
    let title_name = fit_bytes(&display_name(&meta.title, max_len), MAX_NAME_BYTES);
    let part_name = resolve_title(Some(meta), max_len);

    let (dir, base) = match layout {
        LayoutMode::PerItemFolder => (config.output_root.join(&title_name), part_name),
        LayoutMode::Flat => {
            let single_part = meta.type_tag.as_deref() == Some(SINGLE_PART_TYPE_TAG);
            let base = if single_part {
                part_name
            } else {
                format!("{title_name}-{part_name}")
            };
            (config.output_root.clone(), base)
        }
    };

    let base = fit_bytes(&base, MAX_NAME_BYTES);
    let stem = match position {
        Some(n) => format!("{base}-P{n}"),
        None => base,
    };

    OutputTarget {
        layout,
        dir,
        stem,
        title_name,
    }
}
