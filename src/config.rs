use crate::{ConvertError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_NAME_MAX_LEN: usize = 80;

/// External subtitle converter, launched as `program prefix_args... <source> ...`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleTool {
    pub program: String,
    pub prefix_args: Vec<String>,
}

impl Default for SubtitleTool {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            prefix_args: vec!["danmaku2ass.py".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleStyle {
    pub font_name: String,
    pub font_size: u32,
    pub opacity: f32,
    /// Seconds a scrolling comment stays on screen.
    pub duration_marquee: u32,
    /// Seconds a fixed comment stays on screen.
    pub duration_still: u32,
    pub extension: String,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_name: "微软雅黑".to_string(),
            font_size: 48,
            opacity: 0.8,
            duration_marquee: 5,
            duration_still: 5,
            extension: "ass".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Explicit merge tool. `None` means auto-discovery.
    pub merge_tool: Option<PathBuf>,
    pub subtitle_tool: SubtitleTool,
    pub subtitle_style: SubtitleStyle,
    pub per_item_folder: bool,
    pub convert_subtitles: bool,
    pub write_sidecar: bool,
    pub output_root: PathBuf,
    /// Worker pool size. `None` means one worker per available CPU.
    pub max_workers: Option<usize>,
    pub name_max_len: usize,
    pub dry_run: bool,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            merge_tool: None,
            subtitle_tool: SubtitleTool::default(),
            subtitle_style: SubtitleStyle::default(),
            per_item_folder: false,
            convert_subtitles: false,
            write_sidecar: false,
            output_root: PathBuf::from("."),
            max_workers: None,
            name_max_len: DEFAULT_NAME_MAX_LEN,
            dry_run: false,
        }
    }
}

impl ConvertConfig {
    pub fn effective_workers(&self) -> usize {
        match self.max_workers {
            Some(n) if n > 0 => n,
            _ => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name_max_len == 0 {
            return Err(ConvertError::Config(
                "name_max_len must be greater than zero".to_string(),
            ));
        }
        if self.convert_subtitles && self.subtitle_tool.program.trim().is_empty() {
            return Err(ConvertError::Config(
                "subtitle conversion requested but subtitle_tool.program is empty".to_string(),
            ));
        }
        if self.output_root.as_os_str().is_empty() {
            return Err(ConvertError::Config("output_root is empty".to_string()));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<ConvertConfig> {
    if !path.exists() {
        return Ok(ConvertConfig::default());
    }
    let bytes = std::fs::read(path)?;
    let parsed: ConvertConfig = serde_json::from_slice(&bytes).map_err(|e| {
        ConvertError::Config(format!(
            "failed to parse config at {}: {e}",
            path.to_string_lossy()
        ))
    })?;
    Ok(parsed)
}

pub fn save_config(path: &Path, config: &ConvertConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}
