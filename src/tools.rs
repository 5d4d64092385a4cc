use crate::config::ConvertConfig;
use crate::{cmd, ConvertError, Result};
use std::path::PathBuf;
use std::process::Stdio;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct MergeTool {
    pub path: PathBuf,
    pub version: Option<String>,
}

/// Picks the merge tool: the configured path when set, otherwise the `ffmpeg-sidecar`
/// location (a bundled binary beside the executable, else `ffmpeg` on the search path).
pub fn merge_tool_candidate(config: &ConvertConfig) -> PathBuf {
    match &config.merge_tool {
        Some(path) if !path.as_os_str().is_empty() => path.clone(),
        _ => ffmpeg_sidecar::paths::ffmpeg_path(),
    }
}

/// Resolves and probes the merge tool. A tool that cannot be started is fatal for the run.
pub fn resolve_merge_tool(config: &ConvertConfig) -> Result<MergeTool> {
    let path = merge_tool_candidate(config);
    if config.dry_run {
        debug!(tool = %path.display(), "dry run, skipping merge tool probe");
        return Ok(MergeTool {
            path,
            version: None,
        });
    }

    let version = tool_version_first_line(&path).ok_or_else(|| ConvertError::ExternalToolMissing {
        tool: path.to_string_lossy().to_string(),
    })?;
    info!(tool = %path.display(), version = %version, "merge tool ready");
    Ok(MergeTool {
        path,
        version: Some(version),
    })
}

fn tool_version_first_line(program: impl AsRef<std::ffi::OsStr>) -> Option<String> {
    let output = cmd::command(program)
        .arg("-version")
        .stdout(Stdio::piped())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    let first = text.lines().next()?.trim();
    if first.is_empty() {
        return None;
    }
    Some(first.to_string())
}
