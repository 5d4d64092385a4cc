//! Turns cache item directories into external-tool invocations.

use crate::cache::{self, FragmentSet};
use crate::config::ConvertConfig;
use crate::metadata::{self, ItemMetadata};
use crate::paths::{self, OutputTarget};
use crate::sidecar::{self, SidecarReport};
use crate::{ConvertError, Result};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Pixel size passed to the subtitle converter when the descriptor has none.
const FALLBACK_DIMENSIONS: (u32, u32) = (1920, 1080);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Merge,
    Subtitle,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Merge => "merge",
            JobKind::Subtitle => "subtitle",
        }
    }
}

/// One external process: program plus argument vector, never passed through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub kind: JobKind,
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub output: PathBuf,
}

impl Invocation {
    /// Number of `-i <input>` pairs.
    pub fn input_count(&self) -> usize {
        self.args.iter().filter(|a| a.as_os_str() == "-i").count()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            if arg.contains(char::is_whitespace) || arg.is_empty() {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PlannedJob {
    pub item_dir: PathBuf,
    pub target: OutputTarget,
    pub invocations: Vec<Invocation>,
    pub sidecar: Option<SidecarReport>,
}

#[derive(Debug, Default)]
pub struct GroupPlan {
    pub group_dir: PathBuf,
    pub jobs: Vec<PlannedJob>,
    pub skipped: Vec<(PathBuf, ConvertError)>,
}

impl GroupPlan {
    /// All invocations in planning order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.jobs
            .iter()
            .flat_map(|job| job.invocations.iter().cloned())
            .collect()
    }

    pub fn sidecars_written(&self) -> usize {
        self.jobs.iter().filter(|j| j.sidecar.is_some()).count()
    }
}

/// Resolved merge inputs for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeInputs {
    pub video: Vec<PathBuf>,
    pub audio: Option<PathBuf>,
}

impl MergeInputs {
    pub fn all(&self) -> impl Iterator<Item = &PathBuf> {
        self.video.iter().chain(self.audio.iter())
    }
}

pub struct JobPlanner<'a> {
    config: &'a ConvertConfig,
    merge_tool: &'a Path,
}

impl<'a> JobPlanner<'a> {
    pub fn new(config: &'a ConvertConfig, merge_tool: &'a Path) -> Self {
        Self { config, merge_tool }
    }

    /// Plans every item under `group_dir`. Item failures are logged and collected in
    /// `skipped`; they never abort the group.
    pub fn plan_group(&self, group_dir: &Path) -> GroupPlan {
        let items = cache::list_item_directories(group_dir);
        let disambiguate = items.len() > 1;
        let mut plan = GroupPlan {
            group_dir: group_dir.to_path_buf(),
            ..GroupPlan::default()
        };

        for (idx, item_dir) in items.iter().enumerate() {
            let position = disambiguate.then_some(idx + 1);
            match self.plan_item(item_dir, position) {
                Ok(job) => plan.jobs.push(job),
                Err(e) => {
                    match &e {
                        ConvertError::MissingInput { .. } => {
                            warn!(item = %item_dir.display(), error = %e, "skipping item")
                        }
                        _ => error!(item = %item_dir.display(), error = %e, "skipping item"),
                    }
                    plan.skipped.push((item_dir.clone(), e));
                }
            }
        }

        info!(
            group = %group_dir.display(),
            planned = plan.jobs.len(),
            skipped = plan.skipped.len(),
            "group planned"
        );
        plan
    }

    pub fn plan_item(&self, item_dir: &Path, position: Option<usize>) -> Result<PlannedJob> {
        let descriptor = cache::find_fragment(item_dir, cache::DESCRIPTOR_FRAGMENT);
        if let FragmentSet::Multiple(list) = &descriptor {
            warn!(item = %item_dir.display(), count = list.len(), "several descriptors, using the first");
        }
        let descriptor = descriptor
            .first()
            .ok_or_else(|| missing(item_dir, "descriptor"))?
            .to_path_buf();
        let meta = metadata::read_metadata(&descriptor)?;

        let inputs = resolve_inputs(item_dir)?;
        let target = paths::output_target(self.config, &meta, position);
        if !self.config.dry_run {
            target.ensure_dir()?;
        }

        let mut invocations = vec![merge_invocation(self.merge_tool, &inputs, &target.media_path())];

        if self.config.convert_subtitles {
            let source = cache::find_fragment(item_dir, cache::SUBTITLE_SOURCE_FRAGMENT);
            match source.first() {
                Some(source) => {
                    invocations.push(self.subtitle_invocation(&meta, source, &target));
                }
                None => {
                    warn!(item = %item_dir.display(), "no subtitle source, skipping subtitle job")
                }
            }
        }

        let sidecar = if self.config.write_sidecar && !self.config.dry_run {
            self.write_sidecar(&meta, &target)
        } else {
            None
        };

        debug!(
            item = %item_dir.display(),
            output = %target.media_path().display(),
            inputs = inputs.video.len() + usize::from(inputs.audio.is_some()),
            "item planned"
        );

        Ok(PlannedJob {
            item_dir: item_dir.to_path_buf(),
            target,
            invocations,
            sidecar,
        })
    }

    fn subtitle_invocation(
        &self,
        meta: &ItemMetadata,
        source: &Path,
        target: &OutputTarget,
    ) -> Invocation {
        let style = &self.config.subtitle_style;
        let tool = &self.config.subtitle_tool;
        let (width, height) = meta.dimensions().unwrap_or(FALLBACK_DIMENSIONS);
        let output = target.with_extension(&style.extension);

        let mut args: Vec<OsString> = tool.prefix_args.iter().map(OsString::from).collect();
        args.push(source.as_os_str().to_os_string());
        for (flag, value) in [
            ("-s", format!("{width}x{height}")),
            ("-fn", style.font_name.clone()),
            ("-fs", style.font_size.to_string()),
            ("-a", style.opacity.to_string()),
            ("-dm", style.duration_marquee.to_string()),
            ("-ds", style.duration_still.to_string()),
        ] {
            args.push(flag.into());
            args.push(value.into());
        }
        args.push("-o".into());
        args.push(output.as_os_str().to_os_string());

        Invocation {
            kind: JobKind::Subtitle,
            program: PathBuf::from(&tool.program),
            args,
            output,
        }
    }

    /// Sidecar failures stay inside the sidecar; the merge job is still planned.
    fn write_sidecar(&self, meta: &ItemMetadata, target: &OutputTarget) -> Option<SidecarReport> {
        let ext = sidecar::cover_extension(meta.cover_url.as_deref());
        match sidecar::write_sidecar(meta, &target.sidecar_path(), &target.cover_path(&ext)) {
            Ok(report) => Some(report),
            Err(e) => {
                error!(path = %target.sidecar_path().display(), error = %e, "sidecar write failed");
                None
            }
        }
    }
}

fn missing(item_dir: &Path, what: &str) -> ConvertError {
    ConvertError::MissingInput {
        item: item_dir.to_path_buf(),
        what: what.to_string(),
    }
}

/// Finds the video (and, for single-file video, audio) fragments of an item.
///
/// A multi-file video lookup is treated as video-only segments and no audio is
/// searched. Without `video.m4s` the legacy `.blv` segments are tried.
pub fn resolve_inputs(item_dir: &Path) -> Result<MergeInputs> {
    let video = match cache::find_fragment(item_dir, cache::VIDEO_FRAGMENT) {
        FragmentSet::Single(video) => video,
        FragmentSet::Multiple(segments) => {
            return Ok(MergeInputs {
                video: segments,
                audio: None,
            });
        }
        FragmentSet::Absent => {
            let segments = cache::find_fragment(item_dir, cache::ALTERNATE_VIDEO_FRAGMENT);
            if segments.is_absent() {
                return Err(missing(item_dir, "video fragment"));
            }
            debug!(item = %item_dir.display(), segments = segments.len(), "using legacy segments");
            return Ok(MergeInputs {
                video: segments.into_paths(),
                audio: None,
            });
        }
    };

    let audio = match cache::find_fragment(item_dir, cache::AUDIO_FRAGMENT) {
        FragmentSet::Absent => {
            debug!(item = %item_dir.display(), "no audio fragment, merging video only");
            None
        }
        FragmentSet::Single(audio) => Some(audio),
        FragmentSet::Multiple(list) => {
            warn!(item = %item_dir.display(), count = list.len(), "several audio fragments, using the first");
            list.into_iter().next()
        }
    };

    Ok(MergeInputs {
        video: vec![video],
        audio,
    })
}

/// `tool -hide_banner -loglevel error -n -i <in>... -c copy <out>.mp4`
pub fn merge_invocation(tool: &Path, inputs: &MergeInputs, output: &Path) -> Invocation {
    let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-n"]
        .into_iter()
        .map(OsString::from)
        .collect();
    for input in inputs.all() {
        args.push("-i".into());
        args.push(input.as_os_str().to_os_string());
    }
    args.push("-c".into());
    args.push("copy".into());
    args.push(output.as_os_str().to_os_string());

    Invocation {
        kind: JobKind::Merge,
        program: tool.to_path_buf(),
        args,
        output: output.to_path_buf(),
    }
}
