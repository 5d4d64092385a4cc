use std::path::{Path, PathBuf};

use bilimerge::config::ConvertConfig;
use bilimerge::planner::{JobKind, JobPlanner};

fn write(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdir");
    }
    std::fs::write(path, contents).expect("write");
}

fn cached_item(group: &Path, id: &str, entry_json: &str, with_audio: bool) -> PathBuf {
    let item = group.join(id);
    write(&item.join("entry.json"), entry_json.as_bytes());
    write(&item.join("80").join("video.m4s"), b"video");
    if with_audio {
        write(&item.join("80").join("audio.m4s"), b"audio");
    }
    item
}

fn arg_strings(args: &[std::ffi::OsString]) -> Vec<String> {
    args.iter().map(|a| a.to_string_lossy().to_string()).collect()
}

#[test]
fn two_item_group_yields_numbered_merge_jobs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let group = dir.path().join("cache").join("170001");
    cached_item(&group, "1", r#"{ "title": "Show A" }"#, true);
    cached_item(
        &group,
        "2",
        r#"{ "title": "Show A", "page_data": { "part": "Episode 2" } }"#,
        true,
    );

    let out = dir.path().join("out");
    let cfg = ConvertConfig {
        output_root: out.clone(),
        ..ConvertConfig::default()
    };
    let plan = JobPlanner::new(&cfg, Path::new("ffmpeg")).plan_group(&group);
    let invocations = plan.invocations();

    assert_eq!(invocations.len(), 2);
    assert!(plan.skipped.is_empty());
    assert_eq!(invocations[0].output, out.join("Show A-Show A-P1.mp4"));
    assert_eq!(invocations[1].output, out.join("Show A-Episode 2-P2.mp4"));

    for inv in &invocations {
        assert_eq!(inv.kind, JobKind::Merge);
        assert_eq!(inv.input_count(), 2);
        let args = arg_strings(&inv.args);
        assert_eq!(&args[..4], ["-hide_banner", "-loglevel", "error", "-n"]);
        let n = args.len();
        assert_eq!(&args[n - 3..n - 1], ["-c", "copy"]);
        assert_eq!(args[n - 1], inv.output.to_string_lossy());
        assert!(args[5].ends_with("video.m4s"));
        assert!(args[7].ends_with("audio.m4s"));
    }
}

#[test]
fn single_item_group_has_no_disambiguator() {
    let dir = tempfile::tempdir().expect("tempdir");
    let group = dir.path().join("cache").join("g");
    cached_item(
        &group,
        "1",
        r#"{ "title": "Solo", "page_data": { "part": "Only Part" } }"#,
        false,
    );

    let cfg = ConvertConfig {
        output_root: dir.path().join("out"),
        ..ConvertConfig::default()
    };
    let plan = JobPlanner::new(&cfg, Path::new("ffmpeg")).plan_group(&group);
    let invocations = plan.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(
        invocations[0].output,
        dir.path().join("out").join("Solo-Only Part.mp4")
    );
    assert_eq!(invocations[0].input_count(), 1);
}

#[test]
fn three_item_group_numbers_every_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    let group = dir.path().join("cache").join("g");
    for id in ["1", "2", "3"] {
        cached_item(&group, id, r#"{ "title": "Same" }"#, true);
    }

    let cfg = ConvertConfig {
        output_root: dir.path().join("out"),
        ..ConvertConfig::default()
    };
    let plan = JobPlanner::new(&cfg, Path::new("ffmpeg")).plan_group(&group);
    let stems: Vec<&str> = plan.jobs.iter().map(|j| j.target.stem.as_str()).collect();
    assert_eq!(stems, vec!["Same-Same-P1", "Same-Same-P2", "Same-Same-P3"]);
}

#[test]
fn malformed_descriptor_drops_only_that_item() {
    let dir = tempfile::tempdir().expect("tempdir");
    let group = dir.path().join("cache").join("g");
    cached_item(&group, "1", r#"{ "title": "Show" }"#, true);
    cached_item(&group, "2", r#"{ "title": "Show", "#, true);

    let cfg = ConvertConfig {
        output_root: dir.path().join("out"),
        convert_subtitles: true,
        ..ConvertConfig::default()
    };
    write(&group.join("1").join("danmaku.xml"), b"<i></i>");
    write(&group.join("2").join("danmaku.xml"), b"<i></i>");

    let plan = JobPlanner::new(&cfg, Path::new("ffmpeg")).plan_group(&group);
    let kinds: Vec<JobKind> = plan.invocations().iter().map(|i| i.kind).collect();
    assert_eq!(kinds, vec![JobKind::Merge, JobKind::Subtitle]);
    assert_eq!(plan.skipped.len(), 1);
    assert_eq!(plan.skipped[0].0, group.join("2"));
}

#[cfg(unix)]
#[test]
fn run_merges_with_an_external_tool() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().expect("tempdir");
    let tool = dir.path().join("fake-ffmpeg");
    write(
        &tool,
        br#"#!/bin/sh
if [ "$1" = "-version" ]; then
  echo "fake ffmpeg version 0"
  exit 0
fi
for last; do :; done
case "$last" in
  *P2.mp4) echo "refusing $last" >&2; exit 1 ;;
esac
touch "$last"
"#,
    );
    std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).expect("chmod");

    let cache = dir.path().join("cache");
    for group in ["100", "200"] {
        for id in ["1", "2"] {
            cached_item(&cache.join(group), id, &format!(r#"{{ "title": "T{group}" }}"#), true);
        }
    }

    let out = dir.path().join("out");
    let cfg = ConvertConfig {
        merge_tool: Some(tool),
        output_root: out.clone(),
        max_workers: Some(2),
        ..ConvertConfig::default()
    };
    let summary = bilimerge::convert::run(&cfg, &cache).expect("run");

    assert_eq!(summary.groups, 2);
    assert_eq!(summary.items_planned, 4);
    assert_eq!(summary.jobs_succeeded, 2);
    assert_eq!(summary.jobs_failed, 2);
    assert!(out.join("T100-T100-P1.mp4").exists());
    assert!(out.join("T200-T200-P1.mp4").exists());
    assert!(!out.join("T100-T100-P2.mp4").exists());
}
