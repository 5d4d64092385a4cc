use std::path::PathBuf;
use std::process::ExitCode;

use bilimerge::config::{self, ConvertConfig};
use bilimerge::{convert, logging};
use tracing::{error, Level};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_help();
        return ExitCode::SUCCESS;
    }

    let parsed = match parse_args(&args) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init_tracing(parsed.log_level);

    let config = match build_config(&parsed) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match convert::run(&config, &parsed.cache_root) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "conversion aborted");
            ExitCode::FAILURE
        }
    }
}

struct CliArgs {
    cache_root: PathBuf,
    config_path: Option<PathBuf>,
    merge_tool: Option<PathBuf>,
    output_root: Option<PathBuf>,
    workers: Option<usize>,
    per_item_folder: bool,
    convert_subtitles: bool,
    write_sidecar: bool,
    dry_run: bool,
    log_level: Level,
}

fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut cache_root: Option<PathBuf> = None;
    let mut parsed = CliArgs {
        cache_root: PathBuf::new(),
        config_path: None,
        merge_tool: None,
        output_root: None,
        workers: None,
        per_item_folder: false,
        convert_subtitles: false,
        write_sidecar: false,
        dry_run: false,
        log_level: Level::INFO,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-f" | "--ffmpeg" => {
                parsed.merge_tool = Some(PathBuf::from(value_for(args, &mut i)?));
            }
            "-s" | "--save" => {
                parsed.output_root = Some(PathBuf::from(value_for(args, &mut i)?));
            }
            "-c" | "--config" => {
                parsed.config_path = Some(PathBuf::from(value_for(args, &mut i)?));
            }
            "-j" | "--workers" => {
                let v = value_for(args, &mut i)?;
                let n: usize = v
                    .parse()
                    .map_err(|_| format!("--workers expects a positive number, got {v}"))?;
                parsed.workers = Some(n);
            }
            "--folder" => parsed.per_item_folder = true,
            "--danmaku" => parsed.convert_subtitles = true,
            "--nfo" => parsed.write_sidecar = true,
            "--dry-run" => parsed.dry_run = true,
            "-v" | "--verbose" => parsed.log_level = Level::DEBUG,
            "-q" | "--quiet" => parsed.log_level = Level::WARN,
            other if other.starts_with('-') => {
                return Err(format!("unknown arg: {other} (try --help)"))
            }
            other => {
                if cache_root.is_some() {
                    return Err(format!("unexpected extra argument: {other}"));
                }
                cache_root = Some(PathBuf::from(other));
            }
        }
        i += 1;
    }

    parsed.cache_root = cache_root.ok_or_else(|| "missing cache directory (try --help)".to_string())?;
    Ok(parsed)
}

fn value_for<'a>(args: &'a [String], i: &mut usize) -> Result<&'a str, String> {
    let flag = &args[*i];
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a value"))
}

/// Config file values first, then command-line flags on top.
fn build_config(args: &CliArgs) -> bilimerge::Result<ConvertConfig> {
    let mut config = match &args.config_path {
        Some(path) => config::load_config(path)?,
        None => ConvertConfig::default(),
    };
    if args.config_path.is_none() {
        config.output_root = std::env::current_dir()?;
    }

    if let Some(tool) = &args.merge_tool {
        config.merge_tool = Some(tool.clone());
    }
    if let Some(out) = &args.output_root {
        config.output_root = out.clone();
    }
    if args.workers.is_some() {
        config.max_workers = args.workers;
    }
    config.per_item_folder |= args.per_item_folder;
    config.convert_subtitles |= args.convert_subtitles;
    config.write_sidecar |= args.write_sidecar;
    config.dry_run |= args.dry_run;
    Ok(config)
}

fn print_help() {
    println!(
        r#"bilimerge

Merges cached video/audio fragments into named .mp4 files.

Usage:
  bilimerge [options] <cache-dir>

Options:
  -f, --ffmpeg <path>   Merge tool (default: bundled ffmpeg, else ffmpeg on PATH)
  -s, --save <dir>      Output directory (default: current directory)
  -c, --config <file>   JSON config file; flags override its values
  -j, --workers <n>     Parallel jobs per group (default: CPU count)
  --folder              One folder per title instead of a flat output directory
  --danmaku             Convert danmaku.xml to subtitles with the subtitle tool
  --nfo                 Write an .nfo sidecar and download the cover image
  --dry-run             Log the planned commands without running them
  -v, --verbose         Debug logging
  -q, --quiet           Warnings and errors only
"#
    );
}
