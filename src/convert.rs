use crate::config::ConvertConfig;
use crate::planner::JobPlanner;
use crate::{cache, executor, tools, Result};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub groups: usize,
    pub items_planned: usize,
    pub items_skipped: usize,
    pub jobs_succeeded: usize,
    pub jobs_failed: usize,
    pub sidecars_written: usize,
}

/// Converts every group under `cache_root`.
///
/// Only configuration problems (including an unusable merge tool) are returned as
/// errors, and they are detected before any group is touched. Groups run one after
/// another; the jobs inside a group run on the worker pool.
pub fn run(config: &ConvertConfig, cache_root: &Path) -> Result<RunSummary> {
    config.validate()?;
    let merge_tool = tools::resolve_merge_tool(config)?;
    let planner = JobPlanner::new(config, &merge_tool.path);
    let workers = config.effective_workers();

    let mut summary = RunSummary::default();
    let groups = cache::list_item_directories(cache_root);
    if groups.is_empty() {
        warn!(root = %cache_root.display(), "no cached groups found");
    }

    for group in &groups {
        summary.groups += 1;
        let plan = planner.plan_group(group);
        summary.items_planned += plan.jobs.len();
        summary.items_skipped += plan.skipped.len();
        summary.sidecars_written += plan.sidecars_written();

        let invocations = plan.invocations();
        if config.dry_run {
            for invocation in &invocations {
                info!(kind = invocation.kind.as_str(), "{invocation}");
            }
            continue;
        }

        let report = executor::run_all(&invocations, workers);
        summary.jobs_succeeded += report.succeeded;
        summary.jobs_failed += report.failed();
        info!(
            group = %group.display(),
            succeeded = report.succeeded,
            failed = report.failed(),
            "group finished"
        );
    }

    info!(
        groups = summary.groups,
        items = summary.items_planned,
        skipped = summary.items_skipped,
        succeeded = summary.jobs_succeeded,
        failed = summary.jobs_failed,
        sidecars = summary.sidecars_written,
        "conversion finished"
    );
    Ok(summary)
}
