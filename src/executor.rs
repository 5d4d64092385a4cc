//! Fixed-size worker pool running planned invocations as child processes.

use crate::cmd;
use crate::planner::Invocation;
use crate::{ConvertError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use tracing::{debug, error, info};

#[derive(Debug)]
pub struct JobFailure {
    pub invocation: Invocation,
    pub error: ConvertError,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub submitted: usize,
    pub succeeded: usize,
    pub failures: Vec<JobFailure>,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Runs `invocations` on at most `max_workers` threads.
///
/// Jobs start in submission order and finish in any order. A failing job is logged
/// and recorded; it never stops its siblings. There are no retries and no timeouts.
pub fn run_all(invocations: &[Invocation], max_workers: usize) -> BatchReport {
    let total = invocations.len();
    if total == 0 {
        return BatchReport::default();
    }
    let workers = max_workers.clamp(1, total);
    let next = AtomicUsize::new(0);
    let succeeded = AtomicUsize::new(0);
    let failures: Mutex<Vec<(usize, JobFailure)>> = Mutex::new(Vec::new());

    debug!(jobs = total, workers, "starting batch");
    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let idx = next.fetch_add(1, Ordering::SeqCst);
                let Some(invocation) = invocations.get(idx) else {
                    break;
                };
                match run_invocation(invocation) {
                    Ok(()) => {
                        succeeded.fetch_add(1, Ordering::SeqCst);
                        info!(kind = invocation.kind.as_str(), output = %invocation.output.display(), "job finished");
                    }
                    Err(e) => {
                        error!(kind = invocation.kind.as_str(), output = %invocation.output.display(), error = %e, "job failed");
                        let failure = JobFailure {
                            invocation: invocation.clone(),
                            error: e,
                        };
                        failures
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner())
                            .push((idx, failure));
                    }
                }
            });
        }
    });

    let mut failures = failures
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    failures.sort_by_key(|(idx, _)| *idx);

    BatchReport {
        submitted: total,
        succeeded: succeeded.load(Ordering::SeqCst),
        failures: failures.into_iter().map(|(_, f)| f).collect(),
    }
}

/// Spawns one invocation and waits for it. Stdout is discarded and stderr captured.
pub fn run_invocation(invocation: &Invocation) -> Result<()> {
    let tool = invocation.program.to_string_lossy().to_string();
    let output = cmd::command(&invocation.program)
        .args(&invocation.args)
        .output()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConvertError::ExternalToolMissing { tool: tool.clone() },
            _ => ConvertError::Io(e),
        })?;

    if !output.status.success() {
        return Err(ConvertError::ExternalToolFailed {
            tool,
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(())
}
