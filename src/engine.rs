use crate::filter::FilterSet;
use crate::store::{DatasetHandle, SnapshotHandle, SnapshotStore};
use crate::utils;
use anyhow::{Context, Result};
use log::{debug, error, info};
use std::io::Write;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mode {
    /// Do not print matching snapshot names
    pub quiet: bool,
    /// Destroy matching snapshots
    pub delete: bool,
    /// With `delete`, destroy the same-named snapshot on every descendant
    pub recurse: bool,
    /// Ask ZFS for a deferred destroy
    pub defer: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    List,
    Destroy,
    DestroyBySuffix,
}

impl Mode {
    fn action(&self) -> Action {
        match (self.delete, self.recurse) {
            (false, _) => Action::List,
            (true, false) => Action::Destroy,
            (true, true) => Action::DestroyBySuffix,
        }
    }
}

#[derive(Debug)]
pub struct RunParams {
    pub dataset: String,
    pub filters: FilterSet,
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    NotMatched,
    LookupFailed(String),
    Matched,
    Deleted,
    DeleteFailed(String),
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub results: Vec<(String, Outcome)>,
}

impl RunReport {
    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.results.iter().filter(|(_, o)| pred(o)).count()
    }

    pub fn matched(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                Outcome::Matched | Outcome::Deleted | Outcome::DeleteFailed(_)
            )
        })
    }

    pub fn deleted(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Deleted))
    }

    pub fn lookup_failures(&self) -> usize {
        self.count(|o| matches!(o, Outcome::LookupFailed(_)))
    }

    pub fn action_failures(&self) -> usize {
        self.count(|o| matches!(o, Outcome::DeleteFailed(_)))
    }

    pub fn is_success(&self) -> bool {
        self.action_failures() == 0
    }
}

// Per-snapshot failures land in the report; anything returned as Err is fatal.
pub fn run<S, W>(store: &S, params: &RunParams, out: &mut W) -> Result<RunReport>
where
    S: SnapshotStore,
    W: Write,
{
    let dataset = store
        .open(&params.dataset)
        .with_context(|| format!("Failed to open dataset {}", params.dataset))?;
    info!(
        "Scanning snapshots of {} with {} filter(s)",
        dataset.name(),
        params.filters.len()
    );

    let mut report = RunReport::default();
    let result = store.for_each_snapshot(&dataset, false, &mut |snapshot| {
        let outcome = process_snapshot(store, &dataset, params, &snapshot, out)?;
        report.results.push((snapshot.name().to_string(), outcome));
        Ok(())
    });
    let name = dataset.name().to_string();
    store.close(dataset);
    result.with_context(|| format!("Failed to enumerate snapshots of {}", name))?;

    info!(
        "{}: {} snapshot(s) scanned, {} matched, {} deleted, {} lookup failure(s), {} delete failure(s)",
        name,
        report.results.len(),
        report.matched(),
        report.deleted(),
        report.lookup_failures(),
        report.action_failures()
    );
    Ok(report)
}

fn process_snapshot<S, W>(
    store: &S,
    dataset: &DatasetHandle,
    params: &RunParams,
    snapshot: &SnapshotHandle,
    out: &mut W,
) -> Result<Outcome>
where
    S: SnapshotStore,
    W: Write,
{
    debug!("Checking snapshot: {}", snapshot.name());
    match params.filters.matches(store, snapshot) {
        Ok(true) => {}
        Ok(false) => return Ok(Outcome::NotMatched),
        Err(e) => {
            error!("{}: {:#}", snapshot.name(), e);
            return Ok(Outcome::LookupFailed(format!("{:#}", e)));
        }
    }

    if !params.mode.quiet {
        writeln!(out, "{}", snapshot.name()).context("Failed to write snapshot name")?;
    }

    let defer = params.mode.defer;
    let result = match params.mode.action() {
        Action::List => return Ok(Outcome::Matched),
        Action::Destroy => {
            debug!("Deleting snapshot: {}", snapshot.name());
            store.destroy(snapshot, defer)
        }
        Action::DestroyBySuffix => utils::snapshot_suffix(snapshot.name()).and_then(|suffix| {
            debug!("Deleting @{} under {} recursively", suffix, dataset.name());
            store.destroy_by_suffix(dataset, suffix, defer)
        }),
    };
    match result {
        Ok(()) => Ok(Outcome::Deleted),
        Err(e) => {
            let how = if params.mode.recurse { " recursively" } else { "" };
            error!("Failed to delete snapshot {}{}: {:#}", snapshot.name(), how, e);
            Ok(Outcome::DeleteFailed(format!("{:#}", e)))
        }
    }
}
