use crate::filter::USER_PROPERTY_SEPARATOR;
use crate::store::{DatasetHandle, SnapshotHandle, SnapshotStore, UserProperties};
use anyhow::{Context, Result, anyhow, bail};
use log::debug;
use std::path::PathBuf;
use std::process::Command;

/// [`SnapshotStore`] backed by the `zfs` command-line tool.
#[derive(Debug, Clone)]
pub struct ZfsCli {
    binary: PathBuf,
}

impl ZfsCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn zfs(&self, args: &[&str]) -> Result<String> {
        debug!("Running {} {}", self.binary.display(), args.join(" "));
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .with_context(|| format!("Failed to run {}", self.binary.display()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            if stderr.is_empty() {
                bail!("zfs {} failed with {}", args.join(" "), output.status);
            }
            bail!("{}", stderr);
        }
        String::from_utf8(output.stdout).context("zfs printed non-UTF-8 output")
    }
}

impl SnapshotStore for ZfsCli {
    fn open(&self, dataset: &str) -> Result<DatasetHandle> {
        let out = self.zfs(&["list", "-H", "-o", "name", "-t", "filesystem,volume", dataset])?;
        let name = out
            .lines()
            .next()
            .ok_or_else(|| anyhow!("dataset does not exist: {}", dataset))?;
        Ok(DatasetHandle::new(name))
    }

    fn for_each_snapshot(
        &self,
        dataset: &DatasetHandle,
        recurse_into_descendants: bool,
        callback: &mut dyn FnMut(SnapshotHandle) -> Result<()>,
    ) -> Result<()> {
        let args = snapshot_list_args(dataset.name(), recurse_into_descendants);
        let out = self.zfs(&args)?;
        for name in parse_names(&out) {
            callback(SnapshotHandle::new(name))?;
        }
        Ok(())
    }

    fn creation_time(&self, snapshot: &SnapshotHandle) -> Result<i64> {
        let out = self.zfs(&["get", "-H", "-p", "-o", "value", "creation", snapshot.name()])?;
        out.trim()
            .parse::<i64>()
            .with_context(|| format!("Invalid creation time '{}'", out.trim()))
    }

    fn builtin_property(&self, snapshot: &SnapshotHandle, name: &str) -> Result<String> {
        let out = self.zfs(&["get", "-H", "-o", "value", name, snapshot.name()])?;
        Ok(out.trim_end_matches('\n').to_string())
    }

    fn user_properties(&self, snapshot: &SnapshotHandle) -> Result<UserProperties> {
        let out = self.zfs(&["get", "-H", "-o", "property,value", "all", snapshot.name()])?;
        Ok(parse_user_properties(&out))
    }

    fn destroy(&self, snapshot: &SnapshotHandle, defer: bool) -> Result<()> {
        let mut args = vec!["destroy"];
        if defer {
            args.push("-d");
        }
        args.push(snapshot.name());
        self.zfs(&args).map(|_| ())
    }

    fn destroy_by_suffix(&self, dataset: &DatasetHandle, suffix: &str, defer: bool) -> Result<()> {
        let target = format!("{}@{}", dataset.name(), suffix);
        let mut args = vec!["destroy", "-r"];
        if defer {
            args.push("-d");
        }
        args.push(target.as_str());
        self.zfs(&args).map(|_| ())
    }

    fn close(&self, dataset: DatasetHandle) {
        debug!("Closing dataset {}", dataset.name());
    }
}

fn snapshot_list_args(dataset: &str, recurse_into_descendants: bool) -> Vec<&str> {
    let mut args = vec!["list", "-H", "-o", "name", "-t", "snapshot", "-s", "createtxg"];
    if recurse_into_descendants {
        args.push("-r");
    } else {
        args.extend(["-d", "1"]);
    }
    args.push(dataset);
    args
}

fn parse_names(out: &str) -> impl Iterator<Item = &str> {
    out.lines().map(str::trim).filter(|l| !l.is_empty())
}

/// Parse `zfs get -H -o property,value` output, keeping only user
/// properties. Values may contain tabs.
fn parse_user_properties(out: &str) -> UserProperties {
    let mut props = UserProperties::new();
    for line in out.lines() {
        let Some((name, value)) = line.split_once('\t') else {
            continue;
        };
        if !name.contains(USER_PROPERTY_SEPARATOR) {
            continue;
        }
        props
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
    }
    props
}
