use crate::store::{DatasetHandle, SnapshotHandle, SnapshotStore, UserProperties};
use anyhow::{Result, anyhow, bail};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
pub struct FakeSnapshot {
    name: String,
    created: i64,
    builtin: BTreeMap<String, String>,
    user: UserProperties,
}

impl FakeSnapshot {
    pub fn new(name: &str, created: i64) -> Self {
        Self {
            name: name.to_string(),
            created,
            builtin: BTreeMap::new(),
            user: UserProperties::new(),
        }
    }

    pub fn builtin(mut self, name: &str, value: &str) -> Self {
        self.builtin.insert(name.to_string(), value.to_string());
        self
    }

    pub fn user(mut self, name: &str, value: &str) -> Self {
        self.user
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        self
    }
}

#[derive(Debug, Default)]
pub struct FakeStore {
    dataset: String,
    snapshots: Vec<FakeSnapshot>,
    failing_destroys: BTreeSet<String>,
    calls: RefCell<Vec<String>>,
}

impl FakeStore {
    pub fn new(dataset: &str) -> Self {
        Self {
            dataset: dataset.to_string(),
            ..Default::default()
        }
    }

    pub fn with_snapshot(mut self, snapshot: FakeSnapshot) -> Self {
        self.snapshots.push(snapshot);
        self
    }

    pub fn failing_destroy(mut self, target: &str) -> Self {
        self.failing_destroys.insert(target.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("destroy"))
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn snapshot(&self, handle: &SnapshotHandle) -> Result<&FakeSnapshot> {
        self.snapshots
            .iter()
            .find(|s| s.name == handle.name())
            .ok_or_else(|| anyhow!("snapshot does not exist: {}", handle.name()))
    }
}

impl SnapshotStore for FakeStore {
    fn open(&self, dataset: &str) -> Result<DatasetHandle> {
        self.record(format!("open {dataset}"));
        if dataset != self.dataset {
            bail!("cannot open '{}': dataset does not exist", dataset);
        }
        Ok(DatasetHandle::new(dataset))
    }

    fn for_each_snapshot(
        &self,
        dataset: &DatasetHandle,
        recurse_into_descendants: bool,
        callback: &mut dyn FnMut(SnapshotHandle) -> Result<()>,
    ) -> Result<()> {
        self.record(format!(
            "for_each_snapshot {} recurse={}",
            dataset.name(),
            recurse_into_descendants
        ));
        let prefix = format!("{}@", dataset.name());
        let names: Vec<String> = self
            .snapshots
            .iter()
            .filter(|s| s.name.starts_with(&prefix))
            .map(|s| s.name.clone())
            .collect();
        for name in names {
            callback(SnapshotHandle::new(name))?;
        }
        Ok(())
    }

    fn creation_time(&self, snapshot: &SnapshotHandle) -> Result<i64> {
        self.record(format!("creation_time {}", snapshot.name()));
        Ok(self.snapshot(snapshot)?.created)
    }

    fn builtin_property(&self, snapshot: &SnapshotHandle, name: &str) -> Result<String> {
        self.record(format!("builtin_property {} {}", snapshot.name(), name));
        self.snapshot(snapshot)?
            .builtin
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("bad property list: invalid property '{}'", name))
    }

    fn user_properties(&self, snapshot: &SnapshotHandle) -> Result<UserProperties> {
        self.record(format!("user_properties {}", snapshot.name()));
        Ok(self.snapshot(snapshot)?.user.clone())
    }

    fn destroy(&self, snapshot: &SnapshotHandle, defer: bool) -> Result<()> {
        self.record(format!("destroy {} defer={}", snapshot.name(), defer));
        if self.failing_destroys.contains(snapshot.name()) {
            bail!("snapshot is busy");
        }
        Ok(())
    }

    fn destroy_by_suffix(&self, dataset: &DatasetHandle, suffix: &str, defer: bool) -> Result<()> {
        self.record(format!(
            "destroy_by_suffix {} {} defer={}",
            dataset.name(),
            suffix,
            defer
        ));
        if self.failing_destroys.contains(suffix) {
            bail!("snapshot has dependent clones");
        }
        Ok(())
    }

    fn close(&self, dataset: DatasetHandle) {
        self.record(format!("close {}", dataset.name()));
    }
}
