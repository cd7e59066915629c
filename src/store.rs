use anyhow::Result;
use std::collections::BTreeMap;

pub type UserProperties = BTreeMap<String, Vec<String>>;

#[derive(Debug)]
pub struct DatasetHandle {
    name: String,
}

impl DatasetHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHandle {
    name: String,
}

impl SnapshotHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

pub trait SnapshotStore {
    fn open(&self, dataset: &str) -> Result<DatasetHandle>;

    /// Visit the snapshots of `dataset` in order. Stops at the first error the
    /// callback returns.
    fn for_each_snapshot(
        &self,
        dataset: &DatasetHandle,
        recurse_into_descendants: bool,
        callback: &mut dyn FnMut(SnapshotHandle) -> Result<()>,
    ) -> Result<()>;

    fn creation_time(&self, snapshot: &SnapshotHandle) -> Result<i64>;

    fn builtin_property(&self, snapshot: &SnapshotHandle, name: &str) -> Result<String>;

    fn user_properties(&self, snapshot: &SnapshotHandle) -> Result<UserProperties>;

    fn destroy(&self, snapshot: &SnapshotHandle, defer: bool) -> Result<()>;

    /// Destroy `<dataset>@<suffix>` and the same-named snapshot on every
    /// descendant of `dataset`.
    fn destroy_by_suffix(&self, dataset: &DatasetHandle, suffix: &str, defer: bool) -> Result<()>;

    fn close(&self, dataset: DatasetHandle);
}
