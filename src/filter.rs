use crate::store::{SnapshotHandle, SnapshotStore};
use crate::utils;
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use log::debug;
use std::cell::OnceCell;

pub const USER_PROPERTY_SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Empty,
    Before(i64),
    After(i64),
    User,
    Builtin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    property: String,
    value: String,
    kind: Kind,
}

impl Filter {
    pub fn new(property: &str, value: &str) -> Result<Self> {
        Self::new_at(property, value, Utc::now())
    }

    pub fn new_at(property: &str, value: &str, now: DateTime<Utc>) -> Result<Self> {
        let kind = match property {
            "" => Kind::Empty,
            "before" => Kind::Before(
                utils::parse_boundary(value, now).context("Invalid --before value")?,
            ),
            "after" => Kind::After(
                utils::parse_boundary(value, now).context("Invalid --after value")?,
            ),
            p if p.contains(USER_PROPERTY_SEPARATOR) => Kind::User,
            p if p.starts_with('-') || p.contains(',') => {
                bail!("Invalid property name '{}': expected a single ZFS property", p)
            }
            _ => Kind::Builtin,
        };
        Ok(Self {
            property: property.to_string(),
            value: value.to_string(),
            kind,
        })
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    fn matches<S: SnapshotStore>(
        &self,
        store: &S,
        snapshot: &SnapshotHandle,
        created: &OnceCell<i64>,
    ) -> Result<bool> {
        match self.kind {
            Kind::Empty => Ok(false),
            Kind::Before(boundary) => Ok(creation_time(store, snapshot, created)? < boundary),
            Kind::After(boundary) => Ok(creation_time(store, snapshot, created)? > boundary),
            Kind::User => {
                let props = store.user_properties(snapshot).with_context(|| {
                    format!("Failed to retrieve user properties of {}", snapshot.name())
                })?;
                Ok(props
                    .get(&self.property)
                    .is_some_and(|values| values.iter().any(|v| *v == self.value)))
            }
            Kind::Builtin => {
                let actual = store
                    .builtin_property(snapshot, &self.property)
                    .with_context(|| format!("Failed to retrieve property '{}'", self.property))?;
                debug!(
                    "Snapshot {} property {}: {}",
                    snapshot.name(),
                    self.property,
                    actual
                );
                Ok(actual == self.value)
            }
        }
    }
}

fn creation_time<S: SnapshotStore>(
    store: &S,
    snapshot: &SnapshotHandle,
    created: &OnceCell<i64>,
) -> Result<i64> {
    if let Some(ts) = created.get() {
        return Ok(*ts);
    }
    let ts = store
        .creation_time(snapshot)
        .with_context(|| format!("Failed to retrieve creation time of {}", snapshot.name()))?;
    debug!(
        "Snapshot {} created at {}",
        snapshot.name(),
        utils::format_timestamp(ts)
    );
    Ok(*created.get_or_init(|| ts))
}

#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    pub fn new(filters: Vec<Filter>) -> Self {
        Self { filters }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter()
    }

    /// A failed lookup comes back as `Err` and counts as a non-match.
    pub fn matches<S: SnapshotStore>(&self, store: &S, snapshot: &SnapshotHandle) -> Result<bool> {
        let created = OnceCell::new();
        for filter in &self.filters {
            if !filter.matches(store, snapshot, &created)? {
                debug!(
                    "Snapshot {} rejected by {}={}",
                    snapshot.name(),
                    filter.property,
                    filter.value
                );
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl FromIterator<Filter> for FilterSet {
    fn from_iter<I: IntoIterator<Item = Filter>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
