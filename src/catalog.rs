//! Ordered list of selectable regions.

use serde::Serialize;

use crate::dataset::DatasetStore;
use crate::state::{CATALOG_SEPARATOR, NO_REGION, WORLD};

/// `World`, `None`, the aggregate groups, a separator, then individual regions.
#[derive(Debug, Clone, Serialize)]
pub struct RegionCatalog {
    entries: Vec<String>,
    groups: Vec<String>,
}

impl RegionCatalog {
    pub fn new<'a>(regions: impl IntoIterator<Item = &'a str>, groups: &[String]) -> Self {
        let mut groups: Vec<String> = groups
            .iter()
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty() && g != WORLD && g != NO_REGION)
            .collect();
        groups.sort();
        groups.dedup();

        let mut individual: Vec<String> = regions
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty() && r != WORLD && r != NO_REGION && r != CATALOG_SEPARATOR)
            .filter(|r| !groups.contains(r))
            .collect();
        individual.sort();
        individual.dedup();

        let mut entries = Vec::with_capacity(groups.len() + individual.len() + 3);
        entries.push(WORLD.to_string());
        entries.push(NO_REGION.to_string());
        entries.extend(groups.iter().cloned());
        entries.push(CATALOG_SEPARATOR.to_string());
        entries.extend(individual);
        Self { entries, groups }
    }

    pub fn from_store(store: &DatasetStore) -> Self {
        Self::new(store.regions(), store.groups())
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn is_group(&self, region: &str) -> bool {
        self.groups.iter().any(|g| g == region)
    }

    /// The separator is listed but cannot be selected.
    pub fn is_selectable(&self, region: &str) -> bool {
        region != CATALOG_SEPARATOR && self.entries.iter().any(|e| e == region)
    }
}
