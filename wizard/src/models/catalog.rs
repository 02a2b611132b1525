// Sports catalog (`sports/catalog.json`)
//
// Shape: `{ "<sport_id>": { "labels": { "<lang>": "..." }, "group": "...", "macros": { "c", "f", "p" } } }`

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::draft::Macros;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SportRecord {
    pub labels: HashMap<String, String>,
    pub group: Option<String>,
    pub macros: Option<Macros>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SportsCatalog {
    sports: HashMap<String, SportRecord>,
}

impl SportsCatalog {
    pub fn new(sports: HashMap<String, SportRecord>) -> Self {
        Self { sports }
    }

    pub fn is_empty(&self) -> bool {
        self.sports.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&SportRecord> {
        self.sports.get(id)
    }

    /// Localized label, falling back to English and then to the id itself.
    pub fn label(&self, id: &str, lang: &str) -> String {
        self.sports
            .get(id)
            .and_then(|rec| rec.labels.get(lang).or_else(|| rec.labels.get("en")))
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    /// Sport ids by group (`other` when a record has none), ids sorted for stable display.
    pub fn grouped(&self) -> BTreeMap<String, Vec<String>> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (id, rec) in &self.sports {
            let group = rec.group.clone().unwrap_or_else(|| "other".to_string());
            groups.entry(group).or_default().push(id.clone());
        }
        for ids in groups.values_mut() {
            ids.sort();
        }
        groups
    }

    /// Recommended macro split for a sport, if the catalog defines one.
    pub fn macros_for(&self, id: Option<&str>) -> Option<Macros> {
        id.and_then(|id| self.sports.get(id))
            .and_then(|rec| rec.macros.clone())
    }
}
