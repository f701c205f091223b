/// Family hierarchy: parent→children map and the parent-suppression stage
///
/// Hierarchy sources are not guaranteed to be clean trees (SFLD and PIRSF
/// both have families with several parents, and unlisted leaves), so
/// suppression is opt-in per database and every walk here tolerates cycles.
use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::debug;
use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use std::path::Path;

use crate::hit::HitRecord;
use crate::io::{data_lines, open_input};
use crate::union_find::UnionFind;

#[derive(Debug, Clone, Default)]
pub struct HierarchyMap {
    children: HashMap<String, Vec<String>>,
}

impl HierarchyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_child(&mut self, parent: &str, child: &str) {
        if parent == child {
            return;
        }
        let entry = self.children.entry(parent.to_string()).or_default();
        if !entry.iter().any(|c| c == child) {
            entry.push(child.to_string());
        }
    }

    pub fn children(&self, parent: &str) -> &[String] {
        self.children.get(parent).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Parse `PARENT\tCHILD[\tCHILD...]` rows; children may also be
    /// comma-separated within a column.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut map = HierarchyMap::new();
        for line in data_lines(reader, &["#"]) {
            let (_, line) = line?;
            let mut fields = line.split('\t');
            let Some(parent) = fields.next().map(str::trim).filter(|p| !p.is_empty()) else {
                continue;
            };
            for child in fields.flat_map(|f| f.split(',')).map(str::trim) {
                if !child.is_empty() {
                    map.add_child(parent, child);
                }
            }
        }
        Ok(map)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let map = Self::from_reader(open_input(path)?)
            .with_context(|| format!("Failed to read hierarchy map {}", path.display()))?;
        debug!("Loaded {} parent families from {}", map.len(), path.display());
        Ok(map)
    }

    /// True if any transitive descendant of `family` is in `present`
    pub fn has_descendant_in(&self, family: &str, present: &HashSet<&str>) -> bool {
        let mut stack: Vec<&str> = self.children(family).iter().map(String::as_str).collect();
        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(family);

        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            if present.contains(current) {
                return true;
            }
            stack.extend(self.children(current).iter().map(String::as_str));
        }
        false
    }

    /// Label every family with the smallest accession of its connected family tree
    pub fn family_labels(&self) -> IndexMap<String, String> {
        let mut uf = UnionFind::new();
        let mut parents: Vec<&String> = self.children.keys().collect();
        parents.sort();
        for parent in parents {
            uf.insert(parent);
            for child in &self.children[parent] {
                uf.union(parent, child);
            }
        }
        uf.labels()
    }
}

/// Drop every hit whose family has a more specific descendant family hit on
/// the same protein. Survivors keep their input order.
pub fn suppress_parents(records: Vec<HitRecord>, hierarchy: &HierarchyMap) -> Vec<HitRecord> {
    let input_len = records.len();

    let mut by_protein: HashMap<&str, HashSet<&str>> = HashMap::new();
    for r in &records {
        by_protein
            .entry(r.protein_id.as_str())
            .or_default()
            .insert(r.accession.as_str());
    }

    let suppressed: Vec<bool> = records
        .iter()
        .map(|r| {
            by_protein
                .get(r.protein_id.as_str())
                .map_or(false, |present| hierarchy.has_descendant_in(&r.accession, present))
        })
        .collect();

    let kept: Vec<HitRecord> = records
        .into_iter()
        .zip(suppressed)
        .filter_map(|(r, suppressed)| (!suppressed).then_some(r))
        .collect();

    debug!("Hierarchy suppression: {} -> {} records", input_len, kept.len());
    kept
}
