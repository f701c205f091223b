/// Clan grouping: decides which hits compete in the overlap resolver
use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::debug;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use crate::hit::HitRecord;
use crate::hierarchy::HierarchyMap;
use crate::io::{data_lines, open_input};
use crate::policy::{Grouping, OverlapPolicy, Scope};

/// Accession → clan membership (Pfam-A.clans.tsv layout: `ACC\tCLAN\t...`)
#[derive(Debug, Clone, Default)]
pub struct ClanMap {
    clans: HashMap<String, String>,
}

impl ClanMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, accession: impl Into<String>, clan: impl Into<String>) {
        self.clans.insert(accession.into(), clan.into());
    }

    pub fn clan_of(&self, accession: &str) -> Option<&str> {
        self.clans.get(accession).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.clans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clans.is_empty()
    }

    /// Rows with an empty clan column are families outside any clan and are skipped
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut map = ClanMap::new();
        for line in data_lines(reader, &["#"]) {
            let (_, line) = line?;
            let mut fields = line.split('\t').map(str::trim);
            let (Some(acc), Some(clan)) = (fields.next(), fields.next()) else {
                continue;
            };
            if !acc.is_empty() && !clan.is_empty() {
                map.insert(acc, clan);
            }
        }
        Ok(map)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let map = Self::from_reader(open_input(path)?)
            .with_context(|| format!("Failed to read clan map {}", path.display()))?;
        debug!("Loaded {} clan memberships from {}", map.len(), path.display());
        Ok(map)
    }
}

/// Comparison group of a hit; only hits with equal keys on the same protein compete
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    /// Global scope: the whole protein is one group
    Protein,
    Clan(String),
    Family(String),
    /// Ungrouped: the hit competes only with hits of its own model
    Accession(String),
}

/// Resolves hits to comparison groups for one database's policy
#[derive(Debug, Clone)]
pub enum Grouper<'a> {
    Global,
    ByAccession,
    ByClan(&'a ClanMap),
    ByFamily(IndexMap<String, String>),
}

impl<'a> Grouper<'a> {
    /// Build the grouper for `policy`. A grouping whose table is missing falls
    /// back to per-accession groups; pipelines reject that case up front.
    pub fn new(
        policy: &OverlapPolicy,
        clans: Option<&'a ClanMap>,
        hierarchy: Option<&HierarchyMap>,
    ) -> Self {
        if policy.scope == Scope::Global {
            return Grouper::Global;
        }
        match (policy.grouping, clans, hierarchy) {
            (Grouping::Clan, Some(clans), _) => Grouper::ByClan(clans),
            (Grouping::FamilyMap, _, Some(hierarchy)) => Grouper::ByFamily(hierarchy.family_labels()),
            _ => Grouper::ByAccession,
        }
    }

    pub fn key_for(&self, hit: &HitRecord) -> GroupKey {
        let ungrouped = || GroupKey::Accession(hit.accession.clone());
        match self {
            Grouper::Global => GroupKey::Protein,
            Grouper::ByAccession => ungrouped(),
            Grouper::ByClan(clans) => clans
                .clan_of(&hit.accession)
                .map(|clan| GroupKey::Clan(clan.to_string()))
                .unwrap_or_else(ungrouped),
            Grouper::ByFamily(labels) => labels
                .get(&hit.accession)
                .map(|label| GroupKey::Family(label.clone()))
                .unwrap_or_else(ungrouped),
        }
    }

    /// Partition hits by (protein, group key), preserving first-seen order
    pub fn partition(&self, records: Vec<HitRecord>) -> Vec<Vec<HitRecord>> {
        let mut groups: IndexMap<(String, GroupKey), Vec<HitRecord>> = IndexMap::new();
        for record in records {
            let key = (record.protein_id.clone(), self.key_for(&record));
            groups.entry(key).or_default().push(record);
        }
        groups.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hit::tests::make_hit;
    use std::io::Cursor;

    fn clan_policy() -> OverlapPolicy {
        OverlapPolicy {
            overlap_fraction: 0.5,
            grouping: Grouping::Clan,
            ..OverlapPolicy::default()
        }
    }

    #[test]
    fn test_from_reader_skips_unclanned_families() {
        let text = "PF00001\tCL0192\t7tm_1\n PF00002\t\tGPCR\nPF00003\tCL0192\n";
        let clans = ClanMap::from_reader(Cursor::new(text)).unwrap();
        assert_eq!(clans.len(), 2);
        assert_eq!(clans.clan_of("PF00001"), Some("CL0192"));
        assert_eq!(clans.clan_of("PF00002"), None);
    }

    #[test]
    fn test_clan_and_singleton_keys() {
        let mut clans = ClanMap::new();
        clans.insert("PF00001", "CL0001");
        clans.insert("PF00002", "CL0001");
        let grouper = Grouper::new(&clan_policy(), Some(&clans), None);

        let a = make_hit("P1", "PF00001", 1, 50, 10.0);
        let b = make_hit("P1", "PF00002", 1, 50, 10.0);
        let c = make_hit("P1", "PF00003", 1, 50, 10.0);
        assert_eq!(grouper.key_for(&a), grouper.key_for(&b));
        assert_eq!(grouper.key_for(&c), GroupKey::Accession("PF00003".to_string()));
    }

    #[test]
    fn test_partition_separates_proteins() {
        let mut clans = ClanMap::new();
        clans.insert("PF00001", "CL0001");
        let grouper = Grouper::new(&clan_policy(), Some(&clans), None);

        let groups = grouper.partition(vec![
            make_hit("P1", "PF00001", 1, 50, 10.0),
            make_hit("P2", "PF00001", 1, 50, 10.0),
            make_hit("P1", "PF00001", 60, 90, 10.0),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1][0].protein_id, "P2");
    }

    #[test]
    fn test_global_scope_ignores_families() {
        let policy = OverlapPolicy {
            scope: Scope::Global,
            ..OverlapPolicy::default()
        };
        let grouper = Grouper::new(&policy, None, None);
        let groups = grouper.partition(vec![
            make_hit("P1", "G3DSA:1.10.10.10", 1, 50, 10.0),
            make_hit("P1", "G3DSA:3.40.50.300", 1, 50, 10.0),
        ]);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_family_map_grouping() {
        let mut hierarchy = HierarchyMap::new();
        hierarchy.add_child("SFLDS00001", "SFLDG00001");
        hierarchy.add_child("SFLDG00001", "SFLDF00001");
        let policy = OverlapPolicy {
            grouping: Grouping::FamilyMap,
            ..OverlapPolicy::default()
        };
        let grouper = Grouper::new(&policy, None, Some(&hierarchy));

        let family = make_hit("P1", "SFLDF00001", 1, 50, 10.0);
        let superfamily = make_hit("P1", "SFLDS00001", 1, 50, 10.0);
        assert_eq!(grouper.key_for(&family), grouper.key_for(&superfamily));
        assert_eq!(
            grouper.key_for(&family),
            GroupKey::Family("SFLDF00001".to_string())
        );
    }
}
