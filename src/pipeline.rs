/// Per-database pipeline driver
///
/// Runs Normalizer -> Gate -> selection strategy -> (Hierarchy Suppressor)
/// -> Joiner for every protein of one database's hits. The behaviour is taken
/// entirely from the `DatabasePolicy` row; tables are shared read-only across
/// the rayon workers.
use indexmap::IndexMap;
use log::{debug, info};
use rayon::prelude::*;
use std::collections::HashMap;

use crate::accession;
use crate::annotation::{self, AnnotatedHit, AnnotationMaps};
use crate::best_hit::best_hit_per_protein;
use crate::clan::{ClanMap, Grouper};
use crate::error::Result;
use crate::hierarchy::{suppress_parents, HierarchyMap};
use crate::hit::{Database, HitRecord};
use crate::models::ModelMap;
use crate::overlap::resolve_overlaps;
use crate::policy::{DatabasePolicy, Strategy};
use crate::thresholds::{gate, ThresholdTable};

/// Lookup tables for one run, loaded up front and never mutated afterwards
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub thresholds: Option<ThresholdTable>,
    pub clans: Option<ClanMap>,
    pub hierarchy: Option<HierarchyMap>,
    pub models: Option<ModelMap>,
    /// Family descriptions keyed by canonical accession (PANTHER names)
    pub family_names: HashMap<String, String>,
    pub annotations: AnnotationMaps,
}

/// Record counts after each stage, summed over proteins
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    pub input: usize,
    pub gated: usize,
    pub selected: usize,
    pub output: usize,
}

impl StageCounts {
    fn add(self, other: StageCounts) -> StageCounts {
        StageCounts {
            input: self.input + other.input,
            gated: self.gated + other.gated,
            selected: self.selected + other.selected,
            output: self.output + other.output,
        }
    }
}

pub struct Pipeline<'a> {
    database: Database,
    policy: DatabasePolicy,
    tables: &'a Tables,
    grouper: Grouper<'a>,
}

impl<'a> Pipeline<'a> {
    /// Build a pipeline, rejecting a policy the supplied tables cannot back
    pub fn new(database: Database, policy: DatabasePolicy, tables: &'a Tables) -> Result<Self> {
        policy.validate(&database, tables.clans.is_some(), tables.hierarchy.is_some())?;
        let grouper = Grouper::new(&policy.overlap, tables.clans.as_ref(), tables.hierarchy.as_ref());
        debug!(
            "Pipeline for {}: {:?}, overlap {}, {:?}/{}, hierarchy {}",
            database,
            policy.strategy,
            policy.overlap.overlap_fraction,
            policy.overlap.scope,
            policy.overlap.grouping,
            if policy.hierarchy_suppress { "on" } else { "off" }
        );
        Ok(Pipeline {
            database,
            policy,
            tables,
            grouper,
        })
    }

    /// Pipeline with the built-in policy row for `database`
    pub fn for_database(database: Database, tables: &'a Tables) -> Result<Self> {
        let policy = DatabasePolicy::for_database(&database);
        Self::new(database, policy, tables)
    }

    /// Fill ACC/DESC from the model map where the input left them empty, then
    /// derive the canonical accession
    pub fn normalize(&self, mut record: HitRecord) -> HitRecord {
        if let Some(info) = self
            .tables
            .models
            .as_ref()
            .and_then(|models| models.get(&record.model_name))
        {
            if record.accession.is_empty() {
                record.accession = info.accession.clone();
            }
            if record.description.is_empty() {
                record.description = info.description.clone();
            }
        }

        record.accession = accession::normalize(&self.database, record.raw_identifier());

        if record.description.is_empty() {
            if let Some(name) = self.tables.family_names.get(&record.accession) {
                record.description = name.clone();
            }
        }
        record
    }

    /// Gate, select and suppress the hits of a single protein
    pub fn filter_protein(&self, records: Vec<HitRecord>) -> (Vec<HitRecord>, StageCounts) {
        let input = records.len();
        // Threshold tables are per member database; unknown databases are never gated by one
        let thresholds = self
            .tables
            .thresholds
            .as_ref()
            .filter(|_| self.database.is_known());
        let gated = gate(records, thresholds, &self.policy.overlap);
        let gated_len = gated.len();

        let selected = match self.policy.strategy {
            Strategy::GateOnly => gated,
            Strategy::OverlapResolve => {
                resolve_overlaps(gated, self.policy.overlap.overlap_fraction, &self.grouper)
            }
            Strategy::BestHit => best_hit_per_protein(gated),
        };
        let selected_len = selected.len();

        let kept = match (self.policy.hierarchy_suppress, self.tables.hierarchy.as_ref()) {
            (true, Some(hierarchy)) => suppress_parents(selected, hierarchy),
            _ => selected,
        };

        let counts = StageCounts {
            input,
            gated: gated_len,
            selected: selected_len,
            output: kept.len(),
        };
        (kept, counts)
    }

    /// Filter and annotate a whole table. Output is sorted by protein id, then
    /// target start, then rank.
    pub fn run(&self, records: Vec<HitRecord>) -> Vec<AnnotatedHit> {
        let mut by_protein: IndexMap<String, Vec<HitRecord>> = IndexMap::new();
        for record in records {
            let record = self.normalize(record);
            by_protein
                .entry(record.protein_id.clone())
                .or_default()
                .push(record);
        }
        let num_proteins = by_protein.len();

        let (mut kept, counts) = by_protein
            .into_values()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|hits| self.filter_protein(hits))
            .reduce(
                || (Vec::new(), StageCounts::default()),
                |(mut acc, acc_counts), (hits, counts)| {
                    acc.extend(hits);
                    (acc, acc_counts.add(counts))
                },
            );

        kept.sort_by(|a, b| {
            a.protein_id
                .cmp(&b.protein_id)
                .then(a.target_start.cmp(&b.target_start))
                .then_with(|| a.rank_cmp(b))
        });

        info!(
            "{}: {} proteins, {} hits -> {} after gate -> {} after selection -> {} kept",
            self.database, num_proteins, counts.input, counts.gated, counts.selected, counts.output
        );

        annotation::join(kept, &self.tables.annotations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NailscanError;
    use crate::hit::tests::make_hit;
    use crate::policy::{Grouping, Scope};

    #[test]
    fn test_normalize_fills_from_model_map() {
        let mut models = ModelMap::new();
        models.insert("NADH_dh", "PF00329.26", "Respiratory-chain NADH dehydrogenase");
        let tables = Tables {
            models: Some(models),
            ..Tables::default()
        };
        let pipeline = Pipeline::new(Database::Pfam, DatabasePolicy::passthrough(), &tables).unwrap();

        let mut hit = make_hit("P1", "", 1, 100, 50.0);
        hit.model_name = "NADH_dh".to_string();
        let hit = pipeline.normalize(hit);
        assert_eq!(hit.accession, "PF00329");
        assert_eq!(hit.description, "Respiratory-chain NADH dehydrogenase");
    }

    #[test]
    fn test_input_accession_wins_over_model_map() {
        let mut models = ModelMap::new();
        models.insert("NADH_dh", "PF99999.1", "mapped");
        let tables = Tables {
            models: Some(models),
            ..Tables::default()
        };
        let pipeline = Pipeline::new(Database::Pfam, DatabasePolicy::passthrough(), &tables).unwrap();

        let mut hit = make_hit("P1", "PF00329.26", 1, 100, 50.0);
        hit.model_name = "NADH_dh".to_string();
        hit.description = "from input".to_string();
        let hit = pipeline.normalize(hit);
        assert_eq!(hit.accession, "PF00329");
        assert_eq!(hit.description, "from input");
    }

    #[test]
    fn test_panther_names_fill_description() {
        let mut tables = Tables::default();
        tables
            .family_names
            .insert("PTHR16038".to_string(), "PROTEIN KINASE".to_string());
        let pipeline = Pipeline::for_database(Database::Panther, &tables).unwrap();

        let mut hit = make_hit("P1", "", 1, 100, 50.0);
        hit.database = Database::Panther;
        hit.model_name = "PTHR16038.orig.30.pir".to_string();
        let hit = pipeline.normalize(hit);
        assert_eq!(hit.accession, "PTHR16038");
        assert_eq!(hit.description, "PROTEIN KINASE");
    }

    #[test]
    fn test_missing_clan_map_is_fatal() {
        let tables = Tables::default();
        let err = Pipeline::for_database(Database::Pfam, &tables).err().unwrap();
        assert!(matches!(err, NailscanError::PolicyMisconfiguration { .. }));
    }

    #[test]
    fn test_stage_counts() {
        let mut thresholds = ThresholdTable::new();
        thresholds.insert("PF00002", 0.0, 25.0);
        let mut policy = DatabasePolicy::passthrough();
        policy.strategy = Strategy::OverlapResolve;
        policy.overlap.overlap_fraction = 0.5;
        policy.overlap.scope = Scope::Global;
        policy.overlap.grouping = Grouping::None;
        let tables = Tables {
            thresholds: Some(thresholds),
            ..Tables::default()
        };
        let pipeline = Pipeline::new(Database::Gene3d, policy, &tables).unwrap();

        let (kept, counts) = pipeline.filter_protein(vec![
            make_hit("P1", "PF00001", 1, 100, 50.0),
            make_hit("P1", "PF00002", 10, 90, 20.0), // below domain threshold
            make_hit("P1", "PF00003", 20, 110, 40.0), // overlaps PF00001
            make_hit("P1", "PF00004", 150, 200, 30.0),
        ]);
        assert_eq!(kept.len(), 2);
        assert_eq!(
            counts,
            StageCounts {
                input: 4,
                gated: 3,
                selected: 2,
                output: 2
            }
        );
    }

    #[test]
    fn test_unknown_database_ignores_threshold_table() {
        let mut thresholds = ThresholdTable::new();
        thresholds.insert("PR00001", 0.0, 100.0);
        let tables = Tables {
            thresholds: Some(thresholds),
            ..Tables::default()
        };
        let mut hit = make_hit("P1", "PR00001", 1, 100, 5.0);
        hit.database = Database::Other("prints".to_string());

        let pipeline = Pipeline::for_database(Database::Other("prints".to_string()), &tables).unwrap();
        let (kept, _) = pipeline.filter_protein(vec![hit.clone()]);
        assert_eq!(kept.len(), 1);

        // The same table gates a known database
        hit.database = Database::Sfld;
        let pipeline = Pipeline::new(Database::Sfld, DatabasePolicy::passthrough(), &tables).unwrap();
        let (kept, _) = pipeline.filter_protein(vec![hit]);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_run_sorts_by_protein_then_start() {
        let tables = Tables::default();
        let pipeline = Pipeline::new(Database::Sfld, DatabasePolicy::passthrough(), &tables).unwrap();
        let out = pipeline.run(vec![
            make_hit("P2", "SFLDF00001", 5, 50, 10.0),
            make_hit("P1", "SFLDF00002", 90, 120, 10.0),
            make_hit("P1", "SFLDF00003", 3, 60, 10.0),
        ]);
        let order: Vec<(&str, u32)> = out
            .iter()
            .map(|a| (a.hit.protein_id.as_str(), a.hit.target_start))
            .collect();
        assert_eq!(order, vec![("P1", 3), ("P1", 90), ("P2", 5)]);
    }
}
