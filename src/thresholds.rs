/// Threshold gate: curated per-model cutoffs plus the policy's score/e-value limits
use anyhow::{Context, Result};
use log::debug;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use crate::hit::HitRecord;
use crate::io::{data_lines, open_input};
use crate::policy::OverlapPolicy;

/// Per-model cutoffs, keyed by the raw model NAME
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    pub sequence: f64, // applied to the per-protein sum of domain scores
    pub domain: f64,   // applied to each hit
}

#[derive(Debug, Clone, Default)]
pub struct ThresholdTable {
    cutoffs: HashMap<String, Threshold>,
}

impl ThresholdTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, model_name: impl Into<String>, sequence: f64, domain: f64) {
        self.cutoffs
            .insert(model_name.into(), Threshold { sequence, domain });
    }

    pub fn get(&self, model_name: &str) -> Option<Threshold> {
        self.cutoffs.get(model_name).copied()
    }

    pub fn len(&self) -> usize {
        self.cutoffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cutoffs.is_empty()
    }

    /// Parse `NAME\tsequence\tdomain` rows (the `.ga` / `.tc` files).
    /// Rows with fewer than three columns or unparseable numbers are skipped.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut table = ThresholdTable::new();
        let mut skipped = 0usize;

        for line in data_lines(reader, &["#"]) {
            let (_, line) = line?;
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 3 {
                skipped += 1;
                continue;
            }
            match (fields[1].trim().parse::<f64>(), fields[2].trim().parse::<f64>()) {
                (Ok(seq), Ok(dom)) => table.insert(fields[0].trim(), seq, dom),
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            debug!("Skipped {skipped} unparseable threshold rows");
        }
        Ok(table)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let table = Self::from_reader(open_input(path)?)
            .with_context(|| format!("Failed to read threshold table {}", path.display()))?;
        debug!("Loaded {} model thresholds from {}", table.len(), path.display());
        Ok(table)
    }
}

/// Apply the policy cutoffs, then the domain gate, then the sequence gate.
///
/// Models without a table entry are not gated by the table. Surviving records
/// keep their input order.
pub fn gate(
    records: Vec<HitRecord>,
    table: Option<&ThresholdTable>,
    policy: &OverlapPolicy,
) -> Vec<HitRecord> {
    let input_len = records.len();

    // Policy-level cutoffs
    let mut kept: Vec<HitRecord> = records
        .into_iter()
        .filter(|r| policy.evalue_cutoff.map_or(true, |cutoff| r.evalue <= cutoff))
        .filter(|r| policy.bitscore_cutoff.map_or(true, |cutoff| r.score >= cutoff))
        .collect();

    let Some(table) = table else {
        return kept;
    };

    // Domain gate
    kept.retain(|r| table.get(&r.model_name).map_or(true, |t| r.score >= t.domain));

    // Sequence gate on the domain survivors
    let mut sums: HashMap<(&str, &str), f64> = HashMap::new();
    for r in &kept {
        if table.get(&r.model_name).is_some() {
            *sums
                .entry((r.protein_id.as_str(), r.model_name.as_str()))
                .or_insert(0.0) += r.score;
        }
    }
    let failing: Vec<(String, String)> = sums
        .into_iter()
        .filter(|((_, model), sum)| table.get(model).map_or(false, |t| *sum < t.sequence))
        .map(|((protein, model), _)| (protein.to_string(), model.to_string()))
        .collect();

    if !failing.is_empty() {
        kept.retain(|r| {
            !failing
                .iter()
                .any(|(protein, model)| *protein == r.protein_id && *model == r.model_name)
        });
    }

    debug!("Threshold gate: {} -> {} records", input_len, kept.len());
    kept
}
