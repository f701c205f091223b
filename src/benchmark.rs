/// Agreement between a filtered hit table and a reference annotation
///
/// Hits are compared as `(protein, database, accession)` keys; coordinates are
/// ignored. Per-database true/false positives and misses give precision,
/// recall and F1.
use anyhow::{bail, Result};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::{BufRead, Write};

use crate::accession;
use crate::hit::Database;
use crate::io::data_lines;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HitKey {
    pub protein: String,
    pub database: String,
    pub accession: String,
}

impl HitKey {
    fn new(protein: &str, database: &Database, raw_accession: &str) -> Option<Self> {
        let accession = accession::normalize(database, raw_accession);
        if protein.is_empty() || accession.is_empty() {
            return None;
        }
        Some(HitKey {
            protein: protein.to_string(),
            database: database.to_string(),
            accession,
        })
    }
}

pub type KeySet = BTreeSet<HitKey>;

/// Load a filtered table as written by `nailscan`. The database comes from an
/// `Analysis` column when there is one, otherwise from `database`.
pub fn load_prediction<R: BufRead>(reader: R, database: Option<&Database>) -> Result<KeySet> {
    let mut lines = data_lines(reader, &["#"]);
    let Some(header) = lines.next() else {
        return Ok(KeySet::new());
    };
    let (_, header) = header?;
    let columns: Vec<&str> = header.split('\t').map(str::trim).collect();
    let find = |name: &str| columns.iter().position(|c| *c == name);

    let Some(target) = find("target") else {
        bail!("Prediction table has no 'target' column");
    };
    let acc = find("ACC").or_else(|| find("NAME"));
    let Some(acc) = acc else {
        bail!("Prediction table has neither 'ACC' nor 'NAME' column");
    };
    let analysis = find("Analysis");
    if analysis.is_none() && database.is_none() {
        bail!("Prediction table has no 'Analysis' column; pass the database explicitly");
    }

    let mut keys = KeySet::new();
    for line in lines {
        let (_, line) = line?;
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        let db = match (analysis.and_then(|i| fields.get(i)), database) {
            (Some(name), _) => name.parse::<Database>().unwrap_or_else(|e| match e {}),
            (None, Some(db)) => db.clone(),
            (None, None) => continue,
        };
        let protein = fields.get(target).copied().unwrap_or("");
        let raw = fields.get(acc).copied().unwrap_or("");
        if let Some(key) = HitKey::new(protein, &db, raw) {
            keys.insert(key);
        }
    }
    Ok(keys)
}

/// Load an InterProScan TSV (no header; protein, md5, length, analysis,
/// accession, ...). Analyses that are not profile-HMM member databases are skipped.
pub fn load_interproscan<R: BufRead>(reader: R) -> Result<KeySet> {
    let mut keys = KeySet::new();
    for line in data_lines(reader, &["#"]) {
        let (_, line) = line?;
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        if fields.len() < 5 {
            continue;
        }
        let db: Database = fields[3].parse().unwrap_or_else(|e| match e {});
        if !db.is_known() {
            continue;
        }
        if let Some(key) = HitKey::new(fields[0], &db, fields[4]) {
            keys.insert(key);
        }
    }
    Ok(keys)
}

/// Drop reference keys for proteins the prediction never mentions
pub fn restrict_to_predicted(reference: KeySet, prediction: &KeySet) -> KeySet {
    let proteins: HashSet<&str> = prediction.iter().map(|k| k.protein.as_str()).collect();
    reference
        .into_iter()
        .filter(|k| proteins.contains(k.protein.as_str()))
        .collect()
}

/// Keep only keys of the named databases
pub fn restrict_to_databases(keys: KeySet, databases: &[Database]) -> KeySet {
    let names: HashSet<String> = databases.iter().map(|d| d.to_string()).collect();
    keys.into_iter().filter(|k| names.contains(&k.database)).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Agreement {
    pub tp: usize,
    pub fp: usize,
    pub fn_: usize,
}

impl Agreement {
    pub fn predicted(&self) -> usize {
        self.tp + self.fp
    }

    pub fn reference(&self) -> usize {
        self.tp + self.fn_
    }

    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.predicted())
    }

    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.reference())
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r > 0.0 {
            2.0 * p * r / (p + r)
        } else {
            0.0
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Per-database agreement, keyed by database display name
pub fn compare(prediction: &KeySet, reference: &KeySet) -> BTreeMap<String, Agreement> {
    let mut stats: BTreeMap<String, Agreement> = BTreeMap::new();
    for key in prediction {
        let entry = stats.entry(key.database.clone()).or_default();
        if reference.contains(key) {
            entry.tp += 1;
        } else {
            entry.fp += 1;
        }
    }
    for key in reference.difference(prediction) {
        stats.entry(key.database.clone()).or_default().fn_ += 1;
    }
    stats
}

pub fn overall(stats: &BTreeMap<String, Agreement>) -> Agreement {
    stats.values().fold(Agreement::default(), |acc, s| Agreement {
        tp: acc.tp + s.tp,
        fp: acc.fp + s.fp,
        fn_: acc.fn_ + s.fn_,
    })
}

pub fn write_report<W: Write>(out: &mut W, stats: &BTreeMap<String, Agreement>) -> Result<()> {
    let row = |out: &mut W, name: &str, s: &Agreement| {
        writeln!(
            out,
            "{:<18}  {:>6}  {:>6}  {:>6}  {:>6}  {:>6}  {:>7.3}  {:>7.3}  {:>7.3}",
            name,
            s.predicted(),
            s.reference(),
            s.tp,
            s.fp,
            s.fn_,
            s.precision(),
            s.recall(),
            s.f1()
        )
    };

    let header = format!(
        "{:<18}  {:>6}  {:>6}  {:>6}  {:>6}  {:>6}  {:>7}  {:>7}  {:>7}",
        "Database", "Pred", "Ref", "TP", "FP", "FN", "Prec", "Recall", "F1"
    );
    let sep = "-".repeat(header.len());
    writeln!(out, "{header}")?;
    writeln!(out, "{sep}")?;
    for (db, s) in stats {
        row(out, db, s)?;
    }
    writeln!(out, "{sep}")?;
    row(out, "OVERALL", &overall(stats))?;
    Ok(())
}

/// One row per key in either set, with its TP/FP/FN status
pub fn write_detail<W: Write>(out: &mut W, prediction: &KeySet, reference: &KeySet) -> Result<()> {
    writeln!(out, "protein\tdb\tacc\tin_pred\tin_ref\tstatus")?;
    for key in prediction.union(reference) {
        let in_pred = prediction.contains(key);
        let in_ref = reference.contains(key);
        let status = match (in_pred, in_ref) {
            (true, true) => "TP",
            (true, false) => "FP",
            _ => "FN",
        };
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}",
            key.protein, key.database, key.accession, in_pred as u8, in_ref as u8, status
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const PREDICTION: &str = "\
target\tACC\tDESC\ttarget_start\ttarget_end
P1\tPF00001.20\t7tm_1\t10\t200
P1\tPF00002\tx\t220\t300
P2\tPF00003\ty\t5\t50
";

    const REFERENCE: &str = "\
P1\tmd5\t350\tPfam\tPF00001\t7tm_1\t12\t198\t1e-30\tT\t01-01-2024\tIPR000276\t-\t-
P1\tmd5\t350\tMobiDBLite\tmobidb-lite\tdisorder\t1\t20\t-\tT\t01-01-2024\t-\t-\t-
P3\tmd5\t90\tPfam\tPF00004\tz\t1\t80\t1e-10\tT\t01-01-2024\t-\t-\t-
P2\tmd5\t120\tPfam\tPF00005\tw\t1\t80\t1e-10\tT\t01-01-2024\t-\t-\t-
";

    fn load_both() -> (KeySet, KeySet) {
        let pred = load_prediction(Cursor::new(PREDICTION), Some(&Database::Pfam)).unwrap();
        let reference = load_interproscan(Cursor::new(REFERENCE)).unwrap();
        (pred, reference)
    }

    #[test]
    fn test_load_normalizes_and_skips_other_analyses() {
        let (pred, reference) = load_both();
        assert_eq!(pred.len(), 3);
        assert!(pred.iter().any(|k| k.accession == "PF00001"));
        assert_eq!(reference.len(), 3);
        assert!(reference.iter().all(|k| k.database == "Pfam"));
    }

    #[test]
    fn test_prediction_needs_database() {
        assert!(load_prediction(Cursor::new(PREDICTION), None).is_err());
        let with_analysis = "Analysis\ttarget\tACC\nPANTHER\tP1\tPTHR10000.orig.30.pir\n";
        let keys = load_prediction(Cursor::new(with_analysis), None).unwrap();
        let key = keys.iter().next().unwrap();
        assert_eq!(key.database, "PANTHER");
        assert_eq!(key.accession, "PTHR10000");
    }

    #[test]
    fn test_compare_restricted_to_predicted_proteins() {
        let (pred, reference) = load_both();
        let reference = restrict_to_predicted(reference, &pred);
        assert_eq!(reference.len(), 2);

        let stats = compare(&pred, &reference);
        let pfam = stats["Pfam"];
        assert_eq!(pfam, Agreement { tp: 1, fp: 2, fn_: 1 });
        assert!((pfam.precision() - 1.0 / 3.0).abs() < 1e-12);
        assert!((pfam.recall() - 0.5).abs() < 1e-12);
        assert!((pfam.f1() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_empty_agreement_is_zero() {
        let empty = Agreement::default();
        assert_eq!(empty.precision(), 0.0);
        assert_eq!(empty.f1(), 0.0);
    }

    #[test]
    fn test_detail_rows() {
        let (pred, reference) = load_both();
        let mut out = Vec::new();
        write_detail(&mut out, &pred, &reference).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1 + 5);
        assert!(text.contains("P1\tPfam\tPF00001\t1\t1\tTP"));
        assert!(text.contains("P3\tPfam\tPF00004\t0\t1\tFN"));
    }
}
