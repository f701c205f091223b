/// Best-hit selection: at most one classification per protein
use indexmap::IndexMap;
use std::cmp::Ordering;

use crate::hit::HitRecord;

/// Keep the single best-ranked hit of each protein (ties broken as in the
/// overlap resolver). Proteins come back in first-seen order.
pub fn best_hit_per_protein(records: Vec<HitRecord>) -> Vec<HitRecord> {
    let mut best: IndexMap<String, HitRecord> = IndexMap::new();

    for record in records {
        match best.get_mut(&record.protein_id) {
            Some(current) => {
                if record.rank_cmp(current) == Ordering::Less {
                    *current = record;
                }
            }
            None => {
                best.insert(record.protein_id.clone(), record);
            }
        }
    }

    best.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hit::tests::make_hit;
    use crate::hit::Database;

    #[test]
    fn test_one_per_protein() {
        let mut records: Vec<HitRecord> = [10.0, 50.0, 30.0, 20.0, 5.0]
            .iter()
            .enumerate()
            .map(|(i, &score)| {
                let mut hit = make_hit("P1", &format!("PTHR1000{i}"), 1, 200, score);
                hit.database = Database::Panther;
                hit
            })
            .collect();
        records.push(make_hit("P2", "PTHR20000", 1, 80, 12.0));

        let kept = best_hit_per_protein(records);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].accession, "PTHR10001");
        assert_eq!(kept[0].score, 50.0);
        assert_eq!(kept[1].protein_id, "P2");
    }

    #[test]
    fn test_tie_prefers_lower_evalue() {
        let mut a = make_hit("P1", "MF_00001", 1, 200, 80.0);
        let mut b = make_hit("P1", "MF_00002", 1, 200, 80.0);
        a.evalue = 1e-20;
        b.evalue = 1e-30;
        let kept = best_hit_per_protein(vec![a, b]);
        assert_eq!(kept[0].accession, "MF_00002");
    }

    #[test]
    fn test_empty() {
        assert!(best_hit_per_protein(Vec::new()).is_empty());
    }
}
