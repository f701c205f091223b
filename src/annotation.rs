/// Annotation joiner: InterPro entry, InterPro short name and GO terms
///
/// The three lookup tables are independent; any of them may be empty, and a
/// missing key always yields an empty field rather than an error.
use anyhow::{Context, Result};
use log::{debug, warn};
use nom::bytes::complete::{tag, take_till1};
use nom::character::complete::digit1;
use nom::combinator::recognize;
use nom::sequence::{pair, preceded};
use nom::IResult;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use crate::hit::{Database, HitRecord};
use crate::io::{data_lines, open_input};

#[derive(Debug, Clone, Default)]
pub struct AnnotationMaps {
    signature_to_interpro: HashMap<String, String>,
    interpro_to_go: HashMap<String, Vec<String>>,
    interpro_names: HashMap<String, String>,
}

/// A surviving hit with its joined annotation columns
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedHit {
    pub hit: HitRecord,
    pub interpro: String,
    pub interpro_desc: String,
    pub go: String, // semicolon-joined, file order
}

impl AnnotationMaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_signature(&mut self, accession: &str, interpro: &str) {
        // First entry per signature wins
        self.signature_to_interpro
            .entry(accession.to_string())
            .or_insert_with(|| interpro.to_string());
    }

    pub fn add_go_term(&mut self, interpro: &str, go_term: &str) {
        let terms = self.interpro_to_go.entry(interpro.to_string()).or_default();
        if !terms.iter().any(|t| t == go_term) {
            terms.push(go_term.to_string());
        }
    }

    pub fn add_interpro_name(&mut self, interpro: &str, name: &str) {
        self.interpro_names
            .insert(interpro.to_string(), name.to_string());
    }

    pub fn interpro_for(&self, accession: &str) -> Option<&str> {
        self.signature_to_interpro.get(accession).map(String::as_str)
    }

    pub fn go_terms(&self, interpro: &str) -> &[String] {
        self.interpro_to_go
            .get(interpro)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn interpro_name(&self, interpro: &str) -> Option<&str> {
        self.interpro_names.get(interpro).map(String::as_str)
    }

    /// Load `DB\tSIGNATURE\tIPR` rows belonging to `database`
    pub fn read_signatures<R: BufRead>(&mut self, reader: R, database: &Database) -> Result<usize> {
        let member = database.interpro_member_name();
        let mut loaded = 0usize;
        for line in data_lines(reader, &["#"]) {
            let (_, line) = line?;
            let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
            if fields.len() < 3 || fields[0] != member || fields[1].is_empty() || fields[2].is_empty() {
                continue;
            }
            self.add_signature(fields[1], fields[2]);
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Load an `interpro2go` mapping file
    pub fn read_interpro2go<R: BufRead>(&mut self, reader: R) -> Result<usize> {
        let mut loaded = 0usize;
        let mut skipped = 0usize;
        for line in data_lines(reader, &["!"]) {
            let (_, line) = line?;
            match parse_interpro2go_line(&line) {
                Some((interpro, go_term)) => {
                    self.add_go_term(interpro, go_term);
                    loaded += 1;
                }
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            debug!("Skipped {skipped} interpro2go lines without an InterPro/GO pair");
        }
        Ok(loaded)
    }

    /// Load `IPR\tshort name` rows
    pub fn read_interpro_names<R: BufRead>(&mut self, reader: R) -> Result<usize> {
        let mut loaded = 0usize;
        for line in data_lines(reader, &["#"]) {
            let (_, line) = line?;
            if let Some((interpro, name)) = line.split_once('\t') {
                let (interpro, name) = (interpro.trim(), name.trim());
                if interpro.starts_with("IPR") && !name.is_empty() {
                    self.add_interpro_name(interpro, name);
                    loaded += 1;
                }
            }
        }
        Ok(loaded)
    }

    pub fn load_signatures<P: AsRef<Path>>(&mut self, path: P, database: &Database) -> Result<()> {
        let path = path.as_ref();
        let n = self
            .read_signatures(open_input(path)?, database)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if n == 0 {
            warn!(
                "No {} signatures found in {}; InterPro column will be empty",
                database.interpro_member_name(),
                path.display()
            );
        }
        debug!("Loaded {n} signature mappings from {}", path.display());
        Ok(())
    }

    pub fn load_interpro2go<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let n = self
            .read_interpro2go(open_input(path)?)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        debug!("Loaded {n} GO mappings from {}", path.display());
        Ok(())
    }

    pub fn load_interpro_names<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let n = self
            .read_interpro_names(open_input(path)?)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        debug!("Loaded {n} InterPro names from {}", path.display());
        Ok(())
    }
}

fn interpro_id(input: &str) -> IResult<&str, &str> {
    preceded(tag("InterPro:"), take_till1(char::is_whitespace))(input)
}

fn go_id(input: &str) -> IResult<&str, &str> {
    recognize(pair(tag("GO:"), digit1))(input)
}

/// `InterPro:IPR000003 Retinoid X receptor/HNF4 > GO:DNA binding ; GO:0003677`
/// -> `("IPR000003", "GO:0003677")`
fn parse_interpro2go_line(line: &str) -> Option<(&str, &str)> {
    let (rest, interpro) = interpro_id(line.trim()).ok()?;
    let (_, go_part) = rest.split_once('>')?;
    let (_, go_field) = go_part.rsplit_once(';')?;
    let (tail, go_term) = go_id(go_field.trim()).ok()?;
    tail.trim().is_empty().then_some((interpro, go_term))
}

/// Attach InterPro, InterPro short name and GO columns; one output row per input row
pub fn join(records: Vec<HitRecord>, maps: &AnnotationMaps) -> Vec<AnnotatedHit> {
    records
        .into_iter()
        .map(|hit| {
            let interpro = maps.interpro_for(&hit.accession).unwrap_or("").to_string();
            let (interpro_desc, go) = if interpro.is_empty() {
                (String::new(), String::new())
            } else {
                (
                    maps.interpro_name(&interpro).unwrap_or("").to_string(),
                    maps.go_terms(&interpro).join(";"),
                )
            };
            AnnotatedHit {
                hit,
                interpro,
                interpro_desc,
                go,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hit::tests::make_hit;
    use std::io::Cursor;

    const INTERPRO2GO: &str = "\
!date: 2024/01/01
!Mapping of InterPro entries to GO
InterPro:IPR000003 Retinoid X receptor/HNF4 > GO:DNA binding ; GO:0003677
InterPro:IPR000003 Retinoid X receptor/HNF4 > GO:nuclear receptor activity ; GO:0004879
InterPro:IPR000003 Retinoid X receptor/HNF4 > GO:DNA binding ; GO:0003677
InterPro:IPR000005 Helix-turn-helix > GO:a; b ; GO:0003700
malformed line
";

    #[test]
    fn test_parse_interpro2go_line() {
        assert_eq!(
            parse_interpro2go_line("InterPro:IPR000001 Kringle > GO:binding ; GO:0005488"),
            Some(("IPR000001", "GO:0005488"))
        );
        assert_eq!(parse_interpro2go_line("InterPro:IPR000001 no mapping"), None);
        assert_eq!(parse_interpro2go_line("IPR000001 > GO:x ; GO:1"), None);
    }

    #[test]
    fn test_read_interpro2go_keeps_order_and_dedups() {
        let mut maps = AnnotationMaps::new();
        let n = maps.read_interpro2go(Cursor::new(INTERPRO2GO)).unwrap();
        assert_eq!(n, 4);
        assert_eq!(maps.go_terms("IPR000003"), ["GO:0003677", "GO:0004879"]);
        // GO names containing ';' still resolve to the trailing id
        assert_eq!(maps.go_terms("IPR000005"), ["GO:0003700"]);
    }

    #[test]
    fn test_read_signatures_filters_member_database() {
        let text = "PFAM\tPF00001\tIPR000276\nPANTHER\tPTHR10000\tIPR006383\nPFAM\tPF00001\tIPR999999\n";
        let mut maps = AnnotationMaps::new();
        let n = maps.read_signatures(Cursor::new(text), &Database::Pfam).unwrap();
        assert_eq!(n, 2);
        assert_eq!(maps.interpro_for("PF00001"), Some("IPR000276"));
        assert_eq!(maps.interpro_for("PTHR10000"), None);
    }

    #[test]
    fn test_join_interpro_without_go() {
        let mut maps = AnnotationMaps::new();
        maps.add_signature("PF00329", "IPR001135");
        maps.add_interpro_name("IPR001135", "NADH_Q_OxRdtase_suD");

        let joined = join(
            vec![
                make_hit("P1", "PF00329", 1, 100, 50.0),
                make_hit("P1", "PF99999", 120, 200, 30.0),
            ],
            &maps,
        );
        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0].interpro, "IPR001135");
        assert_eq!(joined[0].interpro_desc, "NADH_Q_OxRdtase_suD");
        assert_eq!(joined[0].go, "");
        assert_eq!(joined[1].interpro, "");
        assert_eq!(joined[1].interpro_desc, "");
    }

    #[test]
    fn test_join_go_terms_semicolon_joined() {
        let mut maps = AnnotationMaps::new();
        maps.add_signature("PF00001", "IPR000276");
        maps.add_go_term("IPR000276", "GO:0004930");
        maps.add_go_term("IPR000276", "GO:0007186");
        maps.add_go_term("IPR000276", "GO:0016020");

        let joined = join(vec![make_hit("P1", "PF00001", 1, 100, 50.0)], &maps);
        assert_eq!(joined[0].go, "GO:0004930;GO:0007186;GO:0016020");
        assert_eq!(joined[0].interpro_desc, "");
    }

    #[test]
    fn test_read_interpro_names() {
        let text = "IPR000001\tKringle\nIPR000002\t\nnot-an-entry\tx\n";
        let mut maps = AnnotationMaps::new();
        assert_eq!(maps.read_interpro_names(Cursor::new(text)).unwrap(), 1);
        assert_eq!(maps.interpro_name("IPR000001"), Some("Kringle"));
    }
}
