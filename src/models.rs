/// Model metadata: NAME → (ACC, DESC) for the profiles searched, plus
/// PANTHER family names
use anyhow::{Context, Result};
use log::{debug, info};
use std::collections::HashMap;
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::io::{data_lines, open_input};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelInfo {
    pub accession: String,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct ModelMap {
    models: HashMap<String, ModelInfo>,
}

impl ModelMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, accession: impl Into<String>, description: impl Into<String>) {
        self.models.insert(
            name.into(),
            ModelInfo {
                accession: accession.into(),
                description: description.into(),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&ModelInfo> {
        self.models.get(name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// `NAME\tACC[\tDESC]` rows, as written next to the HMM file (`<hmm>.map`)
    pub fn from_map_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut map = ModelMap::new();
        for line in data_lines(reader, &["#"]) {
            let (_, line) = line?;
            let mut fields = line.splitn(3, '\t');
            let name = fields.next().unwrap_or("").trim();
            let acc = fields.next().unwrap_or("").trim();
            let desc = fields.next().unwrap_or("").trim();
            if !name.is_empty() && !acc.is_empty() {
                map.insert(name, acc, desc);
            }
        }
        Ok(map)
    }

    /// Read NAME / ACC / DESC from the headers of a HMMER3 text profile file
    pub fn from_hmm_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut map = ModelMap::new();
        let mut name = String::new();
        let mut info = ModelInfo::default();

        for line in reader.lines() {
            let line = line?;
            if line.starts_with("//") {
                if !name.is_empty() {
                    map.models.insert(std::mem::take(&mut name), std::mem::take(&mut info));
                }
                info = ModelInfo::default();
                continue;
            }
            // Header tags are left-justified; model lines are indented
            let Some((tag, value)) = line.split_once(char::is_whitespace) else {
                continue;
            };
            match tag {
                "NAME" => name = value.trim().to_string(),
                "ACC" => info.accession = value.trim().to_string(),
                "DESC" => info.description = value.trim().to_string(),
                _ => {}
            }
        }
        // Unterminated last record
        if !name.is_empty() {
            map.models.insert(name, info);
        }
        Ok(map)
    }

    /// Load a `.map` table, or parse a HMMER3 profile file (`.hmm`, `.hmm.gz`)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let is_hmm = file_name.ends_with(".hmm") || file_name.ends_with(".hmm.gz");

        let map = if is_hmm {
            Self::from_hmm_reader(open_input(path)?)
        } else {
            Self::from_map_reader(open_input(path)?)
        }
        .with_context(|| format!("Failed to read model map {}", path.display()))?;

        debug!("Loaded {} model entries from {}", map.len(), path.display());
        Ok(map)
    }
}

/// `id\tname` rows of a PANTHER classifications file. Subfamily ids
/// (containing `:`) and unnamed families are skipped.
pub fn panther_names_from_reader<R: BufRead>(reader: R) -> Result<HashMap<String, String>> {
    let mut names = HashMap::new();
    for line in data_lines(reader, &["#"]) {
        let (_, line) = line?;
        let mut fields = line.split('\t').map(str::trim);
        let (Some(id), Some(name)) = (fields.next(), fields.next()) else {
            continue;
        };
        if !id.contains(':') && !name.is_empty() && name != "FAMILY NOT NAMED" {
            names.insert(id.to_string(), name.to_string());
        }
    }
    Ok(names)
}

/// Latest `PANTHER*_HMM_classifications` file under `dir`, if any
pub fn find_panther_classifications(dir: &Path) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("PANTHER") && n.ends_with("_HMM_classifications"))
                .unwrap_or(false)
        })
        .collect();
    candidates.sort();
    candidates.pop()
}

pub fn load_panther_names(dir: &Path) -> Result<HashMap<String, String>> {
    let Some(path) = find_panther_classifications(dir) else {
        debug!("No PANTHER classifications file in {}", dir.display());
        return Ok(HashMap::new());
    };
    let names = panther_names_from_reader(open_input(&path)?)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    info!("Loaded {} PANTHER family names from {}", names.len(), path.display());
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HMM_TEXT: &str = "\
HMMER3/f [3.3 | Nov 2019]
NAME  1-cysPrx_C
ACC   PF10417.13
DESC  C-terminal domain of 1-Cys peroxiredoxin
LENG  40
HMM          A        C        D
  COMPO   2.5 2.9 3.0
//
HMMER3/f [3.3 | Nov 2019]
NAME  120_Rick_ant
ACC   PF12574.12
LENG  238
//
";

    #[test]
    fn test_hmm_headers() {
        let map = ModelMap::from_hmm_reader(Cursor::new(HMM_TEXT)).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(
            map.get("1-cysPrx_C"),
            Some(&ModelInfo {
                accession: "PF10417.13".to_string(),
                description: "C-terminal domain of 1-Cys peroxiredoxin".to_string(),
            })
        );
        // DESC does not leak from the previous record
        assert_eq!(map.get("120_Rick_ant").unwrap().description, "");
    }

    #[test]
    fn test_map_rows() {
        let text = "1-cysPrx_C\tPF10417.13\tC-terminal domain\tof peroxiredoxin\nnoacc\t\t\nPRK00001\tNF000001.1\n";
        let map = ModelMap::from_map_reader(Cursor::new(text)).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("1-cysPrx_C").unwrap().description, "C-terminal domain\tof peroxiredoxin");
        assert_eq!(map.get("PRK00001").unwrap().accession, "NF000001.1");
    }

    #[test]
    fn test_panther_names() {
        let text = "PTHR10000\tPHOSPHOSERINE PHOSPHATASE\nPTHR10000:SF1\tSUBFAMILY\nPTHR10001\tFAMILY NOT NAMED\n";
        let names = panther_names_from_reader(Cursor::new(text)).unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names["PTHR10000"], "PHOSPHOSERINE PHOSPHATASE");
    }

    #[test]
    fn test_find_latest_classifications() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("PANTHER17.0_HMM_classifications"), "").unwrap();
        fs::write(dir.path().join("PANTHER18.0_HMM_classifications"), "").unwrap();
        fs::write(dir.path().join("other.txt"), "").unwrap();
        let found = find_panther_classifications(dir.path()).unwrap();
        assert!(found.ends_with("PANTHER18.0_HMM_classifications"));
    }
}
