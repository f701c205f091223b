/// Record model for profile-HMM hits
///
/// A `HitRecord` is one protein × model match as reported by the search engine,
/// with the canonical accession and description filled in by the normalizer.
use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Member databases with known post-processing conventions
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Database {
    Pfam,
    NcbiFam,
    Superfamily,
    Hamap,
    Sfld,
    Pirsf,
    Pirsr,
    Panther,
    Gene3d,
    AntiFam,
    /// Anything not in the dispatch table; filtered conservatively
    Other(String),
}

impl Database {
    /// Member database name as used in InterPro's `<db_xref db="...">` entries
    pub fn interpro_member_name(&self) -> String {
        match self {
            Database::Pfam => "PFAM".to_string(),
            Database::NcbiFam => "NCBIFAM".to_string(),
            Database::Superfamily => "SSF".to_string(),
            Database::Hamap => "HAMAP".to_string(),
            Database::Sfld => "SFLD".to_string(),
            Database::Pirsf => "PIRSF".to_string(),
            Database::Pirsr => "PIRSR".to_string(),
            Database::Panther => "PANTHER".to_string(),
            Database::Gene3d => "CATHGENE3D".to_string(),
            Database::AntiFam => "ANTIFAM".to_string(),
            Database::Other(name) => name.to_uppercase(),
        }
    }

    /// Short lowercase key used for data directory layout (`data/<key>/...`)
    pub fn key(&self) -> String {
        match self {
            Database::Pfam => "pfam".to_string(),
            Database::NcbiFam => "ncbifam".to_string(),
            Database::Superfamily => "superfamily".to_string(),
            Database::Hamap => "hamap".to_string(),
            Database::Sfld => "sfld".to_string(),
            Database::Pirsf => "pirsf".to_string(),
            Database::Pirsr => "pirsr".to_string(),
            Database::Panther => "panther".to_string(),
            Database::Gene3d => "cath".to_string(),
            Database::AntiFam => "antifam".to_string(),
            Database::Other(name) => name.to_lowercase(),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Database::Other(_))
    }
}

impl FromStr for Database {
    type Err = std::convert::Infallible;

    /// Accepts config keys, InterPro member names and InterProScan analysis names
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let db = match s.trim().to_lowercase().as_str() {
            "pfam" => Database::Pfam,
            "ncbifam" | "tigrfam" => Database::NcbiFam,
            "superfamily" | "ssf" => Database::Superfamily,
            "hamap" => Database::Hamap,
            "sfld" => Database::Sfld,
            "pirsf" => Database::Pirsf,
            "pirsr" => Database::Pirsr,
            "panther" => Database::Panther,
            "cath" | "gene3d" | "cathgene3d" => Database::Gene3d,
            "antifam" => Database::AntiFam,
            other => Database::Other(other.to_string()),
        };
        Ok(db)
    }
}

impl fmt::Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // InterProScan analysis names
        let name = match self {
            Database::Pfam => "Pfam",
            Database::NcbiFam => "NCBIfam",
            Database::Superfamily => "SUPERFAMILY",
            Database::Hamap => "Hamap",
            Database::Sfld => "SFLD",
            Database::Pirsf => "PIRSF",
            Database::Pirsr => "PIRSR",
            Database::Panther => "PANTHER",
            Database::Gene3d => "Gene3D",
            Database::AntiFam => "AntiFam",
            Database::Other(name) => name.as_str(),
        };
        write!(f, "{name}")
    }
}

/// One candidate match between a protein region and a profile model
#[derive(Debug, Clone, PartialEq)]
pub struct HitRecord {
    pub protein_id: String,
    pub database: Database,
    pub model_name: String, // raw NAME from the search engine
    pub accession: String,  // canonical ID, set by the normalizer
    pub description: String,
    pub target_start: u32, // 1-based, inclusive
    pub target_end: u32,
    pub query_start: u32,
    pub query_end: u32,
    pub score: f64,
    pub bias: f64,
    pub evalue: f64,
    pub cell_frac: f64,
}

impl HitRecord {
    /// Length on the protein, inclusive of both ends
    pub fn length(&self) -> u32 {
        self.target_end - self.target_start + 1
    }

    /// Overlap on the protein divided by the shorter of the two hit lengths
    pub fn overlap_fraction(&self, other: &HitRecord) -> f64 {
        let overlap_start = self.target_start.max(other.target_start);
        let overlap_end = self.target_end.min(other.target_end);

        if overlap_start > overlap_end {
            return 0.0;
        }

        let overlap_len = overlap_end - overlap_start + 1;
        let min_len = self.length().min(other.length());

        overlap_len as f64 / min_len as f64
    }

    /// Ranking used by every selection stage: best first.
    ///
    /// Score descending, then e-value ascending, then accession and start
    /// position, so equal-scoring hits always come out in the same order.
    pub fn rank_cmp(&self, other: &HitRecord) -> Ordering {
        OrderedFloat(other.score)
            .cmp(&OrderedFloat(self.score))
            .then_with(|| OrderedFloat(self.evalue).cmp(&OrderedFloat(other.evalue)))
            .then_with(|| self.accession.cmp(&other.accession))
            .then_with(|| self.target_start.cmp(&other.target_start))
            .then_with(|| self.target_end.cmp(&other.target_end))
    }

    /// The identifier fed to accession normalization when no model map supplies one
    pub fn raw_identifier(&self) -> &str {
        if self.accession.is_empty() {
            &self.model_name
        } else {
            &self.accession
        }
    }
}
