/// Per-database filtering policy
///
/// Every database's behaviour is one `DatabasePolicy` row: which selection
/// strategy runs, with what overlap semantics, and which optional stages are
/// switched on. The pipeline driver consumes these rows; it never branches on
/// the database itself.
use crate::error::{NailscanError, Result};
use crate::hit::Database;
use std::fmt;
use std::str::FromStr;

/// Which hits compete with each other in the overlap resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    WithinGroup, // only hits sharing a clan / family compete
    Global,      // every hit on the protein competes
}

/// How comparison groups are formed when `scope = WithinGroup`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    None,
    Clan,
    FamilyMap,
}

/// Selection stage run after the threshold gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    GateOnly,
    OverlapResolve,
    BestHit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlapPolicy {
    pub evalue_cutoff: Option<f64>,   // drop hits with evalue above this
    pub bitscore_cutoff: Option<f64>, // drop hits scoring below this
    pub overlap_fraction: f64,        // (0, 1]; lower suppresses more
    pub scope: Scope,
    pub grouping: Grouping,
}

impl Default for OverlapPolicy {
    fn default() -> Self {
        OverlapPolicy {
            evalue_cutoff: None,
            bitscore_cutoff: None,
            overlap_fraction: 1.0,
            scope: Scope::WithinGroup,
            grouping: Grouping::None,
        }
    }
}

/// Complete filtering behaviour for one database
#[derive(Debug, Clone, PartialEq)]
pub struct DatabasePolicy {
    pub overlap: OverlapPolicy,
    pub strategy: Strategy,
    pub hierarchy_suppress: bool,
}

impl DatabasePolicy {
    /// Gate with no cutoffs and keep everything; used for databases outside the table
    pub fn passthrough() -> Self {
        DatabasePolicy {
            overlap: OverlapPolicy::default(),
            strategy: Strategy::GateOnly,
            hierarchy_suppress: false,
        }
    }

    /// Built-in policy table
    pub fn for_database(database: &Database) -> Self {
        let gate_only = Self::passthrough();
        match database {
            Database::Pfam => DatabasePolicy {
                overlap: OverlapPolicy {
                    overlap_fraction: 0.5,
                    scope: Scope::WithinGroup,
                    grouping: Grouping::Clan,
                    ..OverlapPolicy::default()
                },
                strategy: Strategy::OverlapResolve,
                hierarchy_suppress: false,
            },
            Database::Superfamily => DatabasePolicy {
                overlap: OverlapPolicy {
                    evalue_cutoff: Some(1e-4),
                    ..OverlapPolicy::default()
                },
                ..gate_only
            },
            // At most one family per protein
            Database::Hamap | Database::Panther => DatabasePolicy {
                strategy: Strategy::BestHit,
                ..gate_only
            },
            // Different CATH superfamilies compete for the same residues
            Database::Gene3d => DatabasePolicy {
                overlap: OverlapPolicy {
                    overlap_fraction: 0.2,
                    scope: Scope::Global,
                    ..OverlapPolicy::default()
                },
                strategy: Strategy::OverlapResolve,
                hierarchy_suppress: false,
            },
            Database::NcbiFam
            | Database::Sfld
            | Database::Pirsf
            | Database::Pirsr
            | Database::AntiFam
            | Database::Other(_) => gate_only,
        }
    }

    /// Reject internally inconsistent policies.
    ///
    /// `has_clans` / `has_hierarchy` say whether the corresponding lookup
    /// tables were supplied.
    pub fn validate(&self, database: &Database, has_clans: bool, has_hierarchy: bool) -> Result<()> {
        let fraction = self.overlap.overlap_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(NailscanError::policy(
                database,
                format!("overlap fraction {fraction} outside (0, 1]"),
            ));
        }

        if let Some(cutoff) = self.overlap.evalue_cutoff {
            if cutoff.is_nan() || cutoff < 0.0 {
                return Err(NailscanError::policy(database, format!("invalid e-value cutoff {cutoff}")));
            }
        }
        if let Some(cutoff) = self.overlap.bitscore_cutoff {
            if cutoff.is_nan() {
                return Err(NailscanError::policy(database, "bit-score cutoff is NaN"));
            }
        }

        if self.overlap.scope == Scope::Global && self.overlap.grouping != Grouping::None {
            return Err(NailscanError::policy(
                database,
                format!("grouping {} has no effect with global scope", self.overlap.grouping),
            ));
        }

        // Grouping only matters to the resolver, but a policy that names a
        // grouping must still be backed by its table.
        match self.overlap.grouping {
            Grouping::Clan if !has_clans => {
                return Err(NailscanError::policy(database, "clan grouping requires a clan map"));
            }
            Grouping::FamilyMap if !has_hierarchy => {
                return Err(NailscanError::policy(
                    database,
                    "family-map grouping requires a hierarchy map",
                ));
            }
            _ => {}
        }

        if self.hierarchy_suppress && !has_hierarchy {
            return Err(NailscanError::policy(
                database,
                "hierarchy suppression requires a hierarchy map",
            ));
        }

        Ok(())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "within_group" | "within-group" | "group" => Ok(Scope::WithinGroup),
            "global" => Ok(Scope::Global),
            other => Err(format!("Unknown scope '{other}'. Use within_group or global")),
        }
    }
}

impl FromStr for Grouping {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Grouping::None),
            "clan" => Ok(Grouping::Clan),
            "family_map" | "family-map" | "family" => Ok(Grouping::FamilyMap),
            other => Err(format!("Unknown grouping '{other}'. Use none, clan or family_map")),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gate_only" | "gate-only" | "gate" => Ok(Strategy::GateOnly),
            "overlap_resolve" | "overlap-resolve" | "overlap" => Ok(Strategy::OverlapResolve),
            "best_hit" | "best-hit" | "best" => Ok(Strategy::BestHit),
            other => Err(format!(
                "Unknown strategy '{other}'. Use gate_only, overlap_resolve or best_hit"
            )),
        }
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Grouping::None => "none",
            Grouping::Clan => "clan",
            Grouping::FamilyMap => "family_map",
        };
        write!(f, "{name}")
    }
}
