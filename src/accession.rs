/// Accession normalization
///
/// Turns the model identifier reported by the search engine into the
/// identifier the member database disseminates. Patterns that do not match
/// pass through unchanged.
use crate::hit::Database;

/// Strip one trailing `.<digits>` component, if present
fn strip_numeric_suffix(id: &str) -> Option<&str> {
    let (stem, suffix) = id.rsplit_once('.')?;
    if !stem.is_empty() && !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
        Some(stem)
    } else {
        None
    }
}

/// `PF00329.26` -> `PF00329`, `X.1.2` -> `X`; at most two numeric components go
pub fn strip_version(id: &str) -> &str {
    match strip_numeric_suffix(id) {
        Some(stem) => strip_numeric_suffix(stem).unwrap_or(stem),
        None => id,
    }
}

/// `PTHR16038.orig.30.pir` -> `PTHR16038`
pub fn strip_panther_suffix(id: &str) -> &str {
    let Some(stem) = id.strip_suffix(".pir") else {
        return id;
    };
    let Some((stem, version)) = stem.rsplit_once('.') else {
        return id;
    };
    if version.is_empty() || !version.bytes().all(|b| b.is_ascii_digit()) {
        return id;
    }
    match stem.strip_suffix(".orig") {
        Some(base) if !base.is_empty() => base,
        _ => id,
    }
}

/// `143243.1` -> `SSF143243`; `SSF143243` stays as is
pub fn superfamily_id(id: &str) -> String {
    if id.starts_with("SSF") {
        return id.to_string();
    }
    let base = id.split('.').next().unwrap_or(id);
    if !base.is_empty() && base.bytes().all(|b| b.is_ascii_digit()) {
        format!("SSF{base}")
    } else {
        id.to_string()
    }
}

/// Canonical accession for a raw identifier under the given database's conventions
pub fn normalize(database: &Database, raw: &str) -> String {
    let raw = raw.trim();
    match database {
        Database::Pfam
        | Database::NcbiFam
        | Database::AntiFam
        | Database::Hamap
        | Database::Pirsf
        | Database::Pirsr
        | Database::Sfld => strip_version(raw).to_string(),
        Database::Panther => strip_panther_suffix(raw).to_string(),
        Database::Superfamily => superfamily_id(raw),
        // CATH superfamily ids are dotted numbers; never strip them
        Database::Gene3d | Database::Other(_) => raw.to_string(),
    }
}
