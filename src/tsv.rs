/// Hit-table TSV reading and annotated output writing
///
/// Input is either a table with a `target\tNAME...` header (columns found by
/// name) or a raw search-engine `tbl` with `#` comments and the fixed
/// ten-column layout.
use log::warn;
use std::io::{BufRead, Write};
use std::str::FromStr;

use crate::annotation::AnnotatedHit;
use crate::error::{NailscanError, Result};
use crate::hit::{Database, HitRecord};

/// Column positions resolved from a header line
#[derive(Debug, Clone)]
struct ColumnIndex {
    target: usize,
    name: usize,
    acc: Option<usize>,
    desc: Option<usize>,
    target_start: usize,
    target_end: usize,
    query_start: usize,
    query_end: usize,
    score: usize,
    bias: usize,
    evalue: usize,
    cell_frac: usize,
}

impl ColumnIndex {
    fn from_header(header: &[&str]) -> Result<Self> {
        let find = |name: &'static str| header.iter().position(|h| h.trim() == name);
        let require = |name: &'static str| find(name).ok_or(NailscanError::MissingColumn(name));

        Ok(ColumnIndex {
            target: require("target")?,
            // raw nail output calls the model column "query"
            name: find("NAME")
                .or_else(|| find("query"))
                .ok_or(NailscanError::MissingColumn("NAME"))?,
            acc: find("ACC"),
            desc: find("DESC"),
            target_start: require("target_start")?,
            target_end: require("target_end")?,
            query_start: require("query_start")?,
            query_end: require("query_end")?,
            score: require("score")?,
            bias: require("bias")?,
            evalue: require("evalue")?,
            cell_frac: require("cell_frac")?,
        })
    }

    fn raw() -> Self {
        // target NAME target_start target_end query_start query_end score bias evalue cell_frac
        ColumnIndex {
            target: 0,
            name: 1,
            acc: None,
            desc: None,
            target_start: 2,
            target_end: 3,
            query_start: 4,
            query_end: 5,
            score: 6,
            bias: 7,
            evalue: 8,
            cell_frac: 9,
        }
    }

    fn max_required(&self) -> usize {
        [
            self.target,
            self.name,
            self.target_start,
            self.target_end,
            self.query_start,
            self.query_end,
            self.score,
            self.bias,
            self.evalue,
            self.cell_frac,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

/// Hits read from one table plus the rows rejected as malformed
#[derive(Debug, Default)]
pub struct HitBatch {
    pub records: Vec<HitRecord>,
    pub rejected: Vec<NailscanError>,
}

fn parse_field<T: FromStr>(fields: &[&str], idx: usize, name: &str, line: usize) -> Result<T> {
    let raw = fields.get(idx).map(|f| f.trim()).unwrap_or("");
    if raw.is_empty() {
        return Err(NailscanError::malformed(line, format!("missing {name}")));
    }
    raw.parse::<T>()
        .map_err(|_| NailscanError::malformed(line, format!("invalid {name} '{raw}'")))
}

fn parse_row(fields: &[&str], cols: &ColumnIndex, database: &Database, line: usize) -> Result<HitRecord> {
    if fields.len() <= cols.max_required() {
        return Err(NailscanError::malformed(
            line,
            format!("expected at least {} fields, found {}", cols.max_required() + 1, fields.len()),
        ));
    }

    let text = |idx: Option<usize>| {
        idx.and_then(|i| fields.get(i))
            .map(|f| f.trim().to_string())
            .unwrap_or_default()
    };

    let protein_id = text(Some(cols.target));
    let model_name = text(Some(cols.name));
    if protein_id.is_empty() || model_name.is_empty() {
        return Err(NailscanError::malformed(line, "empty target or model name"));
    }

    let record = HitRecord {
        protein_id,
        database: database.clone(),
        model_name,
        accession: text(cols.acc),
        description: text(cols.desc),
        target_start: parse_field(fields, cols.target_start, "target_start", line)?,
        target_end: parse_field(fields, cols.target_end, "target_end", line)?,
        query_start: parse_field(fields, cols.query_start, "query_start", line)?,
        query_end: parse_field(fields, cols.query_end, "query_end", line)?,
        score: parse_field(fields, cols.score, "score", line)?,
        bias: parse_field(fields, cols.bias, "bias", line)?,
        evalue: parse_field(fields, cols.evalue, "evalue", line)?,
        cell_frac: parse_field(fields, cols.cell_frac, "cell_frac", line)?,
    };

    if record.target_start == 0 || record.query_start == 0 || record.query_end == 0 {
        return Err(NailscanError::malformed(line, "coordinates are 1-based"));
    }
    if record.target_start > record.target_end {
        return Err(NailscanError::malformed(
            line,
            format!("target_start {} > target_end {}", record.target_start, record.target_end),
        ));
    }
    if record.query_start > record.query_end {
        return Err(NailscanError::malformed(
            line,
            format!("query_start {} > query_end {}", record.query_start, record.query_end),
        ));
    }
    if !(0.0..=1.0).contains(&record.cell_frac) {
        return Err(NailscanError::malformed(
            line,
            format!("cell_frac {} outside [0, 1]", record.cell_frac),
        ));
    }
    if !record.score.is_finite() {
        return Err(NailscanError::malformed(line, "score is not finite"));
    }
    if record.evalue.is_nan() || record.evalue < 0.0 {
        return Err(NailscanError::malformed(line, format!("invalid evalue {}", record.evalue)));
    }

    Ok(record)
}

fn reject(batch: &mut HitBatch, e: NailscanError) {
    if batch.rejected.len() < 10 {
        warn!("Rejecting row: {e}");
    }
    batch.rejected.push(e);
}

/// Read every hit row. Malformed rows are collected in `rejected` and logged;
/// only I/O failures and an unusable header abort the read.
pub fn read_hits<R: BufRead>(mut reader: R, database: &Database) -> Result<HitBatch> {
    let mut batch = HitBatch::default();
    let mut columns: Option<ColumnIndex> = None;
    let mut buf = Vec::new();
    let mut line_no = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim_end_matches(|c: char| c == '\n' || c == '\r'),
            Err(_) => {
                reject(&mut batch, NailscanError::malformed(line_no, "invalid UTF-8"));
                continue;
            }
        };
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();

        // The first data line is either a header or already a raw row
        if columns.is_none() && fields.first().map(|f| f.trim()) == Some("target") {
            columns = Some(ColumnIndex::from_header(&fields)?);
            continue;
        }
        let cols = columns.get_or_insert_with(ColumnIndex::raw);

        match parse_row(&fields, cols, database, line_no) {
            Ok(record) => batch.records.push(record),
            Err(e) => reject(&mut batch, e),
        }
    }

    if batch.rejected.len() > 10 {
        warn!("Rejected {} malformed rows in total", batch.rejected.len());
    }
    Ok(batch)
}

/// Which optional annotation columns to emit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputColumns {
    pub interpro: bool,
    pub go: bool,
}

pub fn output_header(columns: OutputColumns) -> String {
    let mut header = vec![
        "target",
        "ACC",
        "DESC",
        "target_start",
        "target_end",
        "query_start",
        "query_end",
        "score",
        "bias",
        "evalue",
        "cell_frac",
    ];
    if columns.interpro {
        header.extend(["InterPro", "IPR_desc"]);
    }
    if columns.go {
        header.push("GO");
    }
    header.join("\t")
}

/// Write the annotated table; the raw model NAME is never written
pub fn write_hits<W: Write>(writer: &mut W, hits: &[AnnotatedHit], columns: OutputColumns) -> Result<()> {
    writeln!(writer, "{}", output_header(columns))?;
    for annotated in hits {
        let h = &annotated.hit;
        write!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:e}\t{}",
            h.protein_id,
            h.accession,
            h.description,
            h.target_start,
            h.target_end,
            h.query_start,
            h.query_end,
            h.score,
            h.bias,
            h.evalue,
            h.cell_frac,
        )?;
        if columns.interpro {
            write!(writer, "\t{}\t{}", annotated.interpro, annotated.interpro_desc)?;
        }
        if columns.go {
            write!(writer, "\t{}", annotated.go)?;
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const MAPPED: &str = "\
target\tNAME\tACC\tDESC\ttarget_start\ttarget_end\tquery_start\tquery_end\tscore\tbias\tevalue\tcell_frac
sp|P1\tNADH_dh\tPF00329.26\tComplex I subunit\t10\t120\t1\t110\t85.2\t0.1\t3.4e-25\t0.98
sp|P1\tbroken\tPF00001.1\t\t200\t150\t1\t50\t30.0\t0.0\t1e-5\t0.5
sp|P2\tNADH_dh\tPF00329.26\t\t5\t80\t1\t75\tabc\t0.0\t1e-5\t0.5
";

    #[test]
    fn test_read_header_table_rejects_bad_rows() {
        let batch = read_hits(Cursor::new(MAPPED), &Database::Pfam).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.rejected.len(), 2);

        let hit = &batch.records[0];
        assert_eq!(hit.protein_id, "sp|P1");
        assert_eq!(hit.model_name, "NADH_dh");
        assert_eq!(hit.accession, "PF00329.26");
        assert_eq!(hit.description, "Complex I subunit");
        assert_eq!((hit.target_start, hit.target_end), (10, 120));
        assert_eq!(hit.evalue, 3.4e-25);

        assert!(matches!(
            batch.rejected[0],
            NailscanError::MalformedRecord { line: 3, .. }
        ));
    }

    #[test]
    fn test_read_raw_tbl() {
        let text = "# nail tbl\nP1\tPTHR16038.orig.30.pir\t3\t300\t1\t290\t410.5\t2.0\t1e-120\t1.0\n";
        let batch = read_hits(Cursor::new(text), &Database::Panther).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].model_name, "PTHR16038.orig.30.pir");
        assert_eq!(batch.records[0].accession, "");
        assert_eq!(batch.records[0].database, Database::Panther);
    }

    #[test]
    fn test_header_missing_column() {
        let text = "target\tNAME\ttarget_start\n";
        let err = read_hits(Cursor::new(text), &Database::Pfam).unwrap_err();
        assert!(matches!(err, NailscanError::MissingColumn("target_end")));
    }

    #[test]
    fn test_short_row_rejected() {
        let text = "P1\tModel\t1\t10\n";
        let batch = read_hits(Cursor::new(text), &Database::Pfam).unwrap();
        assert!(batch.records.is_empty());
        assert_eq!(batch.rejected.len(), 1);
    }

    #[test]
    fn test_invalid_utf8_row_rejected_alone() {
        let mut text = Vec::new();
        text.extend_from_slice(MAPPED.lines().next().unwrap().as_bytes());
        text.extend_from_slice(b"\nP1\tM1\tPF00001.1\t\t1\t50\t1\t50\t30.0\t0.0\t1e-5\t0.5\n");
        text.extend_from_slice(b"P2\tM\xff\tPF00002.1\t\t1\t50\t1\t50\t30.0\t0.0\t1e-5\t0.5\n");
        text.extend_from_slice(b"P3\tM3\tPF00003.1\t\t1\t50\t1\t50\t30.0\t0.0\t1e-5\t0.5");

        let batch = read_hits(Cursor::new(text), &Database::Pfam).unwrap();
        let proteins: Vec<&str> = batch.records.iter().map(|r| r.protein_id.as_str()).collect();
        assert_eq!(proteins, vec!["P1", "P3"]);
        assert_eq!(batch.rejected.len(), 1);
        assert!(matches!(
            batch.rejected[0],
            NailscanError::MalformedRecord { line: 3, .. }
        ));
    }

    #[test]
    fn test_out_of_range_fields_rejected() {
        let text = "\
P1\tM1\t1\t50\t1\t0\t10.0\t0.0\t1e-5\t0.5
P1\tM1\t1\t50\t1\t40\t10.0\t0.0\t1e-5\t7.5
P1\tM1\t1\t50\t30\t20\t10.0\t0.0\t1e-5\t0.5
P1\tM1\t1\t50\t1\t40\t10.0\t0.0\t1e-5\tNaN
P1\tM1\t1\t50\t1\t40\t10.0\t0.0\t1e-5\t1.0
";
        let batch = read_hits(Cursor::new(text), &Database::Pfam).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.rejected.len(), 4);
        assert_eq!(batch.records[0].cell_frac, 1.0);
    }

    #[test]
    fn test_write_hits_columns() {
        let batch = read_hits(Cursor::new(MAPPED), &Database::Pfam).unwrap();
        let hits: Vec<AnnotatedHit> = batch
            .records
            .into_iter()
            .map(|hit| AnnotatedHit {
                hit,
                interpro: "IPR001135".to_string(),
                interpro_desc: "NADH_Q_OxRdtase_suD".to_string(),
                go: String::new(),
            })
            .collect();

        let mut out = Vec::new();
        write_hits(&mut out, &hits, OutputColumns { interpro: true, go: true }).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("cell_frac\tInterPro\tIPR_desc\tGO"));
        assert!(!lines[0].contains("NAME"));
        let fields: Vec<&str> = lines[1].split('\t').collect();
        assert_eq!(fields.len(), 14);
        assert_eq!(fields[1], "PF00329.26");
        assert_eq!(fields[11], "IPR001135");
        assert_eq!(fields[13], "");

        let mut out = Vec::new();
        write_hits(&mut out, &hits, OutputColumns::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().nth(1).unwrap().split('\t').count(), 11);
    }
}
