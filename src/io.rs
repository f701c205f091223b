/// Input helpers shared by the hit-table and lookup-table readers
use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Open a file, decompressing gzip transparently, returning a boxed BufRead
pub fn open_input<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead + Send>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

    // Check by file extension (faster than reading magic bytes)
    let is_compressed = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext == "gz" || ext == "bgz")
        .unwrap_or(false);

    if is_compressed {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Open a path, or stdin when no path is given or the path is `-`
pub fn open_input_or_stdin(path: Option<&Path>) -> Result<Box<dyn BufRead + Send>> {
    match path {
        Some(p) if p != Path::new("-") => open_input(p),
        _ => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

/// Iterate the data lines of a tab-separated table: blank lines and lines
/// starting with any of `comment_prefixes` are skipped. Yields (1-based line
/// number, line).
pub fn data_lines<R: BufRead>(
    reader: R,
    comment_prefixes: &'static [&'static str],
) -> impl Iterator<Item = Result<(usize, String)>> {
    reader
        .lines()
        .enumerate()
        .filter_map(move |(idx, line)| match line {
            Err(e) => Some(Err(e.into())),
            Ok(line) => {
                let trimmed = line.trim_end_matches(['\r', '\n']);
                if trimmed.trim().is_empty()
                    || comment_prefixes.iter().any(|p| trimmed.starts_with(p))
                {
                    None
                } else {
                    Some(Ok((idx + 1, trimmed.to_string())))
                }
            }
        })
}
