//! Delimited-text serialization of frequency tables.
//!
//! Format: a header row of column names plus `count`, then one row per key
//! sorted by count descending and key ascending, so re-runs over the same
//! corpus produce byte-identical files.

use std::io::{self, Read, Write};
use std::path::Path;

use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};

use crate::aggregate::{FrequencyKey, FrequencyTable};
use crate::error::{Error, Result};
use crate::sink::AtomicFile;

/// Header of the trailing count column.
pub const COUNT_COLUMN: &str = "count";

/// Validate a configured field delimiter: exactly one ASCII character.
pub fn parse_delimiter(delimiter: &str) -> Result<u8> {
    match delimiter.as_bytes() {
        [b] if b.is_ascii() && *b != b'\n' && *b != b'"' => Ok(*b),
        _ => Err(Error::configuration(format!(
            "delimiter must be a single ASCII character other than newline or quote, got {delimiter:?}"
        ))),
    }
}

fn csv_err(context: &str, e: csv::Error) -> Error {
    Error::io(context, io::Error::from(e))
}

/// Serialize `table` to `out`. Returns the number of data rows.
pub fn write_table_to<W: Write>(
    table: &FrequencyTable,
    column_names: &[String],
    delimiter: u8,
    out: W,
) -> Result<(usize, W)> {
    let mut wtr = WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(out);

    let mut header: Vec<&str> = column_names.iter().map(String::as_str).collect();
    header.push(COUNT_COLUMN);
    wtr.write_record(&header)
        .map_err(|e| csv_err("writing header", e))?;

    let rows = table.sorted_rows();
    for (key, count) in &rows {
        if key.values().len() != column_names.len() {
            return Err(Error::configuration(format!(
                "key has {} values but {} columns are declared",
                key.values().len(),
                column_names.len()
            )));
        }
        let count = count.to_string();
        let mut record: Vec<&str> = key.values().iter().map(String::as_str).collect();
        record.push(&count);
        wtr.write_record(&record)
            .map_err(|e| csv_err("writing row", e))?;
    }

    let out = wtr
        .into_inner()
        .map_err(|e| {
            Error::io(
                "flushing table",
                io::Error::new(e.error().kind(), e.error().to_string()),
            )
        })?;
    Ok((rows.len(), out))
}

/// Write `table` to `path` atomically: either the complete table appears
/// at `path`, or the previous file (if any) is left untouched.
pub fn write_table(
    table: &FrequencyTable,
    column_names: &[String],
    delimiter: u8,
    path: &Path,
) -> Result<usize> {
    let sink = AtomicFile::create(path)?;
    let (rows, sink) = write_table_to(table, column_names, delimiter, sink)
        .map_err(|e| match e {
            Error::Io { context, source } => {
                Error::io(format!("{}: {context}", path.display()), source)
            }
            other => other,
        })?;
    sink.commit()?;
    log::info!("Wrote {rows} rows to {}", path.display());
    Ok(rows)
}

/// Parse a written table back into its column names and counts.
pub fn read_table<R: Read>(input: R, delimiter: u8) -> Result<(Vec<String>, FrequencyTable)> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(input);

    let mut names: Vec<String> = rdr
        .headers()
        .map_err(|e| csv_err("reading header", e))?
        .iter()
        .map(str::to_string)
        .collect();
    if names.pop().as_deref() != Some(COUNT_COLUMN) {
        return Err(Error::io(
            "reading header",
            io::Error::new(io::ErrorKind::InvalidData, "last column is not 'count'"),
        ));
    }

    let mut table = FrequencyTable::new();
    for record in rdr.records() {
        let record = record.map_err(|e| csv_err("reading row", e))?;
        let mut fields: Vec<String> = record.iter().map(str::to_string).collect();
        let count = fields
            .pop()
            .and_then(|c| c.parse::<u64>().ok())
            .ok_or_else(|| {
                Error::io(
                    format!("row {:?}", record.position().map(|p| p.line())),
                    io::Error::new(io::ErrorKind::InvalidData, "invalid count"),
                )
            })?;
        table.add(FrequencyKey::new(fields), count);
    }
    Ok((names, table))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(values: &[&str]) -> FrequencyKey {
        values.iter().copied().collect()
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn render(table: &FrequencyTable, cols: &[&str], delimiter: u8) -> String {
        let (_, out) = write_table_to(table, &names(cols), delimiter, Vec::new()).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn concrete_scenario_output() {
        let table: FrequencyTable = [(key(&["b"]), 1), (key(&["a"]), 3)].into_iter().collect();
        assert_eq!(render(&table, &["token"], b','), "token,count\na,3\nb,1\n");
    }

    #[test]
    fn tab_delimited_with_empty_fields() {
        let table: FrequencyTable = [(key(&["hund", "NN", ""]), 2)].into_iter().collect();
        assert_eq!(
            render(&table, &["token", "POS", "SALDO sense"], b'\t'),
            "token\tPOS\tSALDO sense\tcount\nhund\tNN\t\t2\n"
        );
    }

    #[test]
    fn ties_sorted_by_key() {
        let table: FrequencyTable = [(key(&["c"]), 1), (key(&["a"]), 1), (key(&["b"]), 1)]
            .into_iter()
            .collect();
        assert_eq!(render(&table, &["token"], b','), "token,count\na,1\nb,1\nc,1\n");
    }

    #[test]
    fn empty_table_has_header_only() {
        let table = FrequencyTable::new();
        assert_eq!(render(&table, &["token", "POS"], b'\t'), "token\tPOS\tcount\n");
    }

    #[test]
    fn values_containing_delimiter_round_trip() {
        let table: FrequencyTable = [
            (key(&["a,b", "x"]), 2),
            (key(&["\"q\"", ""]), 1),
            (key(&["", ""]), 7),
        ]
        .into_iter()
        .collect();
        let cols = names(&["token", "POS"]);
        let (_, out) = write_table_to(&table, &cols, b',', Vec::new()).unwrap();
        let (parsed_names, parsed) = read_table(out.as_slice(), b',').unwrap();
        assert_eq!(parsed_names, cols);
        assert_eq!(parsed, table);
    }

    #[test]
    fn write_table_is_atomic_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frequency_list/stats_x.csv");
        let table: FrequencyTable = [(key(&["a"]), 3)].into_iter().collect();
        let rows = write_table(&table, &names(&["token"]), b'\t', &path).unwrap();
        assert_eq!(rows, 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "token\tcount\na\t3\n");
    }

    #[test]
    fn width_mismatch_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats_x.csv");
        let table: FrequencyTable = [(key(&["a", "b"]), 3)].into_iter().collect();
        let err = write_table(&table, &names(&["token"]), b'\t', &path).unwrap_err();
        assert!(err.is_configuration());
        assert!(!path.exists());
    }

    #[test]
    fn parse_delimiter_rules() {
        assert_eq!(parse_delimiter("\t").unwrap(), b'\t');
        assert_eq!(parse_delimiter(",").unwrap(), b',');
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("::").is_err());
        assert!(parse_delimiter("\n").is_err());
        assert!(parse_delimiter("§").is_err());
    }

    #[test]
    fn read_table_rejects_bad_count() {
        let err = read_table("token,count\na,x\n".as_bytes(), b',').unwrap_err();
        assert!(err.is_io());
    }
}
