//! CSV record reader.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::IngestionResult;
use crate::types::RawRecord;

/// Lazily yields one [`RawRecord`] per CSV data row.
///
/// Rules:
///
/// - CSV must have headers; header names are trimmed.
/// - Rows may be shorter than the header; missing trailing cells are absent (null).
/// - Cells beyond the header are ignored.
pub struct CsvRecords<R> {
    headers: Vec<String>,
    rows: csv::StringRecordsIntoIter<R>,
}

impl<R: Read> Iterator for CsvRecords<R> {
    type Item = IngestionResult<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(row.map_err(Into::into).map(|row| {
            self.headers
                .iter()
                .zip(row.iter())
                .map(|(h, v)| (h.clone(), v.to_string()))
                .collect()
        }))
    }
}

impl<R> CsvRecords<R> {
    /// Header names, in file order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

/// Open a CSV file for record-by-record reading.
pub fn read_csv_from_path(path: impl AsRef<Path>) -> IngestionResult<CsvRecords<File>> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    read_csv_from_reader(rdr)
}

/// Read records from an existing CSV reader (which must be configured with headers).
pub fn read_csv_from_reader<R: Read>(mut rdr: csv::Reader<R>) -> IngestionResult<CsvRecords<R>> {
    let headers = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    Ok(CsvRecords {
        headers,
        rows: rdr.into_records(),
    })
}

/// Read records from in-memory CSV text.
pub fn read_csv_from_str(input: &str) -> IngestionResult<CsvRecords<&[u8]>> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input.as_bytes());
    read_csv_from_reader(rdr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_records_keyed_by_header() {
        let mut recs = read_csv_from_str(" id ,name\n1,Ada\n2\n").unwrap();
        assert_eq!(recs.headers(), ["id", "name"]);

        let first = recs.next().unwrap().unwrap();
        assert_eq!(first.get("id").map(String::as_str), Some("1"));
        assert_eq!(first.get("name").map(String::as_str), Some("Ada"));

        let short = recs.next().unwrap().unwrap();
        assert_eq!(short.get("id").map(String::as_str), Some("2"));
        assert!(!short.contains_key("name"));

        assert!(recs.next().is_none());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = read_csv_from_path("tests/fixtures/does_not_exist.csv")
            .err()
            .unwrap();
        assert!(err.to_string().contains("csv error"));
    }
}
