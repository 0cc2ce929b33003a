// ============================================================
// Layer 4 — Table Loader
// ============================================================
// Reads (text, summary) rows from a columnar file.
//
// Supported formats, chosen by file extension:
//   .csv            comma separated, header row required
//   .tsv            tab separated, header row required
//   .parquet / .pq  Utf8 or LargeUtf8 columns
//   .jsonl / .ndjson one JSON object per line
//
// Column rules:
//   - the text column must exist, otherwise loading fails
//   - the summary column is optional; without it every record
//     has summary = None (inference-only input)
//   - rows whose text is null or blank are skipped
//
// Reference: csv crate documentation
//            parquet::arrow reader documentation
//            Rust Book §9 (Error Handling)

use anyhow::{anyhow, bail, Context, Result};
use arrow_array::{cast::AsArray, Array, ArrayRef};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use crate::domain::article::ArticleRecord;
use crate::domain::traits::RecordSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Tsv,
    Parquet,
    JsonLines,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv"              => Ok(Self::Csv),
            "tsv"              => Ok(Self::Tsv),
            "parquet" | "pq"   => Ok(Self::Parquet),
            "jsonl" | "ndjson" => Ok(Self::JsonLines),
            other => bail!(
                "Unsupported input format '{}' for '{}' (expected csv, tsv, parquet or jsonl)",
                other,
                path.display()
            ),
        }
    }
}

/// Loads article rows from a single table file.
/// Implements the RecordSource trait from Layer 3.
pub struct TableLoader {
    path:           PathBuf,
    text_column:    String,
    summary_column: String,
}

impl TableLoader {
    pub fn new(
        path:           impl Into<PathBuf>,
        text_column:    impl Into<String>,
        summary_column: impl Into<String>,
    ) -> Self {
        Self {
            path:           path.into(),
            text_column:    text_column.into(),
            summary_column: summary_column.into(),
        }
    }

    fn load_delimited(&self, delimiter: u8) -> Result<Vec<(Option<String>, Option<String>)>> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .from_path(&self.path)
            .with_context(|| format!("Cannot open '{}'", self.path.display()))?;

        let headers = reader.headers()?.clone();
        let text_idx = headers
            .iter()
            .position(|h| h == self.text_column)
            .ok_or_else(|| self.missing_text_column())?;
        let summary_idx = headers.iter().position(|h| h == self.summary_column);

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record
                .with_context(|| format!("Malformed row {} in '{}'", line + 1, self.path.display()))?;
            let text    = record.get(text_idx).map(str::to_string);
            let summary = summary_idx.and_then(|i| record.get(i)).map(str::to_string);
            rows.push((text, summary));
        }
        Ok(rows)
    }

    fn load_parquet(&self) -> Result<Vec<(Option<String>, Option<String>)>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Cannot open '{}'", self.path.display()))?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .with_context(|| format!("Not a valid parquet file: '{}'", self.path.display()))?
            .build()?;

        let mut rows = Vec::new();
        for batch in reader {
            let batch = batch?;
            let texts = batch
                .column_by_name(&self.text_column)
                .ok_or_else(|| self.missing_text_column())
                .and_then(string_values)?;
            let summaries = match batch.column_by_name(&self.summary_column) {
                Some(col) => string_values(col)?,
                None      => vec![None; texts.len()],
            };
            rows.extend(texts.into_iter().zip(summaries));
        }
        Ok(rows)
    }

    fn load_json_lines(&self) -> Result<Vec<(Option<String>, Option<String>)>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Cannot open '{}'", self.path.display()))?;

        let mut rows = Vec::new();
        let mut saw_text_column = false;
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let value: serde_json::Value = serde_json::from_str(&line)
                .with_context(|| format!("Invalid JSON on line {} of '{}'", line_no + 1, self.path.display()))?;

            saw_text_column |= value.get(&self.text_column).is_some();
            let text    = value.get(&self.text_column).and_then(|v| v.as_str()).map(str::to_string);
            let summary = value.get(&self.summary_column).and_then(|v| v.as_str()).map(str::to_string);
            rows.push((text, summary));
        }

        if !rows.is_empty() && !saw_text_column {
            return Err(self.missing_text_column());
        }
        Ok(rows)
    }

    fn missing_text_column(&self) -> anyhow::Error {
        anyhow!(
            "Column '{}' not found in '{}'",
            self.text_column,
            self.path.display()
        )
    }
}

impl RecordSource for TableLoader {
    fn load_records(&self) -> Result<Vec<ArticleRecord>> {
        let format = TableFormat::from_path(&self.path)?;
        tracing::debug!("Reading '{}' as {:?}", self.path.display(), format);

        let rows = match format {
            TableFormat::Csv       => self.load_delimited(b',')?,
            TableFormat::Tsv       => self.load_delimited(b'\t')?,
            TableFormat::Parquet   => self.load_parquet()?,
            TableFormat::JsonLines => self.load_json_lines()?,
        };

        let total = rows.len();
        let records: Vec<ArticleRecord> = rows
            .into_iter()
            .enumerate()
            .filter_map(|(i, (text, summary))| match text {
                Some(t) if !t.trim().is_empty() => Some(ArticleRecord::new(t, summary)),
                _ => {
                    tracing::debug!("Skipping row {}: empty text", i);
                    None
                }
            })
            .collect();

        tracing::info!(
            "Loaded {} of {} rows from '{}'",
            records.len(),
            total,
            self.path.display()
        );
        Ok(records)
    }
}

/// Pull a string column out of an Arrow array, keeping nulls as None.
fn string_values(array: &ArrayRef) -> Result<Vec<Option<String>>> {
    if let Some(values) = array.as_string_opt::<i32>() {
        return Ok(values.iter().map(|v| v.map(str::to_string)).collect());
    }
    if let Some(values) = array.as_string_opt::<i64>() {
        return Ok(values.iter().map(|v| v.map(str::to_string)).collect());
    }
    bail!("Expected a string column, found {:?}", array.data_type())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{RecordBatch, StringArray};
    use std::{fs, sync::Arc};

    fn loader(path: &Path) -> TableLoader {
        TableLoader::new(path, "text", "summary")
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(TableFormat::from_path(Path::new("a.CSV")).unwrap(), TableFormat::Csv);
        assert_eq!(TableFormat::from_path(Path::new("a.pq")).unwrap(), TableFormat::Parquet);
        assert_eq!(TableFormat::from_path(Path::new("a.ndjson")).unwrap(), TableFormat::JsonLines);
        assert!(TableFormat::from_path(Path::new("a.xlsx")).is_err());
        assert!(TableFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_csv_with_quoted_commas() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        fs::write(&path, "id,text,summary\n1,\"Hello, world\",greeting\n2,Second,\n").unwrap();

        let records = loader(&path).load_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text, "Hello, world");
        assert_eq!(records[0].summary.as_deref(), Some("greeting"));
        // empty cell is kept as an empty summary; filtering happens later
        assert_eq!(records[1].summary.as_deref(), Some(""));
    }

    #[test]
    fn test_tsv_without_summary_column() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.tsv");
        fs::write(&path, "text\nfirst article\nsecond article\n").unwrap();

        let records = loader(&path).load_records().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.summary.is_none()));
    }

    #[test]
    fn test_missing_text_column_is_error() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        fs::write(&path, "body,summary\nx,y\n").unwrap();
        assert!(loader(&path).load_records().is_err());
    }

    #[test]
    fn test_blank_text_rows_are_skipped() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.jsonl");
        fs::write(
            &path,
            "{\"text\": \"kept\", \"summary\": \"s\"}\n\
             {\"text\": \"   \", \"summary\": \"s\"}\n\
             \n\
             {\"text\": null, \"summary\": \"s\"}\n\
             {\"text\": \"no summary\"}\n",
        )
        .unwrap();

        let records = loader(&path).load_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text, "kept");
        assert_eq!(records[1].summary, None);
    }

    #[test]
    fn test_parquet_string_columns() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.parquet");

        let texts: ArrayRef     = Arc::new(StringArray::from(vec![Some("a body"), None]));
        let summaries: ArrayRef = Arc::new(StringArray::from(vec![Some("sum"), Some("x")]));
        let batch = RecordBatch::try_from_iter(vec![("text", texts), ("summary", summaries)]).unwrap();

        let file = File::create(&path).unwrap();
        let mut writer = parquet::arrow::ArrowWriter::try_new(file, batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let records = loader(&path).load_records().unwrap();
        assert_eq!(records, vec![ArticleRecord::new("a body", Some("sum".into()))]);
    }
}
