//! TSV parsing and atomic table writing.

use std::fs::File;
use std::path::Path;

use ::csv::{QuoteStyle, ReaderBuilder, StringRecord, Writer, WriterBuilder};
use biocat_core::{BiocatError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

/// An in-memory tab-separated table with a header row.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    headers: Vec<String>,
    rows: Vec<StringRecord>,
}

impl Table {
    /// Display name of the table (its file path) used in error messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first column whose header equals one of `aliases`.
    pub fn column(&self, aliases: &[&str]) -> Option<usize> {
        aliases
            .iter()
            .find_map(|alias| self.headers.iter().position(|h| h == alias))
    }

    /// Like [`Table::column`], but a missing column is a configuration error
    /// reported under the first alias.
    pub fn require(&self, aliases: &[&str]) -> Result<usize> {
        self.column(aliases).ok_or_else(|| BiocatError::MissingColumn {
            table: self.name.clone(),
            column: aliases.first().copied().unwrap_or_default().to_string(),
        })
    }

    /// Cell values of one column, top to bottom. Short rows yield `""`.
    pub fn values(&self, column: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(move |row| row.get(column).unwrap_or(""))
    }

    /// Raw rows.
    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            BiocatError::NotFound(path.to_path_buf())
        } else {
            BiocatError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        }
    })
}

fn tsv_reader() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder.delimiter(b'\t').has_headers(true).quoting(false);
    builder
}

fn tsv_writer() -> WriterBuilder {
    let mut builder = WriterBuilder::new();
    builder
        .delimiter(b'\t')
        .has_headers(false)
        .quote_style(QuoteStyle::Never);
    builder
}

/// Read a TSV file with a mandatory header row.
pub fn read_table(path: impl AsRef<Path>) -> Result<Table> {
    let path = path.as_ref();
    let file = open(path)?;
    let mut reader = tsv_reader().from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| BiocatError::Parse(format!("{}: {}", path.display(), e)))?;
    let headers: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(BiocatError::Parse(format!(
            "{}: header row is missing",
            path.display()
        )));
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record =
            result.map_err(|e| BiocatError::Parse(format!("{}: {}", path.display(), e)))?;
        rows.push(record);
    }

    Ok(Table {
        name: path.display().to_string(),
        headers,
        rows,
    })
}

/// Deserialize every row of a TSV file into `T`, matching fields by header name.
pub fn read_records<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let file = open(path)?;
    let mut reader = tsv_reader().from_reader(file);
    reader
        .deserialize()
        .map(|row| row.map_err(|e| BiocatError::Parse(format!("{}: {}", path.display(), e))))
        .collect()
}

/// Stream a table into a temporary file next to `path`, then link it into
/// place. A file already at `path` is never replaced.
fn persist_atomic<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut Writer<&mut File>) -> std::result::Result<(), ::csv::Error>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = tsv_writer().from_writer(tmp.as_file_mut());
        fill(&mut writer).map_err(|e| BiocatError::Io(e.into()))?;
        writer.flush()?;
    }
    tmp.persist_noclobber(path).map_err(|e| match e.error.kind() {
        std::io::ErrorKind::AlreadyExists => BiocatError::OutputExists(path.to_path_buf()),
        kind => BiocatError::Io(std::io::Error::new(kind, format!("{}: {}", path.display(), e.error))),
    })?;
    Ok(())
}

/// Atomically write a table of string cells. The header row is always written,
/// even when there are no data rows.
pub fn write_table_atomic<I, R, S>(path: impl AsRef<Path>, headers: &[&str], rows: I) -> Result<()>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    persist_atomic(path.as_ref(), |writer| {
        writer.write_record(headers)?;
        for row in rows {
            writer.write_record(row)?;
        }
        Ok(())
    })
}

/// Atomically write serde records under an explicit header row.
///
/// `headers` must list the serialized field names of `T` in declaration order.
pub fn write_records_atomic<T: Serialize>(
    path: impl AsRef<Path>,
    headers: &[&str],
    records: &[T],
) -> Result<()> {
    persist_atomic(path.as_ref(), |writer| {
        writer.write_record(headers)?;
        for record in records {
            writer.serialize(record)?;
        }
        Ok(())
    })
}
