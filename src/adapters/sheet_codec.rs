use crate::domain::ports::Storage;
use crate::domain::sheet::Sheet;
use crate::utils::error::Result;

/// Parses CSV bytes into a sheet. The first record is the header row; rows
/// may be shorter or longer than the header (see [`Sheet::new`]).
pub fn decode_csv(data: &[u8]) -> Result<Sheet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::None)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|c| c.to_string()).collect());
    }

    tracing::debug!("Decoded sheet with {} columns and {} rows", headers.len(), rows.len());
    Ok(Sheet::new(headers, rows))
}

pub fn encode_csv(sheet: &Sheet) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    writer.write_record(sheet.headers())?;
    for row in sheet.rows() {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| crate::utils::error::RouletteError::IoError(e.into_error()))
}

/// Reads and writes a sheet through a `Storage` backend.
#[derive(Debug, Clone)]
pub struct SheetStore<S: Storage> {
    storage: S,
}

impl<S: Storage> SheetStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub async fn load(&self, path: &str) -> Result<Sheet> {
        tracing::debug!("Reading sheet from {}", path);
        let data = self.storage.read_file(path).await?;
        decode_csv(&data)
    }

    pub async fn save(&self, path: &str, sheet: &Sheet) -> Result<()> {
        let data = encode_csv(sheet)?;
        tracing::debug!("Writing sheet ({} bytes) to {}", data.len(), path);
        self.storage.write_file(path, &data).await
    }
}
