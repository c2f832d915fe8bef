use async_trait::async_trait;
use chrono::SecondsFormat;

use super::domain::EnrollmentRecord;

/// Fixed header of the shared CSV ledger, written unquoted on creation.
pub const LEDGER_HEADER: &str = "Timestamp,Full Name,Email,Phone,Address,Selected Course,Preferred Timing,Previous Experience,Motivation";

/// File name of the shared ledger inside the storage directory.
pub const LEDGER_FILE: &str = "enrollments.csv";

/// Storage abstraction so the intake service can be exercised in isolation
/// and backends stay interchangeable.
#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    /// Persist one record, returning a human-readable confirmation.
    async fn save(&self, record: &EnrollmentRecord) -> Result<String, StorageError>;

    /// Every persisted record, sorted by submission time descending.
    /// An absent or empty archive yields an empty list, not an error.
    async fn list(&self) -> Result<Vec<EnrollmentRecord>, StorageError>;

    /// Raw bytes of the CSV ledger; `StorageError::NotFound` when no
    /// submission has ever been recorded.
    async fn ledger_csv(&self) -> Result<Vec<u8>, StorageError>;
}

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("enrollment storage io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("ledger row encoding failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("enrollment record could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("no enrollment data found")]
    NotFound,
}

/// Render one always-quoted ledger row, terminator included.
///
/// Commas inside the free-text motivation become semicolons so spreadsheet
/// imports that split naively stay aligned; embedded quotes are escaped by
/// the encoder.
pub fn ledger_row(record: &EnrollmentRecord) -> Result<String, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());

    writer.write_record([
        record
            .submitted_at
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        record.full_name.clone(),
        record.email.clone(),
        record.phone.clone(),
        record.address.clone().unwrap_or_default(),
        record.selected_course.clone(),
        record.preferred_timing.clone(),
        record.previous_experience.clone().unwrap_or_default(),
        record
            .motivation
            .as_deref()
            .map(|text| text.replace(',', ";"))
            .unwrap_or_default(),
    ])?;

    let bytes = writer.into_inner().map_err(into_io_error)?;
    String::from_utf8(bytes)
        .map_err(|err| csv::Error::from(std::io::Error::other(err.to_string())))
}

fn into_io_error<W>(err: csv::IntoInnerError<W>) -> csv::Error {
    csv::Error::from(std::io::Error::other(err.error().to_string()))
}
