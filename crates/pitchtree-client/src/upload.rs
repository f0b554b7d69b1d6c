// MiLB CSV uploads, validated locally before anything is sent.

use std::path::Path;
use thiserror::Error;
use tracing::debug;

use pitchtree_core::aggregate::{check_required_columns, AggregateError};

pub const CSV_MIME: &str = "text/csv";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Please select a valid CSV file (got content type `{content_type}`)")]
    InvalidMimeType { content_type: String },

    #[error("{file_name} is empty")]
    Empty { file_name: String },

    #[error("Missing required columns: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    #[error("{file_name} is not readable CSV: {source}")]
    Unreadable {
        file_name: String,
        #[source]
        source: csv::Error,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A CSV file that passed local validation.
#[derive(Debug, Clone)]
pub struct CsvUpload {
    file_name: String,
    bytes: Vec<u8>,
}

impl CsvUpload {
    /// Validate content type, non-emptiness and the header row.
    pub fn new(
        file_name: impl Into<String>,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<Self, UploadError> {
        let file_name = file_name.into();

        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if essence != CSV_MIME {
            return Err(UploadError::InvalidMimeType {
                content_type: content_type.to_string(),
            });
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(UploadError::Empty { file_name });
        }

        {
            let mut rdr = csv::ReaderBuilder::new()
                .trim(csv::Trim::All)
                .from_reader(bytes.as_slice());
            let headers = rdr.headers().map_err(|source| UploadError::Unreadable {
                file_name: file_name.clone(),
                source,
            })?;
            check_required_columns(headers.iter()).map_err(|e| match e {
                AggregateError::MissingColumns { missing } => {
                    UploadError::MissingColumns { missing }
                }
                AggregateError::Csv(source) => UploadError::Unreadable {
                    file_name: file_name.clone(),
                    source,
                },
            })?;
        }

        debug!(%file_name, bytes = bytes.len(), "validated CSV upload");
        Ok(CsvUpload { file_name, bytes })
    }

    /// Read a file from disk. Only a `.csv` extension is treated as `text/csv`.
    pub async fn from_path(path: &Path) -> Result<Self, UploadError> {
        let content_type = mime_for_path(path);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        // Reject on type before touching the file.
        if content_type != CSV_MIME {
            return Err(UploadError::InvalidMimeType {
                content_type: content_type.to_string(),
            });
        }

        let bytes = tokio::fs::read(path).await.map_err(|source| UploadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        CsvUpload::new(file_name, content_type, bytes)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Multipart body `{file, pitcher_id}` for `POST /upload-milb`.
    pub fn into_form(self, pitcher_id: &str) -> Result<reqwest::multipart::Form, reqwest::Error> {
        let part = reqwest::multipart::Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(CSV_MIME)?;
        Ok(reqwest::multipart::Form::new()
            .part("file", part)
            .text("pitcher_id", pitcher_id.to_string()))
    }
}

fn mime_for_path(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => CSV_MIME,
        _ => "application/octet-stream",
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = "pitch_type,description,balls,strikes,events\nSL,ball,0,0,\n";

    #[test]
    fn accepts_valid_csv() {
        let up = CsvUpload::new("skenes.csv", "text/csv", GOOD.as_bytes().to_vec()).unwrap();
        assert_eq!(up.file_name(), "skenes.csv");
        assert_eq!(up.bytes(), GOOD.as_bytes());
    }

    #[test]
    fn accepts_csv_with_charset_parameter() {
        assert!(CsvUpload::new("a.csv", "text/csv; charset=utf-8", GOOD.as_bytes().to_vec()).is_ok());
    }

    #[test]
    fn rejects_other_mime_types() {
        for ct in ["application/vnd.ms-excel", "text/plain", "application/json", ""] {
            let err = CsvUpload::new("a.csv", ct, GOOD.as_bytes().to_vec()).unwrap_err();
            assert!(matches!(err, UploadError::InvalidMimeType { .. }), "{ct}");
        }
    }

    #[test]
    fn rejects_empty_file() {
        let err = CsvUpload::new("a.csv", "text/csv", b"  \n".to_vec()).unwrap_err();
        assert!(matches!(err, UploadError::Empty { .. }));
    }

    #[test]
    fn rejects_missing_columns() {
        let err = CsvUpload::new("a.csv", "text/csv", b"pitch_type,balls,strikes\n".to_vec())
            .unwrap_err();
        match err {
            UploadError::MissingColumns { missing } => {
                assert_eq!(missing, vec!["description", "events"]);
            }
            other => panic!("expected MissingColumns, got: {other}"),
        }
    }

    #[test]
    fn mime_inferred_from_extension() {
        assert_eq!(mime_for_path(Path::new("data/p.csv")), "text/csv");
        assert_eq!(mime_for_path(Path::new("data/P.CSV")), "text/csv");
        assert_eq!(mime_for_path(Path::new("data/p.xlsx")), "application/octet-stream");
        assert_eq!(mime_for_path(Path::new("data/p")), "application/octet-stream");
    }

    #[tokio::test]
    async fn from_path_rejects_non_csv_without_reading() {
        let err = CsvUpload::from_path(Path::new("/definitely/not/here.xlsx"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::InvalidMimeType { .. }));
    }

    #[tokio::test]
    async fn from_path_reads_csv_file() {
        let dir = std::env::temp_dir().join("pitchtree_upload_test");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("milb.csv");
        std::fs::write(&path, GOOD).unwrap();

        let up = CsvUpload::from_path(&path).await.unwrap();
        assert_eq!(up.file_name(), "milb.csv");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn from_path_missing_file_is_io_error() {
        let err = CsvUpload::from_path(Path::new("/definitely/not/here.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Io { .. }));
    }
}
