// Library root: wire types, HTTP client and upload validation for the
// analytics backend.

pub mod client;
pub mod protocol;
pub mod upload;

pub use client::{AnalyticsBackend, ApiClient, ApiError, ClientSettings};
pub use upload::{CsvUpload, UploadError};
