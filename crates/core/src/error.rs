#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Delimited text error: {0}")]
    Delimited(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rust_xlsxwriter::XlsxError> for CoreError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Self::Spreadsheet(err.to_string())
    }
}

impl From<calamine::XlsxError> for CoreError {
    fn from(err: calamine::XlsxError) -> Self {
        Self::Spreadsheet(err.to_string())
    }
}

impl From<csv::Error> for CoreError {
    fn from(err: csv::Error) -> Self {
        Self::Delimited(err.to_string())
    }
}
