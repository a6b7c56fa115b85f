use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure that ends a run. Recoverable input problems (malformed
/// lines, over-long tokens) are logged and counted instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("cannot parse json configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing or invalid parameter, wrong number of arguments.
    #[error("configuration error: {0}")]
    Config(String),

    /// The requested score column is absent from the header, or names one
    /// of the four identifier columns.
    #[error("column named \"{name}\" not found in {file}, the first four fields cannot be used as scores")]
    MissingColumn { name: String, file: String },

    /// An id that must be present in a frozen index is not. Signals a
    /// corrupted intermediate file.
    /// A tabular input without even a header line.
    #[error("{0} is empty, expected a header line")]
    EmptyFile(String),

    #[error("no {role} profile for id {id}")]
    MissingProfile { role: &'static str, id: usize },

    #[error("no symbol with id {0}")]
    MissingSymbol(usize),

    #[error("cannot build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}
