use thiserror::Error;
/// Why a received block was dropped without touching the store.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("line {line} has no `=` separator")]
    MissingSeparator { line: usize },
    #[error("column `{name}` holds a non-numeric token `{token}`")]
    InvalidNumber { name: String, token: String },
    #[error("unknown column `{0}`")]
    UnknownColumn(String),
    #[error("column `{0}` appears twice in the same block")]
    DuplicateColumn(String),
}
#[derive(Debug, Error)]
pub enum OxyError {
    #[error("malformed block: {0}")]
    Frame(#[from] FrameError),
    #[error("column name is not valid UTF-8: {0}")]
    NameEncoding(#[from] std::str::Utf8Error),
    #[error("window needs {needed} rows, store holds {available}")]
    InsufficientWindow { needed: usize, available: usize },
    #[error("unknown window function `{0}`")]
    UnknownWindow(String),
    #[error("`{0}` is not a raw device channel")]
    NotAChannel(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("cannot open serial port {port}: {source} (available: {available})")]
    OpenPort {
        port: String,
        #[source]
        source: serialport::Error,
        available: String,
    },
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to render plot: {0}")]
    Plot(String),
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for OxyError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        OxyError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for OxyError {
    fn from(value: image::ImageError) -> Self {
        OxyError::Plot(value.to_string())
    }
}
