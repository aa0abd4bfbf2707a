use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::DeError),
    #[error("xml write error: {0}")]
    XmlWrite(#[from] quick_xml::SeError),
    #[error("malformed MSPDI duration {0:?}")]
    MalformedDuration(String),
    #[error("malformed MSPDI date {0:?}")]
    MalformedDate(String),
    #[error("unrecognized MSPDI {1} code {0}")]
    UnknownCode(i64, &'static str),
    #[error(transparent)]
    Core(#[from] pls_core::Error),
}

pub type Result<T> = std::result::Result<T, IoError>;
