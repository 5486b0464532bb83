use stowage_base::b3f::B3FError;
use stowage_base::LocationError;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

/// Coarse grouping of [`LoadError`], describing how the loader reacted to it
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoadErrorCategory {
    /// Rejected before anything started, `load()` returned false and no event fired
    Configuration,
    /// The fetch itself failed, the request ended up `Failed`
    Transport,
    /// The payload arrived but could not be turned into the declared asset type
    Decode,
    /// The path could not be turned into a URL, no IO was attempted
    MalformedLocation,
}

#[derive(Debug, Clone)]
pub enum LoadError {
    EmptyPath,
    Inactive,
    MalformedLocation(LocationError),
    IoError(Arc<std::io::Error>),
    HttpError(String),
    HttpStatus(u16),
    UnsupportedScheme(String),
    Timeout(Duration),
    DecodeError(String),
    ImageError(Arc<image::ImageError>),
    BincodeError(Arc<bincode::Error>),
    JsonError(Arc<serde_json::Error>),
    B3FError(B3FError),
}

impl LoadError {
    pub fn category(&self) -> LoadErrorCategory {
        match self {
            LoadError::EmptyPath | LoadError::Inactive => LoadErrorCategory::Configuration,
            LoadError::MalformedLocation(_) => LoadErrorCategory::MalformedLocation,
            LoadError::IoError(_)
            | LoadError::HttpError(_)
            | LoadError::HttpStatus(_)
            | LoadError::UnsupportedScheme(_)
            | LoadError::Timeout(_) => LoadErrorCategory::Transport,
            LoadError::DecodeError(_)
            | LoadError::ImageError(_)
            | LoadError::BincodeError(_)
            | LoadError::B3FError(_) => LoadErrorCategory::Decode,
            // Only produced while reading configuration
            LoadError::JsonError(_) => LoadErrorCategory::Configuration,
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            LoadError::MalformedLocation(ref e) => Some(e),
            LoadError::IoError(ref e) => Some(&**e),
            LoadError::ImageError(ref e) => Some(&**e),
            LoadError::BincodeError(ref e) => Some(&**e),
            LoadError::JsonError(ref e) => Some(&**e),
            LoadError::B3FError(ref e) => Some(e),
            _ => None,
        }
    }
}

impl Display for LoadError {
    fn fmt(
        &self,
        fmt: &mut core::fmt::Formatter,
    ) -> core::fmt::Result {
        match *self {
            LoadError::EmptyPath => "no path or URL configured".fmt(fmt),
            LoadError::Inactive => "owner is not active".fmt(fmt),
            LoadError::MalformedLocation(ref e) => e.fmt(fmt),
            LoadError::IoError(ref e) => e.fmt(fmt),
            LoadError::HttpError(ref e) => e.fmt(fmt),
            LoadError::HttpStatus(status) => write!(fmt, "HTTP status {}", status),
            LoadError::UnsupportedScheme(ref scheme) => {
                write!(fmt, "unsupported URL scheme {}", scheme)
            }
            LoadError::Timeout(duration) => write!(fmt, "fetch timed out after {:?}", duration),
            LoadError::DecodeError(ref e) => e.fmt(fmt),
            LoadError::ImageError(ref e) => e.fmt(fmt),
            LoadError::BincodeError(ref e) => e.fmt(fmt),
            LoadError::JsonError(ref e) => e.fmt(fmt),
            LoadError::B3FError(ref e) => e.fmt(fmt),
        }
    }
}

impl From<&str> for LoadError {
    fn from(str: &str) -> Self {
        LoadError::DecodeError(str.to_string())
    }
}

impl From<String> for LoadError {
    fn from(string: String) -> Self {
        LoadError::DecodeError(string)
    }
}

impl From<LocationError> for LoadError {
    fn from(error: LocationError) -> Self {
        LoadError::MalformedLocation(error)
    }
}

impl From<std::io::Error> for LoadError {
    fn from(error: std::io::Error) -> Self {
        LoadError::IoError(Arc::new(error))
    }
}

impl From<image::ImageError> for LoadError {
    fn from(error: image::ImageError) -> Self {
        LoadError::ImageError(Arc::new(error))
    }
}

impl From<bincode::Error> for LoadError {
    fn from(error: bincode::Error) -> Self {
        LoadError::BincodeError(Arc::new(error))
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(error: serde_json::Error) -> Self {
        LoadError::JsonError(Arc::new(error))
    }
}

impl From<B3FError> for LoadError {
    fn from(error: B3FError) -> Self {
        LoadError::B3FError(error)
    }
}

impl From<ureq::Error> for LoadError {
    fn from(error: ureq::Error) -> Self {
        match error {
            ureq::Error::Status(status, _) => LoadError::HttpStatus(status),
            ureq::Error::Transport(transport) => LoadError::HttpError(transport.to_string()),
        }
    }
}

pub type LoadResult<T> = Result<T, LoadError>;
