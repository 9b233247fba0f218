use std::{error, fmt, io};

use crate::playlist::LabelId;

#[derive(Debug)]
pub enum Error {
    EmptyPlaylist,
    DuplicateLabel(LabelId),
    NotReady,
    FeedDisconnected { code: i32, message: String },
    MalformedMessage(Box<dyn error::Error + Send + Sync>),
    ConfigError(String),
    WebApiError(String),
    JsonError(Box<dyn error::Error + Send + Sync>),
    IoError(io::Error),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPlaylist => write!(f, "Playlist has no labels"),
            Self::DuplicateLabel(id) => write!(f, "Label {id} appears more than once in playlist"),
            Self::NotReady => write!(f, "Playlist is not loaded yet"),
            Self::FeedDisconnected { code, message } => {
                write!(f, "Feed disconnected ({code}): {message}")
            }
            Self::MalformedMessage(err) => write!(f, "Malformed message: {err}"),
            Self::ConfigError(msg) => write!(f, "Invalid configuration: {msg}"),
            Self::WebApiError(msg) => f.write_str(msg),
            Self::JsonError(err) => err.fmt(f),
            Self::IoError(err) => err.fmt(f),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::JsonError(Box::new(err))
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Error {
        Error::WebApiError(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Error {
        Error::ConfigError(err.to_string())
    }
}
