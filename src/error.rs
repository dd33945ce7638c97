/// Error types shared by the loader, the audio backend and the player.

use std::path::PathBuf;

use thiserror::Error;

/// Problems with a box description. All of these abort startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("a {0} without name was found, each {0} must have a name")]
    MissingName(&'static str),

    #[error("{0} has no key, each theme and global effect needs a unique keyboard key")]
    MissingKey(String),

    #[error("the key {0:?} is not in the allowed range (a-z lowercase and 0-9 only)")]
    InvalidKey(char),

    #[error("the key {0} is already registered")]
    DuplicateKey(char),

    #[error("no file given in {0}")]
    MissingFile(String),

    #[error("file {path} for {owner} not found")]
    FileNotFound { path: PathBuf, owner: String },

    #[error("no theme found, there must be at least one theme")]
    NoTheme,

    #[error("no more than 10 global effects are allowed in path mode")]
    TooManyGlobals,

    #[error("no key can be assigned to {0}")]
    NoFreeKey(String),

    #[error("invalid color {0:?}, expected #rrggbb")]
    InvalidColor(String),
}

/// Failures reported by an audio backend.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoDevice,

    #[error("could not open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("unknown sound handle {0}")]
    UnknownHandle(u32),
}

/// Errors that stop the player loop.
#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("the key {0} is not registered as a theme")]
    ThemeNotFound(char),

    #[error(transparent)]
    Audio(#[from] AudioError),
}
