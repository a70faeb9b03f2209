use std::{io, path::PathBuf};

use thiserror::Error;

use crate::remote::RemoteError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("git remote `{alias}` is not configured; add it with `git remote add {alias} dokku@<host>:<app>`")]
    RemoteNotConfigured { alias: String },

    #[error("could not determine both the Dokku host and the app name")]
    IncompleteTarget,

    #[error("invalid port `{0}`")]
    InvalidPort(String),

    #[error("an environment file is required; pass --envfile=PATH or set `git config remote.<remote>.dokku-envfile`")]
    EnvFileUnset,

    #[error("environment file {path} does not exist")]
    EnvFileNotFound { path: PathBuf },

    #[error("could not read environment file {path}")]
    EnvFileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid {setting} entry `{entry}`")]
    InvalidPair { setting: &'static str, entry: String },

    #[error("{hook} hook exited with status {status}")]
    HookFailed { hook: &'static str, status: i32 },

    #[error("could not run {hook} hook")]
    HookSpawn {
        hook: &'static str,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Remote(#[from] RemoteError),
}
