//! Wrapper-level option handling. Our options may appear anywhere on the
//! command line; everything else belongs to the remote command.

use std::{ffi::OsString, path::PathBuf};

/// The wrapper's own options, pulled out of the raw argument list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrapperArgs {
    pub remote: Option<String>,
    pub envfile: Option<PathBuf>,
    pub help: bool,
    /// Everything else, in original order and byte for byte.
    pub rest: Vec<OsString>,
}

/// Strips `--remote=`, `--envfile=`, `--help` and `-h` from `args` regardless
/// of position. A bare `--` stops the scan; it is dropped and everything after
/// it is kept verbatim. Arguments that are not valid UTF-8 are never ours and
/// pass through untouched.
pub fn split<I, S>(args: I) -> WrapperArgs
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let mut parsed = WrapperArgs::default();
    let mut args = args.into_iter().map(Into::<OsString>::into);

    while let Some(arg) = args.next() {
        let Some(text) = arg.to_str() else {
            parsed.rest.push(arg);
            continue;
        };

        if text == "--" {
            parsed.rest.extend(args.by_ref());
            break;
        } else if let Some(remote) = text.strip_prefix("--remote=") {
            parsed.remote = Some(remote.to_string());
        } else if let Some(envfile) = text.strip_prefix("--envfile=") {
            parsed.envfile = Some(PathBuf::from(envfile));
        } else if text == "--help" || text == "-h" {
            parsed.help = true;
        } else {
            parsed.rest.push(arg);
        }
    }

    parsed
}

/// What an invocation asks for, decided by the first non-option argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Push the environment file's config to the app.
    EnvFile,
    /// Run the full provisioning sequence.
    Install,
    /// Hand the arguments to Dokku unchanged.
    Forward(Vec<OsString>),
}

impl Command {
    pub fn from_args(rest: &[OsString]) -> Self {
        match rest.first().and_then(|first| first.to_str()) {
            Some("envfile") => Command::EnvFile,
            Some("install") => Command::Install,
            _ => Command::Forward(rest.to_vec()),
        }
    }
}
