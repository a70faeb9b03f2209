//! Forwards arbitrary commands to Dokku over an interactive `ssh` session.

use std::{
    ffi::OsString,
    io,
    process::{Command, ExitStatus},
};

use tracing::trace;

use crate::resolve::ConnectionTarget;

/// Arguments for the system `ssh` client: a forced pseudo-terminal, the
/// target's port and destination, then `--app <app>` and the forwarded
/// command untouched.
pub fn ssh_args(target: &ConnectionTarget, command: &[OsString]) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-t".into(),
        "-p".into(),
        target.port.to_string().into(),
        target.destination().into(),
        "--".into(),
        "--app".into(),
        target.app.clone().into(),
    ];
    args.extend(command.iter().cloned());
    args
}

/// Runs `command` against the target app with the terminal attached and
/// returns the session's exit status.
pub fn forward(target: &ConnectionTarget, command: &[OsString]) -> io::Result<ExitStatus> {
    let args = ssh_args(target, command);
    trace!(?args, "ssh");

    Command::new("ssh").args(&args).status()
}
