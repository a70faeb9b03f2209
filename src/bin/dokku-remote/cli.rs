use std::{
    ffi::OsString,
    path::PathBuf,
    process::{ExitCode, ExitStatus},
};

use clap::Parser;
use color_eyre::Result;
use dialoguer::console::Term;
use dokku_remote::{
    args::{self, Command, WrapperArgs},
    envfile,
    error::Error,
    git::GitCli,
    hooks::HookRunner,
    invoke,
    provision::Orchestrator,
    remote::SshClient,
    resolve::{self, ConnectionTarget, Overrides, Resolved},
};
use tracing::{trace, warn};

/// Run Dokku commands against the host and app named by a git remote.
///
/// `envfile` pushes the environment file's config to the app, `install`
/// provisions the app from it, and any other command is forwarded to Dokku.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
#[clap(bin_name = "dokku-remote")]
pub struct Cli {
    /// Git remote to read the host and app from [default: `git config dokku.remote`, then `dokku`].
    #[clap(long, value_name = "NAME")]
    pub remote: Option<String>,

    /// Environment file for `envfile` and `install` [default: `git config remote.<remote>.dokku-envfile`].
    #[clap(long, value_name = "PATH")]
    pub envfile: Option<PathBuf>,

    /// `envfile`, `install`, or a Dokku command and its arguments.
    #[clap(value_name = "COMMAND", value_parser)]
    pub command: Vec<OsString>,
}

impl Cli {
    /// Parses the process arguments. Our options are accepted anywhere on the
    /// line, so they are separated out before clap sees them.
    pub fn from_env() -> Self {
        let wrapper = args::split(std::env::args_os().skip(1));
        Cli::parse_from(argv(&wrapper))
    }

    pub fn exec(self) -> Result<ExitCode> {
        let git = GitCli;
        let command = Command::from_args(&self.command);

        let Resolved { target, remote } =
            resolve::resolve_target(&git, self.remote.as_deref(), Overrides::from_env())?;
        trace!(?target, remote = remote.as_str(), ?command);

        match command {
            Command::Forward(args) => {
                let status = invoke::forward(&target, &args)?;
                Ok(exit_code(status))
            }
            Command::EnvFile => {
                let path = self.env_file(&git, &remote)?;
                let prompt = format!("Set config from {} on {}?", path.display(), describe(&target));
                if !confirm(&prompt) {
                    println!("Cancelled.");
                    return Ok(ExitCode::SUCCESS);
                }

                let mut client = SshClient::new(target.clone());
                envfile::configure(&mut client, &target.app, &path)?;
                println!("=====> Config set on {}", target.app);
                Ok(ExitCode::SUCCESS)
            }
            Command::Install => {
                let path = self.env_file(&git, &remote)?;
                let prompt = format!("Install {} using {}?", describe(&target), path.display());
                if !confirm(&prompt) {
                    println!("Cancelled.");
                    return Ok(ExitCode::SUCCESS);
                }

                let mut client = SshClient::new(target.clone());
                let hooks = HookRunner::new(std::env::current_dir()?);
                Orchestrator::new(&mut client, &target, hooks).install(&path)?;
                Ok(ExitCode::SUCCESS)
            }
        }
    }

    /// The environment file, which must exist before we ask to use it.
    fn env_file(&self, git: &GitCli, remote: &str) -> Result<PathBuf, Error> {
        let path = resolve::env_file(git, remote, self.envfile.clone())?;
        if !path.exists() {
            return Err(Error::EnvFileNotFound { path });
        }
        Ok(path)
    }
}

/// Rebuilds an argument vector clap can parse: recognised options first, then
/// `--` and the remote command.
fn argv(wrapper: &WrapperArgs) -> Vec<OsString> {
    let mut argv: Vec<OsString> = vec!["dokku-remote".into()];

    if let Some(remote) = &wrapper.remote {
        argv.push(format!("--remote={remote}").into());
    }
    if let Some(envfile) = &wrapper.envfile {
        let mut arg = OsString::from("--envfile=");
        arg.push(envfile);
        argv.push(arg);
    }
    if wrapper.help {
        argv.push("--help".into());
    }

    argv.push("--".into());
    argv.extend(wrapper.rest.iter().cloned());
    argv
}

fn describe(target: &ConnectionTarget) -> String {
    format!("{} on {}", target.app, target.host)
}

/// A single `y`/`Y` keypress confirms; any other key, including a terminal we
/// cannot prompt on, declines.
fn confirm(prompt: &str) -> bool {
    let term = Term::stderr();
    if !term.is_term() {
        warn!("not a terminal, cannot ask for confirmation");
        return false;
    }

    if let Err(e) = term.write_str(&format!("{prompt} [y/N] ")) {
        warn!("could not write prompt: {e}");
        return false;
    }
    let answer = term.read_char();
    let _ = term.write_line("");

    match answer {
        Ok(key) => is_yes(key),
        Err(e) => {
            warn!("could not read confirmation: {e}");
            false
        }
    }
}

fn is_yes(key: char) -> bool {
    matches!(key, 'y' | 'Y')
}

fn exit_code(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(code) => ExitCode::from(code as u8),
        None => ExitCode::FAILURE,
    }
}
