use std::{
    io::{self, Read},
    net::TcpStream,
};

use ssh2::{CheckResult, ExtendedData, KnownHostFileKind, Session};
use thiserror::Error;
use tracing::{debug, trace};

use crate::{plan::ServiceKind, resolve::ConnectionTarget, ssh_config::HostSettings};

/// The remote operations provisioning needs, one method per category of
/// Dokku command.
pub trait RemoteClient {
    fn create_app(&mut self, app: &str) -> Result<(), RemoteError>;

    /// Sets every pair in one call. `pairs` are already escaped `KEY=VALUE`
    /// tokens.
    fn set_config(&mut self, app: &str, pairs: &[String], restart: bool) -> Result<(), RemoteError>;

    fn add_docker_option(&mut self, app: &str, option: &str) -> Result<(), RemoteError>;

    /// `mount` is in `host_path:container_path[:options]` form.
    fn mount_storage(&mut self, app: &str, mount: &str) -> Result<(), RemoteError>;

    fn domains(&mut self, app: &str) -> Result<Vec<String>, RemoteError>;

    fn add_domain(&mut self, app: &str, domain: &str) -> Result<(), RemoteError>;

    fn enable_tls(&mut self, app: &str) -> Result<(), RemoteError>;

    fn set_redirect(&mut self, app: &str, from: &str, to: &str) -> Result<(), RemoteError>;

    fn create_service(&mut self, kind: ServiceKind, name: &str) -> Result<(), RemoteError>;

    fn link_service(&mut self, kind: ServiceKind, name: &str, app: &str) -> Result<(), RemoteError>;
}

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("could not connect to {address}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("host key for {host} {problem}")]
    HostKey { host: String, problem: &'static str },

    #[error("ssh authentication as `{user}` failed; is your key loaded in ssh-agent?")]
    Auth { user: String },

    #[error(transparent)]
    Ssh(#[from] ssh2::Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("`{command}` exited with status {status}: {output}")]
    CommandFailed {
        command: String,
        status: i32,
        output: String,
    },
}

impl RemoteError {
    /// Whether the remote side ran the command and rejected it, as opposed to
    /// the command never reaching the host.
    pub fn is_command_failure(&self) -> bool {
        matches!(self, RemoteError::CommandFailed { .. })
    }
}

/// Runs Dokku commands over `ssh2`, one session per command.
pub struct SshClient {
    target: ConnectionTarget,
}

impl SshClient {
    pub fn new(target: ConnectionTarget) -> Self {
        Self { target }
    }

    fn connect(&self) -> Result<Session, RemoteError> {
        let host = HostSettings::lookup(&self.target);
        let address = format!("{}:{}", host.hostname, host.port);
        let tcp = TcpStream::connect(&address).map_err(|source| RemoteError::Connect {
            address: address.clone(),
            source,
        })?;

        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        session.handshake()?;
        verify_host_key(&session, &host)?;

        let user = &self.target.user;
        if let Err(e) = session.userauth_agent(user) {
            debug!("agent authentication failed: {e}");
            for key in host.identity_files.iter().filter(|path| path.is_file()) {
                if session.userauth_pubkey_file(user, None, key, None).is_ok() {
                    break;
                }
            }
        }

        trace!(
            "SSH connection authenticated: {authenticated}",
            authenticated = session.authenticated()
        );

        if !session.authenticated() {
            return Err(RemoteError::Auth { user: user.clone() });
        }

        Ok(session)
    }

    /// Executes `args` as a single Dokku command and returns its output, with
    /// stderr interleaved into stdout.
    pub fn exec(&self, args: &[&str]) -> Result<String, RemoteError> {
        let command = args.join(" ");
        trace!(command);

        let session = self.connect()?;
        let mut channel = session.channel_session()?;
        // stderr shares the stdout stream, so one read drains both.
        channel.handle_extended_data(ExtendedData::Merge)?;
        channel.exec(&command)?;

        let mut output = String::new();
        channel.read_to_string(&mut output)?;

        channel.send_eof()?;
        channel.wait_eof()?;
        channel.close()?;
        channel.wait_close()?;

        let status = channel.exit_status()?;
        debug!(command, status, "remote command finished");

        if status != 0 {
            return Err(RemoteError::CommandFailed {
                command,
                status,
                output: output.trim().to_string(),
            });
        }

        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<(), RemoteError> {
        let output = self.exec(args)?;
        print!("{output}");
        Ok(())
    }
}

/// Checks the server's key against the user's known_hosts files, the way
/// `ssh` does with `StrictHostKeyChecking=yes`.
fn verify_host_key(session: &Session, host: &HostSettings) -> Result<(), RemoteError> {
    let mut known_hosts = session.known_hosts()?;
    for file in host.known_hosts_files.iter().filter(|path| path.is_file()) {
        known_hosts.read_file(file, KnownHostFileKind::OpenSSH)?;
    }

    let (key, _) = session.host_key().ok_or_else(|| RemoteError::HostKey {
        host: host.hostname.clone(),
        problem: "was not sent by the server",
    })?;

    host_key_verdict(known_hosts.check_port(&host.hostname, host.port, key), &host.hostname)
}

fn host_key_verdict(result: CheckResult, host: &str) -> Result<(), RemoteError> {
    let problem = match result {
        CheckResult::Match => return Ok(()),
        CheckResult::NotFound => "is not in known_hosts; connect once with `ssh` to add it",
        CheckResult::Mismatch => {
            "does not match known_hosts; the server changed or the connection is being intercepted"
        }
        CheckResult::Failure => "could not be checked against known_hosts",
    };
    Err(RemoteError::HostKey {
        host: host.to_string(),
        problem,
    })
}

impl RemoteClient for SshClient {
    fn create_app(&mut self, app: &str) -> Result<(), RemoteError> {
        self.run(&["apps:create", app])
    }

    fn set_config(&mut self, app: &str, pairs: &[String], restart: bool) -> Result<(), RemoteError> {
        let mut args = vec!["config:set"];
        if !restart {
            args.push("--no-restart");
        }
        args.push(app);
        args.extend(pairs.iter().map(String::as_str));
        self.run(&args)
    }

    fn add_docker_option(&mut self, app: &str, option: &str) -> Result<(), RemoteError> {
        self.run(&["docker-options:add", app, "deploy,run", option])
    }

    fn mount_storage(&mut self, app: &str, mount: &str) -> Result<(), RemoteError> {
        self.run(&["storage:mount", app, mount])
    }

    fn domains(&mut self, app: &str) -> Result<Vec<String>, RemoteError> {
        let stdout = self.exec(&["domains:report", app, "--domains-app-vhosts"])?;
        Ok(stdout.split_whitespace().map(str::to_string).collect())
    }

    fn add_domain(&mut self, app: &str, domain: &str) -> Result<(), RemoteError> {
        self.run(&["domains:add", app, domain])
    }

    fn enable_tls(&mut self, app: &str) -> Result<(), RemoteError> {
        self.run(&["letsencrypt:enable", app])
    }

    fn set_redirect(&mut self, app: &str, from: &str, to: &str) -> Result<(), RemoteError> {
        self.run(&["redirect:set", app, from, to])
    }

    fn create_service(&mut self, kind: ServiceKind, name: &str) -> Result<(), RemoteError> {
        let command = format!("{}:create", kind.plugin());
        self.run(&[command.as_str(), name])
    }

    fn link_service(&mut self, kind: ServiceKind, name: &str, app: &str) -> Result<(), RemoteError> {
        let command = format!("{}:link", kind.plugin());
        self.run(&[command.as_str(), name, app])
    }
}
