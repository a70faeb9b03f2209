//! Host settings as the system `ssh` client resolves them, so `ssh2` sessions
//! reach the same machine that `ssh` does for the same remote.

use std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use tracing::debug;

use crate::resolve::ConnectionTarget;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSettings {
    pub hostname: String,
    pub port: u16,
    pub identity_files: Vec<PathBuf>,
    pub known_hosts_files: Vec<PathBuf>,
}

impl HostSettings {
    /// Asks `ssh -G` how it would connect to the target. Falls back to the
    /// target as given when `ssh` is unavailable or rejects the lookup.
    pub fn lookup(target: &ConnectionTarget) -> Self {
        let home = home_dir();
        let output = Command::new("ssh")
            .arg("-G")
            .arg("-p")
            .arg(target.port.to_string())
            .arg(target.destination())
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output();

        match output {
            Ok(output) if output.status.success() => {
                let settings = Self::parse(
                    &String::from_utf8_lossy(&output.stdout),
                    target,
                    home.as_deref(),
                );
                debug!(?settings, "resolved ssh settings");
                settings
            }
            Ok(output) => {
                debug!(status = ?output.status, "ssh -G failed, using target as given");
                Self::fallback(target, home.as_deref())
            }
            Err(e) => {
                debug!("could not run ssh -G: {e}");
                Self::fallback(target, home.as_deref())
            }
        }
    }

    pub fn fallback(target: &ConnectionTarget, home: Option<&Path>) -> Self {
        let ssh_dir = home.map(|home| home.join(".ssh"));
        Self {
            hostname: target.host.clone(),
            port: target.port,
            identity_files: ssh_dir
                .iter()
                .flat_map(|dir| [dir.join("id_ed25519"), dir.join("id_rsa")])
                .collect(),
            known_hosts_files: ssh_dir.iter().map(|dir| dir.join("known_hosts")).collect(),
        }
    }

    /// Reads `ssh -G` output: one lowercase `key value` pair per line.
    pub fn parse(output: &str, target: &ConnectionTarget, home: Option<&Path>) -> Self {
        let mut settings = Self::fallback(target, home);
        let mut identity_files = Vec::new();
        let mut known_hosts_files = Vec::new();

        for line in output.lines() {
            let Some((key, value)) = line.split_once(' ') else {
                continue;
            };
            let value = value.trim();
            match key {
                "hostname" => settings.hostname = value.to_string(),
                "port" => {
                    if let Ok(port) = value.parse() {
                        settings.port = port;
                    }
                }
                "identityfile" => identity_files.push(expand_home(value, home)),
                "userknownhostsfile" => known_hosts_files.extend(
                    value
                        .split_whitespace()
                        .map(|file| expand_home(file, home)),
                ),
                _ => {}
            }
        }

        if !identity_files.is_empty() {
            settings.identity_files = identity_files;
        }
        if !known_hosts_files.is_empty() {
            settings.known_hosts_files = known_hosts_files;
        }
        settings
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

fn expand_home(path: &str, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> ConnectionTarget {
        ConnectionTarget {
            host: "myserver".into(),
            app: "shop".into(),
            port: 22,
            user: "dokku".into(),
        }
    }

    #[test]
    fn follows_host_aliases() {
        let output = "user dokku\n\
                      hostname dokku.example.com\n\
                      port 2222\n\
                      identityfile ~/.ssh/deploy_key\n\
                      identityfile /etc/keys/shared\n\
                      userknownhostsfile ~/.ssh/known_hosts ~/.ssh/known_hosts2\n";

        let settings = HostSettings::parse(output, &target(), Some(Path::new("/home/ops")));

        assert_eq!(
            settings,
            HostSettings {
                hostname: "dokku.example.com".into(),
                port: 2222,
                identity_files: vec![
                    PathBuf::from("/home/ops/.ssh/deploy_key"),
                    PathBuf::from("/etc/keys/shared"),
                ],
                known_hosts_files: vec![
                    PathBuf::from("/home/ops/.ssh/known_hosts"),
                    PathBuf::from("/home/ops/.ssh/known_hosts2"),
                ],
            }
        );
    }

    #[test]
    fn missing_keys_keep_the_target() {
        let settings = HostSettings::parse("user dokku\nport nope\n", &target(), Some(Path::new("/home/ops")));

        assert_eq!(settings.hostname, "myserver");
        assert_eq!(settings.port, 22);
        assert_eq!(
            settings.identity_files,
            vec![
                PathBuf::from("/home/ops/.ssh/id_ed25519"),
                PathBuf::from("/home/ops/.ssh/id_rsa"),
            ]
        );
        assert_eq!(
            settings.known_hosts_files,
            vec![PathBuf::from("/home/ops/.ssh/known_hosts")]
        );
    }

    #[test]
    fn no_home_means_no_default_files() {
        let settings = HostSettings::fallback(&target(), None);
        assert!(settings.identity_files.is_empty());
        assert!(settings.known_hosts_files.is_empty());
    }
}
