//! Read-only access to the local git configuration.

use std::process::{Command, Stdio};

use tracing::debug;

/// A named git remote and its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub name: String,
    pub url: String,
}

pub trait GitConfig {
    /// The value of a single config key, if set.
    fn get(&self, key: &str) -> Option<String>;

    /// Every configured remote that has a URL.
    fn remotes(&self) -> Vec<Remote>;
}

/// Shells out to the `git` binary in the current directory.
#[derive(Debug, Default)]
pub struct GitCli;

impl GitCli {
    fn run(&self, args: &[&str]) -> Option<String> {
        let output = Command::new("git")
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output();

        match output {
            Ok(output) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(output) => {
                debug!(?args, status = ?output.status, "git exited unsuccessfully");
                None
            }
            Err(e) => {
                debug!(?args, "could not run git: {e}");
                None
            }
        }
    }
}

impl GitConfig for GitCli {
    fn get(&self, key: &str) -> Option<String> {
        self.run(&["config", "--get", key])
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn remotes(&self) -> Vec<Remote> {
        self.run(&["config", "--get-regexp", r"^remote\..*\.url$"])
            .map(|listing| parse_remote_urls(&listing))
            .unwrap_or_default()
    }
}

/// Parses `git config --get-regexp` output of the form
/// `remote.<name>.url <url>`, one per line.
fn parse_remote_urls(listing: &str) -> Vec<Remote> {
    listing
        .lines()
        .filter_map(|line| {
            let (key, url) = line.split_once(char::is_whitespace)?;
            let name = key.strip_prefix("remote.")?.strip_suffix(".url")?;
            Some(Remote {
                name: name.to_string(),
                url: url.trim().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_remote_listing() {
        let listing = "remote.origin.url git@github.com:acme/web.git\n\
                       remote.dokku.url dokku@dokku.me:web\n\
                       remote.stage.eu.url dokku@eu.dokku.me:web-stage\n";

        let remotes = parse_remote_urls(listing);
        assert_eq!(remotes.len(), 3);
        assert_eq!(
            remotes[1],
            Remote {
                name: "dokku".into(),
                url: "dokku@dokku.me:web".into()
            }
        );
        assert_eq!(remotes[2].name, "stage.eu");
    }

    #[test]
    fn skips_malformed_lines() {
        assert!(parse_remote_urls("\nbranch.main.remote origin\n").is_empty());
    }
}
