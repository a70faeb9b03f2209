//! `KEY=VALUE` environment files, pushed to the app as Dokku config.

use std::{fs, path::Path};

use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    remote::RemoteClient,
};

/// The ordered `KEY=VALUE` pairs of an environment file. Values are taken
/// literally; nothing is interpolated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFile {
    entries: Vec<(String, String)>,
}

impl EnvFile {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::EnvFileNotFound {
                path: path.to_path_buf(),
            });
        }

        let contents = fs::read_to_string(path).map_err(|source| Error::EnvFileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let env = Self::parse(&contents);
        debug!(path = %path.display(), entries = env.entries.len(), "loaded environment file");
        Ok(env)
    }

    pub fn parse(contents: &str) -> Self {
        let entries = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| line.strip_prefix("export ").map_or(line, str::trim_start))
            .filter_map(|line| match line.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    Some((key.trim().to_string(), value.to_string()))
                }
                _ => {
                    warn!(line, "ignoring environment file line without KEY=VALUE");
                    None
                }
            })
            .collect();

        Self { entries }
    }

    /// The last value assigned to `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `KEY=VALUE` tokens ready to send, with spaces in values escaped so the
    /// remote shell keeps each pair whole.
    pub fn config_args(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(key, value)| format!("{key}={}", value.replace(' ', "\\ ")))
            .collect()
    }

    /// Sets every pair on `app` in a single call, without restarting it.
    pub fn push(&self, client: &mut impl RemoteClient, app: &str) -> Result<()> {
        if self.is_empty() {
            warn!(app, "environment file has no entries, nothing to set");
            return Ok(());
        }

        client.set_config(app, &self.config_args(), false)?;
        Ok(())
    }
}

/// Loads the file at `path` and sets its pairs on `app`.
pub fn configure(client: &mut impl RemoteClient, app: &str, path: &Path) -> Result<()> {
    EnvFile::load(path)?.push(client, app)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_and_blank_lines() {
        let env = EnvFile::parse("# comment\n\n   \nexport FOO=bar\nBAZ=qux quux\n");

        assert_eq!(
            env.entries(),
            &[
                ("FOO".to_string(), "bar".to_string()),
                ("BAZ".to_string(), "qux quux".to_string()),
            ]
        );
        assert_eq!(env.config_args(), vec!["FOO=bar", "BAZ=qux\\ quux"]);
    }

    #[test]
    fn values_are_literal() {
        let env = EnvFile::parse("URL=postgres://u:p@db/app?x=1\nHOME_DIR=$HOME\nQUOTED=\"a b\"\n");

        assert_eq!(env.get("URL"), Some("postgres://u:p@db/app?x=1"));
        assert_eq!(env.get("HOME_DIR"), Some("$HOME"));
        assert_eq!(env.get("QUOTED"), Some("\"a b\""));
    }

    #[test]
    fn later_assignments_win_on_lookup() {
        let env = EnvFile::parse("A=1\nA=2\n");
        assert_eq!(env.get("A"), Some("2"));
        assert_eq!(env.entries().len(), 2);
    }

    #[test]
    fn ignores_lines_without_assignment() {
        let env = EnvFile::parse("not an assignment\n=novalue\nEMPTY=\n");
        assert_eq!(env.entries(), &[("EMPTY".to_string(), String::new())]);
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = EnvFile::load(Path::new("/nonexistent/.env.production")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/.env.production"));
    }
}
