//! Derives where and what to deploy from flags, the environment, and git
//! configuration, in that order of precedence.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::{
    error::{Error, Result},
    git::GitConfig,
};

pub const DEFAULT_REMOTE: &str = "dokku";
pub const DEFAULT_PORT: u16 = 22;
pub const DEFAULT_USER: &str = "dokku";

/// Git config key holding the preferred remote alias.
pub const REMOTE_SETTING: &str = "dokku.remote";

/// Where remote commands go. Built once per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub host: String,
    pub app: String,
    pub port: u16,
    pub user: String,
}

impl ConnectionTarget {
    /// `user@host`, as given to ssh.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

/// A resolved target plus the git remote name its per-remote settings are
/// stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub target: ConnectionTarget,
    /// The configured spelling when a git remote was matched, otherwise the
    /// requested alias.
    pub remote: String,
}

/// Values supplied from outside git, normally through `DOKKU_*` variables.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub app: Option<String>,
    pub port: Option<String>,
    pub user: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key| lookup(key).filter(|value: &String| !value.is_empty());
        Self {
            host: get("DOKKU_HOST"),
            app: get("DOKKU_APP"),
            port: get("DOKKU_PORT"),
            user: get("DOKKU_USER"),
        }
    }
}

/// Flag value, then the stored setting, then [`DEFAULT_REMOTE`]. Empty values
/// count as unset.
pub fn remote_alias(git: &impl GitConfig, flag: Option<&str>) -> String {
    flag.filter(|flag| !flag.is_empty())
        .map(str::to_string)
        .or_else(|| git.get(REMOTE_SETTING).filter(|alias| !alias.is_empty()))
        .unwrap_or_else(|| DEFAULT_REMOTE.to_string())
}

pub fn resolve_target(
    git: &impl GitConfig,
    remote_flag: Option<&str>,
    overrides: Overrides,
) -> Result<Resolved> {
    let Overrides {
        mut host,
        mut app,
        port,
        user,
    } = overrides;

    let mut remote_name = remote_alias(git, remote_flag);
    trace!(alias = remote_name.as_str());

    if host.is_none() || app.is_none() {
        let remote = git
            .remotes()
            .into_iter()
            .find(|remote| remote.name.eq_ignore_ascii_case(&remote_name))
            .ok_or(Error::RemoteNotConfigured { alias: remote_name })?;

        let (remote_host, remote_app) = parse_remote_url(&remote.url);
        debug!(url = remote.url.as_str(), remote_host, remote_app, "parsed git remote");

        host = host.or_else(|| Some(remote_host.to_string()));
        app = app.or_else(|| Some(remote_app.to_string()));
        remote_name = remote.name;
    }

    let port = match port {
        Some(port) => port.parse().map_err(|_| Error::InvalidPort(port))?,
        None => DEFAULT_PORT,
    };

    match (host, app) {
        (Some(host), Some(app)) if !host.is_empty() && !app.is_empty() => Ok(Resolved {
            target: ConnectionTarget {
                host,
                app,
                port,
                user: user.unwrap_or_else(|| DEFAULT_USER.to_string()),
            },
            remote: remote_name,
        }),
        _ => Err(Error::IncompleteTarget),
    }
}

/// Splits a `user@host:app` URL into `(host, app)`. Text before the first `@`
/// is dropped; the first `:` after it separates host from app.
pub fn parse_remote_url(url: &str) -> (&str, &str) {
    let rest = url.split_once('@').map_or(url, |(_, rest)| rest);
    rest.split_once(':').unwrap_or((rest, ""))
}

/// Flag value, then `remote.<remote>.dokku-envfile`. `remote` should be the
/// name as git stores it, since git matches subsection names exactly.
pub fn env_file(git: &impl GitConfig, remote: &str, flag: Option<PathBuf>) -> Result<PathBuf> {
    flag.or_else(|| git.get(&format!("remote.{remote}.dokku-envfile")).map(PathBuf::from))
        .ok_or(Error::EnvFileUnset)
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, collections::HashMap};

    use super::*;
    use crate::git::Remote;

    #[derive(Default)]
    struct FakeGit {
        config: HashMap<String, String>,
        remotes: Vec<Remote>,
        lookups: Cell<usize>,
    }

    impl FakeGit {
        fn with_remote(name: &str, url: &str) -> Self {
            Self {
                remotes: vec![Remote {
                    name: name.into(),
                    url: url.into(),
                }],
                ..Default::default()
            }
        }
    }

    impl GitConfig for FakeGit {
        fn get(&self, key: &str) -> Option<String> {
            self.config.get(key).cloned()
        }

        fn remotes(&self) -> Vec<Remote> {
            self.lookups.set(self.lookups.get() + 1);
            self.remotes.clone()
        }
    }

    #[test]
    fn splits_remote_url() {
        assert_eq!(parse_remote_url("dokku@dokku.me:appname"), ("dokku.me", "appname"));
        assert_eq!(parse_remote_url("dokku.me:appname"), ("dokku.me", "appname"));
        assert_eq!(parse_remote_url("dokku@dokku.me"), ("dokku.me", ""));
    }

    #[test]
    fn derives_target_from_default_remote() {
        let git = FakeGit::with_remote("dokku", "dokku@dokku.me:appname");
        let resolved = resolve_target(&git, None, Overrides::default()).unwrap();
        let target = resolved.target;

        assert_eq!(resolved.remote, "dokku");
        assert_eq!(
            target,
            ConnectionTarget {
                host: "dokku.me".into(),
                app: "appname".into(),
                port: 22,
                user: "dokku".into(),
            }
        );
        assert_eq!(target.destination(), "dokku@dokku.me");
    }

    #[test]
    fn remote_names_match_case_insensitively() {
        let git = FakeGit::with_remote("Production", "dokku@prod.example.com:shop");
        let resolved = resolve_target(&git, Some("production"), Overrides::default()).unwrap();
        assert_eq!(resolved.target.app, "shop");
        assert_eq!(resolved.remote, "Production");
    }

    #[test]
    fn env_file_setting_follows_the_configured_remote_name() {
        let mut git = FakeGit::with_remote("Production", "dokku@prod.example.com:shop");
        git.config.insert(
            "remote.Production.dokku-envfile".into(),
            ".env.production".into(),
        );

        let resolved = resolve_target(&git, Some("production"), Overrides::default()).unwrap();
        assert_eq!(
            env_file(&git, &resolved.remote, None).unwrap(),
            PathBuf::from(".env.production")
        );
    }

    #[test]
    fn empty_remote_flag_means_default() {
        let mut git = FakeGit::with_remote("dokku", "dokku@dokku.me:appname");
        assert_eq!(remote_alias(&git, Some("")), DEFAULT_REMOTE);

        git.config.insert(REMOTE_SETTING.into(), "staging".into());
        assert_eq!(remote_alias(&git, Some("")), "staging");

        git.config.insert(REMOTE_SETTING.into(), String::new());
        let resolved = resolve_target(&git, Some(""), Overrides::default()).unwrap();
        assert_eq!(resolved.target.host, "dokku.me");
    }

    #[test]
    fn stored_setting_picks_the_remote() {
        let mut git = FakeGit::with_remote("staging", "dokku@stage.example.com:shop-stage");
        git.config.insert(REMOTE_SETTING.into(), "staging".into());

        let target = resolve_target(&git, None, Overrides::default()).unwrap().target;
        assert_eq!(target.host, "stage.example.com");
    }

    #[test]
    fn full_overrides_skip_git() {
        let git = FakeGit::default();
        let overrides = Overrides {
            host: Some("dokku.me".into()),
            app: Some("web".into()),
            port: Some("2222".into()),
            user: Some("deploy".into()),
        };

        let resolved = resolve_target(&git, Some("missing"), overrides).unwrap();
        assert_eq!(resolved.target.port, 2222);
        assert_eq!(resolved.target.user, "deploy");
        assert_eq!(resolved.remote, "missing");
        assert_eq!(git.lookups.get(), 0);
    }

    #[test]
    fn partial_override_keeps_the_other_half_from_git() {
        let git = FakeGit::with_remote("dokku", "dokku@dokku.me:appname");
        let overrides = Overrides {
            app: Some("other".into()),
            ..Default::default()
        };

        let target = resolve_target(&git, None, overrides).unwrap().target;
        assert_eq!(target.host, "dokku.me");
        assert_eq!(target.app, "other");
    }

    #[test]
    fn missing_remote_is_an_error() {
        let git = FakeGit::with_remote("origin", "git@github.com:acme/web.git");
        let err = resolve_target(&git, None, Overrides::default()).unwrap_err();

        assert!(matches!(err, Error::RemoteNotConfigured { ref alias } if alias == "dokku"));
    }

    #[test]
    fn remote_without_app_is_incomplete() {
        let git = FakeGit::with_remote("dokku", "dokku@dokku.me");
        let err = resolve_target(&git, None, Overrides::default()).unwrap_err();
        assert!(matches!(err, Error::IncompleteTarget));
    }

    #[test]
    fn rejects_bad_port() {
        let git = FakeGit::with_remote("dokku", "dokku@dokku.me:web");
        let overrides = Overrides {
            port: Some("ssh".into()),
            ..Default::default()
        };
        assert!(matches!(
            resolve_target(&git, None, overrides),
            Err(Error::InvalidPort(_))
        ));
    }

    #[test]
    fn empty_variables_are_ignored() {
        let overrides = Overrides::from_lookup(|key| match key {
            "DOKKU_HOST" => Some(String::new()),
            "DOKKU_APP" => Some("web".into()),
            _ => None,
        });
        assert_eq!(overrides.host, None);
        assert_eq!(overrides.app.as_deref(), Some("web"));
    }

    #[test]
    fn env_file_precedence() {
        let mut git = FakeGit::default();
        git.config
            .insert("remote.dokku.dokku-envfile".into(), ".env.production".into());

        assert_eq!(
            env_file(&git, "dokku", Some("/tmp/x".into())).unwrap(),
            PathBuf::from("/tmp/x")
        );
        assert_eq!(
            env_file(&git, "dokku", None).unwrap(),
            PathBuf::from(".env.production")
        );
        assert!(matches!(
            env_file(&git, "staging", None),
            Err(Error::EnvFileUnset)
        ));
    }
}
