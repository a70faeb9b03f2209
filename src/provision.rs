//! The `install` sequence: everything needed to stand an app up on a fresh
//! Dokku host, safe to run again against one that is already provisioned.

use std::path::Path;

use tracing::{info, warn};

use crate::{
    envfile::EnvFile,
    error::Result,
    hooks::{Hook, HookRunner},
    plan::ProvisioningPlan,
    remote::{RemoteClient, RemoteError},
    resolve::ConnectionTarget,
};

/// Root under which per-app storage directories live on the host.
pub const STORAGE_ROOT: &str = "/var/lib/dokku/data/storage";

pub const LOCALTIME_MOUNT: &str = "/etc/localtime:/etc/localtime:ro";

pub struct Orchestrator<'a, C> {
    client: &'a mut C,
    target: &'a ConnectionTarget,
    hooks: HookRunner,
}

impl<'a, C: RemoteClient> Orchestrator<'a, C> {
    pub fn new(client: &'a mut C, target: &'a ConnectionTarget, hooks: HookRunner) -> Self {
        Self {
            client,
            target,
            hooks,
        }
    }

    /// Provisions the target app from the environment file at `env_path`.
    ///
    /// Steps that can be repeated safely (creating the app, mounts, redirects,
    /// services) log and continue when Dokku rejects them. Loading the
    /// environment file, hooks and certificate issuance abort the run.
    pub fn install(&mut self, env_path: &Path) -> Result<ProvisioningPlan> {
        let target = self.target;
        let app = target.app.as_str();

        step(format!("Creating app {app}"));
        tolerate("apps:create", self.client.create_app(app))?;

        step(format!("Setting config from {}", env_path.display()));
        let env = EnvFile::load(env_path)?;
        let plan = ProvisioningPlan::from_settings(&env, |key| std::env::var(key).ok())?;
        env.push(&mut *self.client, app)?;

        self.hooks.run(Hook::Preinstall, target)?;

        step("Routing container logs to journald");
        self.client.add_docker_option(app, "--log-driver=journald")?;
        self.client.add_docker_option(app, &format!("--log-opt=tag={app}"))?;

        step("Mounting host local time");
        tolerate("storage:mount", self.client.mount_storage(app, LOCALTIME_MOUNT))?;

        for storage in &plan.storages {
            let mount = format!(
                "{STORAGE_ROOT}/{app}/{}:{}",
                storage.host_dir, storage.container_dir
            );
            step(format!("Mounting {mount}"));
            tolerate("storage:mount", self.client.mount_storage(app, &mount))?;
        }

        if !plan.domains.is_empty() {
            let existing = self.client.domains(app)?;
            for domain in &plan.domains {
                if domain_present(&existing, domain) {
                    info!(domain, "domain already added");
                    continue;
                }
                step(format!("Adding domain {domain}"));
                self.client.add_domain(app, domain)?;
            }
        }

        if plan.letsencrypt {
            step("Issuing TLS certificate");
            self.client.enable_tls(app)?;
        }

        for redirect in &plan.redirects {
            step(format!("Redirecting {} to {}", redirect.from, redirect.to));
            tolerate(
                "redirect:set",
                self.client.set_redirect(app, &redirect.from, &redirect.to),
            )?;
        }

        for (kind, names) in &plan.services {
            for name in names {
                step(format!("Linking {kind} service {name}"));
                tolerate("service create", self.client.create_service(*kind, name))?;
                tolerate("service link", self.client.link_service(*kind, name, app))?;
            }
        }

        self.hooks.run(Hook::Postinstall, target)?;

        println!("=====> {app} installed on {}", target.host);
        Ok(plan)
    }
}

fn step(message: impl AsRef<str>) {
    println!("-----> {}", message.as_ref());
}

/// Swallows a rejection from Dokku, which is how it reports resources that
/// already exist. Transport failures still propagate.
fn tolerate(operation: &str, result: Result<(), RemoteError>) -> Result<(), RemoteError> {
    match result {
        Err(e) if e.is_command_failure() => {
            warn!(operation, "continuing past rejected command: {e}");
            Ok(())
        }
        other => other,
    }
}

/// Prefix match against the app's current domains. `foo.com` counts as
/// present when `foo.com.au` is.
pub fn domain_present(existing: &[String], domain: &str) -> bool {
    existing.iter().any(|current| current.starts_with(domain))
}
