//! Drive a remote Dokku host from a git checkout: resolve the host and app
//! from git remotes, forward commands over ssh, and provision apps from an
//! environment file.

pub mod args;
pub mod envfile;
pub mod error;
pub mod git;
pub mod hooks;
pub mod invoke;
pub mod plan;
pub mod provision;
pub mod remote;
pub mod resolve;
pub mod ssh_config;
