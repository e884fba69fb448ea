//! Terraform provider for the Plural console
//!
//! Resources and data sources talk to the console GraphQL API through [`client::ConsoleApi`].
//! Long-running console operations (deletions, service rollouts) are awaited with the
//! poll-until-condition waiter of the [`wait`] module, configured per call site in [`waiters`].

pub mod client;
pub mod cluster;
pub mod git_repository;
pub mod project;
pub mod service;
pub mod stack;
pub mod wait;
pub mod waiters;

mod provider;
mod utils;

pub use provider::{PluralProvider, ProviderConfig, ACCESS_TOKEN_ENV, CONSOLE_URL_ENV};
