//! Infrastructure layer: audit logs, remote CRM client, stores, scheduled
//! tasks and their runner, configuration.

pub mod audit;
pub mod config;
pub mod remote;
pub mod runner;
pub mod store;
pub mod tasks;

#[cfg(test)]
mod testing;
