//! Simulated ethical-hacking labs.
//!
//! Every lab is a fake console: free-text commands are matched against a
//! static rule table and answered with canned output. Nothing is executed and
//! nothing touches the network except the progress sync with our own service.
//!
//! - [`console`]: tokenizer, rule tables and the interactive shell
//! - [`missions`]: ordered step definitions and the completion state machine
//! - [`labs`]: the lab registry and each lab's vocabulary and missions
//! - [`progress`]: local cache, unlock gate and best-effort remote sync
//! - [`session`]: one open lab, wiring the pieces above together
//! - [`api`], [`db`]: the remote progress service

pub mod api;
pub mod client;
pub mod config;
pub mod console;
pub mod db;
pub mod labs;
pub mod missions;
pub mod models;
pub mod progress;
pub mod session;
