//! Bundler for programmable-unit Lua scripts
//!
//! Sources declare their dependencies and timers with `--@` directives. A build discovers every
//! source under a directory, orders the files reachable from the main file, and packs them into
//! a JSON handler table the game runtime loads as a single module.

pub mod compiler;
pub mod config;
pub mod dependency_tree;
pub mod dirs;
pub mod environment;
pub mod error;
pub mod minifier;
pub mod orchestrator;
pub mod output_module;
pub mod proxies;
pub mod revision;
pub mod source_file;
pub mod source_repository;
pub mod types;
