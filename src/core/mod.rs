//! Core implementation: path parsing, the zip entry codec, the resolver,
//! random-access readers and their host integrations

pub mod archive;
pub mod channel;
pub mod config;
pub mod error;
pub mod path;
pub mod provider;
pub mod registry;
pub mod vfs;
