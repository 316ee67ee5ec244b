//! `gmail-search` — search a Gmail mailbox and turn every match into a clean,
//! serializable record.
//!
//! The library covers paginated search, raw message retrieval, MIME and
//! charset decoding, HTML clean-up with quoted-reply removal and Markdown
//! rendering. The binary wires it to environment configuration and writes the
//! results as JSON.

pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod providers;
pub mod services;
pub mod store;
