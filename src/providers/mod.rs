pub mod auth;
pub mod gmail;
pub mod provider;
pub mod search;
