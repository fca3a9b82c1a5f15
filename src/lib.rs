pub mod clay;
pub mod config;
pub mod error;
pub mod exceptions;
pub mod fpros;
pub mod html;
pub mod http_client;
pub mod identity_index;
pub mod ingest;
pub mod ktc;
pub mod name_canon;
pub mod player;
pub mod position;
pub mod resolver;
pub mod roster;
pub mod sleeper_proj;
pub mod sleeper_weekly;
pub mod store;
