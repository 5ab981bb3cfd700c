// typoguard: lookalike domain discovery
// Generates typo, homograph and combosquat variants of an authentic domain,
// confirms which are registered via two independent resolvers and records
// them as blacklist entries.

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod core;
pub mod dns;
pub mod domain;
pub mod error;
pub mod generators;
pub mod rate_limit;
pub mod retry;
pub mod store;
pub mod validation;
pub mod verify;
pub mod writer;
