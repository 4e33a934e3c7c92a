//! CLI subcommands

pub mod evaluate;
pub mod notify;
pub mod probe;
pub mod status;
