//! # VMS CLI
//!
//! Subcommands of the `vms` binary.

pub mod commands;
