//! Domain Services - Logic that spans several entities
//!
//! Pure functions over models: no I/O, no clocks except the `now`
//! values passed in.

pub mod reports;
pub mod roll_call;
pub mod screening;
pub mod validation;
