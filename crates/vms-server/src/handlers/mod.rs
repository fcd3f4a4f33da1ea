//! Route handlers, one module per area

pub mod admin;
pub mod people;
pub mod safety;
pub mod visits;
