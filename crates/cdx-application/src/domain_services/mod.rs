//! Domain services with no provider dependencies.

pub mod classify;
pub mod coverage;
