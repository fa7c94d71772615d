//! Command implementations for the linalign CLI

pub mod align;
