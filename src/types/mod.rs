// Shared type definitions
// Each submodule defines plain data used across the crate.

pub mod ai;
pub mod errors;
pub mod events;
pub mod session;
pub mod settings;
pub mod tab;
