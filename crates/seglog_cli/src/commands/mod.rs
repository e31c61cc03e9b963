//! CLI command implementations.

pub mod inspect;
pub mod replay;
pub mod verify;
pub mod write;
