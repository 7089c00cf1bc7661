//! Shared types for `rkv`: the wire protocol codec, error taxonomy, process
//! configuration, and the constants the rest of the workspace agrees on.

pub mod config;
pub mod error;
pub mod hash;
pub mod limits;
pub mod wire;

pub use config::Config;
pub use error::{ErrCode, Error, Result};
