pub mod cache;
pub mod cmd;
pub mod config;
pub mod convert;
mod error;
pub mod executor;
pub mod logging;
pub mod metadata;
pub mod naming;
pub mod paths;
pub mod planner;
pub mod sidecar;
pub mod tools;

pub use error::{ConvertError, Result};
