pub mod action;
pub mod config;
pub mod exec;
pub mod pipeline;
pub mod sheet;
pub mod status;
pub mod style;
pub mod template;
pub mod testing;

pub use crate::config::Config;
pub use crate::status::{DisplayStatus, Status};
