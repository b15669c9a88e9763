pub mod action;
pub mod command;
pub mod config;
pub mod grading;
pub mod interactive;
pub mod serdable;
pub mod style;

pub use crate::config::Config;
