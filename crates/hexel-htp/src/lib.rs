//! HTP protocol handling for hexel.

pub mod command;
pub mod engine;
pub mod error;

pub use command::{BookValue, Command, Request, parse_line};
pub use engine::HtpEngine;
pub use error::HtpError;
