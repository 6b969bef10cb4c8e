//! Utility functions and helpers.

pub mod fs;
pub mod http;
pub mod url;

pub use self::url::{basename, is_http, resolve, same_host};
