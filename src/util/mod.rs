//! Utility modules: timeout and cancellation guards, HTTP client setup.

pub mod http;
pub mod timeout;
