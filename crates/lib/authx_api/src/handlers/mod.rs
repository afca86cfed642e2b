//! Request handlers.

pub mod exchange;
pub mod session;
pub mod token;
