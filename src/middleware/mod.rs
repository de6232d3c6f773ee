// Middleware module
pub mod actor;

pub use actor::*;
