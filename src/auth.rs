//! Credential model: redacted token secrets, credential names, and the access/refresh pair.

pub mod token;

pub use token::{pair::*, secret::*};
