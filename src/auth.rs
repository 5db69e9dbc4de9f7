//! Identifiers, redacted secrets, scope sets, and the random material both login flows hand out.

pub mod generate;
pub mod id;
pub mod scope;
pub mod secret;

pub use generate::*;
pub use id::*;
pub use scope::*;
pub use secret::*;
