//! OIDC provider metadata, discovery, ID-token claims, and the lazily initialized registry.
//!
//! `descriptor` holds validated provider metadata (HTTPS-only endpoints, accepted ID-token
//! algorithms, client authentication preference). `discovery` builds descriptors from the
//! provider's `.well-known/openid-configuration`. `claims` verifies ID tokens against the
//! provider key set. `registry` owns every configured provider and initializes each one on
//! first use.

pub mod claims;
pub mod descriptor;
pub mod discovery;
pub mod registry;

pub use claims::*;
pub use descriptor::*;
pub use discovery::*;
pub use registry::*;
