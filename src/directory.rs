//! Data-access contract for users and provider identity links.
//!
//! The broker never persists users itself; it sequences calls into a [`UserDirectory`]
//! supplied by the host application. "Not found" is always `Ok(None)`, never an error.

pub mod memory;

pub use memory::MemoryDirectory;

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, UserId},
};

/// Boxed future returned by [`UserDirectory`] methods.
pub type DirectoryFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, DirectoryError>> + 'a + Send>>;

/// Storage backend contract for users and their provider identities.
pub trait UserDirectory
where
	Self: Send + Sync,
{
	/// Fetches a user by id.
	fn user_by_id<'a>(&'a self, id: &'a UserId) -> DirectoryFuture<'a, Option<User>>;

	/// Fetches a user by email address.
	fn user_by_email<'a>(&'a self, email: &'a str) -> DirectoryFuture<'a, Option<User>>;

	/// Creates a user and returns the stored record.
	fn create_user(&self, user: NewUser) -> DirectoryFuture<'_, User>;

	/// Fetches the identity link for a provider subject.
	fn identity<'a>(
		&'a self,
		provider: &'a ProviderId,
		subject: &'a str,
	) -> DirectoryFuture<'a, Option<UserIdentity>>;

	/// Links a provider subject to an existing user.
	fn create_identity(&self, identity: NewIdentity) -> DirectoryFuture<'_, UserIdentity>;
}

/// Authorization role of a local user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	/// Regular account; assigned to users created from provider logins.
	#[default]
	User,
	/// Administrative account.
	Admin,
}

/// Local user record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
	/// Directory-assigned identifier.
	pub id: UserId,
	/// Primary email address.
	pub email: String,
	/// Name shown in the UI.
	pub display_name: String,
	/// Authorization role.
	pub role: Role,
	/// Creation instant.
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}

/// Input for [`UserDirectory::create_user`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewUser {
	/// Primary email address.
	pub email: String,
	/// Name shown in the UI.
	pub display_name: String,
	/// Authorization role.
	pub role: Role,
}

/// Stored association between a local user and a `(provider, subject)` pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
	/// Provider that asserted the subject.
	pub provider: ProviderId,
	/// Provider-scoped subject identifier (`sub`).
	pub subject: String,
	/// Linked local user.
	pub user_id: UserId,
	/// Creation instant.
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}

/// Input for [`UserDirectory::create_identity`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewIdentity {
	/// Provider that asserted the subject.
	pub provider: ProviderId,
	/// Provider-scoped subject identifier (`sub`).
	pub subject: String,
	/// Local user to link.
	pub user_id: UserId,
}

/// Error type produced by [`UserDirectory`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum DirectoryError {
	/// A unique constraint (email, identity) was violated.
	#[error("Directory conflict: {message}.")]
	Conflict {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;

	#[test]
	fn directory_error_converts_into_broker_error_with_source() {
		let directory_error = DirectoryError::Backend { message: "database unreachable".into() };
		let broker_error: Error = directory_error.clone().into();

		assert!(matches!(broker_error, Error::Directory(_)));
		assert_eq!(broker_error.to_string(), directory_error.to_string());
		assert!(StdError::source(&broker_error).is_none());
	}

	#[test]
	fn role_serializes_lowercase() {
		assert_eq!(
			serde_json::to_string(&Role::Admin).expect("Role should serialize to JSON."),
			"\"admin\""
		);
	}
}
