//! Maps verified provider claims onto local users.

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, UserId},
	directory::{NewIdentity, NewUser, Role, UserDirectory},
	provider::ProviderClaims,
};

/// Sequences directory lookups to turn provider claims into a local user id.
#[derive(Clone)]
pub struct UserResolver {
	directory: Arc<dyn UserDirectory>,
}
impl UserResolver {
	/// Creates a resolver over the provided directory.
	pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
		Self { directory }
	}

	/// Resolves (and if needed provisions) the local user for `claims`.
	///
	/// An existing identity link wins. Otherwise the user is matched by email or created with
	/// the `user` role, and the identity is linked before returning.
	pub async fn resolve(&self, provider: &ProviderId, claims: &ProviderClaims) -> Result<UserId> {
		if let Some(identity) = self.directory.identity(provider, &claims.subject).await? {
			return Ok(identity.user_id);
		}

		let user = match self.directory.user_by_email(&claims.email).await? {
			Some(user) => user,
			None =>
				self.directory
					.create_user(NewUser {
						email: claims.email.clone(),
						display_name: claims.preferred_display_name().to_owned(),
						role: Role::User,
					})
					.await?,
		};

		self.directory
			.create_identity(NewIdentity {
				provider: provider.clone(),
				subject: claims.subject.clone(),
				user_id: user.id.clone(),
			})
			.await?;

		#[cfg(feature = "tracing")]
		tracing::info!(provider = %provider, user = %user.id, "linked provider identity");

		Ok(user.id)
	}
}
impl Debug for UserResolver {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("UserResolver(..)")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::directory::{MemoryDirectory, User};

	fn claims(subject: &str, email: &str) -> ProviderClaims {
		ProviderClaims {
			subject: subject.into(),
			email: email.into(),
			name: Some("Ada Lovelace".into()),
			display_name: None,
			picture: None,
		}
	}

	fn acme() -> ProviderId {
		ProviderId::new("acme").expect("Provider fixture should be valid.")
	}

	#[tokio::test]
	async fn creates_user_and_identity_on_first_login() {
		let directory = MemoryDirectory::default();
		let resolver = UserResolver::new(Arc::new(directory.clone()));
		let user_id = resolver
			.resolve(&acme(), &claims("sub-1", "ada@example.com"))
			.await
			.expect("First login should provision a user.");
		let user = directory
			.user_by_id(&user_id)
			.await
			.expect("Directory lookup should succeed.")
			.expect("Provisioned user should exist.");

		assert_eq!(user.display_name, "Ada Lovelace");
		assert_eq!(user.role, Role::User);
		assert_eq!(directory.identity_count(), 1);

		let again = resolver
			.resolve(&acme(), &claims("sub-1", "ada@example.com"))
			.await
			.expect("Second login should reuse the identity.");

		assert_eq!(again, user_id);
		assert_eq!(directory.user_count(), 1);
	}

	#[tokio::test]
	async fn links_existing_user_by_email() {
		let directory = MemoryDirectory::default();
		let existing = User {
			id: UserId::new("u1").expect("User fixture should be valid."),
			email: "ada@example.com".into(),
			display_name: "Ada".into(),
			role: Role::Admin,
			created_at: OffsetDateTime::now_utc(),
		};

		directory.seed(existing.clone());

		let resolver = UserResolver::new(Arc::new(directory.clone()));
		let user_id = resolver
			.resolve(&acme(), &claims("sub-9", "ada@example.com"))
			.await
			.expect("Login should link the existing user.");

		assert_eq!(user_id, existing.id);
		assert_eq!(directory.user_count(), 1);
		assert_eq!(directory.identity_count(), 1);
	}
}
