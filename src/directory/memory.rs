//! Thread-safe in-memory [`UserDirectory`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, UserId, random_string},
	directory::{
		DirectoryError, DirectoryFuture, NewIdentity, NewUser, User, UserDirectory, UserIdentity,
	},
};

const USER_ID_LEN: usize = 24;

#[derive(Debug, Default)]
struct Tables {
	users: HashMap<UserId, User>,
	identities: HashMap<(ProviderId, String), UserIdentity>,
}

type DirectoryMap = Arc<RwLock<Tables>>;

/// Thread-safe directory backend that keeps users in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryDirectory(DirectoryMap);
impl MemoryDirectory {
	/// Inserts a fully formed user, replacing any record with the same id.
	pub fn seed(&self, user: User) {
		self.0.write().users.insert(user.id.clone(), user);
	}

	/// Number of stored users.
	pub fn user_count(&self) -> usize {
		self.0.read().users.len()
	}

	/// Number of stored identity links.
	pub fn identity_count(&self) -> usize {
		self.0.read().identities.len()
	}

	fn create_user_now(map: DirectoryMap, user: NewUser) -> Result<User, DirectoryError> {
		let mut guard = map.write();

		if guard.users.values().any(|existing| existing.email.eq_ignore_ascii_case(&user.email)) {
			return Err(DirectoryError::Conflict {
				message: format!("email `{}` is already registered", user.email),
			});
		}

		let id = UserId::new(random_string(USER_ID_LEN))
			.map_err(|e| DirectoryError::Backend { message: e.to_string() })?;
		let record = User {
			id: id.clone(),
			email: user.email,
			display_name: user.display_name,
			role: user.role,
			created_at: OffsetDateTime::now_utc(),
		};

		guard.users.insert(id, record.clone());

		Ok(record)
	}

	fn create_identity_now(
		map: DirectoryMap,
		identity: NewIdentity,
	) -> Result<UserIdentity, DirectoryError> {
		let mut guard = map.write();

		if !guard.users.contains_key(&identity.user_id) {
			return Err(DirectoryError::Conflict {
				message: format!("user `{}` does not exist", identity.user_id),
			});
		}

		let key = (identity.provider.clone(), identity.subject.clone());

		if guard.identities.contains_key(&key) {
			return Err(DirectoryError::Conflict {
				message: format!("identity `{}` is already linked", identity.subject),
			});
		}

		let record = UserIdentity {
			provider: identity.provider,
			subject: identity.subject,
			user_id: identity.user_id,
			created_at: OffsetDateTime::now_utc(),
		};

		guard.identities.insert(key, record.clone());

		Ok(record)
	}
}
impl UserDirectory for MemoryDirectory {
	fn user_by_id<'a>(&'a self, id: &'a UserId) -> DirectoryFuture<'a, Option<User>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().users.get(id).cloned()) })
	}

	fn user_by_email<'a>(&'a self, email: &'a str) -> DirectoryFuture<'a, Option<User>> {
		let map = self.0.clone();

		Box::pin(async move {
			Ok(map.read().users.values().find(|user| user.email.eq_ignore_ascii_case(email)).cloned())
		})
	}

	fn create_user(&self, user: NewUser) -> DirectoryFuture<'_, User> {
		let map = self.0.clone();

		Box::pin(async move { Self::create_user_now(map, user) })
	}

	fn identity<'a>(
		&'a self,
		provider: &'a ProviderId,
		subject: &'a str,
	) -> DirectoryFuture<'a, Option<UserIdentity>> {
		let map = self.0.clone();
		let key = (provider.to_owned(), subject.to_owned());

		Box::pin(async move { Ok(map.read().identities.get(&key).cloned()) })
	}

	fn create_identity(&self, identity: NewIdentity) -> DirectoryFuture<'_, UserIdentity> {
		let map = self.0.clone();

		Box::pin(async move { Self::create_identity_now(map, identity) })
	}
}
