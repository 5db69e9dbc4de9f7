//! Signed bearer tokens issued once a login flow completes.

// crates.io
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
// self
use crate::{
	_prelude::*,
	auth::{Secret, UserId},
	directory::UserDirectory,
};

/// Token signing and verification failures.
#[derive(Debug, ThisError)]
pub enum SigningError {
	/// The user no longer exists in the directory.
	#[error("User `{user}` does not exist.")]
	UnknownUser {
		/// User the token was requested for.
		user: UserId,
	},
	/// Token could not be encoded.
	#[error("Token could not be signed.")]
	Encode(#[source] jsonwebtoken::errors::Error),
	/// Presented token failed verification.
	#[error("Token is invalid.")]
	InvalidToken(#[source] jsonwebtoken::errors::Error),
}

/// Claims carried by issued tokens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTokenClaims {
	/// Local user the token authenticates.
	#[serde(rename = "userId")]
	pub user_id: UserId,
	/// Issued-at, seconds since the Unix epoch.
	pub iat: i64,
}

/// HS256 signer for user tokens.
///
/// No `exp` claim is set; token lifetime is left to the issuing policy.
#[derive(Clone)]
pub struct TokenSigner {
	directory: Arc<dyn UserDirectory>,
	encoding: EncodingKey,
	decoding: DecodingKey,
}
impl TokenSigner {
	/// Creates a signer keyed with `secret`.
	pub fn new(secret: &Secret, directory: Arc<dyn UserDirectory>) -> Self {
		Self {
			directory,
			encoding: EncodingKey::from_secret(secret.expose().as_bytes()),
			decoding: DecodingKey::from_secret(secret.expose().as_bytes()),
		}
	}

	/// Issues a token for `user` after confirming the user still exists.
	pub async fn sign(&self, user: &UserId, now: OffsetDateTime) -> Result<Secret> {
		if self.directory.user_by_id(user).await?.is_none() {
			return Err(SigningError::UnknownUser { user: user.clone() }.into());
		}

		let claims = UserTokenClaims { user_id: user.clone(), iat: now.unix_timestamp() };
		let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
			.map_err(SigningError::Encode)?;

		Ok(Secret::new(token))
	}

	/// Verifies a token issued by [`sign`](Self::sign) and returns its claims.
	pub fn verify(&self, token: &str) -> Result<UserTokenClaims> {
		let mut validation = Validation::new(Algorithm::HS256);

		validation.validate_exp = false;
		validation.required_spec_claims.clear();

		let data = jsonwebtoken::decode::<UserTokenClaims>(token, &self.decoding, &validation)
			.map_err(SigningError::InvalidToken)?;

		Ok(data.claims)
	}
}
impl Debug for TokenSigner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TokenSigner(..)")
	}
}
