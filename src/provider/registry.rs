//! Configured providers with lazy, single-flight initialization.

// std
use std::cmp::Ordering;
// crates.io
use jsonwebtoken::jwk::JwkSet;
// self
use crate::{
	_prelude::*,
	auth::{PkcePair, ProviderId, RequestId, ScopeSet, Secret},
	clock::{Clock, SystemClock},
	config::ProviderConfig,
	error::{ConfigError, ProviderError, ProviderStage},
	http::{ProviderHttpClient, ReqwestHttpClient},
	oauth::CodeExchange,
	provider::{ProviderClaims, ProviderDescriptor, discover, fetch_keys, verify_id_token},
};

/// Provider entry as listed to end users.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSummary {
	/// Provider identifier.
	pub id: ProviderId,
	/// Configured display name.
	pub display_name: String,
}

/// Initialization state of one provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderStatus {
	/// Never initialized.
	Uninitialized,
	/// Discovery succeeded; the provider can be used.
	Ready,
	/// The last initialization attempt failed; the next access retries.
	Failed {
		/// When the attempt failed.
		at: OffsetDateTime,
		/// Rendered failure.
		reason: String,
	},
}

struct ReadyProvider<C>
where
	C: ?Sized + ProviderHttpClient,
{
	descriptor: ProviderDescriptor,
	exchange: CodeExchange<C>,
	client_id: String,
	keys: RwLock<Arc<JwkSet>>,
}

enum ProviderState<C>
where
	C: ?Sized + ProviderHttpClient,
{
	Uninitialized,
	Ready(Arc<ReadyProvider<C>>),
	Failed { at: OffsetDateTime, reason: String },
}

struct ProviderSlot<C>
where
	C: ?Sized + ProviderHttpClient,
{
	config: ProviderConfig,
	scopes: ScopeSet,
	state: AsyncMutex<ProviderState<C>>,
}

/// Registry of configured OIDC providers.
///
/// Each provider is discovered on first use. Initialization runs under a per-provider async
/// mutex so concurrent callers share one attempt, and a failed attempt is recorded but retried
/// on the next access.
pub struct ProviderRegistry<C = ReqwestHttpClient>
where
	C: ?Sized + ProviderHttpClient,
{
	providers: BTreeMap<ProviderId, ProviderSlot<C>>,
	http_client: Arc<C>,
	clock: Arc<dyn Clock>,
}
impl<C> ProviderRegistry<C>
where
	C: ?Sized + ProviderHttpClient,
{
	/// Registers every configured provider without contacting any of them.
	pub fn new(
		providers: &BTreeMap<ProviderId, ProviderConfig>,
		http_client: Arc<C>,
	) -> Result<Self, ConfigError> {
		let providers: BTreeMap<_, _> = providers
			.iter()
			.map(|(id, config)| -> Result<_, ConfigError> {
				let slot = ProviderSlot {
					config: config.clone(),
					scopes: config.scope_set()?,
					state: AsyncMutex::new(ProviderState::Uninitialized),
				};

				Ok((id.clone(), slot))
			})
			.collect::<Result<_, _>>()?;

		Ok(Self { providers, http_client, clock: Arc::new(SystemClock) })
	}

	/// Replaces the time source stamped on failed initializations.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Lists providers naturally sorted by display name, then id.
	pub fn list(&self) -> Vec<ProviderSummary> {
		let mut summaries = self
			.providers
			.iter()
			.map(|(id, slot)| ProviderSummary {
				id: id.clone(),
				display_name: slot.config.name.clone(),
			})
			.collect::<Vec<_>>();

		summaries.sort_by(|a, b| {
			natural_cmp(&a.display_name, &b.display_name).then_with(|| natural_cmp(&a.id, &b.id))
		});

		summaries
	}

	/// Resolves a caller-supplied provider id.
	pub fn provider_id(&self, id: &str) -> Result<&ProviderId> {
		self.slot(id).map(|(id, _)| id)
	}

	/// Reports the initialization state of a provider.
	pub async fn status(&self, id: &str) -> Result<ProviderStatus> {
		let (_, slot) = self.slot(id)?;
		let state = slot.state.lock().await;

		Ok(match &*state {
			ProviderState::Uninitialized => ProviderStatus::Uninitialized,
			ProviderState::Ready(_) => ProviderStatus::Ready,
			ProviderState::Failed { at, reason } =>
				ProviderStatus::Failed { at: *at, reason: reason.clone() },
		})
	}

	/// Initializes the provider unless it is already ready.
	pub async fn ensure_ready(&self, id: &str) -> Result<()> {
		self.ready(id).await.map(|_| ())
	}

	/// Builds the authorization URL for a new request.
	pub async fn authorize_url(&self, id: &str, state: &RequestId, pkce: &PkcePair) -> Result<Url> {
		let (_, ready) = self.ready(id).await?;

		Ok(ready.exchange.authorize_url(state, pkce))
	}

	/// Exchanges an authorization code and returns the verified identity claims.
	///
	/// An ID token signed by an unknown key triggers one key-set refresh before failing.
	pub async fn claim(
		&self,
		id: &str,
		code: &Secret,
		pkce_verifier: &Secret,
	) -> Result<ProviderClaims> {
		let (id, ready) = self.ready(id).await?;
		let wrap = |e| Error::provider(id, ProviderStage::Claim, e);
		let raw = ready.exchange.exchange(code, pkce_verifier).await.map_err(wrap)?;

		self.verify(&ready, &raw).await.map_err(wrap)
	}

	fn slot(&self, id: &str) -> Result<(&ProviderId, &ProviderSlot<C>)> {
		self.providers
			.get_key_value(id)
			.ok_or_else(|| Error::ProviderNotFound { provider: id.to_owned() })
	}

	async fn ready(&self, id: &str) -> Result<(&ProviderId, Arc<ReadyProvider<C>>)> {
		let (id, slot) = self.slot(id)?;
		let mut state = slot.state.lock().await;

		if let ProviderState::Ready(ready) = &*state {
			return Ok((id, Arc::clone(ready)));
		}

		match self.initialize(id, slot).await {
			Ok(ready) => {
				let ready = Arc::new(ready);

				*state = ProviderState::Ready(Arc::clone(&ready));

				#[cfg(feature = "tracing")]
				tracing::info!(provider = %id, "provider initialized");

				Ok((id, ready))
			},
			Err(e) => {
				#[cfg(feature = "tracing")]
				tracing::warn!(provider = %id, error = %e, "provider initialization failed");

				*state = ProviderState::Failed { at: self.clock.now(), reason: e.to_string() };

				Err(Error::provider(id, ProviderStage::Initialize, e))
			},
		}
	}

	async fn initialize(
		&self,
		id: &ProviderId,
		slot: &ProviderSlot<C>,
	) -> Result<ReadyProvider<C>, ProviderError> {
		let config = &slot.config;
		let descriptor =
			discover(&*self.http_client, id, &config.issuer_url, config.client_auth).await?;
		let keys = fetch_keys(&*self.http_client, &descriptor).await?;
		let exchange = CodeExchange::from_descriptor(
			&descriptor,
			config,
			slot.scopes.clone(),
			Arc::clone(&self.http_client),
		)?;

		Ok(ReadyProvider {
			descriptor,
			exchange,
			client_id: config.client_id.clone(),
			keys: RwLock::new(Arc::new(keys)),
		})
	}

	async fn verify(
		&self,
		ready: &ReadyProvider<C>,
		raw: &str,
	) -> Result<ProviderClaims, ProviderError> {
		let keys = ready.keys.read().clone();

		match verify_id_token(raw, &keys, &ready.descriptor, &ready.client_id) {
			Err(ProviderError::UnknownSigningKey { .. }) => {
				let refreshed = Arc::new(fetch_keys(&*self.http_client, &ready.descriptor).await?);

				*ready.keys.write() = Arc::clone(&refreshed);

				verify_id_token(raw, &refreshed, &ready.descriptor, &ready.client_id)
			},
			other => other,
		}
	}
}
impl<C> Debug for ProviderRegistry<C>
where
	C: ?Sized + ProviderHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProviderRegistry")
			.field("providers", &self.providers.keys().collect::<Vec<_>>())
			.finish()
	}
}

/// Case-insensitive ordering where digit runs compare by numeric value.
fn natural_cmp(a: &str, b: &str) -> Ordering {
	let mut left = a.chars().peekable();
	let mut right = b.chars().peekable();

	loop {
		let ordering = match (left.peek().copied(), right.peek().copied()) {
			(None, None) => return Ordering::Equal,
			(None, Some(_)) => return Ordering::Less,
			(Some(_), None) => return Ordering::Greater,
			(Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
				let l = take_digits(&mut left);
				let r = take_digits(&mut right);

				compare_digit_runs(&l, &r)
			},
			(Some(l), Some(r)) => {
				left.next();
				right.next();

				l.to_lowercase().cmp(r.to_lowercase())
			},
		};

		if ordering != Ordering::Equal {
			return ordering;
		}
	}
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars>) -> String {
	let mut run = String::new();

	while let Some(c) = chars.next_if(char::is_ascii_digit) {
		run.push(c);
	}

	run
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
	let a = a.trim_start_matches('0');
	let b = b.trim_start_matches('0');

	a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
