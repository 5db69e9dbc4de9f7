//! The broker facade owning both request stores and every collaborator.

pub mod provider_flow;
pub mod quick_connect;

pub use provider_flow::*;
pub use quick_connect::*;

// crates.io
use reqwest::redirect::Policy;
// self
use crate::{
	_prelude::*,
	cleaner::{Cleaner, CleanerHandle, Sweep, SweepReport},
	clock::{Clock, SystemClock},
	config::BrokerConfig,
	directory::{User, UserDirectory},
	http::{ProviderHttpClient, ReqwestHttpClient},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::ProviderRegistry,
	requests::{ExpiryPolicy, ProviderRequestStore, QuickConnectStore},
	resolver::UserResolver,
	token::TokenSigner,
};

/// Broker specialized for the crate's default reqwest transport.
pub type ReqwestBroker = Broker<ReqwestHttpClient>;

/// Mediates provider logins and quick-connect pairing.
///
/// The broker is created once at startup and shared behind an [`Arc`]. Both stores live inside
/// it, provider I/O goes through its [`ProviderRegistry`], users are resolved through the
/// injected [`UserDirectory`], and every expiry decision reads the broker's [`Clock`].
pub struct Broker<C = ReqwestHttpClient>
where
	C: ?Sized + ProviderHttpClient,
{
	registry: ProviderRegistry<C>,
	directory: Arc<dyn UserDirectory>,
	resolver: UserResolver,
	signer: TokenSigner,
	provider_requests: ProviderRequestStore,
	quick_connect_requests: QuickConnectStore,
	clock: Arc<dyn Clock>,
	expiry: ExpiryPolicy,
	quick_connect_url: Option<Url>,
	cleanup_interval: std::time::Duration,
}
impl<C> Broker<C>
where
	C: ?Sized + ProviderHttpClient,
{
	/// Creates a broker that reuses the caller-provided transport.
	pub fn with_http_client(
		config: &BrokerConfig,
		directory: Arc<dyn UserDirectory>,
		http_client: impl Into<Arc<C>>,
	) -> Result<Self> {
		config.validate()?;

		let registry = ProviderRegistry::new(&config.providers, http_client.into())?;

		Ok(Self {
			registry,
			resolver: UserResolver::new(Arc::clone(&directory)),
			signer: TokenSigner::new(&config.signing_secret, Arc::clone(&directory)),
			directory,
			provider_requests: ProviderRequestStore::default(),
			quick_connect_requests: QuickConnectStore::default(),
			clock: Arc::new(SystemClock),
			expiry: config.expiry,
			quick_connect_url: config.quick_connect_url.clone(),
			cleanup_interval: config.cleanup_interval(),
		})
	}

	/// Replaces the time source used for every expiry decision.
	pub fn with_clock(self, clock: impl Clock) -> Self {
		let clock: Arc<dyn Clock> = Arc::new(clock);

		Self { registry: self.registry.with_clock(Arc::clone(&clock)), clock, ..self }
	}

	/// Provider registry backing the provider flow.
	pub fn registry(&self) -> &ProviderRegistry<C> {
		&self.registry
	}

	/// Signer issuing and verifying user tokens.
	pub fn signer(&self) -> &TokenSigner {
		&self.signer
	}

	/// Resolves the user behind a bearer token issued by this broker.
	pub async fn authenticate(&self, token: &str) -> Result<User> {
		let claims = self.signer.verify(token).map_err(|_| Error::Unauthorized)?;

		self.directory.user_by_id(&claims.user_id).await?.ok_or(Error::Unauthorized)
	}

	/// Removes every request past its purge deadline from both stores.
	pub fn sweep(&self) -> SweepReport {
		let _span = FlowSpan::sweep().entered();
		let now = self.clock.now();
		let report = SweepReport {
			provider_requests: self.provider_requests.purge(now),
			quick_connect_requests: self.quick_connect_requests.purge(now),
		};

		obs::record_sweep(&report);

		report
	}

	/// Starts the periodic cleaner for this broker.
	pub fn spawn_cleaner(self: &Arc<Self>) -> CleanerHandle {
		Cleaner::spawn(Arc::clone(self), self.cleanup_interval)
	}

	fn now(&self) -> OffsetDateTime {
		self.clock.now()
	}
}
impl Broker<ReqwestHttpClient> {
	/// Creates a broker with its own reqwest transport.
	///
	/// Redirects are not followed; discovery, key-set, and token endpoints answer directly.
	pub fn new(config: &BrokerConfig, directory: Arc<dyn UserDirectory>) -> Result<Self> {
		let client = ReqwestClient::builder()
			.redirect(Policy::none())
			.build()
			.map_err(crate::error::ConfigError::from)?;

		Self::with_http_client(config, directory, ReqwestHttpClient::with_client(client))
	}
}
impl<C> Sweep for Broker<C>
where
	C: ?Sized + ProviderHttpClient,
{
	fn sweep(&self) -> SweepReport {
		Broker::sweep(self)
	}
}
impl<C> Debug for Broker<C>
where
	C: ?Sized + ProviderHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("registry", &self.registry)
			.field("provider_requests", &self.provider_requests.len())
			.field("quick_connect_requests", &self.quick_connect_requests.len())
			.field("expiry", &self.expiry)
			.finish()
	}
}

fn record_outcome<T>(kind: FlowKind, result: &Result<T>) {
	match result {
		Ok(_) => obs::record_flow_outcome(kind, FlowOutcome::Success),
		Err(_e) => {
			#[cfg(feature = "tracing")]
			tracing::debug!(flow = kind.as_str(), code = _e.code(), error = %_e, "broker operation failed");

			obs::record_flow_outcome(kind, FlowOutcome::Failure)
		},
	}
}
