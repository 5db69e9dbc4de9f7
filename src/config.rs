//! Broker configuration loaded from TOML.
//!
//! ```toml
//! signing_secret = "change-me"
//! quick_connect_url = "https://app.example.com/quick-connect"
//! cleanup_interval_secs = 1800
//!
//! [expiry]
//! request_ttl_secs = 300
//! grace_secs = 600
//!
//! [providers.acme]
//! name = "Acme"
//! client_id = "broker"
//! client_secret = "secret"
//! issuer_url = "https://idp.example.com"
//! redirect_url = "https://app.example.com/auth/providers/callback"
//! ```

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, ScopeSet, Secret},
	error::ConfigError,
	provider::ClientAuthMethod,
	requests::ExpiryPolicy,
};

const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 30 * 60;

/// Top-level broker settings.
#[derive(Clone, Debug, Deserialize)]
pub struct BrokerConfig {
	/// Key used to sign user tokens.
	pub signing_secret: Secret,
	/// Configured OIDC providers keyed by id.
	#[serde(default)]
	pub providers: BTreeMap<ProviderId, ProviderConfig>,
	/// Page where a signed-in user types a quick-connect code; `?code=` is appended.
	#[serde(default)]
	pub quick_connect_url: Option<Url>,
	/// Request lifetime policy shared by both flows.
	#[serde(default)]
	pub expiry: ExpiryPolicy,
	/// Seconds between cleaner passes.
	#[serde(default = "default_cleanup_interval_secs")]
	pub cleanup_interval_secs: u64,
}
impl BrokerConfig {
	/// Creates a configuration with no providers and default timings.
	pub fn new(signing_secret: impl Into<String>) -> Self {
		Self {
			signing_secret: Secret::new(signing_secret),
			providers: BTreeMap::new(),
			quick_connect_url: None,
			expiry: ExpiryPolicy::default(),
			cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
		}
	}

	/// Parses and validates a TOML document.
	pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(source)?;

		config.validate()?;

		Ok(config)
	}

	/// Adds or replaces a provider.
	pub fn with_provider(mut self, id: ProviderId, provider: ProviderConfig) -> Self {
		self.providers.insert(id, provider);

		self
	}

	/// Sets the quick-connect landing page.
	pub fn with_quick_connect_url(mut self, url: Url) -> Self {
		self.quick_connect_url = Some(url);

		self
	}

	/// Overrides the request lifetime policy.
	pub fn with_expiry(mut self, expiry: ExpiryPolicy) -> Self {
		self.expiry = expiry;

		self
	}

	/// Overrides the cleaner interval.
	pub fn with_cleanup_interval_secs(mut self, secs: u64) -> Self {
		self.cleanup_interval_secs = secs;

		self
	}

	/// Interval between cleaner passes.
	pub fn cleanup_interval(&self) -> std::time::Duration {
		std::time::Duration::from_secs(self.cleanup_interval_secs)
	}

	/// Checks every setting the broker relies on.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.signing_secret.is_empty() {
			return Err(ConfigError::EmptySigningSecret);
		}
		if self.expiry.request_ttl_secs == 0 {
			return Err(ConfigError::ZeroDuration { field: "expiry.request_ttl_secs" });
		}
		if self.cleanup_interval_secs == 0 {
			return Err(ConfigError::ZeroDuration { field: "cleanup_interval_secs" });
		}

		for (id, provider) in &self.providers {
			provider.validate(id)?;
		}

		Ok(())
	}
}

/// Settings for one OIDC provider.
#[derive(Clone, Debug, Deserialize)]
pub struct ProviderConfig {
	/// Human-readable name shown in provider lists.
	pub name: String,
	/// OAuth2 client identifier; also the expected ID-token audience.
	pub client_id: String,
	/// OAuth2 client secret.
	pub client_secret: Secret,
	/// Issuer used for discovery and `iss` validation.
	pub issuer_url: Url,
	/// Callback URL registered with the provider.
	pub redirect_url: Url,
	/// Requested scopes; must include `openid`.
	#[serde(default = "default_scopes")]
	pub scopes: Vec<String>,
	/// Token endpoint client authentication.
	#[serde(default)]
	pub client_auth: ClientAuthMethod,
}
impl ProviderConfig {
	/// Creates a provider entry requesting `openid profile email`.
	pub fn new(
		name: impl Into<String>,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		issuer_url: Url,
		redirect_url: Url,
	) -> Self {
		Self {
			name: name.into(),
			client_id: client_id.into(),
			client_secret: Secret::new(client_secret),
			issuer_url,
			redirect_url,
			scopes: default_scopes(),
			client_auth: ClientAuthMethod::default(),
		}
	}

	/// Overrides the client authentication method.
	pub fn with_client_auth(mut self, method: ClientAuthMethod) -> Self {
		self.client_auth = method;

		self
	}

	/// Normalizes the configured scopes.
	pub fn scope_set(&self) -> Result<ScopeSet, ConfigError> {
		Ok(ScopeSet::new(self.scopes.iter().cloned())?)
	}

	fn validate(&self, id: &ProviderId) -> Result<(), ConfigError> {
		let missing = |field: &'static str| ConfigError::MissingField { provider: id.to_string(), field };

		if self.name.trim().is_empty() {
			return Err(missing("name"));
		}
		if self.client_id.trim().is_empty() {
			return Err(missing("client_id"));
		}
		if !self.scope_set()?.contains("openid") {
			return Err(ConfigError::MissingOpenIdScope { provider: id.to_string() });
		}

		Ok(())
	}
}

fn default_scopes() -> Vec<String> {
	["openid", "profile", "email"].into_iter().map(String::from).collect()
}

fn default_cleanup_interval_secs() -> u64 {
	DEFAULT_CLEANUP_INTERVAL_SECS
}
