//! Transport primitives for provider discovery, key retrieval, and code exchanges.
//!
//! [`ProviderHttpClient`] is the broker's only dependency on an HTTP stack. Every provider call
//! (discovery document, JWKS, token endpoint) runs through a short-lived handle carrying a
//! [`ResponseMetadataSlot`], so failures are classified with the status and retry hint of the
//! response that caused them.

// std
use std::ops::Deref;
// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{Method, Request, header::ACCEPT},
};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, ProviderError, TransientError, TransportError},
};

/// Abstraction over HTTP transports used to talk to OIDC providers.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by every
/// provider in the registry, and the handles they return must own whatever state their request
/// futures need so those futures stay `Send`.
pub trait ProviderHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds a handle that records response metadata in `slot`.
	///
	/// Handles call [`ResponseMetadataSlot::take`] before dispatching and
	/// [`ResponseMetadataSlot::store`] once a status line is known.
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Metadata from the most recent HTTP response, used for error classification.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code, if a response arrived.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Reqwest-backed [`ProviderHttpClient`].
///
/// Token endpoints answer directly, so custom clients should disable redirect following.
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl ProviderHttpClient for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		InstrumentedHandle(Arc::new(InstrumentedHttpClient { client: self.0.clone(), slot }))
	}
}

struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

/// Handle returned by [`ReqwestHttpClient`] that records response metadata.
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let response = client
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let retry_after = parse_retry_after(&headers);

			client.slot.store(ResponseMetadata { status: Some(status.as_u16()), retry_after });

			let mut converted =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

/// Fetches `url` with `GET` and decodes a JSON body, locating parse failures by path.
pub(crate) async fn fetch_json<C, T>(http: &C, url: &Url) -> Result<T, ProviderError>
where
	C: ?Sized + ProviderHttpClient,
	T: DeserializeOwned,
{
	let slot = ResponseMetadataSlot::default();
	let handle = http.with_metadata(slot.clone());
	let request = Request::builder()
		.method(Method::GET)
		.uri(url.as_str())
		.header(ACCEPT, "application/json")
		.body(Vec::new())
		.map_err(ConfigError::from)?;
	let response =
		handle.call(request).await.map_err(|e| map_transport_error(slot.take().as_ref(), e))?;
	let status = response.status();

	if !status.is_success() {
		let meta = slot.take();

		return Err(TransientError::Endpoint {
			message: format!("GET {url} returned HTTP {}", status.as_u16()),
			status: Some(status.as_u16()),
			retry_after: meta.and_then(|meta| meta.retry_after),
		}
		.into());
	}

	let mut de = serde_json::Deserializer::from_slice(response.body());

	serde_path_to_error::deserialize(&mut de).map_err(|source| {
		TransientError::ResponseParse { source, status: Some(status.as_u16()) }.into()
	})
}

/// Classifies an [`HttpClientError`] into the provider error taxonomy.
pub(crate) fn map_transport_error<E>(
	meta: Option<&ResponseMetadata>,
	err: HttpClientError<E>,
) -> ProviderError
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Reqwest(inner) => TransportError::network(*inner).into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransientError::Endpoint {
			message: format!("HTTP client error: {message}"),
			status: meta.and_then(|meta| meta.status),
			retry_after: meta.and_then(|meta| meta.retry_after),
		}
		.into(),
		_ => TransientError::Endpoint {
			message: "HTTP client error".into(),
			status: meta.and_then(|meta| meta.status),
			retry_after: meta.and_then(|meta| meta.retry_after),
		}
		.into(),
	}
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// crates.io
	use reqwest::header::HeaderValue;
	// self
	use super::*;

	#[test]
	fn retry_after_accepts_delta_seconds() {
		let mut headers = HeaderMap::new();

		headers.insert(RETRY_AFTER, HeaderValue::from_static("120"));

		assert_eq!(parse_retry_after(&headers), Some(Duration::seconds(120)));
		assert_eq!(parse_retry_after(&HeaderMap::new()), None);
	}

	#[test]
	fn metadata_slot_is_consumed_on_take() {
		let slot = ResponseMetadataSlot::default();

		slot.store(ResponseMetadata { status: Some(503), retry_after: None });

		assert_eq!(slot.take().and_then(|meta| meta.status), Some(503));
		assert!(slot.take().is_none());
	}

	#[test]
	fn other_client_errors_keep_the_status() {
		let meta = ResponseMetadata { status: Some(502), retry_after: None };
		let err = map_transport_error::<std::io::Error>(
			Some(&meta),
			HttpClientError::Other("boom".into()),
		);

		assert!(matches!(
			err,
			ProviderError::Transient(TransientError::Endpoint { status: Some(502), .. })
		));
	}
}
