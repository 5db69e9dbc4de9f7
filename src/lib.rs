//! In-memory authentication request broker mediating OIDC provider logins and quick-connect
//! device pairing, issuing a signed user token once a flow is proven complete.

#![deny(clippy::all, unused_crate_dependencies)]
#![warn(missing_docs)]

#[cfg(feature = "axum")] pub mod api;
pub mod auth;
pub mod broker;
pub mod cleaner;
pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod requests;
pub mod resolver;
pub mod token;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "axum")] pub use axum;
pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tower as _};
