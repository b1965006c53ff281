//! Credential resolution and request signing.
//!
//! Credentials come from an ordered list of sources, highest priority first:
//! explicit builder arguments, environment variables, the local config file,
//! and finally built-in defaults (base URL only). Each source yields a
//! partial [`CredentialFragment`]; fragments merge field by field with
//! "first non-empty wins" semantics.
//!
//! Nothing in this module logs or formats secret values. Both
//! [`Credentials`] and [`CredentialFragment`] redact them in `Debug`.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::Sha256;
use tracing::debug;

use crate::DEFAULT_BASE_URL;
use crate::config::ConfigFile;
use crate::error::{ConfigProblem, Error, Result};

pub const ENV_API_KEY: &str = "AINATIVE_API_KEY";
pub const ENV_API_SECRET: &str = "AINATIVE_API_SECRET";
pub const ENV_ORG_ID: &str = "AINATIVE_ORG_ID";
pub const ENV_BASE_URL: &str = "AINATIVE_BASE_URL";

type HmacSha256 = Hmac<Sha256>;

/// A partial set of credential fields produced by one source.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialFragment {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub organization_id: Option<String>,
    pub base_url: Option<String>,
}

impl CredentialFragment {
    /// Read the `AINATIVE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a fragment from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            api_key: lookup(ENV_API_KEY),
            api_secret: lookup(ENV_API_SECRET),
            organization_id: lookup(ENV_ORG_ID),
            base_url: lookup(ENV_BASE_URL),
        }
    }

    /// The lowest-priority source: only the public base URL.
    pub fn defaults() -> Self {
        Self {
            base_url: Some(DEFAULT_BASE_URL.to_string()),
            ..Default::default()
        }
    }

    /// Fill every field still empty in `self` from `lower`.
    pub fn or(self, lower: CredentialFragment) -> Self {
        Self {
            api_key: non_empty(self.api_key).or_else(|| non_empty(lower.api_key)),
            api_secret: non_empty(self.api_secret).or_else(|| non_empty(lower.api_secret)),
            organization_id: non_empty(self.organization_id)
                .or_else(|| non_empty(lower.organization_id)),
            base_url: non_empty(self.base_url).or_else(|| non_empty(lower.base_url)),
        }
    }
}

impl fmt::Debug for CredentialFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialFragment")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_secret", &self.api_secret.as_ref().map(|_| "<redacted>"))
            .field("organization_id", &self.organization_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A credential source: evaluated lazily, may fail (e.g. malformed file).
pub type CredentialSource = Box<dyn Fn() -> Result<CredentialFragment> + Send + Sync>;

/// The standard source chain: `explicit` → environment → config file → defaults.
pub fn default_sources(explicit: CredentialFragment) -> Vec<CredentialSource> {
    chain(
        explicit,
        Box::new(|| ConfigFile::load_default().map(|file| file.fragment())),
    )
}

/// The standard chain with the config file already loaded.
pub fn sources_with_file(explicit: CredentialFragment, file: &ConfigFile) -> Vec<CredentialSource> {
    let fragment = file.fragment();
    chain(explicit, Box::new(move || Ok(fragment.clone())))
}

fn chain(explicit: CredentialFragment, file: CredentialSource) -> Vec<CredentialSource> {
    vec![
        Box::new(move || Ok(explicit.clone())),
        Box::new(|| Ok(CredentialFragment::from_env())),
        file,
        Box::new(|| Ok(CredentialFragment::defaults())),
    ]
}

/// Resolved, immutable credentials for one client instance.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    api_secret: Option<String>,
    organization_id: Option<String>,
    base_url: Url,
}

impl Credentials {
    /// Build credentials directly from an API key and base URL.
    pub fn new(api_key: impl Into<String>, base_url: &str) -> Result<Self> {
        Self::from_fragment(CredentialFragment {
            api_key: Some(api_key.into()),
            base_url: Some(base_url.to_string()),
            ..Default::default()
        })
    }

    /// Evaluate `sources` in priority order and merge the results.
    pub fn resolve(sources: &[CredentialSource]) -> Result<Self> {
        let mut merged = CredentialFragment::default();
        for source in sources {
            merged = merged.or(source()?);
        }
        Self::from_fragment(merged)
    }

    /// Resolve with the standard source chain on top of `explicit`.
    pub fn discover(explicit: CredentialFragment) -> Result<Self> {
        Self::resolve(&default_sources(explicit))
    }

    /// Validate a merged fragment into usable credentials.
    pub fn from_fragment(fragment: CredentialFragment) -> Result<Self> {
        let fragment = fragment.or(CredentialFragment::default());
        let api_key = fragment.api_key.ok_or_else(|| {
            Error::configuration(
                ConfigProblem::MissingApiKey,
                format!(
                    "no API key found; pass one explicitly, set {ENV_API_KEY}, \
                     or run `ainative config set api_key <key>`"
                ),
            )
        })?;
        let raw_base = fragment
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = normalize_base_url(&raw_base)?;

        debug!(
            base_url = %base_url,
            has_secret = fragment.api_secret.is_some(),
            has_org = fragment.organization_id.is_some(),
            "credentials resolved"
        );

        Ok(Self {
            api_key,
            api_secret: fragment.api_secret,
            organization_id: fragment.organization_id,
            base_url,
        })
    }

    pub fn with_api_secret(mut self, secret: impl Into<String>) -> Self {
        self.api_secret = non_empty(Some(secret.into()));
        self
    }

    pub fn with_organization_id(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = non_empty(Some(organization_id.into()));
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_secret(&self) -> Option<&str> {
        self.api_secret.as_deref()
    }

    pub fn organization_id(&self) -> Option<&str> {
        self.organization_id.as_deref()
    }

    /// Normalized base URL, always ending in an `/api/...` prefix.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// HMAC-SHA256 signature over `api_key ‖ timestamp`, base64 encoded.
    ///
    /// Returns `None` when no API secret is configured.
    pub fn sign(&self, timestamp: i64) -> Option<String> {
        let secret = self.api_secret.as_deref()?;
        // HMAC accepts keys of any length, so this cannot fail.
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
        mac.update(self.api_key.as_bytes());
        mac.update(timestamp.to_string().as_bytes());
        Some(BASE64.encode(mac.finalize().into_bytes()))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &self.api_secret.as_ref().map(|_| "<redacted>"))
            .field("organization_id", &self.organization_id)
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

/// Strip trailing slashes and append `/api/v1` unless an `/api/` prefix is
/// already present.
pub fn normalize_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim().trim_end_matches('/');
    let versioned = if trimmed.contains("/api/") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/api/v1")
    };

    let url = Url::parse(&versioned).map_err(|e| {
        Error::configuration(
            ConfigProblem::InvalidBaseUrl,
            format!("base url '{raw}' is not a valid absolute URL: {e}"),
        )
    })?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(Error::configuration(
            ConfigProblem::InvalidBaseUrl,
            format!("base url '{raw}' must be an http(s) URL with a host"),
        ));
    }
    Ok(url)
}
