//! Bridge configuration shared by the server, the gate, and the client flows.

use secrecy::SecretString;

/// Runtime configuration for the bridge. The provider key is a secret and
/// never shows up in `Debug` output.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    provider_url: String,
    provider_key: SecretString,
    site_url: String,
}

impl BridgeConfig {
    #[must_use]
    pub fn new(provider_url: String, provider_key: SecretString, site_url: String) -> Self {
        Self {
            provider_url: provider_url.trim_end_matches('/').to_string(),
            provider_key,
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn provider_url(&self) -> &str {
        &self.provider_url
    }

    #[must_use]
    pub fn provider_key(&self) -> &SecretString {
        &self.provider_key
    }

    #[must_use]
    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    /// Cookies are only marked `Secure` when the site itself is served over
    /// HTTPS, so local development keeps working.
    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.site_url.starts_with("https://")
    }

    /// Where the provider's confirmation email lands the user when the
    /// signup request does not name a redirect.
    #[must_use]
    pub fn default_email_redirect(&self) -> String {
        format!("{}/auth/callback", self.site_url)
    }
}
