//! Store and cookie configuration
//!
//! The core never touches an HTTP request or response. Cookie emission is a
//! pure function of (session id, config): callers pick up the rendered
//! `Set-Cookie` value from [`Store::set_cookie_header`](crate::Store) and
//! attach it however their HTTP layer wants.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::crypto::EncryptionConfig;

/// Default cookie lifetime: 30 days.
const DEFAULT_LIFETIME_SECS: u64 = 86400 * 30;

/// SameSite cookie attribute
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SameSite {
    /// Strict - cookie only sent for same-site requests
    Strict,
    /// Lax - cookie sent for same-site requests and top-level navigations
    Lax,
    /// None - cookie sent for all requests (forces Secure)
    None,
}

impl SameSite {
    fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Attributes of the session cookie
#[derive(Clone, Debug)]
pub struct CookieConfig {
    /// Cookie name (default: "SESSION_ID")
    pub name: String,

    /// Cookie path (default: "/")
    pub path: String,

    /// Cookie domain (default: None - current domain only)
    pub domain: Option<String>,

    /// HttpOnly flag (default: true)
    pub http_only: bool,

    /// Secure flag. `None` means auto: secure when the request came in over
    /// TLS. Always true when `same_site` is `None`.
    pub secure: Option<bool>,

    /// SameSite attribute (default: Lax)
    pub same_site: SameSite,

    /// Lifetime used to compute `Expires` (default: 30 days)
    pub lifetime: Duration,

    /// Fixed absolute expiry. When set, takes precedence over `lifetime`.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "SESSION_ID".to_string(),
            path: "/".to_string(),
            domain: None,
            http_only: true,
            secure: None,
            same_site: SameSite::Lax,
            lifetime: Duration::from_secs(DEFAULT_LIFETIME_SECS),
            expires_at: None,
        }
    }
}

impl CookieConfig {
    /// Create a cookie configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cookie name (default: "SESSION_ID")
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Set the cookie path (default: "/")
    pub fn with_path<S: Into<String>>(mut self, path: S) -> Self {
        self.path = path.into();
        self
    }

    /// Set the cookie domain
    pub fn with_domain<S: Into<String>>(mut self, domain: S) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set the HttpOnly flag (default: true)
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Force the Secure flag on or off (default: auto-detect from TLS)
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    /// Set the SameSite attribute (default: Lax)
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    /// Set the lifetime used to compute `Expires` (default: 30 days)
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Pin `Expires` to a fixed absolute time instead of now + lifetime
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Render the `Set-Cookie` header value issuing the given session id.
    ///
    /// `https` tells the config whether the current request came in over TLS,
    /// which drives the auto value of the Secure flag.
    pub fn issue_header(&self, id: &str, https: bool) -> String {
        let expires = self
            .expires_at
            .unwrap_or_else(|| Utc::now() + chrono::Duration::seconds(self.lifetime.as_secs() as i64));
        self.render(id, expires, https)
    }

    /// Render the `Set-Cookie` header value that clears the session cookie.
    pub fn clear_header(&self, https: bool) -> String {
        self.render("", Utc::now() - chrono::Duration::hours(1), https)
    }

    fn render(&self, value: &str, expires: DateTime<Utc>, https: bool) -> String {
        let mut header = format!("{}={}", self.name, value);

        if let Some(domain) = &self.domain {
            header.push_str("; Domain=");
            header.push_str(domain);
        }

        header.push_str("; Path=");
        header.push_str(&self.path);

        header.push_str("; Expires=");
        header.push_str(&expires.format("%a, %d %b %Y %H:%M:%S GMT").to_string());

        header.push_str("; SameSite=");
        header.push_str(self.same_site.as_str());

        if self.http_only {
            header.push_str("; HttpOnly");
        }

        // SameSite=None is only honored by browsers on secure cookies.
        let secure = self.same_site == SameSite::None || self.secure.unwrap_or(https);
        if secure {
            header.push_str("; Secure");
        }

        header
    }
}

/// Top-level configuration for a [`Store`](crate::Store)
#[derive(Clone, Debug, Default)]
pub struct StoreConfig {
    /// Session cookie attributes
    pub cookie: CookieConfig,

    /// Payload encryption. `None` persists plaintext JSON.
    pub encryption: Option<EncryptionConfig>,
}

impl StoreConfig {
    /// Create a configuration with default cookie attributes and no encryption
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cookie attributes
    pub fn with_cookie(mut self, cookie: CookieConfig) -> Self {
        self.cookie = cookie;
        self
    }

    /// Enable payload encryption
    pub fn with_encryption(mut self, encryption: EncryptionConfig) -> Self {
        self.encryption = Some(encryption);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_header_defaults() {
        let config = CookieConfig::new();
        let header = config.issue_header("0123456789abcdef0123456789abcdef", false);

        assert!(header.starts_with("SESSION_ID=0123456789abcdef0123456789abcdef; "));
        assert!(header.contains("; Path=/"));
        assert!(header.contains("; SameSite=Lax"));
        assert!(header.contains("; HttpOnly"));
        assert!(header.contains("; Expires="));
        assert!(!header.contains("; Secure"));
        assert!(!header.contains("; Domain="));
    }

    #[test]
    fn test_secure_auto_follows_tls() {
        let config = CookieConfig::new();
        assert!(config.issue_header("ab", true).contains("; Secure"));
        assert!(!config.issue_header("ab", false).contains("; Secure"));
    }

    #[test]
    fn test_same_site_none_forces_secure() {
        let config = CookieConfig::new().with_same_site(SameSite::None);
        let header = config.issue_header("ab", false);
        assert!(header.contains("; SameSite=None"));
        assert!(header.contains("; Secure"));
    }

    #[test]
    fn test_explicit_secure_overrides_tls() {
        let config = CookieConfig::new().with_secure(true);
        assert!(config.issue_header("ab", false).contains("; Secure"));
    }

    #[test]
    fn test_domain_and_custom_name() {
        let config = CookieConfig::new()
            .with_name("sid")
            .with_domain("example.com");
        let header = config.issue_header("ab", false);
        assert!(header.starts_with("sid=ab; "));
        assert!(header.contains("; Domain=example.com"));
    }

    #[test]
    fn test_fixed_expires() {
        let fixed = Utc::now() + chrono::Duration::days(7);
        let config = CookieConfig::new().with_expires_at(fixed);
        let header = config.issue_header("ab", false);
        let formatted = fixed.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        assert!(header.contains(&formatted));
    }

    #[test]
    fn test_clear_header_expires_in_past() {
        let config = CookieConfig::new();
        let header = config.clear_header(false);
        assert!(header.starts_with("SESSION_ID=; "));

        // Extract the Expires attribute and check it is behind us.
        let expires = header
            .split("; ")
            .find_map(|part| part.strip_prefix("Expires="))
            .unwrap();
        let parsed = DateTime::parse_from_rfc2822(&expires.replace("GMT", "+0000")).unwrap();
        assert!(parsed.with_timezone(&Utc) < Utc::now());
    }
}
