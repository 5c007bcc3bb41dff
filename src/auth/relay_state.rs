//! Relay state cookies.
//!
//! Each in-flight login keeps its signed relay state token in its own cookie,
//! named `<prefix><relay id>` and scoped to the assertion consumer path so
//! it is sent only when the IdP posts back. Several logins (e.g. in multiple
//! tabs) can therefore be in flight at once.

use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use rand::RngCore;
use tower_cookies::{
    Cookie, Cookies,
    cookie::{SameSite, time::Duration as CookieDuration},
};

use crate::config::{SamlConfig, SessionConfig};

/// Random bytes in a relay identifier. 42 bytes encode to 56 URL-safe
/// characters, within the 80 byte limit on `RelayState`.
const RELAY_ID_BYTES: usize = 42;

/// Generate a fresh, unpredictable relay identifier.
pub fn new_relay_id() -> String {
    let mut bytes = [0u8; RELAY_ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE.encode(bytes)
}

/// Reads and writes relay state cookies on a request's cookie jar.
#[derive(Debug, Clone)]
pub struct RelayStateStore {
    prefix: String,
    path: String,
    secure: bool,
    same_site: SameSite,
    max_age_secs: u64,
}

impl RelayStateStore {
    pub fn new(saml: &SamlConfig, session: &SessionConfig) -> Self {
        Self {
            prefix: session.relay_state.cookie_prefix.clone(),
            path: saml.acs_path.clone(),
            secure: session.secure,
            same_site: session.relay_state.same_site.into(),
            max_age_secs: session.relay_state.max_age_secs,
        }
    }

    fn cookie_name(&self, relay_id: &str) -> String {
        format!("{}{}", self.prefix, relay_id)
    }

    /// Store a relay state token under `relay_id`.
    pub fn put(&self, cookies: &Cookies, relay_id: &str, token: String) {
        let cookie = Cookie::build((self.cookie_name(relay_id), token))
            .path(self.path.clone())
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site)
            .max_age(CookieDuration::seconds(self.max_age_secs as i64))
            .build();
        cookies.add(cookie);
    }

    /// Every relay state token presented with the request.
    pub fn get_all(&self, cookies: &Cookies) -> Vec<String> {
        cookies
            .list()
            .into_iter()
            .filter(|c| c.name().starts_with(&self.prefix))
            .map(|c| c.value().to_string())
            .collect()
    }

    /// The relay state token stored under `relay_id`, if presented.
    pub fn get_one(&self, cookies: &Cookies, relay_id: &str) -> Option<String> {
        cookies
            .get(&self.cookie_name(relay_id))
            .map(|c| c.value().to_string())
    }

    /// Remove the relay state under `relay_id`. Emits an expiring cookie;
    /// later reads in the same request no longer see it.
    pub fn delete(&self, cookies: &Cookies, relay_id: &str) {
        let removal = Cookie::build((self.cookie_name(relay_id), ""))
            .path(self.path.clone())
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site)
            .build();
        cookies.remove(removal);
    }
}
