use tower_cookies::{Cookie, Cookies, cookie::time::Duration as CookieDuration};

use super::{AuthError, Gatekeeper, Identity, claims::SessionClaims};

impl Gatekeeper {
    /// The identity carried by the request's session cookie.
    ///
    /// Every failure (missing cookie, bad signature, expired, wrong audience,
    /// unexpected claims) reads as "no session"; the cause is only logged.
    pub fn session(&self, cookies: &Cookies) -> Option<Identity> {
        let cookie = cookies.get(&self.session.cookie_name)?;

        match self
            .codec
            .verify::<SessionClaims>(cookie.value(), Some(self.entity_id()))
        {
            Ok(claims) => Some(Identity::from(claims)),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring invalid session token");
                None
            }
        }
    }

    /// Sign `claims` and set them as the session cookie.
    pub(super) fn issue_session(
        &self,
        cookies: &Cookies,
        claims: &SessionClaims,
    ) -> Result<(), AuthError> {
        let token = self
            .codec
            .sign(claims)
            .map_err(|e| AuthError::Internal(format!("failed to sign session token: {e}")))?;

        let mut cookie = Cookie::build((self.session.cookie_name.clone(), token))
            .path("/")
            .http_only(true)
            .secure(self.session.secure)
            .same_site(self.session.same_site.into())
            .max_age(CookieDuration::seconds(self.session.duration_secs as i64))
            .build();
        if let Some(domain) = &self.session.domain {
            cookie.set_domain(domain.clone());
        }
        cookies.add(cookie);
        Ok(())
    }
}
