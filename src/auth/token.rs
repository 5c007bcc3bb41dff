//! Signed token codec shared by relay state and session tokens.
//!
//! Tokens are compact JWS values MAC'd with a symmetric key. The key is either
//! supplied directly or derived from the SP private key, so rotating the
//! private key invalidates every outstanding session and in-flight login.

use hmac::{Hmac, Mac};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::{Serialize, de::DeserializeOwned};
use sha2::Sha256;

use crate::config::SigningAlgorithm;

/// Domain separation label for deriving the token key from SP key material.
const KEY_DERIVATION_LABEL: &[u8] = b"saml-gatekeeper token signing key v1";

/// Token verification and signing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token algorithm does not match the configured algorithm")]
    AlgorithmMismatch,

    #[error("token has expired")]
    Expired,

    #[error("token is not yet valid")]
    NotYetValid,

    #[error("token audience does not match")]
    AudienceMismatch,

    #[error("token is malformed: {0}")]
    Malformed(String),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::AlgorithmMismatch
            }
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::ImmatureSignature => TokenError::NotYetValid,
            ErrorKind::InvalidAudience => TokenError::AudienceMismatch,
            _ => TokenError::Malformed(e.to_string()),
        }
    }
}

/// Signs and verifies claim sets with one symmetric key and one algorithm.
///
/// Immutable after construction; share it behind an `Arc`.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    leeway_secs: u64,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm)
            .field("leeway_secs", &self.leeway_secs)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Build a codec from a raw secret.
    pub fn new(secret: &[u8], algorithm: SigningAlgorithm, leeway_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: algorithm.into(),
            leeway_secs,
        }
    }

    /// Build a codec whose key is derived deterministically from key material
    /// (the DER encoding of the SP private key).
    pub fn derive(
        key_material: &[u8],
        algorithm: SigningAlgorithm,
        leeway_secs: u64,
    ) -> Result<Self, TokenError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(KEY_DERIVATION_LABEL)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        mac.update(key_material);
        let secret = mac.finalize().into_bytes();
        Ok(Self::new(&secret, algorithm, leeway_secs))
    }

    /// Serialize and sign a claim set.
    pub fn sign<C: Serialize>(&self, claims: &C) -> Result<String, TokenError> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify a token and decode its claims.
    ///
    /// Checks, in order: algorithm, signature, expiry, not-before, and (when
    /// `audience` is given) the `aud` claim. Tokens without `exp` are
    /// rejected.
    pub fn verify<C: DeserializeOwned>(
        &self,
        token: &str,
        audience: Option<&str>,
    ) -> Result<C, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = self.leeway_secs;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        match audience {
            Some(aud) => {
                validation.set_audience(&[aud]);
                validation.set_required_spec_claims(&["exp", "aud"]);
            }
            None => {
                validation.validate_aud = false;
                validation.set_required_spec_claims(&["exp"]);
            }
        }

        let data = decode::<C>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}
