//! SAML service provider core.
//!
//! All login and session state lives in signed cookies:
//! - relay state cookies correlate an outgoing AuthnRequest with the
//!   returning assertion ([`relay_state`]);
//! - the session cookie carries the authenticated subject and attributes
//!   ([`session`]).
//!
//! Both are signed with a [`TokenCodec`]. The protocol work itself (building
//! requests, validating responses) is delegated to a [`SamlEngine`].

mod authorizer;
pub mod claims;
mod engine;
mod error;
mod gatekeeper;
mod identity;
mod initiator;
mod relay_state;
#[cfg(feature = "saml")]
pub mod saml;
mod session;
#[cfg(test)]
pub(crate) mod test_utils;
mod token;

pub use authorizer::{AcsForm, flatten_attributes};
pub use engine::*;
pub use error::AuthError;
pub use gatekeeper::Gatekeeper;
pub use identity::Identity;
pub use initiator::POST_BINDING_CSP;
pub use relay_state::{RelayStateStore, new_relay_id};
pub use token::{TokenCodec, TokenError};
