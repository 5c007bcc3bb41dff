mod gate;
mod require_attribute;

pub use gate::{insert_identity_headers, saml_gate_middleware, strip_identity_headers};
pub use require_attribute::{AttributeRequirement, require_attribute};
