//! End-to-end tests that drive the full router: gate, SAML endpoints and
//! downstream handlers, with a fake SAML engine in place of real XML.
