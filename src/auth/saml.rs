//! SAML engine backed by `samael`.
//!
//! Builds one `ServiceProvider` at startup from the configured key pair and
//! IdP metadata. AuthnRequest generation and response validation (signature,
//! audience, conditions, `InResponseTo`) are delegated to it. SP metadata is
//! rendered here.

use async_trait::async_trait;
use openssl::{
    pkey::{PKey, Private},
    x509::X509,
};
use samael::{
    metadata::{EntityDescriptor, HTTP_POST_BINDING, HTTP_REDIRECT_BINDING},
    service_provider::{ServiceProvider, ServiceProviderBuilder},
    traits::ToXml,
};

use super::{
    Assertion, Attribute, AttributeStatement, AuthnRequest, Binding, EngineError,
    InvalidResponse, SamlEngine,
};
use crate::config::{ConfigError, IdpMetadataSource, SamlConfig};

/// SP key pair loaded from configuration.
pub struct KeyPair {
    pub private_key: PKey<Private>,
    pub certificate: X509,
    certificate_pem: String,
}

impl KeyPair {
    pub fn load(config: &SamlConfig) -> Result<Self, ConfigError> {
        let key_pem = config.private_key()?;
        let certificate_pem = config.certificate()?;

        let private_key = PKey::private_key_from_pem(key_pem.as_bytes())
            .map_err(|e| ConfigError::Key(format!("failed to parse SP private key: {e}")))?;
        let certificate = X509::from_pem(certificate_pem.as_bytes())
            .map_err(|e| ConfigError::Key(format!("failed to parse SP certificate: {e}")))?;

        Ok(Self {
            private_key,
            certificate,
            certificate_pem,
        })
    }

    /// DER encoding of the private key, from which the token key is derived.
    pub fn key_material(&self) -> Result<Vec<u8>, ConfigError> {
        self.private_key
            .private_key_to_der()
            .map_err(|e| ConfigError::Key(format!("failed to encode SP private key: {e}")))
    }
}

/// Load IdP metadata XML from whichever source is configured.
pub async fn load_idp_metadata(
    config: &SamlConfig,
    http_client: &reqwest::Client,
) -> Result<String, EngineError> {
    match config
        .idp_metadata_source()
        .map_err(|e| EngineError::Setup(e.to_string()))?
    {
        IdpMetadataSource::Inline(xml) => Ok(xml.to_string()),
        IdpMetadataSource::File(path) => std::fs::read_to_string(path).map_err(|e| {
            EngineError::Setup(format!(
                "failed to read IdP metadata {}: {e}",
                path.display()
            ))
        }),
        IdpMetadataSource::Url(url) => {
            tracing::debug!(url = %url, "Fetching SAML IdP metadata");

            let response = http_client.get(url).send().await.map_err(|e| {
                tracing::error!(error = %e, url = %url, "Failed to fetch SAML metadata");
                EngineError::Setup(format!("failed to fetch IdP metadata: {e}"))
            })?;

            if !response.status().is_success() {
                let status = response.status();
                tracing::error!(status = %status, "SAML metadata endpoint returned error");
                return Err(EngineError::Setup(format!(
                    "IdP metadata endpoint returned {status}"
                )));
            }

            response.text().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to read SAML metadata response");
                EngineError::Setup(format!("failed to read IdP metadata: {e}"))
            })
        }
    }
}

pub struct SamaelEngine {
    sp: ServiceProvider,
    entity_id: String,
    acs_url: String,
    name_id_format: String,
    certificate_pem: String,
}

impl SamaelEngine {
    pub fn new(
        config: &SamlConfig,
        keys: &KeyPair,
        idp_metadata_xml: &str,
    ) -> Result<Self, EngineError> {
        let idp_metadata: EntityDescriptor = samael::metadata::de::from_str(idp_metadata_xml)
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to parse SAML IdP metadata");
                EngineError::Setup(format!("failed to parse IdP metadata: {e}"))
            })?;

        let sp = ServiceProviderBuilder::default()
            .entity_id(config.entity_id.clone())
            .key(keys.private_key.clone())
            .certificate(keys.certificate.clone())
            .metadata_url(config.metadata_url())
            .acs_url(config.acs_url())
            .idp_metadata(idp_metadata)
            .authn_name_id_format(config.name_id_format.clone())
            .force_authn(config.force_authn)
            .allow_idp_initiated(config.allow_idp_initiated)
            .build()
            .map_err(|e| EngineError::Setup(format!("failed to build ServiceProvider: {e}")))?;

        Ok(Self {
            sp,
            entity_id: config.entity_id.clone(),
            acs_url: config.acs_url(),
            name_id_format: config.name_id_format.clone(),
            certificate_pem: keys.certificate_pem.clone(),
        })
    }
}

#[async_trait]
impl SamlEngine for SamaelEngine {
    fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// SP metadata advertising our certificate, NameID format and the
    /// HTTP-POST assertion consumer service.
    fn metadata(&self) -> Result<String, EngineError> {
        let cert_data = strip_pem_headers(&self.certificate_pem);
        if cert_data.is_empty() {
            return Err(EngineError::Metadata("SP certificate is empty".into()));
        }

        let mut xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" entityID="{}">
  <md:SPSSODescriptor AuthnRequestsSigned="false" WantAssertionsSigned="true" protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">"#,
            self.entity_id
        );

        for usage in ["signing", "encryption"] {
            xml.push_str(&format!(
                r#"
    <md:KeyDescriptor use="{}">
      <ds:KeyInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
        <ds:X509Data>
          <ds:X509Certificate>{}</ds:X509Certificate>
        </ds:X509Data>
      </ds:KeyInfo>
    </md:KeyDescriptor>"#,
                usage, cert_data
            ));
        }

        xml.push_str(&format!(
            r#"
    <md:NameIDFormat>{}</md:NameIDFormat>
    <md:AssertionConsumerService
        Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST"
        Location="{}"
        index="0"/>
  </md:SPSSODescriptor>
</md:EntityDescriptor>"#,
            self.name_id_format, self.acs_url
        ));

        Ok(xml)
    }

    fn sso_binding_location(&self, binding: Binding) -> Option<String> {
        let binding = match binding {
            Binding::Redirect => HTTP_REDIRECT_BINDING,
            Binding::Post => HTTP_POST_BINDING,
        };
        self.sp.sso_binding_location(binding)
    }

    fn make_authentication_request(&self, location: &str) -> Result<AuthnRequest, EngineError> {
        let request = self
            .sp
            .make_authentication_request(location)
            .map_err(|e| EngineError::AuthnRequest(e.to_string()))?;
        let xml = ToXml::to_string(&request)
            .map_err(|e| EngineError::AuthnRequest(format!("failed to serialize: {e}")))?;

        Ok(AuthnRequest {
            id: request.id.clone(),
            destination: request
                .destination
                .clone()
                .unwrap_or_else(|| location.to_string()),
            xml,
        })
    }

    async fn parse_response(
        &self,
        encoded: &str,
        possible_request_ids: &[String],
    ) -> Result<Assertion, InvalidResponse> {
        let ids: Vec<&str> = possible_request_ids.iter().map(String::as_str).collect();
        let assertion = self
            .sp
            .parse_base64_response(encoded, Some(&ids))
            .map_err(|e| InvalidResponse::new(encoded, e.to_string()))?;

        Ok(convert_assertion(&assertion))
    }
}

fn convert_assertion(assertion: &samael::schema::Assertion) -> Assertion {
    let subject = assertion
        .subject
        .as_ref()
        .and_then(|s| s.name_id.as_ref())
        .map(|n| n.value.clone());

    let attribute_statements = assertion
        .attribute_statements
        .iter()
        .flatten()
        .map(|statement| AttributeStatement {
            attributes: statement
                .attributes
                .iter()
                .map(|attr| Attribute {
                    name: attr.name.clone().unwrap_or_default(),
                    friendly_name: attr.friendly_name.clone(),
                    values: attr.values.iter().filter_map(|v| v.value.clone()).collect(),
                })
                .collect(),
        })
        .collect();

    Assertion {
        subject,
        attribute_statements,
    }
}

/// Strip PEM headers from a certificate.
fn strip_pem_headers(pem: &str) -> String {
    pem.lines()
        .filter(|line| !line.starts_with("-----BEGIN") && !line.starts_with("-----END"))
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("")
}
