use error_stack::report;
use masking::Secret;
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::consts;
use crate::errors::{CustomResult, PayError};
use crate::schema::FieldSchema;
use crate::sign;
use crate::types::{AppIdentity, DeviceInfo, Envelope, MerchantIdentity};

#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug)]
pub enum RequestContent {
    Xml(Envelope),
}

impl RequestContent {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Xml(_) => "text/xml",
        }
    }

    pub fn render(&self) -> CustomResult<String, PayError> {
        match self {
            Self::Xml(fields) => crate::xml::encode(fields),
        }
    }
}

#[derive(Debug)]
pub struct Request {
    pub url: String,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub certificate: Option<Secret<String>>,
    pub certificate_key: Option<Secret<String>>,
    pub body: Option<RequestContent>,
}

impl Request {
    pub fn new(method: Method, url: &str) -> Self {
        Self {
            method,
            url: String::from(url),
            headers: Vec::new(),
            certificate: None,
            certificate_key: None,
            body: None,
        }
    }
}

/// Builds the signed request envelope: validates caller data against the send
/// schema before any field injection, then injects the identity fields and a
/// fresh nonce, canonicalizes and signs.
pub fn prepare(
    data: &Envelope,
    send_schema: &FieldSchema,
    app: &AppIdentity,
    merchant: &MerchantIdentity,
    device: Option<&DeviceInfo>,
) -> CustomResult<Envelope, PayError> {
    send_schema
        .validate(data)
        .map_err(|violations| report!(PayError::SendValidation).attach_printable(violations.to_string()))?;
    if data.contains_key(consts::FIELD_SIGN) {
        return Err(report!(PayError::SendValidation)
            .attach_printable("request data must not carry a precomputed signature"));
    }

    let mut envelope = data.clone();
    envelope.insert("appid".to_string(), app.app_id.clone());
    envelope.insert("mch_id".to_string(), merchant.mch_id.clone());
    if let Some(device) = device {
        envelope.insert("device_info".to_string(), device.device_info.clone());
    }
    envelope.insert("nonce_str".to_string(), generate_nonce());

    let signature = sign::sign(&merchant.api_key, &sign::canonical_string(&envelope));
    envelope.insert(consts::FIELD_SIGN.to_string(), signature);
    Ok(envelope)
}

pub(crate) fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(consts::NONCE_LENGTH)
        .map(char::from)
        .collect()
}
