use base64::engine::general_purpose;

/// Base64 engine for certificate material supplied by the merchant portal.
pub const BASE64_ENGINE: base64::engine::GeneralPurpose = general_purpose::STANDARD;

/// Length of the `nonce_str` injected into every outbound envelope.
pub const NONCE_LENGTH: usize = 32;

/// Name of the signature field; excluded from canonicalization.
pub const FIELD_SIGN: &str = "sign";

/// Root element wrapping every envelope on the wire.
pub(crate) const XML_ROOT: &str = "xml";
