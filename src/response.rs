use error_stack::report;
use once_cell::sync::Lazy;

use crate::errors::{CustomResult, PayError};
use crate::schema::{FieldKind, FieldRule, FieldSchema};
use crate::types::{AppIdentity, Envelope, MerchantIdentity, PayOutcome};

pub(crate) const CODE_SUCCESS: &str = "SUCCESS";

/// Header fields every trusted envelope must carry on the success path.
static AUTH_HEADER_SCHEMA: Lazy<FieldSchema> = Lazy::new(|| {
    FieldSchema::new()
        .field("appid", FieldRule::required(FieldKind::Text))
        .field("mch_id", FieldRule::required(FieldKind::Text))
        .field("nonce_str", FieldRule::required(FieldKind::Text))
        .field("sign", FieldRule::required(FieldKind::Text))
});

/// Interprets the two-level success/failure envelope.
///
/// `return_code` gates communication-level success; the provider identity
/// fields are then verified against the caller's own, and only a
/// `result_code` of SUCCESS lets a result schema extract business fields.
/// Every path returns exactly once.
pub fn handle(
    app: &AppIdentity,
    merchant: &MerchantIdentity,
    envelope: &Envelope,
    result_schema: Option<&FieldSchema>,
) -> CustomResult<PayOutcome, PayError> {
    let return_code = envelope
        .get("return_code")
        .map(String::as_str)
        .unwrap_or_default();
    if return_code != CODE_SUCCESS {
        return Err(report!(PayError::ReturnCodeFailure {
            message: failure_message(envelope),
        }));
    }

    verify_headers(app, merchant, envelope)?;

    let Some(schema) = result_schema else {
        // Caller wants the full payload without structural extraction.
        return Ok(PayOutcome {
            result: None,
            envelope: envelope.clone(),
        });
    };

    if envelope.get("result_code").map(String::as_str) == Some(CODE_SUCCESS) {
        if let Err(violations) = schema.validate(envelope) {
            return Err(
                report!(PayError::ResultValidation).attach_printable(violations.to_string())
            );
        }
        return Ok(PayOutcome {
            result: Some(schema.extract(envelope)),
            envelope: envelope.clone(),
        });
    }

    // result_code absent or not SUCCESS: single terminal failure carrying the
    // business reason when the gateway supplied one.
    Err(report!(PayError::ReturnCodeFailure {
        message: failure_message(envelope),
    }))
}

fn verify_headers(
    app: &AppIdentity,
    merchant: &MerchantIdentity,
    envelope: &Envelope,
) -> CustomResult<(), PayError> {
    if let Err(violations) = AUTH_HEADER_SCHEMA.validate(envelope) {
        return Err(report!(PayError::HeaderValidation).attach_printable(violations.to_string()));
    }
    if envelope.get("appid").map(String::as_str) != Some(app.app_id.as_str()) {
        return Err(report!(PayError::AppIdMismatch));
    }
    if envelope.get("mch_id").map(String::as_str) != Some(merchant.mch_id.as_str()) {
        return Err(report!(PayError::MerchantIdMismatch));
    }
    Ok(())
}

fn failure_message(envelope: &Envelope) -> String {
    envelope
        .get("err_code_des")
        .or_else(|| envelope.get("return_msg"))
        .cloned()
        .unwrap_or_default()
}
