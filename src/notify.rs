use error_stack::report;
use once_cell::sync::Lazy;

use crate::errors::{CustomResult, PayError};
use crate::response::{self, CODE_SUCCESS};
use crate::schema::{FieldKind, FieldRule, FieldSchema};
use crate::sign;
use crate::types::{AppIdentity, Envelope, MerchantIdentity, PayOutcome};
use crate::xml;

static NOTIFICATION_RESULT: Lazy<FieldSchema> = Lazy::new(|| {
    FieldSchema::new()
        .field("openid", FieldRule::required(FieldKind::Text))
        .field("trade_type", FieldRule::required(FieldKind::Text))
        .field("out_trade_no", FieldRule::required(FieldKind::Text))
        .field("transaction_id", FieldRule::required(FieldKind::Text))
        .field("total_fee", FieldRule::required(FieldKind::Numeric))
        .field("time_end", FieldRule::required(FieldKind::Numeric))
        .field("bank_type", FieldRule::optional(FieldKind::Text))
        .field("is_subscribe", FieldRule::optional(FieldKind::Text))
        .field("fee_type", FieldRule::optional(FieldKind::Text))
        .field("cash_fee", FieldRule::optional(FieldKind::Numeric))
        .field("attach", FieldRule::optional(FieldKind::Text))
});

/// Handles the asynchronous payment notification the gateway posts to the
/// merchant's `notify_url`. The signature is checked with the merchant key
/// before any field is trusted.
pub fn handle_notification(
    app: &AppIdentity,
    merchant: &MerchantIdentity,
    body: &[u8],
) -> CustomResult<PayOutcome, PayError> {
    let envelope = xml::decode(body)?;

    // Failed-communication notifications carry no signature; reject them on
    // the return code before looking for one.
    let return_code = envelope
        .get("return_code")
        .map(String::as_str)
        .unwrap_or_default();
    if return_code != CODE_SUCCESS {
        let message = envelope.get("return_msg").cloned().unwrap_or_default();
        return Err(report!(PayError::ReturnCodeFailure { message }));
    }

    if !sign::verify(&merchant.api_key, &envelope) {
        return Err(report!(PayError::SignatureMismatch));
    }

    response::handle(app, merchant, &envelope, Some(&NOTIFICATION_RESULT))
}

/// Body the merchant must answer with once a notification is accepted.
pub fn success_ack() -> String {
    ack(CODE_SUCCESS, "OK")
}

/// Body telling the gateway to redeliver later.
pub fn failure_ack(message: &str) -> String {
    ack("FAIL", message)
}

fn ack(code: &str, message: &str) -> String {
    format!(
        "<xml><return_code><![CDATA[{code}]]></return_code><return_msg><![CDATA[{message}]]></return_msg></xml>"
    )
}

#[cfg(test)]
mod tests {
    use masking::Secret;

    use super::*;

    fn app() -> AppIdentity {
        AppIdentity {
            app_id: "wx2421b1c4370ec43b".to_string(),
        }
    }

    fn merchant() -> MerchantIdentity {
        MerchantIdentity {
            mch_id: "10000100".to_string(),
            api_key: Secret::new("192006250b4c09247ec02edce69f6a2d".to_string()),
        }
    }

    fn notification_envelope() -> Envelope {
        let mut envelope: Envelope = [
            ("return_code", "SUCCESS"),
            ("appid", "wx2421b1c4370ec43b"),
            ("mch_id", "10000100"),
            ("nonce_str", "5K8264ILTKCH16CQ2502SI8ZNMTM67VS"),
            ("result_code", "SUCCESS"),
            ("openid", "oUpF8uMEb4qRXf22hE3X68TekukE"),
            ("trade_type", "JSAPI"),
            ("bank_type", "CMC"),
            ("total_fee", "1"),
            ("transaction_id", "1004400740201409030005092168"),
            ("out_trade_no", "1409811653"),
            ("time_end", "20140903131540"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let signature = sign::sign(&merchant().api_key, &sign::canonical_string(&envelope));
        envelope.insert("sign".to_string(), signature);
        envelope
    }

    #[test]
    fn valid_notification_extracts_business_fields() {
        let body = xml::encode(&notification_envelope()).unwrap();
        let outcome = handle_notification(&app(), &merchant(), body.as_bytes()).unwrap();

        let result = outcome.result.unwrap();
        assert_eq!(
            result.get("out_trade_no").map(String::as_str),
            Some("1409811653")
        );
        assert_eq!(result.get("total_fee").map(String::as_str), Some("1"));
        assert!(!result.contains_key("sign"));
    }

    #[test]
    fn tampered_notification_is_a_signature_mismatch() {
        let mut envelope = notification_envelope();
        envelope.insert("total_fee".to_string(), "9999".to_string());
        let body = xml::encode(&envelope).unwrap();

        let err = handle_notification(&app(), &merchant(), body.as_bytes()).unwrap_err();
        assert!(matches!(
            err.current_context(),
            PayError::SignatureMismatch
        ));
    }

    #[test]
    fn unsigned_notification_is_a_signature_mismatch() {
        let mut envelope = notification_envelope();
        envelope.remove("sign");
        let body = xml::encode(&envelope).unwrap();

        let err = handle_notification(&app(), &merchant(), body.as_bytes()).unwrap_err();
        assert!(matches!(
            err.current_context(),
            PayError::SignatureMismatch
        ));
    }

    #[test]
    fn failed_communication_notification_fails_on_return_code() {
        let body = b"<xml><return_code><![CDATA[FAIL]]></return_code><return_msg><![CDATA[bad request]]></return_msg></xml>";
        let err = handle_notification(&app(), &merchant(), body).unwrap_err();
        match err.current_context() {
            PayError::ReturnCodeFailure { message } => assert_eq!(message, "bad request"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn acks_match_the_prescribed_bodies() {
        assert_eq!(
            success_ack(),
            "<xml><return_code><![CDATA[SUCCESS]]></return_code><return_msg><![CDATA[OK]]></return_msg></xml>"
        );
        assert!(failure_ack("signature mismatch").contains("FAIL"));
    }
}
