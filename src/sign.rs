use masking::{PeekInterface, Secret};

use crate::consts;
use crate::types::Envelope;

/// Joins the non-empty fields as `key=value` pairs with `&`, keys in byte
/// order. The signature field never participates.
pub fn canonical_string(fields: &Envelope) -> String {
    let mut pairs = Vec::with_capacity(fields.len());
    for (name, value) in fields {
        if value.is_empty() || name == consts::FIELD_SIGN {
            continue;
        }
        pairs.push(format!("{name}={value}"));
    }
    pairs.join("&")
}

/// MD5 over `<canonical>&key=<merchant key>`, rendered as uppercase hex.
/// A legacy digest kept bit-for-bit compatible with the gateway.
pub fn sign(api_key: &Secret<String>, canonical: &str) -> String {
    let keyed = format!("{canonical}&key={}", api_key.peek());
    let digest = md5::compute(keyed.as_bytes());
    hex::encode_upper(digest.0)
}

/// Recomputes the signature over the envelope minus `sign` and compares.
pub fn verify(api_key: &Secret<String>, envelope: &Envelope) -> bool {
    match envelope.get(consts::FIELD_SIGN) {
        Some(expected) => sign(api_key, &canonical_string(envelope)) == *expected,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(pairs: &[(&str, &str)]) -> Envelope {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn canonical_string_is_insertion_order_independent() {
        let forward = envelope(&[("appid", "wx1"), ("body", "test"), ("mch_id", "10000100")]);
        let mut reversed = Envelope::new();
        reversed.insert("mch_id".to_string(), "10000100".to_string());
        reversed.insert("body".to_string(), "test".to_string());
        reversed.insert("appid".to_string(), "wx1".to_string());

        assert_eq!(canonical_string(&forward), canonical_string(&reversed));
        assert_eq!(
            canonical_string(&forward),
            "appid=wx1&body=test&mch_id=10000100"
        );
    }

    #[test]
    fn canonical_string_excludes_empty_values_and_sign() {
        let fields = envelope(&[("a", "1"), ("b", ""), ("sign", "FEEDBEEF")]);
        assert_eq!(canonical_string(&fields), "a=1");
    }

    #[test]
    fn sign_matches_reference_digest() {
        let key = Secret::new("192006250b4c09247ec02edce69f6a2d".to_string());
        let fields = envelope(&[
            ("body", "test"),
            ("mch_id", "10000100"),
            ("out_trade_no", "20150806125346"),
        ]);
        assert_eq!(
            sign(&key, &canonical_string(&fields)),
            "4D652F22FAC5D5FC47792EFBF7FA78BB"
        );
    }

    #[test]
    fn sign_is_deterministic_and_uppercase_hex() {
        let key = Secret::new("abc".to_string());
        let first = sign(&key, "a=1&b=2");
        assert_eq!(first, sign(&key, "a=1&b=2"));
        assert_eq!(first, "C74DDE974EF6D8DFDDAEDCBE763FC9A9");
    }

    #[test]
    fn verify_round_trips_and_rejects_tampering() {
        let key = Secret::new("secret".to_string());
        let mut fields = envelope(&[("out_trade_no", "T100"), ("total_fee", "1")]);
        let signature = sign(&key, &canonical_string(&fields));
        fields.insert("sign".to_string(), signature);
        assert!(verify(&key, &fields));

        fields.insert("total_fee".to_string(), "2".to_string());
        assert!(!verify(&key, &fields));
    }

    #[test]
    fn verify_fails_without_a_signature() {
        let key = Secret::new("secret".to_string());
        assert!(!verify(&key, &envelope(&[("a", "1")])));
    }
}
