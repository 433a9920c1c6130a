use error_stack::{report, ResultExt};
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::consts;
use crate::errors::{CustomResult, PayError};
use crate::types::Envelope;

/// Renders a flat envelope as `<xml><k><![CDATA[v]]></k>...</xml>`, the shape
/// the gateway prescribes for every request body.
pub fn encode(fields: &Envelope) -> CustomResult<String, PayError> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Start(BytesStart::new(consts::XML_ROOT)))
        .change_context(PayError::RequestEncodingFailed)?;
    for (name, value) in fields {
        writer
            .write_event(Event::Start(BytesStart::new(name.as_str())))
            .change_context(PayError::RequestEncodingFailed)?;
        writer
            .write_event(Event::CData(BytesCData::new(value.as_str())))
            .change_context(PayError::RequestEncodingFailed)?;
        writer
            .write_event(Event::End(BytesEnd::new(name.as_str())))
            .change_context(PayError::RequestEncodingFailed)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(consts::XML_ROOT)))
        .change_context(PayError::RequestEncodingFailed)?;
    String::from_utf8(writer.into_inner()).change_context(PayError::RequestEncodingFailed)
}

/// Decodes a flat envelope from the children of the root element. Text and
/// CDATA values are both accepted; nesting below one level is rejected.
pub fn decode(body: &[u8]) -> CustomResult<Envelope, PayError> {
    let text = std::str::from_utf8(body)
        .change_context(PayError::ResponseDecodingFailed)?
        .trim_start_matches('\u{feff}');

    let mut reader = Reader::from_str(text);
    let mut fields = Envelope::new();
    let mut depth = 0usize;
    let mut current: Option<String> = None;

    loop {
        match reader
            .read_event()
            .change_context(PayError::ResponseDecodingFailed)?
        {
            Event::Start(start) => {
                depth += 1;
                match depth {
                    1 => {}
                    2 => {
                        current = Some(
                            String::from_utf8(start.name().as_ref().to_vec())
                                .change_context(PayError::ResponseDecodingFailed)?,
                        );
                    }
                    _ => {
                        return Err(report!(PayError::ResponseDecodingFailed)
                            .attach_printable("envelope fields must not nest"));
                    }
                }
            }
            Event::End(_) => {
                if depth == 2 {
                    current = None;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Text(value) => {
                if let Some(name) = current.as_ref() {
                    let value = value
                        .unescape()
                        .change_context(PayError::ResponseDecodingFailed)?;
                    let value = value.trim();
                    if !value.is_empty() {
                        fields.insert(name.clone(), value.to_string());
                    }
                }
            }
            Event::CData(value) => {
                if let Some(name) = current.as_ref() {
                    let value = String::from_utf8(value.into_inner().into_owned())
                        .change_context(PayError::ResponseDecodingFailed)?;
                    fields.insert(name.clone(), value);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(fields)
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
    fn encode_then_decode_is_identity() {
        let fields = envelope(&[
            ("appid", "wx2421b1c4370ec43b"),
            ("body", "JSAPI pay test"),
            ("total_fee", "1"),
        ]);
        let body = encode(&fields).unwrap();
        assert_eq!(decode(body.as_bytes()).unwrap(), fields);
    }

    #[test]
    fn encode_wraps_values_in_cdata() {
        let body = encode(&envelope(&[("return_msg", "OK")])).unwrap();
        assert_eq!(
            body,
            "<xml><return_msg><![CDATA[OK]]></return_msg></xml>"
        );
    }

    #[test]
    fn decode_accepts_plain_text_values() {
        let fields =
            decode(b"<xml><return_code>SUCCESS</return_code><total_fee>1</total_fee></xml>")
                .unwrap();
        assert_eq!(
            fields,
            envelope(&[("return_code", "SUCCESS"), ("total_fee", "1")])
        );
    }

    #[test]
    fn decode_strips_a_leading_bom() {
        let mut body = "\u{feff}".to_string();
        body.push_str("<xml><return_code><![CDATA[SUCCESS]]></return_code></xml>");
        let fields = decode(body.as_bytes()).unwrap();
        assert_eq!(fields.get("return_code").map(String::as_str), Some("SUCCESS"));
    }

    #[test]
    fn decode_rejects_nested_elements() {
        let result = decode(b"<xml><outer><inner>1</inner></outer></xml>");
        assert!(result.is_err());
    }

    #[test]
    fn decode_skips_self_closing_fields() {
        let fields = decode(b"<xml><attach/><out_trade_no>T1</out_trade_no></xml>").unwrap();
        assert_eq!(fields, envelope(&[("out_trade_no", "T1")]));
    }
}
