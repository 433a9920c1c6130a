use std::collections::BTreeMap;
use std::fmt;

use crate::types::Envelope;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldKind {
    Text,
    /// Value must be an unsigned decimal integer (fee amounts).
    Numeric,
}

#[derive(Clone, Copy, Debug)]
pub struct FieldRule {
    pub required: bool,
    pub kind: FieldKind,
}

impl FieldRule {
    pub const fn required(kind: FieldKind) -> Self {
        Self {
            required: true,
            kind,
        }
    }

    pub const fn optional(kind: FieldKind) -> Self {
        Self {
            required: false,
            kind,
        }
    }
}

/// Declarative description of the fields an envelope may carry. Owned by the
/// calling module and passed by reference into validate/extract.
#[derive(Clone, Debug, Default)]
pub struct FieldSchema {
    rules: BTreeMap<&'static str, FieldRule>,
    any_of: Vec<&'static [&'static str]>,
}

impl FieldSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &'static str, rule: FieldRule) -> Self {
        self.rules.insert(name, rule);
        self
    }

    /// At least one field of the group must be present and non-empty.
    pub fn any_of(mut self, group: &'static [&'static str]) -> Self {
        self.any_of.push(group);
        self
    }

    pub fn validate(&self, data: &Envelope) -> Result<(), Violations> {
        let mut violations = Vec::new();
        for (name, rule) in &self.rules {
            match data.get(*name).filter(|value| !value.is_empty()) {
                None if rule.required => {
                    violations.push(format!("missing required field `{name}`"));
                }
                None => {}
                Some(value) => {
                    if rule.kind == FieldKind::Numeric
                        && !value.bytes().all(|byte| byte.is_ascii_digit())
                    {
                        violations.push(format!("field `{name}` is not numeric"));
                    }
                }
            }
        }
        for group in &self.any_of {
            let satisfied = group
                .iter()
                .any(|name| data.get(*name).is_some_and(|value| !value.is_empty()));
            if !satisfied {
                violations.push(format!("one of {} is required", group.join(", ")));
            }
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Violations(violations))
        }
    }

    /// Extracts only the fields this schema names, dropping everything else.
    pub fn extract(&self, data: &Envelope) -> Envelope {
        let mut extracted = Envelope::new();
        let named = self
            .rules
            .keys()
            .copied()
            .chain(self.any_of.iter().flat_map(|group| group.iter().copied()));
        for name in named {
            if let Some(value) = data.get(name).filter(|value| !value.is_empty()) {
                extracted.insert(name.to_string(), value.clone());
            }
        }
        extracted
    }
}

#[derive(Clone, Debug)]
pub struct Violations(Vec<String>);

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("; "))
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
    fn missing_required_field_is_reported_by_name() {
        let schema = FieldSchema::new()
            .field("out_trade_no", FieldRule::required(FieldKind::Text))
            .field("attach", FieldRule::optional(FieldKind::Text));

        let err = schema
            .validate(&envelope(&[("attach", "x")]))
            .unwrap_err();
        assert!(err.to_string().contains("out_trade_no"));
    }

    #[test]
    fn empty_value_does_not_satisfy_a_required_field() {
        let schema = FieldSchema::new().field("body", FieldRule::required(FieldKind::Text));
        assert!(schema.validate(&envelope(&[("body", "")])).is_err());
    }

    #[test]
    fn numeric_rule_rejects_non_digits() {
        let schema = FieldSchema::new().field("total_fee", FieldRule::required(FieldKind::Numeric));
        assert!(schema.validate(&envelope(&[("total_fee", "100")])).is_ok());
        assert!(schema
            .validate(&envelope(&[("total_fee", "1.00")]))
            .is_err());
    }

    #[test]
    fn any_of_group_needs_one_member() {
        let schema = FieldSchema::new().any_of(&["transaction_id", "out_trade_no"]);
        assert!(schema
            .validate(&envelope(&[("out_trade_no", "T100")]))
            .is_ok());
        assert!(schema.validate(&envelope(&[("other", "x")])).is_err());
    }

    #[test]
    fn extract_keeps_only_named_fields() {
        let schema = FieldSchema::new().field("foo", FieldRule::required(FieldKind::Text));
        let extracted = schema.extract(&envelope(&[("foo", "bar"), ("extra", "x")]));
        assert_eq!(extracted, envelope(&[("foo", "bar")]));
    }

    #[test]
    fn extract_includes_any_of_members() {
        let schema = FieldSchema::new().any_of(&["transaction_id", "out_trade_no"]);
        let extracted = schema.extract(&envelope(&[("transaction_id", "42"), ("noise", "n")]));
        assert_eq!(extracted, envelope(&[("transaction_id", "42")]));
    }
}
