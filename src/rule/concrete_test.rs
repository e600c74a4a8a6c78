//! Unit tests for the tagged rule: dispatch, override detection and the
//! wire format (one camelCased variant field per document).

#[cfg(test)]
mod tests {
    use mongodb::bson;
    use mongodb::bson::doc;
    use mongodb::bson::Bson;

    use super::super::*;
    use crate::EvaluationContext;

    fn ctx(entries: &[(&str, Bson)]) -> EvaluationContext {
        entries
            .iter()
            .map(|(key, value)| ((*key).to_owned(), value.clone()))
            .collect()
    }

    #[test]
    fn test_dispatch_to_wrapped_rule() {
        let rule = ConcreteRule::ExactMatchRule(ExactMatchRule {
            key: "user_id".to_owned(),
            key_value: "12345".to_owned(),
            variant_id: "hit".to_owned(),
            priority: 10,
            value_data: "on".into(),
        });

        assert!(rule.matches(&ctx(&[("user_id", "12345".into())])));
        assert_eq!(rule.value(), &Bson::String("on".to_owned()));
        assert_eq!(rule.variant(), "hit");
        assert_eq!(rule.priority(), 10);
        assert!(!rule.is_override());
    }

    #[test]
    fn test_is_override_only_for_override_rule() {
        let standard = ConcreteRule::ExistsRule(ExistsRule {
            key: "k".to_owned(),
            ..Default::default()
        });
        let control = ConcreteRule::NotRule(NotRule {
            rule: Box::new(standard.clone()),
            priority: 0,
            value_data: Bson::Null,
        });
        let override_rule = ConcreteRule::OverrideRule(OverrideRule::default());

        assert!(!standard.is_override());
        assert!(!control.is_override());
        assert!(override_rule.is_override());
    }

    #[test]
    fn test_serializes_to_single_variant_field() {
        let rule = ConcreteRule::ExistsRule(ExistsRule {
            key: "user_id".to_owned(),
            variant_id: "exists".to_owned(),
            priority: 5,
            value_data: "on".into(),
        });

        let document = bson::to_document(&rule).expect("serializing rule");

        assert_eq!(document.len(), 1);
        assert!(document.contains_key("existsRule"));
        let inner = document.get_document("existsRule").expect("variant body");
        assert_eq!(inner.get_str("key"), Ok("user_id"));
        assert_eq!(inner.get_str("variantId"), Ok("exists"));
        assert_eq!(inner.get_i32("priority"), Ok(5));
    }

    #[test]
    fn test_variant_field_names_are_camel_cased() {
        let cases = [
            (
                ConcreteRule::IpRangeRule(IpRangeRule::default()),
                "ipRangeRule",
            ),
            (
                ConcreteRule::GeoFenceRule(GeoFenceRule::default()),
                "geoFenceRule",
            ),
            (
                ConcreteRule::SemVerRule(SemVerRule::default()),
                "semVerRule",
            ),
            (
                ConcreteRule::DateTimeRule(DateTimeRule::default()),
                "dateTimeRule",
            ),
            (
                ConcreteRule::OverrideRule(OverrideRule::default()),
                "overrideRule",
            ),
        ];

        for (rule, field) in cases {
            let document = bson::to_document(&rule).expect("serializing rule");
            assert_eq!(document.len(), 1, "{field}");
            assert!(document.contains_key(field), "missing {field}");
        }
    }

    #[test]
    fn test_deserializes_from_wire_document() {
        let document = doc! {
            "regexRule": {
                "key": "email",
                "pattern": ".*@corp\\.example$",
                "variantId": "corp",
                "priority": 3,
                "valueData": true,
            },
        };

        let rule: ConcreteRule = bson::from_document(document).expect("deserializing rule");

        assert!(rule.matches(&ctx(&[("email", "dev@corp.example".into())])));
        assert_eq!(rule.variant(), "corp");
        assert_eq!(rule.priority(), 3);
        assert_eq!(rule.value(), &Bson::Boolean(true));
    }

    #[test]
    fn test_round_trip_preserves_matching() {
        let original = ConcreteRule::AndRule(AndRule {
            rules: vec![
                ConcreteRule::ExistsRule(ExistsRule {
                    key: "a".to_owned(),
                    variant_id: "va".to_owned(),
                    ..Default::default()
                }),
                ConcreteRule::FractionalRule(FractionalRule {
                    key: "a".to_owned(),
                    percentage: 100.0,
                    variant_id: "vf".to_owned(),
                    ..Default::default()
                }),
            ],
            priority: 2,
            value_data: "both".into(),
        });

        let document = bson::to_document(&original).expect("serializing rule");
        let decoded: ConcreteRule = bson::from_document(document).expect("deserializing rule");

        let subject = ctx(&[("a", "x".into())]);
        assert_eq!(decoded.matches(&subject), original.matches(&subject));
        assert_eq!(decoded.variant(), original.variant());
        assert_eq!(decoded.priority(), original.priority());
        assert_eq!(decoded.value(), original.value());
    }

    #[test]
    fn test_missing_defaults_fill_in() {
        let document = doc! {
            "existsRule": { "key": "user_id" },
        };

        let rule: ConcreteRule = bson::from_document(document).expect("deserializing rule");

        assert_eq!(rule.priority(), 0);
        assert_eq!(rule.variant(), "");
        assert_eq!(rule.value(), &Bson::Null);
        assert!(!rule.is_override());
    }
}
