//! Unit tests for rule composition and derived variant naming.

#[cfg(test)]
mod tests {
    use mongodb::bson::Bson;

    use super::super::*;
    use crate::EvaluationContext;

    fn ctx(entries: &[(&str, Bson)]) -> EvaluationContext {
        entries
            .iter()
            .map(|(key, value)| ((*key).to_owned(), value.clone()))
            .collect()
    }

    fn exists(key: &str, variant_id: &str) -> ConcreteRule {
        ConcreteRule::ExistsRule(ExistsRule {
            key: key.to_owned(),
            variant_id: variant_id.to_owned(),
            ..Default::default()
        })
    }

    #[test]
    fn test_and_requires_all_children() {
        let rule = AndRule {
            rules: vec![exists("a", "va"), exists("b", "vb")],
            value_data: "ab".into(),
            ..Default::default()
        };

        assert!(rule.matches(&ctx(&[("a", 1.into()), ("b", 2.into())])));
        assert!(!rule.matches(&ctx(&[("a", 1.into())])));
        assert!(!rule.matches(&ctx(&[])));
    }

    #[test]
    fn test_and_variant_naming() {
        let rule = AndRule {
            rules: vec![exists("a", "va"), exists("b", "vb")],
            ..Default::default()
        };

        assert_eq!(rule.variant(), "&(va+vb)");
    }

    #[test]
    fn test_or_requires_any_child() {
        let rule = OrRule {
            rules: vec![exists("a", "va"), exists("b", "vb")],
            ..Default::default()
        };

        assert!(rule.matches(&ctx(&[("a", 1.into())])));
        assert!(rule.matches(&ctx(&[("b", 2.into())])));
        assert!(!rule.matches(&ctx(&[("c", 3.into())])));
        assert_eq!(rule.variant(), "|(va+vb)");
    }

    #[test]
    fn test_not_inverts_child() {
        let rule = NotRule {
            rule: Box::new(exists("banned", "vb")),
            priority: 0,
            value_data: Bson::Null,
        };

        // A missing key in the child means the negation holds.
        assert!(rule.matches(&ctx(&[])));
        assert!(!rule.matches(&ctx(&[("banned", 1.into())])));
        assert_eq!(rule.variant(), "!(vb)");
    }

    #[test]
    fn test_nested_composition_variant() {
        let rule = OrRule {
            rules: vec![
                ConcreteRule::AndRule(AndRule {
                    rules: vec![exists("a", "va"), exists("b", "vb")],
                    ..Default::default()
                }),
                ConcreteRule::NotRule(NotRule {
                    rule: Box::new(exists("c", "vc")),
                    priority: 0,
                    value_data: Bson::Null,
                }),
            ],
            ..Default::default()
        };

        assert_eq!(rule.variant(), "|(&(va+vb)+!(vc))");
        // The NOT branch holds whenever `c` is absent.
        assert!(rule.matches(&ctx(&[])));
        assert!(!rule.matches(&ctx(&[("c", 1.into())])));
        assert!(rule.matches(&ctx(&[("a", 1.into()), ("b", 2.into()), ("c", 3.into())])));
    }

    #[test]
    fn test_override_always_matches() {
        let rule = OverrideRule {
            variant_id: "forced".to_owned(),
            priority: 15,
            value_data: "ovr".into(),
        };

        assert!(rule.matches(&ctx(&[])));
        assert!(rule.matches(&ctx(&[("anything", 1.into())])));
        assert_eq!(rule.variant(), "forced");
        assert_eq!(rule.priority(), 15);
    }

    #[test]
    fn test_empty_composites() {
        // Vacuous truth for AND, vacuous falsity for OR.
        let and = AndRule {
            ..Default::default()
        };
        let or = OrRule {
            ..Default::default()
        };

        assert!(and.matches(&ctx(&[])));
        assert!(!or.matches(&ctx(&[])));
        assert_eq!(and.variant(), "&()");
        assert_eq!(or.variant(), "|()");
    }
}
