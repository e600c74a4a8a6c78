//! The tagged rule representation stored on the wire.

use mongodb::bson::Bson;
use serde::Deserialize;
use serde::Serialize;

use super::AndRule;
use super::ContainsRule;
use super::CronRule;
use super::DateTimeRule;
use super::ExactMatchRule;
use super::ExistsRule;
use super::FractionalRule;
use super::GeoFenceRule;
use super::InListRule;
use super::IpRangeRule;
use super::NotRule;
use super::OrRule;
use super::OverrideRule;
use super::PrefixRule;
use super::RangeRule;
use super::RegexRule;
use super::Rule;
use super::SemVerRule;
use super::SuffixRule;
use crate::context::EvaluationContext;

/// Exactly one rule variant. Externally tagged, so a serialized rule is a
/// document with a single camelCased variant field (`{"existsRule": {...}}`),
/// interchangeable with documents written by other implementations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConcreteRule {
    ExactMatchRule(ExactMatchRule),
    RegexRule(RegexRule),
    ExistsRule(ExistsRule),
    FractionalRule(FractionalRule),
    RangeRule(RangeRule),
    InListRule(InListRule),
    PrefixRule(PrefixRule),
    SuffixRule(SuffixRule),
    ContainsRule(ContainsRule),
    #[serde(rename = "ipRangeRule")]
    IpRangeRule(IpRangeRule),
    GeoFenceRule(GeoFenceRule),
    DateTimeRule(DateTimeRule),
    SemVerRule(SemVerRule),
    CronRule(CronRule),

    // Control rules
    AndRule(AndRule),
    OrRule(OrRule),
    NotRule(NotRule),
    OverrideRule(OverrideRule),
}

impl ConcreteRule {
    fn inner(&self) -> &dyn Rule {
        match self {
            ConcreteRule::ExactMatchRule(rule) => rule,
            ConcreteRule::RegexRule(rule) => rule,
            ConcreteRule::ExistsRule(rule) => rule,
            ConcreteRule::FractionalRule(rule) => rule,
            ConcreteRule::RangeRule(rule) => rule,
            ConcreteRule::InListRule(rule) => rule,
            ConcreteRule::PrefixRule(rule) => rule,
            ConcreteRule::SuffixRule(rule) => rule,
            ConcreteRule::ContainsRule(rule) => rule,
            ConcreteRule::IpRangeRule(rule) => rule,
            ConcreteRule::GeoFenceRule(rule) => rule,
            ConcreteRule::DateTimeRule(rule) => rule,
            ConcreteRule::SemVerRule(rule) => rule,
            ConcreteRule::CronRule(rule) => rule,
            ConcreteRule::AndRule(rule) => rule,
            ConcreteRule::OrRule(rule) => rule,
            ConcreteRule::NotRule(rule) => rule,
            ConcreteRule::OverrideRule(rule) => rule,
        }
    }

    /// Whether this variant is the always-matching override.
    pub fn is_override(&self) -> bool {
        matches!(self, ConcreteRule::OverrideRule(_))
    }
}

impl Rule for ConcreteRule {
    fn matches(&self, ctx: &EvaluationContext) -> bool {
        self.inner().matches(ctx)
    }

    fn value(&self) -> &Bson {
        self.inner().value()
    }

    fn variant(&self) -> String {
        self.inner().variant()
    }

    fn priority(&self) -> i32 {
        self.inner().priority()
    }
}
