//! Targeting rules: the closed set of predicates a flag definition can
//! carry, their composition, and the tagged wire representation.
//!
//! A stored rule document has exactly one variant field present
//! (`exactMatchRule`, `regexRule`, ...); [`ConcreteRule`] models that as an
//! externally tagged enum so serialization and the sum type coincide.
//! Compiled artifacts (regex, cron schedule, semver constraint, parsed
//! CIDR lists) are built lazily on first match and cached in the rule
//! instance; they are never serialized.

mod concrete;
mod control;
mod predicate;

pub use concrete::ConcreteRule;
pub use control::AndRule;
pub use control::NotRule;
pub use control::OrRule;
pub use control::OverrideRule;
pub use predicate::ContainsRule;
pub use predicate::CronRule;
pub use predicate::DateTimeRule;
pub use predicate::ExactMatchRule;
pub use predicate::ExistsRule;
pub use predicate::FractionalRule;
pub use predicate::GeoFenceRule;
pub use predicate::InListRule;
pub use predicate::IpRangeRule;
pub use predicate::PrefixRule;
pub use predicate::RangeRule;
pub use predicate::RegexRule;
pub use predicate::SemVerRule;
pub use predicate::SuffixRule;

#[cfg(test)]
mod concrete_test;
#[cfg(test)]
mod control_test;
#[cfg(test)]
mod predicate_test;

use mongodb::bson::Bson;

use crate::context::EvaluationContext;

/// Uniform surface every rule variant implements.
pub trait Rule {
    /// Whether the rule fires for the given context. Pure: depends only on
    /// the rule's parameters and the context.
    fn matches(&self, ctx: &EvaluationContext) -> bool;

    /// Value returned when the rule wins arbitration.
    fn value(&self) -> &Bson;

    /// Variant identifier reported in the resolution detail.
    fn variant(&self) -> String;

    /// Rules with higher priority win arbitration; ties break to overrides,
    /// then to author order.
    fn priority(&self) -> i32;
}
