//! Control rules: boolean composition of child rules plus the always-on
//! override. Composites derive their variant from their children.

use mongodb::bson::Bson;
use serde::Deserialize;
use serde::Serialize;

use super::ConcreteRule;
use super::Rule;
use crate::context::bson_null;
use crate::context::EvaluationContext;

/// Matches if ALL children match (short-circuit); variant `&(v1+v2+...)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AndRule {
    pub rules: Vec<ConcreteRule>,

    #[serde(default)]
    pub priority: i32,
    #[serde(default = "bson_null")]
    pub value_data: Bson,
}

impl Default for AndRule {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            priority: 0,
            value_data: Bson::Null,
        }
    }
}

impl Rule for AndRule {
    fn matches(&self, ctx: &EvaluationContext) -> bool {
        self.rules.iter().all(|rule| rule.matches(ctx))
    }

    fn value(&self) -> &Bson {
        &self.value_data
    }

    fn variant(&self) -> String {
        format!("&({})", joined_variants(&self.rules))
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// Matches if ANY child matches (short-circuit); variant `|(v1+v2+...)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrRule {
    pub rules: Vec<ConcreteRule>,

    #[serde(default)]
    pub priority: i32,
    #[serde(default = "bson_null")]
    pub value_data: Bson,
}

impl Default for OrRule {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            priority: 0,
            value_data: Bson::Null,
        }
    }
}

impl Rule for OrRule {
    fn matches(&self, ctx: &EvaluationContext) -> bool {
        self.rules.iter().any(|rule| rule.matches(ctx))
    }

    fn value(&self) -> &Bson {
        &self.value_data
    }

    fn variant(&self) -> String {
        format!("|({})", joined_variants(&self.rules))
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// Inverts a single child; variant `!(v)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotRule {
    pub rule: Box<ConcreteRule>,

    #[serde(default)]
    pub priority: i32,
    #[serde(default = "bson_null")]
    pub value_data: Bson,
}

impl Rule for NotRule {
    fn matches(&self, ctx: &EvaluationContext) -> bool {
        !self.rule.matches(ctx)
    }

    fn value(&self) -> &Bson {
        &self.value_data
    }

    fn variant(&self) -> String {
        format!("!({})", self.rule.variant())
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// Always matches. Among rules of equal priority an override beats every
/// non-override during arbitration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideRule {
    #[serde(default)]
    pub variant_id: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "bson_null")]
    pub value_data: Bson,
}

impl Default for OverrideRule {
    fn default() -> Self {
        Self {
            variant_id: String::new(),
            priority: 0,
            value_data: Bson::Null,
        }
    }
}

impl Rule for OverrideRule {
    fn matches(&self, _ctx: &EvaluationContext) -> bool {
        true
    }

    fn value(&self) -> &Bson {
        &self.value_data
    }

    fn variant(&self) -> String {
        self.variant_id.clone()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

fn joined_variants(rules: &[ConcreteRule]) -> String {
    rules
        .iter()
        .map(Rule::variant)
        .collect::<Vec<_>>()
        .join("+")
}
