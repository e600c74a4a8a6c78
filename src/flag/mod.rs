//! Flag definitions: an ordered rule list plus a default, evaluated with
//! priority and override arbitration.


use std::collections::HashMap;

use mongodb::bson;
use mongodb::bson::Bson;
use mongodb::bson::Document;
use serde::Deserialize;
use serde::Serialize;

use crate::context::bson_null;
use crate::context::EvaluationContext;
use crate::resolution::ResolutionDetail;
use crate::rule::ConcreteRule;
use crate::rule::Rule;

/// The stored record describing how to evaluate one feature flag. Rules are
/// kept in author order; `flag_name` is unique within a store and cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    pub flag_name: String,

    #[serde(default = "bson_null")]
    pub default_value: Bson,
    #[serde(default)]
    pub default_variant: String,

    #[serde(default)]
    pub rules: Vec<ConcreteRule>,
}

impl Definition {
    /// Walks every rule and returns the winner's value and detail, or the
    /// default when nothing matches.
    ///
    /// Arbitration: higher priority always wins; at equal priority an
    /// override beats a non-override; among equals with the same
    /// override-ness the earliest rule in author order stands.
    pub fn evaluate(&self, ctx: &EvaluationContext) -> (Bson, ResolutionDetail) {
        let mut winner: Option<&ConcreteRule> = None;
        let mut winner_priority = 0;
        let mut winner_override = false;

        for rule in &self.rules {
            let (is_override, priority) = (rule.is_override(), rule.priority());
            if winner.is_some() {
                // Cannot beat the current winner: don't bother matching.
                if priority < winner_priority {
                    continue;
                }
                if priority == winner_priority && (winner_override || !is_override) {
                    continue;
                }
            }
            if rule.matches(ctx) {
                winner = Some(rule);
                winner_priority = priority;
                winner_override = is_override;
            }
        }

        match winner {
            Some(rule) => (rule.value().clone(), ResolutionDetail::matched(rule.variant())),
            None => (
                self.default_value.clone(),
                ResolutionDetail::unmatched(self.default_variant.clone()),
            ),
        }
    }
}

/// Interprets an aggregated single-layout document (`flagName -> definition`
/// fields under one `_id`) as a definition map, discarding the `_id`.
pub fn definitions_from_document(
    mut document: Document,
) -> std::result::Result<HashMap<String, Definition>, bson::de::Error> {
    document.remove("_id");
    let mut definitions = HashMap::with_capacity(document.len());
    for (name, value) in document {
        definitions.insert(name, bson::from_bson(value)?);
    }
    Ok(definitions)
}
