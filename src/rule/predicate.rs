//! Leaf predicates. Each rule inspects a single context key (GeoFence uses
//! two) and never errors: missing keys, type mismatches and invalid rule
//! configuration all evaluate to "does not match".

use std::net::IpAddr;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use cron::Schedule;
use ipnet::IpNet;
use mongodb::bson::Bson;
use regex::Regex;
use semver::Version;
use semver::VersionReq;
use serde::Deserialize;
use serde::Serialize;
use tracing::error;
use tracing::warn;

use super::Rule;
use crate::context::bson_null;
use crate::context::EvaluationContext;

/// Fires if `ctx[key]` equals the configured string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactMatchRule {
    pub key: String,
    pub key_value: String,

    #[serde(default)]
    pub variant_id: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "bson_null")]
    pub value_data: Bson,
}

impl Default for ExactMatchRule {
    fn default() -> Self {
        Self {
            key: String::new(),
            key_value: String::new(),
            variant_id: String::new(),
            priority: 0,
            value_data: Bson::Null,
        }
    }
}

impl Rule for ExactMatchRule {
    fn matches(&self, ctx: &EvaluationContext) -> bool {
        ctx.get(&self.key)
            .is_some_and(|v| matches!(v, Bson::String(s) if *s == self.key_value))
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

/// Fires if `ctx[key]` is a string matching the pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegexRule {
    pub key: String,
    pub pattern: String,

    #[serde(default)]
    pub variant_id: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "bson_null")]
    pub value_data: Bson,

    // Compiled on first match; never serialized.
    #[serde(skip)]
    pub(crate) compiled: OnceLock<Option<Regex>>,
}

impl Default for RegexRule {
    fn default() -> Self {
        Self {
            key: String::new(),
            pattern: String::new(),
            variant_id: String::new(),
            priority: 0,
            value_data: Bson::Null,
            compiled: OnceLock::new(),
        }
    }
}

impl RegexRule {
    fn regex(&self) -> Option<&Regex> {
        self.compiled
            .get_or_init(|| match Regex::new(&self.pattern) {
                Ok(regex) => Some(regex),
                Err(err) => {
                    error!(key = %self.key, pattern = %self.pattern, %err, "invalid regex pattern");
                    None
                }
            })
            .as_ref()
    }
}

impl Rule for RegexRule {
    fn matches(&self, ctx: &EvaluationContext) -> bool {
        let Some(Bson::String(value)) = ctx.get(&self.key) else {
            return false;
        };
        self.regex().is_some_and(|regex| regex.is_match(value))
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

/// Fires if the context contains the key at all (the value may be null).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistsRule {
    pub key: String,

    #[serde(default)]
    pub variant_id: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "bson_null")]
    pub value_data: Bson,
}

impl Default for ExistsRule {
    fn default() -> Self {
        Self {
            key: String::new(),
            variant_id: String::new(),
            priority: 0,
            value_data: Bson::Null,
        }
    }
}

impl Rule for ExistsRule {
    fn matches(&self, ctx: &EvaluationContext) -> bool {
        ctx.contains_key(&self.key)
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

/// Fires for a percentage of subjects, deterministically: the FNV-1a 32-bit
/// hash of key plus the canonical string form of the value picks a bucket in
/// [0, 100), and the rule matches when `bucket < percentage`. Same key and
/// value always land in the same bucket, in every process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FractionalRule {
    pub key: String,
    /// In [0.0, 100.0]; 0 never matches, 100 always matches.
    pub percentage: f64,

    #[serde(default)]
    pub variant_id: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "bson_null")]
    pub value_data: Bson,
}

impl Default for FractionalRule {
    fn default() -> Self {
        Self {
            key: String::new(),
            percentage: 0.0,
            variant_id: String::new(),
            priority: 0,
            value_data: Bson::Null,
        }
    }
}

impl Rule for FractionalRule {
    fn matches(&self, ctx: &EvaluationContext) -> bool {
        let Some(value) = ctx.get(&self.key) else {
            return false;
        };
        f64::from(bucket(&self.key, value)) < self.percentage
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

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 16_777_619;

fn bucket(key: &str, value: &Bson) -> u32 {
    let repr = canonical_repr(value);
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in key.as_bytes().iter().chain(repr.as_bytes()) {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash % 100
}

/// Canonical string form hashed for bucketing. Stability across processes is
/// the contract; changing this reshuffles every bucket.
fn canonical_repr(value: &Bson) -> String {
    match value {
        Bson::String(s) => s.clone(),
        Bson::Int32(v) => v.to_string(),
        Bson::Int64(v) => v.to_string(),
        Bson::Double(v) => v.to_string(),
        Bson::Boolean(v) => v.to_string(),
        other => other.to_string(),
    }
}

/// Fires if `ctx[key]` is a finite number inside the interval; the two
/// exclusivity flags control each endpoint independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeRule {
    pub key: String,
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub exclusive_min: bool,
    #[serde(default)]
    pub exclusive_max: bool,

    #[serde(default)]
    pub variant_id: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "bson_null")]
    pub value_data: Bson,
}

impl Default for RangeRule {
    fn default() -> Self {
        Self {
            key: String::new(),
            min: 0.0,
            max: 0.0,
            exclusive_min: false,
            exclusive_max: false,
            variant_id: String::new(),
            priority: 0,
            value_data: Bson::Null,
        }
    }
}

impl Rule for RangeRule {
    fn matches(&self, ctx: &EvaluationContext) -> bool {
        let Some(value) = ctx.get(&self.key).and_then(numeric) else {
            return false;
        };
        if !value.is_finite() {
            return false;
        }
        if self.exclusive_min {
            if value <= self.min {
                return false;
            }
        } else if value < self.min {
            return false;
        }
        if self.exclusive_max {
            value < self.max
        } else {
            value <= self.max
        }
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

fn numeric(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

/// Fires if `ctx[key]` deep-equals any listed item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InListRule {
    pub key: String,
    pub items: Vec<Bson>,

    #[serde(default)]
    pub variant_id: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "bson_null")]
    pub value_data: Bson,
}

impl Default for InListRule {
    fn default() -> Self {
        Self {
            key: String::new(),
            items: Vec::new(),
            variant_id: String::new(),
            priority: 0,
            value_data: Bson::Null,
        }
    }
}

impl Rule for InListRule {
    fn matches(&self, ctx: &EvaluationContext) -> bool {
        let Some(value) = ctx.get(&self.key) else {
            return false;
        };
        self.items.iter().any(|item| item == value)
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

/// Fires if `ctx[key]` is a string with the given prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefixRule {
    pub key: String,
    pub prefix: String,

    #[serde(default)]
    pub variant_id: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "bson_null")]
    pub value_data: Bson,
}

impl Default for PrefixRule {
    fn default() -> Self {
        Self {
            key: String::new(),
            prefix: String::new(),
            variant_id: String::new(),
            priority: 0,
            value_data: Bson::Null,
        }
    }
}

impl Rule for PrefixRule {
    fn matches(&self, ctx: &EvaluationContext) -> bool {
        ctx.get(&self.key)
            .is_some_and(|v| matches!(v, Bson::String(s) if s.starts_with(&self.prefix)))
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

/// Fires if `ctx[key]` is a string with the given suffix.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuffixRule {
    pub key: String,
    pub suffix: String,

    #[serde(default)]
    pub variant_id: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "bson_null")]
    pub value_data: Bson,
}

impl Default for SuffixRule {
    fn default() -> Self {
        Self {
            key: String::new(),
            suffix: String::new(),
            variant_id: String::new(),
            priority: 0,
            value_data: Bson::Null,
        }
    }
}

impl Rule for SuffixRule {
    fn matches(&self, ctx: &EvaluationContext) -> bool {
        ctx.get(&self.key)
            .is_some_and(|v| matches!(v, Bson::String(s) if s.ends_with(&self.suffix)))
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

/// Fires if `ctx[key]` is a string containing the given substring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainsRule {
    pub key: String,
    pub substring: String,

    #[serde(default)]
    pub variant_id: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "bson_null")]
    pub value_data: Bson,
}

impl Default for ContainsRule {
    fn default() -> Self {
        Self {
            key: String::new(),
            substring: String::new(),
            variant_id: String::new(),
            priority: 0,
            value_data: Bson::Null,
        }
    }
}

impl Rule for ContainsRule {
    fn matches(&self, ctx: &EvaluationContext) -> bool {
        ctx.get(&self.key)
            .is_some_and(|v| matches!(v, Bson::String(s) if s.contains(&self.substring)))
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

/// Fires if `ctx[key]` parses as an IP address contained in any listed CIDR.
/// Unparseable CIDR entries are skipped (logged once per rule instance).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpRangeRule {
    pub key: String,
    pub cidrs: Vec<String>,

    #[serde(default)]
    pub variant_id: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "bson_null")]
    pub value_data: Bson,

    #[serde(skip)]
    pub(crate) networks: OnceLock<Vec<IpNet>>,
}

impl Default for IpRangeRule {
    fn default() -> Self {
        Self {
            key: String::new(),
            cidrs: Vec::new(),
            variant_id: String::new(),
            priority: 0,
            value_data: Bson::Null,
            networks: OnceLock::new(),
        }
    }
}

impl IpRangeRule {
    fn networks(&self) -> &[IpNet] {
        self.networks.get_or_init(|| {
            self.cidrs
                .iter()
                .filter_map(|cidr| match cidr.parse::<IpNet>() {
                    Ok(net) => Some(net),
                    Err(err) => {
                        warn!(key = %self.key, %cidr, %err, "skipping unparseable CIDR");
                        None
                    }
                })
                .collect()
        })
    }
}

impl Rule for IpRangeRule {
    fn matches(&self, ctx: &EvaluationContext) -> bool {
        let Some(Bson::String(raw)) = ctx.get(&self.key) else {
            return false;
        };
        let Ok(ip) = raw.parse::<IpAddr>() else {
            return false;
        };
        self.networks().iter().any(|net| net.contains(&ip))
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

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Fires if the coordinates under `latKey`/`lngKey` lie within
/// `radiusMeters` of the center, by haversine distance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoFenceRule {
    pub lat_key: String,
    pub lng_key: String,
    pub lat_center: f64,
    pub lng_center: f64,
    pub radius_meters: f64,

    #[serde(default)]
    pub variant_id: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "bson_null")]
    pub value_data: Bson,
}

impl Default for GeoFenceRule {
    fn default() -> Self {
        Self {
            lat_key: String::new(),
            lng_key: String::new(),
            lat_center: 0.0,
            lng_center: 0.0,
            radius_meters: 0.0,
            variant_id: String::new(),
            priority: 0,
            value_data: Bson::Null,
        }
    }
}

impl Rule for GeoFenceRule {
    fn matches(&self, ctx: &EvaluationContext) -> bool {
        let (Some(Bson::Double(lat)), Some(Bson::Double(lng))) =
            (ctx.get(&self.lat_key), ctx.get(&self.lng_key))
        else {
            return false;
        };
        haversine_meters(*lat, *lng, self.lat_center, self.lng_center) <= self.radius_meters
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

fn haversine_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    EARTH_RADIUS_METERS * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Fires if `ctx[key]` is a timestamp strictly between `after` and `before`.
/// Both bounds are exclusive; equal bounds match nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateTimeRule {
    pub key: String,
    pub after: mongodb::bson::DateTime,
    pub before: mongodb::bson::DateTime,

    #[serde(default)]
    pub variant_id: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "bson_null")]
    pub value_data: Bson,
}

impl Default for DateTimeRule {
    fn default() -> Self {
        Self {
            key: String::new(),
            after: mongodb::bson::DateTime::from_millis(0),
            before: mongodb::bson::DateTime::from_millis(0),
            variant_id: String::new(),
            priority: 0,
            value_data: Bson::Null,
        }
    }
}

impl Rule for DateTimeRule {
    fn matches(&self, ctx: &EvaluationContext) -> bool {
        let Some(Bson::DateTime(t)) = ctx.get(&self.key) else {
            return false;
        };
        *t > self.after && *t < self.before
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

/// Fires if `ctx[key]` parses as a semantic version satisfying the
/// constraint expression (e.g. `>=1.2.3, <2`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemVerRule {
    pub key: String,
    pub constraint: String,

    #[serde(default)]
    pub variant_id: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "bson_null")]
    pub value_data: Bson,

    #[serde(skip)]
    pub(crate) requirement: OnceLock<Option<VersionReq>>,
}

impl Default for SemVerRule {
    fn default() -> Self {
        Self {
            key: String::new(),
            constraint: String::new(),
            variant_id: String::new(),
            priority: 0,
            value_data: Bson::Null,
            requirement: OnceLock::new(),
        }
    }
}

impl SemVerRule {
    fn requirement(&self) -> Option<&VersionReq> {
        self.requirement
            .get_or_init(|| match VersionReq::parse(&self.constraint) {
                Ok(req) => Some(req),
                Err(err) => {
                    error!(key = %self.key, constraint = %self.constraint, %err, "invalid semver constraint");
                    None
                }
            })
            .as_ref()
    }
}

impl Rule for SemVerRule {
    fn matches(&self, ctx: &EvaluationContext) -> bool {
        let Some(Bson::String(raw)) = ctx.get(&self.key) else {
            return false;
        };
        let Ok(version) = Version::parse(raw) else {
            return false;
        };
        self.requirement().is_some_and(|req| req.matches(&version))
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

/// Fires inside recurring time windows: a window opens at every firing of
/// the 5-field cron spec and stays open for `durationSeconds`. The probed
/// instant is `ctx[key]`, or the current wall clock when `key` is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronRule {
    #[serde(default)]
    pub key: String,
    pub cron_spec: String,
    pub duration_seconds: i64,

    #[serde(default)]
    pub variant_id: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "bson_null")]
    pub value_data: Bson,

    #[serde(skip)]
    pub(crate) schedule: OnceLock<Option<Schedule>>,
}

impl Default for CronRule {
    fn default() -> Self {
        Self {
            key: String::new(),
            cron_spec: String::new(),
            duration_seconds: 0,
            variant_id: String::new(),
            priority: 0,
            value_data: Bson::Null,
            schedule: OnceLock::new(),
        }
    }
}

impl CronRule {
    fn schedule(&self) -> Option<&Schedule> {
        self.schedule
            .get_or_init(|| {
                // The cron crate wants a seconds field; specs here are the
                // classic 5-field form (minute through day-of-week).
                let spec = format!("0 {}", self.cron_spec.trim());
                match Schedule::from_str(&spec) {
                    Ok(schedule) => Some(schedule),
                    Err(err) => {
                        error!(cron_spec = %self.cron_spec, %err, "invalid cron spec");
                        None
                    }
                }
            })
            .as_ref()
    }

    fn probe_instant(&self, ctx: &EvaluationContext) -> Option<DateTime<Utc>> {
        if self.key.is_empty() {
            return Some(Utc::now());
        }
        match ctx.get(&self.key) {
            Some(Bson::DateTime(dt)) => DateTime::from_timestamp_millis(dt.timestamp_millis()),
            _ => None,
        }
    }
}

impl Rule for CronRule {
    fn matches(&self, ctx: &EvaluationContext) -> bool {
        let Some(t) = self.probe_instant(ctx) else {
            return false;
        };
        let Some(schedule) = self.schedule() else {
            return false;
        };
        // Inside a window iff some firing happened in [t - duration, t].
        // `after` is exclusive, so step back one second to make the window
        // start inclusive.
        let start = t - Duration::seconds(self.duration_seconds) - Duration::seconds(1);
        schedule
            .after(&start)
            .next()
            .is_some_and(|firing| firing <= t)
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
