//! Unit tests for the leaf predicates: matching semantics, boundary
//! behavior, type-mismatch tolerance and invalid-configuration handling.

#[cfg(test)]
mod tests {
    use mongodb::bson::Bson;
    use tracing_test::traced_test;

    use super::super::*;
    use crate::EvaluationContext;

    fn ctx(entries: &[(&str, Bson)]) -> EvaluationContext {
        entries
            .iter()
            .map(|(key, value)| ((*key).to_owned(), value.clone()))
            .collect()
    }

    fn timestamp(millis: i64) -> Bson {
        Bson::DateTime(mongodb::bson::DateTime::from_millis(millis))
    }

    #[test]
    fn test_exact_match() {
        let rule = ExactMatchRule {
            key: "user_id".to_owned(),
            key_value: "12345".to_owned(),
            ..Default::default()
        };

        assert!(rule.matches(&ctx(&[("user_id", "12345".into())])));
        assert!(!rule.matches(&ctx(&[("user_id", "54321".into())])));
        assert!(!rule.matches(&ctx(&[("other", "12345".into())])));
        assert!(!rule.matches(&ctx(&[("user_id", Bson::Int32(12345))])));
        assert!(!rule.matches(&ctx(&[])));
    }

    #[test]
    fn test_regex() {
        let rule = RegexRule {
            key: "email".to_owned(),
            pattern: r".*@corp\.example$".to_owned(),
            ..Default::default()
        };

        assert!(rule.matches(&ctx(&[("email", "dev@corp.example".into())])));
        assert!(!rule.matches(&ctx(&[("email", "dev@elsewhere.example".into())])));
        assert!(!rule.matches(&ctx(&[("email", Bson::Int32(7))])));
        assert!(!rule.matches(&ctx(&[])));
    }

    #[traced_test]
    #[test]
    fn test_regex_invalid_pattern_never_matches() {
        let rule = RegexRule {
            key: "email".to_owned(),
            pattern: "(unclosed".to_owned(),
            ..Default::default()
        };

        assert!(!rule.matches(&ctx(&[("email", "dev@corp.example".into())])));
        assert!(!rule.matches(&ctx(&[("email", "dev@corp.example".into())])));
        assert!(logs_contain("invalid regex pattern"));
    }

    #[test]
    fn test_exists() {
        let rule = ExistsRule {
            key: "user_id".to_owned(),
            ..Default::default()
        };

        assert!(rule.matches(&ctx(&[("user_id", "x".into())])));
        // Presence is all that counts; a null value still matches.
        assert!(rule.matches(&ctx(&[("user_id", Bson::Null)])));
        assert!(!rule.matches(&ctx(&[("other", "x".into())])));
    }

    #[test]
    fn test_fractional_bounds() {
        let never = FractionalRule {
            key: "user_id".to_owned(),
            percentage: 0.0,
            ..Default::default()
        };
        let always = FractionalRule {
            key: "user_id".to_owned(),
            percentage: 100.0,
            ..Default::default()
        };

        for i in 0..100_000 {
            let subject = ctx(&[("user_id", format!("user-{i}").into())]);
            assert!(!never.matches(&subject));
            assert!(always.matches(&subject));
        }
    }

    #[test]
    fn test_fractional_distribution_near_half() {
        let rule = FractionalRule {
            key: "user_id".to_owned(),
            percentage: 50.0,
            ..Default::default()
        };

        let hits = (0..100_000)
            .filter(|i| rule.matches(&ctx(&[("user_id", format!("user-{i}").into())])))
            .count();

        // 50% of 100k with a 5% tolerance.
        assert!((45_000..=55_000).contains(&hits), "hits = {hits}");
    }

    #[test]
    fn test_fractional_deterministic_and_monotone() {
        let subject = ctx(&[("user_id", "user-42".into())]);

        let at = |percentage: f64| {
            FractionalRule {
                key: "user_id".to_owned(),
                percentage,
                ..Default::default()
            }
            .matches(&subject)
        };

        // Same inputs, same outcome.
        assert_eq!(at(37.0), at(37.0));

        // Once a subject matches at p, it matches at every p' >= p.
        let mut matched = false;
        for percentage in (0..=100).step_by(10) {
            let now = at(f64::from(percentage));
            assert!(now || !matched, "matching set shrank at {percentage}");
            matched = now;
        }
        assert!(matched, "every subject matches at 100");
    }

    #[test]
    fn test_fractional_missing_key() {
        let rule = FractionalRule {
            key: "user_id".to_owned(),
            percentage: 100.0,
            ..Default::default()
        };

        assert!(!rule.matches(&ctx(&[])));
    }

    #[test]
    fn test_range_inclusive_endpoints() {
        let rule = RangeRule {
            key: "age".to_owned(),
            min: 18.0,
            max: 65.0,
            ..Default::default()
        };

        assert!(rule.matches(&ctx(&[("age", Bson::Int32(18))])));
        assert!(rule.matches(&ctx(&[("age", Bson::Int64(65))])));
        assert!(rule.matches(&ctx(&[("age", Bson::Double(40.5))])));
        assert!(!rule.matches(&ctx(&[("age", Bson::Double(17.9))])));
        assert!(!rule.matches(&ctx(&[("age", Bson::Int32(66))])));
        assert!(!rule.matches(&ctx(&[("age", "40".into())])));
        assert!(!rule.matches(&ctx(&[])));
    }

    #[test]
    fn test_range_exclusivity_flags_are_independent() {
        let exclusive_min = RangeRule {
            key: "age".to_owned(),
            min: 18.0,
            max: 65.0,
            exclusive_min: true,
            ..Default::default()
        };
        assert!(!exclusive_min.matches(&ctx(&[("age", Bson::Int32(18))])));
        assert!(exclusive_min.matches(&ctx(&[("age", Bson::Int32(65))])));

        let exclusive_max = RangeRule {
            key: "age".to_owned(),
            min: 18.0,
            max: 65.0,
            exclusive_max: true,
            ..Default::default()
        };
        assert!(exclusive_max.matches(&ctx(&[("age", Bson::Int32(18))])));
        assert!(!exclusive_max.matches(&ctx(&[("age", Bson::Int32(65))])));
    }

    #[test]
    fn test_range_rejects_non_finite() {
        let rule = RangeRule {
            key: "score".to_owned(),
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            ..Default::default()
        };

        assert!(!rule.matches(&ctx(&[("score", Bson::Double(f64::NAN))])));
        assert!(!rule.matches(&ctx(&[("score", Bson::Double(f64::INFINITY))])));
        assert!(rule.matches(&ctx(&[("score", Bson::Double(0.0))])));
    }

    #[test]
    fn test_in_list_deep_equality() {
        let rule = InListRule {
            key: "plan".to_owned(),
            items: vec!["pro".into(), Bson::Int32(3), Bson::Boolean(true)],
            ..Default::default()
        };

        assert!(rule.matches(&ctx(&[("plan", "pro".into())])));
        assert!(rule.matches(&ctx(&[("plan", Bson::Int32(3))])));
        assert!(rule.matches(&ctx(&[("plan", Bson::Boolean(true))])));
        assert!(!rule.matches(&ctx(&[("plan", "enterprise".into())])));
        assert!(!rule.matches(&ctx(&[])));
    }

    #[test]
    fn test_string_shape_rules() {
        let prefix = PrefixRule {
            key: "host".to_owned(),
            prefix: "staging-".to_owned(),
            ..Default::default()
        };
        assert!(prefix.matches(&ctx(&[("host", "staging-eu-1".into())])));
        assert!(!prefix.matches(&ctx(&[("host", "prod-eu-1".into())])));
        assert!(!prefix.matches(&ctx(&[("host", Bson::Int32(1))])));

        let suffix = SuffixRule {
            key: "host".to_owned(),
            suffix: "-canary".to_owned(),
            ..Default::default()
        };
        assert!(suffix.matches(&ctx(&[("host", "api-canary".into())])));
        assert!(!suffix.matches(&ctx(&[("host", "api".into())])));

        let contains = ContainsRule {
            key: "agent".to_owned(),
            substring: "Mobile".to_owned(),
            ..Default::default()
        };
        assert!(contains.matches(&ctx(&[("agent", "Mozilla Mobile Safari".into())])));
        assert!(!contains.matches(&ctx(&[("agent", "Mozilla Desktop".into())])));
    }

    #[test]
    fn test_ip_range() {
        let rule = IpRangeRule {
            key: "ip".to_owned(),
            cidrs: vec!["10.0.0.0/8".to_owned(), "192.168.1.0/24".to_owned()],
            ..Default::default()
        };

        assert!(rule.matches(&ctx(&[("ip", "10.1.2.3".into())])));
        assert!(rule.matches(&ctx(&[("ip", "192.168.1.77".into())])));
        assert!(!rule.matches(&ctx(&[("ip", "172.16.0.1".into())])));
        assert!(!rule.matches(&ctx(&[("ip", "not-an-ip".into())])));
        assert!(!rule.matches(&ctx(&[("ip", Bson::Int32(10))])));
    }

    #[traced_test]
    #[test]
    fn test_ip_range_skips_unparseable_cidrs() {
        let rule = IpRangeRule {
            key: "ip".to_owned(),
            cidrs: vec!["bogus".to_owned(), "10.0.0.0/8".to_owned()],
            ..Default::default()
        };

        assert!(rule.matches(&ctx(&[("ip", "10.1.2.3".into())])));
        assert!(logs_contain("skipping unparseable CIDR"));
    }

    #[test]
    fn test_geo_fence() {
        let rule = GeoFenceRule {
            lat_key: "lat".to_owned(),
            lng_key: "lng".to_owned(),
            lat_center: 40.7128,
            lng_center: -74.0060,
            radius_meters: 1_000.0,
            ..Default::default()
        };

        // A couple of blocks from the center.
        assert!(rule.matches(&ctx(&[
            ("lat", Bson::Double(40.7150)),
            ("lng", Bson::Double(-74.0100)),
        ])));
        // Los Angeles is not within a kilometer of Manhattan.
        assert!(!rule.matches(&ctx(&[
            ("lat", Bson::Double(34.0522)),
            ("lng", Bson::Double(-118.2437)),
        ])));
        // Integer coordinates do not coerce.
        assert!(!rule.matches(&ctx(&[
            ("lat", Bson::Int32(40)),
            ("lng", Bson::Double(-74.0060)),
        ])));
        assert!(!rule.matches(&ctx(&[("lat", Bson::Double(40.7128))])));
    }

    #[test]
    fn test_date_time_bounds_are_exclusive() {
        let rule = DateTimeRule {
            key: "at".to_owned(),
            after: mongodb::bson::DateTime::from_millis(1_000),
            before: mongodb::bson::DateTime::from_millis(2_000),
            ..Default::default()
        };

        assert!(rule.matches(&ctx(&[("at", timestamp(1_500))])));
        assert!(!rule.matches(&ctx(&[("at", timestamp(1_000))])));
        assert!(!rule.matches(&ctx(&[("at", timestamp(2_000))])));
        assert!(!rule.matches(&ctx(&[("at", Bson::Int64(1_500))])));
        assert!(!rule.matches(&ctx(&[])));
    }

    #[test]
    fn test_date_time_equal_bounds_match_nothing() {
        let rule = DateTimeRule {
            key: "at".to_owned(),
            after: mongodb::bson::DateTime::from_millis(1_000),
            before: mongodb::bson::DateTime::from_millis(1_000),
            ..Default::default()
        };

        assert!(!rule.matches(&ctx(&[("at", timestamp(1_000))])));
        assert!(!rule.matches(&ctx(&[("at", timestamp(999))])));
        assert!(!rule.matches(&ctx(&[("at", timestamp(1_001))])));
    }

    #[test]
    fn test_sem_ver() {
        let rule = SemVerRule {
            key: "app_version".to_owned(),
            constraint: ">=1.2.0, <2.0.0".to_owned(),
            ..Default::default()
        };

        assert!(rule.matches(&ctx(&[("app_version", "1.4.0".into())])));
        assert!(!rule.matches(&ctx(&[("app_version", "2.1.0".into())])));
        assert!(!rule.matches(&ctx(&[("app_version", "not-a-version".into())])));
        assert!(!rule.matches(&ctx(&[("app_version", Bson::Double(1.4))])));
    }

    #[traced_test]
    #[test]
    fn test_sem_ver_invalid_constraint_never_matches() {
        let rule = SemVerRule {
            key: "app_version".to_owned(),
            constraint: "not a constraint".to_owned(),
            ..Default::default()
        };

        assert!(!rule.matches(&ctx(&[("app_version", "1.4.0".into())])));
        assert!(logs_contain("invalid semver constraint"));
    }

    #[test]
    fn test_cron_window_contains_probed_instant() {
        // Daily at 09:00 UTC for two hours.
        let rule = CronRule {
            key: "at".to_owned(),
            cron_spec: "0 9 * * *".to_owned(),
            duration_seconds: 7_200,
            ..Default::default()
        };

        let at = |iso: &str| {
            let dt = chrono::DateTime::parse_from_rfc3339(iso).expect("valid timestamp");
            ctx(&[("at", timestamp(dt.timestamp_millis()))])
        };

        assert!(rule.matches(&at("2024-05-15T09:00:00Z")));
        assert!(rule.matches(&at("2024-05-15T10:30:00Z")));
        assert!(rule.matches(&at("2024-05-15T11:00:00Z")));
        assert!(!rule.matches(&at("2024-05-15T08:59:00Z")));
        assert!(!rule.matches(&at("2024-05-15T11:30:00Z")));
    }

    #[test]
    fn test_cron_empty_key_uses_wall_clock() {
        // Fires every minute with a two-minute window: always inside.
        let rule = CronRule {
            cron_spec: "* * * * *".to_owned(),
            duration_seconds: 120,
            ..Default::default()
        };

        assert!(rule.matches(&ctx(&[])));
    }

    #[traced_test]
    #[test]
    fn test_cron_invalid_spec_never_matches() {
        let rule = CronRule {
            key: "at".to_owned(),
            cron_spec: "nonsense".to_owned(),
            duration_seconds: 60,
            ..Default::default()
        };

        assert!(!rule.matches(&ctx(&[("at", timestamp(0))])));
        assert!(logs_contain("invalid cron spec"));
    }

    #[test]
    fn test_cron_non_timestamp_value_never_matches() {
        let rule = CronRule {
            key: "at".to_owned(),
            cron_spec: "* * * * *".to_owned(),
            duration_seconds: 120,
            ..Default::default()
        };

        assert!(!rule.matches(&ctx(&[("at", "2024-05-15T09:00:00Z".into())])));
        assert!(!rule.matches(&ctx(&[])));
    }
}
