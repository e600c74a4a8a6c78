//! Unit tests for the store's document shaping. Driver round trips belong
//! to an integration harness with a live database; these cover the pure
//! layers both layouts are built from.

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;
    use mongodb::bson::Bson;

    use super::super::*;

    #[test]
    fn test_single_document_update_nests_under_flag_name() {
        let body = doc! {
            "flagName": "v2_enabled",
            "defaultValue": "false",
            "defaultVariant": "database_default",
        };

        let update = single_document_update("v2_enabled", body.clone());

        assert_eq!(update.len(), 1);
        assert_eq!(update.get_document("v2_enabled"), Ok(&body));
    }

    #[test]
    fn test_prefixed_updates_target_nested_fields() {
        let updates = doc! {
            "defaultValue": true,
            "defaultVariant": "on",
        };

        let set = prefixed_updates("v2_enabled", &updates);

        assert_eq!(set.len(), 2);
        assert_eq!(set.get("v2_enabled.defaultValue"), Some(&Bson::Boolean(true)));
        assert_eq!(
            set.get("v2_enabled.defaultVariant"),
            Some(&Bson::String("on".to_owned()))
        );
    }

    #[test]
    fn test_exists_filter_multi_document() {
        let filter = exists_filter(None, "v2_enabled");

        assert_eq!(filter, doc! { "_id": "v2_enabled" });
    }

    #[test]
    fn test_exists_filter_single_document() {
        let filter = exists_filter(Some("flags"), "v2_enabled");

        assert_eq!(filter.get_str("_id"), Ok("flags"));
        assert_eq!(
            filter.get_document("v2_enabled"),
            Ok(&doc! { "$exists": true })
        );
    }

    #[test]
    fn test_default_max_tries() {
        assert_eq!(DEFAULT_MAX_TRIES, 2);
    }
}
