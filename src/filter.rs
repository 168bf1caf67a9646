//! Selects which documents take part in an export run.

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use tracing::warn;

use crate::importer::{Document, ParsedCache};

/// Invalid or deleted documents never pass. With a start date, the creation
/// time must fall in `[start, now]`; without one every remaining document passes.
pub fn is_included(doc: &Document, now: DateTime<Utc>, start: Option<DateTime<Utc>>) -> bool {
    if !doc.is_valid() || doc.is_deleted() {
        return false;
    }
    let Some(start) = start else {
        return true;
    };
    match doc.created() {
        Some(created) => start <= created && created <= now,
        None => {
            warn!(id = %doc.id, created_at = ?doc.created_at, "unparseable creation time, excluding");
            false
        }
    }
}

/// Documents that pass [`is_included`], oldest first, ties broken by id.
pub fn select_documents(
    cache: &ParsedCache,
    now: DateTime<Utc>,
    start: Option<DateTime<Utc>>,
) -> Vec<&Document> {
    let mut docs: Vec<&Document> = cache
        .documents
        .values()
        .filter(|d| is_included(d, now, start))
        .collect();
    docs.sort_by_cached_key(|d| (d.created(), d.id.clone()));
    docs
}

/// Local midnight at the start of a `YYYY-MM-DD` day.
pub fn parse_since(raw: &str) -> Option<DateTime<Utc>> {
    let day = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()?;
    let midnight = day.and_hms_opt(0, 0, 0)?;
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn start_from_days(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    now - Duration::days(i64::from(days))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    fn doc(created_at: &str) -> Document {
        Document {
            id: "d".into(),
            created_at: Some(created_at.into()),
            valid_meeting: Some(true),
            ..Default::default()
        }
    }

    #[test]
    fn invalid_documents_always_excluded() {
        let now = ts("2024-03-10T00:00:00Z");
        let mut d = doc("2024-03-05T00:00:00Z");
        d.valid_meeting = Some(false);
        assert!(!is_included(&d, now, None));
        assert!(!is_included(&d, now, Some(ts("2024-01-01T00:00:00Z"))));
        d.valid_meeting = None;
        assert!(!is_included(&d, now, None));
    }

    #[test]
    fn deleted_documents_always_excluded() {
        let now = ts("2024-03-10T00:00:00Z");
        let mut d = doc("2024-03-05T00:00:00Z");
        d.deleted_at = Some("2024-03-06T00:00:00Z".into());
        assert!(!is_included(&d, now, None));
        assert!(!is_included(&d, now, Some(ts("2024-01-01T00:00:00Z"))));

        // empty string is not a deletion mark
        d.deleted_at = Some(String::new());
        assert!(is_included(&d, now, None));
    }

    #[test]
    fn no_start_includes_any_timestamp() {
        let now = ts("2024-03-10T00:00:00Z");
        assert!(is_included(&doc("2030-01-01T00:00:00Z"), now, None));
        assert!(is_included(&doc("garbage"), now, None));
    }

    #[test]
    fn range_is_inclusive_on_both_ends() {
        let start = ts("2024-03-01T00:00:00Z");
        let now = ts("2024-03-10T00:00:00Z");
        assert!(is_included(&doc("2024-03-01T00:00:00Z"), now, Some(start)));
        assert!(is_included(&doc("2024-03-10T00:00:00Z"), now, Some(start)));
        assert!(!is_included(&doc("2024-02-29T23:59:59Z"), now, Some(start)));
        assert!(!is_included(&doc("2024-03-10T00:00:01Z"), now, Some(start)));
        assert!(!is_included(&doc("garbage"), now, Some(start)));
    }

    #[test]
    fn selects_in_creation_order() {
        let now = ts("2024-03-10T00:00:00Z");
        let mut cache = ParsedCache::default();
        for (id, created) in [
            ("c", "2024-03-03T00:00:00Z"),
            ("a", "2024-03-01T00:00:00Z"),
            ("b", "2024-03-01T00:00:00Z"),
            ("old", "2023-01-01T00:00:00Z"),
        ] {
            let mut d = doc(created);
            d.id = id.into();
            cache.documents.insert(id.into(), d);
        }
        let mut deleted = doc("2024-03-02T00:00:00Z");
        deleted.id = "gone".into();
        deleted.deleted_at = Some("2024-03-04T00:00:00Z".into());
        cache.documents.insert("gone".into(), deleted);

        let ids: Vec<&str> = select_documents(&cache, now, Some(ts("2024-02-01T00:00:00Z")))
            .into_iter()
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        assert_eq!(select_documents(&cache, now, None).len(), 4);
    }

    #[test]
    fn parses_since_dates() {
        assert!(parse_since("2024-03-01").is_some());
        assert!(parse_since("03/01/2024").is_none());
    }

    #[test]
    fn days_back_from_now() {
        let now = ts("2024-03-10T12:00:00Z");
        assert_eq!(start_from_days(now, 7), ts("2024-03-03T12:00:00Z"));
    }
}
