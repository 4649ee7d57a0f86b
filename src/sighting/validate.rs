//! Input validation and normalization.
//!
//! [`validate`] checks a [`Sighting`] and collects every violated constraint
//! into one [`ValidationErrors`]. Nothing is auto-corrected: the only
//! transformation applied is normalizing `occurred_at` to RFC 3339 UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::error::ValidationErrors;
use crate::sighting::types::{Metadata, Sighting};

/// Naive date-time layouts accepted for `occurred_at`, interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A sighting that passed validation, ready to be written.
#[derive(Debug, Clone)]
pub struct ValidSighting {
    pub occurred_at: DateTime<Utc>,
    pub place_label: Option<String>,
    pub source: String,
    pub summary: String,
    pub metadata: Option<Metadata>,
    pub tags: Option<Vec<String>>,
}

impl ValidSighting {
    /// `occurred_at` in its persisted text form.
    pub fn occurred_at_text(&self) -> String {
        format_timestamp(&self.occurred_at)
    }

    /// Text fed to the embedding provider: summary, source, then place if any.
    pub fn embedding_text(&self) -> String {
        embedding_text(&self.summary, &self.source, self.place_label.as_deref())
    }

    pub fn metadata_json(&self) -> Option<String> {
        self.metadata
            .as_ref()
            .map(|m| Value::Object(m.clone()).to_string())
    }

    pub fn tags_json(&self) -> Option<String> {
        self.tags.as_ref().map(|t| Value::from(t.clone()).to_string())
    }

    /// Back to the public shape, with the given id.
    pub fn into_sighting(self, id: i64) -> Sighting {
        Sighting {
            id: Some(id),
            occurred_at: format_timestamp(&self.occurred_at),
            place_label: self.place_label,
            source: self.source,
            summary: self.summary,
            metadata: self.metadata,
            tags: self.tags,
        }
    }
}

/// Blank place labels are left out.
pub fn embedding_text(summary: &str, source: &str, place_label: Option<&str>) -> String {
    match place_label.filter(|p| !p.trim().is_empty()) {
        Some(place) => format!("{summary} {source} {place}"),
        None => format!("{summary} {source}"),
    }
}

/// Check every constraint on `sighting`. The id is carried through untouched.
pub fn validate(sighting: Sighting) -> Result<(Option<i64>, ValidSighting), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let occurred_at = if sighting.occurred_at.trim().is_empty() {
        errors.push("occurred_at", "is required");
        None
    } else {
        let parsed = parse_timestamp(&sighting.occurred_at);
        if parsed.is_none() {
            errors.push(
                "occurred_at",
                format!("not a valid ISO 8601 date-time: {:?}", sighting.occurred_at),
            );
        }
        parsed
    };

    if sighting.source.trim().is_empty() {
        errors.push("source", "is required");
    }
    if sighting.summary.trim().is_empty() {
        errors.push("summary", "is required");
    }

    // `metadata` is a JSON object by construction; loose input is checked by
    // `metadata_from_json` before it becomes a `Sighting`.

    match (errors.into_result(), occurred_at) {
        (Ok(()), Some(occurred_at)) => Ok((
            sighting.id,
            ValidSighting {
                occurred_at,
                place_label: sighting.place_label,
                source: sighting.source,
                summary: sighting.summary,
                metadata: sighting.metadata,
                tags: sighting.tags,
            },
        )),
        (Err(errors), _) => Err(errors),
        (Ok(()), None) => Err(ValidationErrors::single("occurred_at", "is required")),
    }
}

/// Parse any accepted `occurred_at` form into a UTC instant.
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// RFC 3339 UTC with a `Z` suffix and only the fractional digits needed.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Normalize a timestamp string, or `None` if it does not parse.
pub fn normalize_timestamp(input: &str) -> Option<String> {
    parse_timestamp(input).map(|dt| format_timestamp(&dt))
}

/// Convert raw JSON into metadata. Accepts an object, `null`, or a
/// JSON-encoded string holding either.
pub fn metadata_from_json(value: Value) -> Result<Option<Metadata>, ValidationErrors> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(Value::Null) => Ok(None),
            Ok(Value::Object(map)) => Ok(Some(map)),
            Ok(_) => Err(ValidationErrors::single("metadata", "must be a JSON object")),
            Err(e) => Err(ValidationErrors::single(
                "metadata",
                format!("invalid JSON: {e}"),
            )),
        },
        _ => Err(ValidationErrors::single("metadata", "must be a JSON object")),
    }
}

/// Convert raw JSON into tags. Accepts an array of strings, `null`, or a
/// JSON-encoded string holding either.
pub fn tags_from_json(value: Value) -> Result<Option<Vec<String>>, ValidationErrors> {
    let value = match value {
        Value::String(s) => serde_json::from_str::<Value>(&s).map_err(|e| {
            ValidationErrors::single("tags", format!("invalid JSON: {e}"))
        })?,
        other => other,
    };
    match value {
        Value::Null => Ok(None),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::String(s) => Ok(s),
                other => Err(ValidationErrors::single(
                    "tags",
                    format!("element {i} is not a string: {other}"),
                )),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        _ => Err(ValidationErrors::single("tags", "must be a JSON array of strings")),
    }
}

/// Parse a command-line metadata argument.
pub fn parse_metadata_str(input: &str) -> Result<Option<Metadata>, ValidationErrors> {
    metadata_from_json(Value::String(input.to_string()))
}

/// Parse a command-line tags argument.
pub fn parse_tags_str(input: &str) -> Result<Option<Vec<String>>, ValidationErrors> {
    tags_from_json(Value::String(input.to_string()))
}

/// Substring LIKE pattern with the query's own wildcards escaped (`ESCAPE '\'`).
pub fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_every_documented_timestamp_form() {
        let cases = [
            ("2026-01-07T14:23:00Z", "2026-01-07T14:23:00Z"),
            ("2026-01-07T14:23:00+02:00", "2026-01-07T12:23:00Z"),
            ("2026-01-07T14:23:00", "2026-01-07T14:23:00Z"),
            ("2026-01-07 14:23:00", "2026-01-07T14:23:00Z"),
            ("2026-01-07T14:23:00.250", "2026-01-07T14:23:00.250Z"),
            ("2026-01-07T14:23", "2026-01-07T14:23:00Z"),
            ("2026-01-07", "2026-01-07T00:00:00Z"),
        ];
        for (input, expected) in cases {
            assert_eq!(
                normalize_timestamp(input).as_deref(),
                Some(expected),
                "input {input}"
            );
        }
    }

    #[test]
    fn rejects_garbage_timestamps() {
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("2026-13-45").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn collects_every_violation() {
        let s = Sighting::new("not a date", "  ", "");
        let errors = validate(s).unwrap_err();
        assert!(errors.mentions("occurred_at"));
        assert!(errors.mentions("source"));
        assert!(errors.mentions("summary"));
        assert_eq!(errors.errors().len(), 3);
    }

    #[test]
    fn valid_sighting_keeps_text_untouched() {
        let s = Sighting::new("2026-01-07", " Walk ", "Saw fnord graffiti").with_place("Seattle");
        let (id, valid) = validate(s).unwrap();
        assert!(id.is_none());
        assert_eq!(valid.source, " Walk ");
        assert_eq!(valid.occurred_at_text(), "2026-01-07T00:00:00Z");
        assert_eq!(valid.embedding_text(), "Saw fnord graffiti  Walk  Seattle");
    }

    #[test]
    fn embedding_text_without_place() {
        assert_eq!(embedding_text("Debug log had fnord", "Code", None), "Debug log had fnord Code");
    }

    #[test]
    fn blank_place_is_left_out_of_embedding_text() {
        assert_eq!(embedding_text("Saw fnord", "Walk", Some("")), "Saw fnord Walk");
        assert_eq!(embedding_text("Saw fnord", "Walk", Some("  ")), "Saw fnord Walk");
        assert_eq!(
            embedding_text("Saw fnord", "Walk", Some("Seattle")),
            "Saw fnord Walk Seattle"
        );
        assert_eq!(embedding_text("Saw fnord", "Walk", None), "Saw fnord Walk");
    }

    #[test]
    fn metadata_accepts_objects_and_encoded_strings() {
        let direct = metadata_from_json(json!({"url": "x"})).unwrap().unwrap();
        let encoded = metadata_from_json(json!("{\"url\": \"x\"}")).unwrap().unwrap();
        assert_eq!(direct, encoded);
        assert!(metadata_from_json(Value::Null).unwrap().is_none());
        assert_eq!(metadata_from_json(json!({})).unwrap(), Some(Metadata::new()));
    }

    #[test]
    fn metadata_rejects_non_objects() {
        assert!(metadata_from_json(json!([1, 2])).unwrap_err().mentions("metadata"));
        assert!(parse_metadata_str("{broken").unwrap_err().mentions("metadata"));
        assert!(parse_metadata_str("42").is_err());
    }

    #[test]
    fn tags_must_be_strings() {
        assert_eq!(
            tags_from_json(json!(["a", "b"])).unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(
            parse_tags_str("[\"ad hominem\"]").unwrap(),
            Some(vec!["ad hominem".to_string()])
        );
        let err = tags_from_json(json!(["a", 1])).unwrap_err();
        assert!(err.mentions("tags"));
        assert!(tags_from_json(json!({"a": 1})).is_err());
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(escape_like("fnord"), "%fnord%");
        assert_eq!(escape_like("100%_a\\b"), "%100\\%\\_a\\\\b%");
    }
}
