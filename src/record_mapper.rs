use log::warn;
use serde_json::Value;

use crate::error::RecordError;
use crate::models::{Review, User};

/// A named location inside a raw review record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPath {
    pub name: &'static str,
    pub pointer: &'static str,
}

impl FieldPath {
    const fn new(name: &'static str, pointer: &'static str) -> Self {
        Self { name, pointer }
    }
}

pub const REVIEW_ID: FieldPath = FieldPath::new("id", "/id");
pub const TITLE: FieldPath = FieldPath::new("title", "/title");
pub const RATING: FieldPath = FieldPath::new("rating", "/rating");
pub const TEXT: FieldPath = FieldPath::new("text", "/text");
pub const PUBLISHED_DATE: FieldPath = FieldPath::new("published date", "/publishedDate");

pub const USER_PROFILE: FieldPath = FieldPath::new("user profile", "/userProfile/route/url");
pub const USER_LOCATION: FieldPath = FieldPath::new("user location", "/userProfile/hometown");
pub const USER_CONTRIBUTIONS: FieldPath = FieldPath::new(
    "user contributions",
    "/userProfile/contributionCounts/sumAllUgc",
);
pub const USER_HELPFUL_VOTES: FieldPath = FieldPath::new(
    "helpful votes",
    "/userProfile/contributionCounts/helpfulVote",
);

/// Where a record came from, for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct RecordContext<'a> {
    pub attraction_id: i64,
    pub page_index: usize,
    pub record_index: usize,
    pub url: &'a str,
}

/// An optional field that could not be read from a record.
pub type MissingField = FieldPath;

#[derive(Debug, Clone, PartialEq)]
pub struct MappedRecord {
    pub review: Review,
    pub user: User,
    pub missing: Vec<MissingField>,
}

impl MappedRecord {
    pub fn has_user(&self) -> bool {
        self.user.profile.is_some()
    }
}

struct FieldAttempts<'v, 'c> {
    raw: &'v Value,
    ctx: &'c RecordContext<'c>,
    missing: Vec<MissingField>,
}

impl<'v, 'c> FieldAttempts<'v, 'c> {
    fn required<T>(
        &self,
        path: FieldPath,
        convert: impl FnOnce(&'v Value) -> Option<T>,
    ) -> Result<T, RecordError> {
        self.raw
            .pointer(path.pointer)
            .and_then(convert)
            .ok_or(missing_required(path))
    }

    /// The key has to be there, but an explicit `null` maps to `None`.
    fn nullable<T>(
        &self,
        path: FieldPath,
        convert: impl FnOnce(&'v Value) -> Option<T>,
    ) -> Result<Option<T>, RecordError> {
        match self.raw.pointer(path.pointer) {
            Some(Value::Null) => Ok(None),
            Some(value) => convert(value).map(Some).ok_or(missing_required(path)),
            None => Err(missing_required(path)),
        }
    }

    fn optional<T>(
        &mut self,
        path: FieldPath,
        convert: impl FnOnce(&'v Value) -> Option<T>,
    ) -> Option<T> {
        let value = self.raw.pointer(path.pointer).and_then(convert);
        if value.is_none() {
            warn!(
                "No {} found at attraction {}, page {}, review {}. URL: {}",
                path.name,
                self.ctx.attraction_id,
                self.ctx.page_index + 1,
                self.ctx.record_index + 1,
                self.ctx.url
            );
            self.missing.push(path);
        }
        value
    }
}

fn missing_required(path: FieldPath) -> RecordError {
    RecordError::MissingRequired {
        field: path.name,
        pointer: path.pointer,
    }
}

fn as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn as_json_text(value: &Value) -> Option<String> {
    if value.is_null() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Maps one raw review record into a review and the user who wrote it.
///
/// Missing optional fields are logged and left empty; only a missing required
/// field rejects the record.
pub fn map_record(raw: &Value, ctx: &RecordContext<'_>) -> Result<MappedRecord, RecordError> {
    if !raw.is_object() {
        return Err(RecordError::NotAnObject);
    }
    let mut fields = FieldAttempts {
        raw,
        ctx,
        missing: Vec::new(),
    };

    let id = fields.required(REVIEW_ID, as_id)?;
    let title = fields.nullable(TITLE, as_string)?;
    let rating = fields.required(RATING, Value::as_f64)?;
    let full_text = fields.nullable(TEXT, as_string)?;
    let date = fields.nullable(PUBLISHED_DATE, as_string)?;

    let profile = fields.optional(USER_PROFILE, as_string);
    let location = fields.optional(USER_LOCATION, as_json_text);
    let contributions = fields.optional(USER_CONTRIBUTIONS, Value::as_i64);
    let helpful_votes = fields.optional(USER_HELPFUL_VOTES, Value::as_i64);

    Ok(MappedRecord {
        review: Review {
            id,
            title,
            rating,
            date,
            full_text,
            attraction_id: ctx.attraction_id,
            user_profile: profile.clone(),
        },
        user: User {
            profile,
            location,
            contributions,
            helpful_votes,
        },
        missing: fields.missing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> RecordContext<'static> {
        RecordContext {
            attraction_id: 42,
            page_index: 1,
            record_index: 3,
            url: "https://example.com/Attraction-42",
        }
    }

    fn full_record() -> Value {
        json!({
            "id": 901,
            "title": "Worth the queue",
            "rating": 5,
            "text": "Crown jewels were stunning.",
            "publishedDate": "2023-05-02",
            "userProfile": {
                "route": {"url": "/Profile/someone"},
                "hometown": {"location": {"name": "Leeds"}},
                "contributionCounts": {"sumAllUgc": 17, "helpfulVote": 4}
            }
        })
    }

    #[test]
    fn maps_complete_record() {
        let mapped = map_record(&full_record(), &ctx()).unwrap();
        assert_eq!(mapped.review.id, 901);
        assert_eq!(mapped.review.title.as_deref(), Some("Worth the queue"));
        assert_eq!(mapped.review.rating, 5.0);
        assert_eq!(
            mapped.review.full_text.as_deref(),
            Some("Crown jewels were stunning.")
        );
        assert_eq!(mapped.review.date.as_deref(), Some("2023-05-02"));
        assert_eq!(mapped.review.attraction_id, 42);
        assert_eq!(mapped.review.user_profile.as_deref(), Some("/Profile/someone"));
        assert_eq!(mapped.user.profile.as_deref(), Some("/Profile/someone"));
        assert_eq!(
            mapped.user.location.as_deref(),
            Some(r#"{"location":{"name":"Leeds"}}"#)
        );
        assert_eq!(mapped.user.contributions, Some(17));
        assert_eq!(mapped.user.helpful_votes, Some(4));
        assert!(mapped.missing.is_empty());
        assert!(mapped.has_user());
    }

    #[test]
    fn missing_user_profile_is_tolerated() {
        let mut raw = full_record();
        raw.as_object_mut().unwrap().remove("userProfile");
        let mapped = map_record(&raw, &ctx()).unwrap();
        assert_eq!(mapped.review.user_profile, None);
        assert_eq!(mapped.user, User::default());
        assert!(!mapped.has_user());
        assert_eq!(
            mapped.missing,
            vec![USER_PROFILE, USER_LOCATION, USER_CONTRIBUTIONS, USER_HELPFUL_VOTES]
        );
    }

    #[test]
    fn each_optional_field_fails_independently() {
        let mut raw = full_record();
        raw["userProfile"]["hometown"] = Value::Null;
        raw["userProfile"]["contributionCounts"]
            .as_object_mut()
            .unwrap()
            .remove("helpfulVote");
        let mapped = map_record(&raw, &ctx()).unwrap();
        assert_eq!(mapped.user.profile.as_deref(), Some("/Profile/someone"));
        assert_eq!(mapped.user.location, None);
        assert_eq!(mapped.user.contributions, Some(17));
        assert_eq!(mapped.user.helpful_votes, None);
        assert_eq!(mapped.missing, vec![USER_LOCATION, USER_HELPFUL_VOTES]);
    }

    #[test]
    fn string_id_is_accepted() {
        let mut raw = full_record();
        raw["id"] = json!("12345");
        let mapped = map_record(&raw, &ctx()).unwrap();
        assert_eq!(mapped.review.id, 12345);
    }

    #[test]
    fn missing_required_field_rejects_record() {
        let mut raw = full_record();
        raw.as_object_mut().unwrap().remove("title");
        let err = map_record(&raw, &ctx()).unwrap_err();
        assert!(matches!(
            err,
            RecordError::MissingRequired { field: "title", .. }
        ));
    }

    #[test]
    fn null_title_and_text_keep_the_record() {
        let raw = json!({
            "id": 5,
            "title": null,
            "rating": 4,
            "text": null,
            "publishedDate": "2024-01-01"
        });
        let mapped = map_record(&raw, &ctx()).unwrap();
        assert_eq!(mapped.review.id, 5);
        assert_eq!(mapped.review.title, None);
        assert_eq!(mapped.review.full_text, None);
        assert_eq!(mapped.review.date.as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn wrongly_typed_title_rejects_record() {
        let mut raw = full_record();
        raw["title"] = json!(["not", "a", "title"]);
        let err = map_record(&raw, &ctx()).unwrap_err();
        assert!(matches!(
            err,
            RecordError::MissingRequired { field: "title", .. }
        ));
    }

    #[test]
    fn non_object_record_is_rejected() {
        let err = map_record(&json!(7), &ctx()).unwrap_err();
        assert!(matches!(err, RecordError::NotAnObject));
    }
}
