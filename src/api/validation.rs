//! Request body shapes and the checks that turn them into drafts.
//!
//! Bodies deserialize loosely (every field an optional JSON value) so that a
//! wrong type produces the same domain message a missing field does rather
//! than a generic JSON rejection.

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::database::models::{BookDraft, ChapterDraft, VerseDraft};
use crate::error::ApiError;
use crate::types::Testament;

const MIN_NAME_LEN: usize = 3;
const MIN_TEXT_LEN: usize = 3;

#[derive(Debug, Default, Deserialize)]
pub struct CredentialsBody {
    #[serde(default)]
    pub username: Option<Value>,
    #[serde(default)]
    pub password: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookBody {
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub testament: Option<Value>,
    #[serde(default)]
    pub order_index: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterBody {
    #[serde(default)]
    pub number: Option<Value>,
    #[serde(default)]
    pub book_id: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerseBody {
    #[serde(default)]
    pub number: Option<Value>,
    #[serde(default)]
    pub text: Option<Value>,
    #[serde(default)]
    pub chapter_id: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Whether the request must carry an ordinal (edits) or may omit it (creates append)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrdinalRule {
    Optional,
    Required,
}

pub fn credentials(body: CredentialsBody) -> Result<Credentials, ApiError> {
    let username = string_field(&body.username, "username", "Invalid username type")?;
    let password = string_field(&body.password, "password", "Invalid password type")?;
    Ok(Credentials {
        username: username.trim().to_string(),
        password: password.to_string(),
    })
}

pub fn book_input(body: BookBody, rule: OrdinalRule) -> Result<(BookDraft, Option<i32>), ApiError> {
    let name = string_field(&body.name, "name", "Invalid name type")?.trim();
    if name.chars().count() < MIN_NAME_LEN {
        return Err(ApiError::field_error("name", "Name should have at least 3 characters"));
    }

    let testament = body
        .testament
        .as_ref()
        .and_then(Value::as_str)
        .and_then(Testament::parse)
        .ok_or_else(|| ApiError::field_error("testament", "Testament could either be OLD, NEW or CUSTOM"))?;

    let order_index = ordinal_field(&body.order_index, rule, "orderIndex", "Invalid Order Index type")?;

    let draft = BookDraft {
        name: name.to_string(),
        testament,
    };
    Ok((draft, order_index))
}

pub fn chapter_input(body: ChapterBody, rule: OrdinalRule) -> Result<(ChapterDraft, Option<i32>), ApiError> {
    let number = ordinal_field(&body.number, rule, "number", "Invalid chapter number type")?;
    let book_id = uuid_field(&body.book_id, "bookId", "Invalid book Id")?;
    Ok((ChapterDraft { book_id }, number))
}

pub fn verse_input(body: VerseBody, rule: OrdinalRule) -> Result<(VerseDraft, Option<i32>), ApiError> {
    let number = ordinal_field(&body.number, rule, "number", "Invalid verse number type")?;
    let chapter_id = uuid_field(&body.chapter_id, "chapterId", "Invalid chapter Id")?;

    let text = string_field(&body.text, "text", "Invalid text type")?;
    if text.trim().chars().count() < MIN_TEXT_LEN {
        return Err(ApiError::field_error("text", "Text must be at least 3 characters"));
    }

    let draft = VerseDraft {
        chapter_id,
        text: text.to_string(),
    };
    Ok((draft, number))
}

/// Path or query id; `label` names the resource in the error ("book", "chapter")
pub fn parse_id(raw: &str, label: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::bad_request(format!("Invalid {} Id", label)))
}

/// Integer query parameter such as a chapter or verse number
pub fn parse_number(raw: Option<&str>, field: &str, message: &str) -> Result<i32, ApiError> {
    raw.and_then(|s| s.trim().parse::<i32>().ok())
        .ok_or_else(|| ApiError::field_error(field, message))
}

/// Ordinal for an edit, which always names its target position
pub fn required(ordinal: Option<i32>, field: &str, message: &str) -> Result<i32, ApiError> {
    ordinal.ok_or_else(|| ApiError::field_error(field, message))
}

fn string_field<'a>(value: &'a Option<Value>, field: &str, message: &str) -> Result<&'a str, ApiError> {
    match value.as_ref().and_then(Value::as_str) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(ApiError::field_error(field, message)),
    }
}

fn uuid_field(value: &Option<Value>, field: &str, message: &str) -> Result<Uuid, ApiError> {
    value
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| ApiError::field_error(field, message))
}

/// Integer ordinal; absent or null is only accepted under `OrdinalRule::Optional`.
/// Range checks belong to the sequence, which knows the scope size.
fn ordinal_field(value: &Option<Value>, rule: OrdinalRule, field: &str, message: &str) -> Result<Option<i32>, ApiError> {
    match value {
        None | Some(Value::Null) => match rule {
            OrdinalRule::Optional => Ok(None),
            OrdinalRule::Required => Err(ApiError::field_error(field, message)),
        },
        Some(v) => v
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| ApiError::field_error(field, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn book(value: Value) -> BookBody {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn book_requires_name_of_three_chars() {
        let err = book_input(book(json!({"name": "Jo", "testament": "OLD"})), OrdinalRule::Optional).unwrap_err();
        assert_eq!(err.message(), "Name should have at least 3 characters");

        let err = book_input(book(json!({"name": 42, "testament": "OLD"})), OrdinalRule::Optional).unwrap_err();
        assert_eq!(err.message(), "Invalid name type");
    }

    #[test]
    fn book_testament_is_strict() {
        let err = book_input(book(json!({"name": "Ruth", "testament": "old"})), OrdinalRule::Optional).unwrap_err();
        assert_eq!(err.message(), "Testament could either be OLD, NEW or CUSTOM");
    }

    #[test]
    fn create_may_omit_order_index() {
        let (draft, ordinal) =
            book_input(book(json!({"name": "Ruth", "testament": "OLD"})), OrdinalRule::Optional).unwrap();
        assert_eq!(draft.name, "Ruth");
        assert_eq!(draft.testament, Testament::Old);
        assert_eq!(ordinal, None);
    }

    #[test]
    fn edit_requires_integer_order_index() {
        let missing = book_input(book(json!({"name": "Ruth", "testament": "OLD"})), OrdinalRule::Required);
        assert_eq!(missing.unwrap_err().message(), "Invalid Order Index type");

        let text = book_input(
            book(json!({"name": "Ruth", "testament": "OLD", "orderIndex": "3"})),
            OrdinalRule::Required,
        );
        assert_eq!(text.unwrap_err().message(), "Invalid Order Index type");

        let fraction = book_input(
            book(json!({"name": "Ruth", "testament": "OLD", "orderIndex": 2.5})),
            OrdinalRule::Required,
        );
        assert!(fraction.is_err());

        let (_, ordinal) = book_input(
            book(json!({"name": "Ruth", "testament": "OLD", "orderIndex": 3})),
            OrdinalRule::Required,
        )
        .unwrap();
        assert_eq!(ordinal, Some(3));
    }

    #[test]
    fn out_of_range_ordinals_pass_shape_checks() {
        // Bounds depend on the scope size and are enforced by the sequence
        let (_, ordinal) = book_input(
            book(json!({"name": "Ruth", "testament": "OLD", "orderIndex": 0})),
            OrdinalRule::Required,
        )
        .unwrap();
        assert_eq!(ordinal, Some(0));
    }

    #[test]
    fn chapter_needs_book_uuid() {
        let body: ChapterBody = serde_json::from_value(json!({"bookId": "nope"})).unwrap();
        assert_eq!(chapter_input(body, OrdinalRule::Optional).unwrap_err().message(), "Invalid book Id");

        let id = Uuid::new_v4();
        let body: ChapterBody = serde_json::from_value(json!({"bookId": id.to_string(), "number": 2})).unwrap();
        let (draft, number) = chapter_input(body, OrdinalRule::Optional).unwrap();
        assert_eq!(draft.book_id, id);
        assert_eq!(number, Some(2));
    }

    #[test]
    fn verse_text_needs_three_chars() {
        let id = Uuid::new_v4().to_string();
        let body: VerseBody = serde_json::from_value(json!({"chapterId": id, "text": "ab"})).unwrap();
        let err = verse_input(body, OrdinalRule::Optional).unwrap_err();
        assert_eq!(err.message(), "Text must be at least 3 characters");
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);

        let body: VerseBody = serde_json::from_value(json!({"chapterId": id, "text": "abc"})).unwrap();
        assert!(verse_input(body, OrdinalRule::Optional).is_ok());
    }

    #[test]
    fn credentials_need_both_strings() {
        let body: CredentialsBody = serde_json::from_value(json!({"username": "admin"})).unwrap();
        assert_eq!(credentials(body).unwrap_err().message(), "Invalid password type");

        let body: CredentialsBody = serde_json::from_value(json!({"username": "admin", "password": "pw"})).unwrap();
        assert_eq!(credentials(body).unwrap().username, "admin");
    }

    #[test]
    fn query_numbers_must_be_integers() {
        assert_eq!(parse_number(Some(" 12 "), "number", "Invalid verse number type").unwrap(), 12);
        let err = parse_number(Some("twelve"), "number", "Invalid verse number type").unwrap_err();
        assert_eq!(err.message(), "Invalid verse number type");
        assert!(parse_number(None, "number", "Invalid verse number type").is_err());
    }

    #[test]
    fn ids_must_be_uuids() {
        assert_eq!(parse_id("123", "book").unwrap_err().message(), "Invalid book Id");
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string(), "verse").unwrap(), id);
    }
}
