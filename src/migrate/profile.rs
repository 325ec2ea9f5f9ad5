use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::error::{json_kind, ExtractError};

pub const ID: &str = "id";
pub const DISPLAY_NAME: &str = "displayName";
pub const PHOTO_URL: &str = "photoURL";
pub const BIO: &str = "bio";
pub const CUSTOM_EDIT_TOOLS: &str = "customEditTools";
pub const CUSTOM_EDIT_TOOLS_ORDER: &str = "customEditToolsOrder";
pub const FOLLOWERS_COUNT: &str = "followersCount";
pub const FOLLOWING_COUNT: &str = "followingCount";
pub const POSTS_COUNT: &str = "postsCount";
pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";

/// A timestamp copied from the source, or a placeholder filled with store time at commit.
#[derive(Debug, Clone, PartialEq)]
pub enum Stamp {
    Source(Value),
    ServerTime,
}

impl Stamp {
    fn resolve(&self, now: DateTime<Utc>) -> Value {
        match self {
            Stamp::Source(v) => v.clone(),
            Stamp::ServerTime => Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

/// The public projection of a user document. Shares its id with the source user.
#[derive(Debug, Clone, PartialEq)]
pub struct PublicProfile {
    pub id: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub bio: Option<String>,
    pub custom_edit_tools: Option<Value>,
    pub custom_edit_tools_order: Option<Value>,
    pub followers_count: u64,
    pub following_count: u64,
    pub posts_count: u64,
    pub created_at: Stamp,
    pub updated_at: Stamp,
}

impl PublicProfile {
    /// Every schema field is present in the output; absent optionals become explicit nulls.
    pub fn to_fields(&self, now: DateTime<Utc>) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert(ID.into(), Value::from(self.id.clone()));
        m.insert(DISPLAY_NAME.into(), Value::from(self.display_name.clone()));
        m.insert(PHOTO_URL.into(), Value::from(self.photo_url.clone()));
        m.insert(BIO.into(), Value::from(self.bio.clone()));
        m.insert(CUSTOM_EDIT_TOOLS.into(), self.custom_edit_tools.clone().unwrap_or(Value::Null));
        m.insert(CUSTOM_EDIT_TOOLS_ORDER.into(), self.custom_edit_tools_order.clone().unwrap_or(Value::Null));
        m.insert(FOLLOWERS_COUNT.into(), Value::from(self.followers_count));
        m.insert(FOLLOWING_COUNT.into(), Value::from(self.following_count));
        m.insert(POSTS_COUNT.into(), Value::from(self.posts_count));
        m.insert(CREATED_AT.into(), self.created_at.resolve(now));
        m.insert(UPDATED_AT.into(), self.updated_at.resolve(now));
        m
    }
}

/// Maps a user document onto its public profile. Pure; fails only on malformed input.
pub fn extract(id: &str, data: &Value) -> Result<PublicProfile, ExtractError> {
    let Value::Object(obj) = data else { return Err(ExtractError::NotAnObject(json_kind(data))) };

    Ok(PublicProfile {
        id: id.to_string(),
        display_name: string_field(obj, DISPLAY_NAME)?,
        photo_url: string_field(obj, PHOTO_URL)?,
        bio: string_field(obj, BIO)?,
        custom_edit_tools: present(obj, CUSTOM_EDIT_TOOLS).cloned(),
        custom_edit_tools_order: present(obj, CUSTOM_EDIT_TOOLS_ORDER).cloned(),
        followers_count: count_field(obj, FOLLOWERS_COUNT)?,
        following_count: count_field(obj, FOLLOWING_COUNT)?,
        posts_count: count_field(obj, POSTS_COUNT)?,
        created_at: stamp_field(obj, CREATED_AT),
        updated_at: stamp_field(obj, UPDATED_AT),
    })
}

fn present<'a>(obj: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    obj.get(name).filter(|v| !v.is_null())
}

fn string_field(obj: &Map<String, Value>, name: &'static str) -> Result<Option<String>, ExtractError> {
    match present(obj, name) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ExtractError::InvalidField {
            field: name,
            reason: format!("expected a string, found {}", json_kind(other)),
        }),
    }
}

fn count_field(obj: &Map<String, Value>, name: &'static str) -> Result<u64, ExtractError> {
    let Some(v) = present(obj, name) else { return Ok(0) };
    if let Some(n) = v.as_u64() {
        return Ok(n);
    }
    // Whole-valued doubles are accepted as counts.
    match v.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
        _ => Err(ExtractError::InvalidField {
            field: name,
            reason: format!("expected a non-negative integer, found {}", v),
        }),
    }
}

fn stamp_field(obj: &Map<String, Value>, name: &str) -> Stamp {
    match present(obj, name) {
        Some(v) => Stamp::Source(v.clone()),
        None => Stamp::ServerTime,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn missing_optionals_become_explicit_nulls() {
        let p = extract("u1", &json!({ "displayName": "Sora" })).unwrap();
        let fields = p.to_fields(now());
        assert_eq!(fields.len(), 11);
        assert_eq!(fields[ID], json!("u1"));
        assert_eq!(fields[DISPLAY_NAME], json!("Sora"));
        for key in [PHOTO_URL, BIO, CUSTOM_EDIT_TOOLS, CUSTOM_EDIT_TOOLS_ORDER] {
            assert_eq!(fields.get(key), Some(&Value::Null), "{key} should be an explicit null");
        }
    }

    #[test]
    fn counts_default_to_zero() {
        let p = extract("u1", &json!({ "followersCount": null })).unwrap();
        assert_eq!((p.followers_count, p.following_count, p.posts_count), (0, 0, 0));
        let fields = p.to_fields(now());
        assert_eq!(fields[FOLLOWERS_COUNT], json!(0));
        assert_eq!(fields[POSTS_COUNT], json!(0));
    }

    #[test]
    fn present_values_copied_verbatim() {
        let tools = json!({ "exposure": { "enabled": true }, "crop": [1, 2] });
        let src = json!({
            "displayName": "Sora",
            "photoURL": "https://example.com/a.png",
            "bio": "clouds",
            "customEditTools": tools,
            "customEditToolsOrder": ["crop", "exposure"],
            "followersCount": 12,
            "followingCount": 3.0,
            "postsCount": 7,
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": { "_seconds": 1704067200, "_nanoseconds": 0 },
            "email": "private@example.com"
        });
        let fields = extract("u9", &src).unwrap().to_fields(now());
        assert_eq!(fields[CUSTOM_EDIT_TOOLS], tools);
        assert_eq!(fields[CUSTOM_EDIT_TOOLS_ORDER], json!(["crop", "exposure"]));
        assert_eq!(fields[FOLLOWING_COUNT], json!(3));
        assert_eq!(fields[CREATED_AT], json!("2024-01-01T00:00:00Z"));
        assert_eq!(fields[UPDATED_AT], json!({ "_seconds": 1704067200, "_nanoseconds": 0 }));
        assert!(!fields.contains_key("email"));
    }

    #[test]
    fn generated_timestamps_share_one_instant() {
        let fields = extract("u1", &json!({})).unwrap().to_fields(now());
        assert_eq!(fields[CREATED_AT], json!("2025-03-01T12:00:00.000Z"));
        assert_eq!(fields[CREATED_AT], fields[UPDATED_AT]);
    }

    #[test]
    fn malformed_documents_are_rejected() {
        assert_eq!(extract("u1", &json!("nope")), Err(ExtractError::NotAnObject("a string")));

        let err = extract("u1", &json!({ "bio": 42 })).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidField { field: BIO, .. }));

        let err = extract("u1", &json!({ "postsCount": -1 })).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidField { field: POSTS_COUNT, .. }));

        let err = extract("u1", &json!({ "followersCount": "many" })).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidField { field: FOLLOWERS_COUNT, .. }));
    }
}
