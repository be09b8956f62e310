use crate::error::{AuthError, Result};
use bridge_traits::notify::{SessionEvent, StoredValueDecoder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Identifier of the signed-in user as issued by the backend.
///
/// Backends disagree on whether ids are numbers or strings, so both are kept
/// verbatim.
///
/// ```
/// use core_auth::UserId;
///
/// let id: UserId = serde_json::from_str("1").unwrap();
/// assert_eq!(id, UserId::Number(1));
/// assert_eq!(id.to_string(), "1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(i64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Number(n) => write!(f, "{}", n),
            UserId::Text(s) => f.write_str(s),
        }
    }
}

/// Cached snapshot of the signed-in user.
///
/// Saves a profile refetch right after a session is synced. Fields the
/// bridge does not know about are preserved in `extra` so the snapshot
/// survives a round-trip through storage or a hand-off URL unchanged.
///
/// ```
/// use core_auth::{UserId, UserProfile};
///
/// let profile = UserProfile::from_json_str(r#"{"id":1,"name":"Ana","tier":"gold"}"#).unwrap();
/// assert_eq!(profile.id, Some(UserId::Number(1)));
/// assert_eq!(profile.name.as_deref(), Some("Ana"));
/// assert_eq!(profile.extra["tier"], "gold");
/// ```
#[derive(Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Parse a profile from JSON text. Only JSON objects are profiles.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| AuthError::MalformedProfile(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(AuthError::MalformedProfile(
                "profile must be a JSON object".to_string(),
            ));
        }
        serde_json::from_value(value).map_err(|e| AuthError::MalformedProfile(e.to_string()))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| AuthError::SerializationFailed(e.to_string()))
    }
}

// Contact fields stay out of logs.
impl fmt::Debug for UserProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserProfile")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("phone", &self.phone.as_ref().map(|_| "[REDACTED]"))
            .field("extra_fields", &self.extra.len())
            .finish()
    }
}

/// The unit of session state.
///
/// Persisted as a single JSON value under one key, so writing or removing
/// it is atomic for every reader.
#[derive(Clone, PartialEq)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user_profile: Option<UserProfile>,
    /// Wall-clock milliseconds of the last write. Staleness hint only.
    pub last_sync_millis: i64,
}

/// On-disk shape. The profile stays raw so a damaged profile does not take
/// the token down with it.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_profile: Option<Value>,
    #[serde(rename = "lastSyncTimestampMillis")]
    last_sync_millis: i64,
}

impl TokenRecord {
    /// Create a record stamped at `now_millis`.
    ///
    /// # Errors
    ///
    /// [`AuthError::EmptyToken`] when `access_token` is empty or blank.
    pub fn new(
        access_token: impl Into<String>,
        user_profile: Option<UserProfile>,
        refresh_token: Option<String>,
        now_millis: i64,
    ) -> Result<Self> {
        let access_token = access_token.into();
        if access_token.trim().is_empty() {
            return Err(AuthError::EmptyToken);
        }

        Ok(Self {
            access_token,
            refresh_token: refresh_token.filter(|t| !t.is_empty()),
            user_profile,
            last_sync_millis: now_millis,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        let stored = StoredRecord {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            user_profile: self.user_profile.as_ref().map(UserProfile::to_value),
            last_sync_millis: self.last_sync_millis,
        };
        serde_json::to_string(&stored).map_err(|e| AuthError::SerializationFailed(e.to_string()))
    }

    /// Parse a stored record.
    ///
    /// A record without a usable access token is malformed. A damaged
    /// profile is dropped and the rest of the record kept.
    pub fn from_json(json: &str) -> Result<Self> {
        let stored: StoredRecord =
            serde_json::from_str(json).map_err(|e| AuthError::MalformedToken(e.to_string()))?;

        if stored.access_token.trim().is_empty() {
            return Err(AuthError::MalformedToken(
                "stored record has an empty access token".to_string(),
            ));
        }

        let user_profile = match stored.user_profile {
            None | Some(Value::Null) => None,
            Some(value) => match UserProfile::from_value(value) {
                Ok(profile) => Some(profile),
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping malformed cached profile");
                    None
                }
            },
        };

        Ok(Self {
            access_token: stored.access_token,
            refresh_token: stored.refresh_token,
            user_profile,
            last_sync_millis: stored.last_sync_millis,
        })
    }

    /// Notification announcing this record to other contexts.
    pub fn to_event(&self) -> SessionEvent {
        SessionEvent::TokenUpdated {
            token: self.access_token.clone(),
            user_data: self.user_profile.as_ref().map(UserProfile::to_value),
            refresh_token: self.refresh_token.clone(),
            timestamp: self.last_sync_millis,
        }
    }

    /// Record carried by a `TokenUpdated` event. `None` for `Logout` or an
    /// empty token; an unreadable profile is dropped.
    pub fn from_event(event: &SessionEvent) -> Option<Self> {
        match event {
            SessionEvent::TokenUpdated {
                token,
                user_data,
                refresh_token,
                timestamp,
            } => {
                let profile = user_data
                    .clone()
                    .and_then(|value| UserProfile::from_value(value).ok());
                Self::new(token.clone(), profile, refresh_token.clone(), *timestamp).ok()
            }
            SessionEvent::Logout => None,
        }
    }

    /// Event implied by a stored record value, for change-observing
    /// transports.
    pub fn event_from_stored(json: &str) -> Option<SessionEvent> {
        Self::from_json(json).ok().map(|record| record.to_event())
    }

    /// [`event_from_stored`](Self::event_from_stored) as a transport decoder.
    pub fn stored_value_decoder() -> StoredValueDecoder {
        Arc::new(|json: &str| Self::event_from_stored(json))
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"[REDACTED]")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("user_profile", &self.user_profile)
            .field("last_sync_millis", &self.last_sync_millis)
            .finish()
    }
}

/// Session state of one execution context.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated(TokenRecord),
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn record(&self) -> Option<&TokenRecord> {
        match self {
            SessionState::Authenticated(record) => Some(record),
            SessionState::Anonymous => None,
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.record().map(|r| r.access_token.as_str())
    }

    pub fn last_sync_millis(&self) -> Option<i64> {
        self.record().map(|r| r.last_sync_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ana() -> UserProfile {
        UserProfile::new(UserId::Number(1), "Ana")
    }

    #[test]
    fn test_profile_round_trip_preserves_shape() {
        let profile = ana();
        assert_eq!(profile.to_value(), json!({"id": 1, "name": "Ana"}));

        let text = UserProfile::from_json_str(r#"{"id":"u-7","email":"ana@example.com"}"#).unwrap();
        assert_eq!(text.id, Some(UserId::Text("u-7".to_string())));
    }

    #[test]
    fn test_profile_rejects_non_objects() {
        assert!(matches!(
            UserProfile::from_json_str("{not json"),
            Err(AuthError::MalformedProfile(_))
        ));
        assert!(matches!(
            UserProfile::from_json_str("[1,2]"),
            Err(AuthError::MalformedProfile(_))
        ));
        assert!(UserProfile::from_value(json!("Ana")).is_err());
    }

    #[test]
    fn test_profile_debug_redacts_contact_fields() {
        let mut profile = ana();
        profile.email = Some("ana@example.com".to_string());
        profile.phone = Some("+58 412 0000000".to_string());

        let rendered = format!("{:?}", profile);
        assert!(!rendered.contains("example.com"));
        assert!(!rendered.contains("412"));
        assert!(rendered.contains("Ana"));
    }

    #[test]
    fn test_record_rejects_empty_token() {
        assert!(matches!(
            TokenRecord::new("", None, None, 1),
            Err(AuthError::EmptyToken)
        ));
        assert!(matches!(
            TokenRecord::new("   ", None, None, 1),
            Err(AuthError::EmptyToken)
        ));
    }

    #[test]
    fn test_record_json_layout() {
        let record =
            TokenRecord::new("abc.def.ghi", Some(ana()), Some("ref-1".to_string()), 1_700).unwrap();
        let value: Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();

        assert_eq!(value["accessToken"], "abc.def.ghi");
        assert_eq!(value["refreshToken"], "ref-1");
        assert_eq!(value["userProfile"], json!({"id": 1, "name": "Ana"}));
        assert_eq!(value["lastSyncTimestampMillis"], 1_700);

        assert_eq!(TokenRecord::from_json(&record.to_json().unwrap()).unwrap(), record);
    }

    #[test]
    fn test_damaged_profile_keeps_token() {
        let json = r#"{"accessToken":"tok","userProfile":"garbage","lastSyncTimestampMillis":5}"#;
        let record = TokenRecord::from_json(json).unwrap();

        assert_eq!(record.access_token, "tok");
        assert_eq!(record.user_profile, None);
    }

    #[test]
    fn test_stored_record_without_token_is_malformed() {
        assert!(matches!(
            TokenRecord::from_json(r#"{"accessToken":"","lastSyncTimestampMillis":5}"#),
            Err(AuthError::MalformedToken(_))
        ));
        assert!(TokenRecord::from_json("not json").is_err());
    }

    #[test]
    fn test_event_conversion() {
        let record = TokenRecord::new("newtok", Some(ana()), None, 42).unwrap();
        let event = record.to_event();

        assert_eq!(TokenRecord::from_event(&event), Some(record.clone()));
        assert_eq!(TokenRecord::from_event(&SessionEvent::Logout), None);

        let decoder = TokenRecord::stored_value_decoder();
        assert_eq!(decoder(&record.to_json().unwrap()), Some(event));
        assert_eq!(decoder("{}"), None);
    }

    #[test]
    fn test_record_debug_redacts_token() {
        let record = TokenRecord::new("super-secret", None, Some("refresh-secret".into()), 1).unwrap();
        let rendered = format!("{:?}", record);
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_session_state_accessors() {
        let record = TokenRecord::new("tok", None, None, 9).unwrap();
        let state = SessionState::Authenticated(record);

        assert!(state.is_authenticated());
        assert_eq!(state.access_token(), Some("tok"));
        assert_eq!(state.last_sync_millis(), Some(9));
        assert_eq!(SessionState::default().access_token(), None);
    }
}
