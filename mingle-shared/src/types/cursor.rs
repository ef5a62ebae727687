use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, ErrorCode};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 50;

/// Keyset pagination position: the `(timestamp, id)` of the last row the
/// client has already seen. `score` is a reserved slot for orderings that are
/// not purely chronological; the messaging lists do not set it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub ts: DateTime<Utc>,
    pub id: Uuid,
    pub score: Option<i64>,
}

impl Cursor {
    pub fn new(ts: DateTime<Utc>, id: Uuid) -> Self {
        Self { ts, id, score: None }
    }

    /// Opaque, URL-safe token. Timestamps are carried at microsecond
    /// precision so the decoded position filters exactly against Postgres
    /// timestamptz columns.
    pub fn encode(&self) -> String {
        let raw = match self.score {
            Some(score) => format!("{}:{}:{}", self.ts.timestamp_micros(), self.id, score),
            None => format!("{}:{}", self.ts.timestamp_micros(), self.id),
        };
        URL_SAFE_NO_PAD.encode(raw)
    }

    pub fn decode(token: &str) -> Result<Self, AppError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| Self::invalid())?;
        let raw = String::from_utf8(bytes).map_err(|_| Self::invalid())?;

        let mut parts = raw.split(':');
        let micros: i64 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(Self::invalid)?;
        let id: Uuid = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(Self::invalid)?;
        let score = match parts.next() {
            Some(p) => Some(p.parse().map_err(|_| Self::invalid())?),
            None => None,
        };
        if parts.next().is_some() {
            return Err(Self::invalid());
        }

        let ts = Utc
            .timestamp_micros(micros)
            .single()
            .ok_or_else(Self::invalid)?;
        Ok(Self { ts, id, score })
    }

    fn invalid() -> AppError {
        AppError::new(ErrorCode::InvalidCursor, "malformed pagination cursor")
    }
}

/// Query parameters shared by the cursor-paginated list endpoints. An absent
/// or empty cursor means "first page"; limits above `MAX_PAGE_SIZE` are
/// silently capped.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

impl PageParams {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn position(&self) -> Result<Option<Cursor>, AppError> {
        match self.cursor.as_deref() {
            None | Some("") => Ok(None),
            Some(token) => Cursor::decode(token).map(Some),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl<T: Serialize> Page<T> {
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp(micros: i64) -> DateTime<Utc> {
        Utc.timestamp_micros(micros).single().unwrap()
    }

    #[test]
    fn round_trips_timestamp_and_id() {
        let cursor = Cursor::new(stamp(1_714_070_123_456_789), Uuid::new_v4());
        let decoded = Cursor::decode(&cursor.encode()).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn round_trips_reserved_score() {
        let cursor = Cursor {
            ts: stamp(99),
            id: Uuid::new_v4(),
            score: Some(-42),
        };
        let decoded = Cursor::decode(&cursor.encode()).unwrap();
        assert_eq!(decoded.score, Some(-42));
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn rejects_malformed_tokens() {
        let tokens = vec![
            "!!!not-base64!!!".to_string(),
            URL_SAFE_NO_PAD.encode("no-colon-here"),
            URL_SAFE_NO_PAD.encode("123"),
            URL_SAFE_NO_PAD.encode("abc:def"),
            URL_SAFE_NO_PAD.encode("123:not-a-uuid"),
            URL_SAFE_NO_PAD.encode(format!("123:{}:9:extra", Uuid::nil())),
        ];
        for token in &tokens {
            let err = Cursor::decode(token).unwrap_err();
            assert_eq!(err.error_code(), ErrorCode::InvalidCursor, "{token}");
        }
    }

    #[test]
    fn empty_cursor_means_first_page() {
        let params = PageParams {
            cursor: Some(String::new()),
            limit: None,
        };
        assert!(params.position().unwrap().is_none());
        assert!(PageParams::default().position().unwrap().is_none());
    }

    #[test]
    fn limit_is_clamped_not_rejected() {
        let params = PageParams {
            cursor: None,
            limit: Some(10_000),
        };
        assert_eq!(params.limit(), MAX_PAGE_SIZE);

        let params = PageParams {
            cursor: None,
            limit: Some(0),
        };
        assert_eq!(params.limit(), 1);

        assert_eq!(PageParams::default().limit(), DEFAULT_PAGE_SIZE);
    }
}
