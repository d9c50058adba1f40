//! Query parameter types for the notification endpoints.
//!
//! Pagination values are parsed leniently: anything that is not an integer
//! is treated as absent, and the defaults apply.

use serde::{Deserialize, Deserializer};

/// An integer query value that never fails to deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LenientInt(pub Option<i64>);

impl LenientInt {
    pub fn get(self) -> Option<i64> {
        self.0
    }
}

impl<'de> Deserialize<'de> for LenientInt {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(LenientInt(s.trim().parse::<i64>().ok()))
    }
}

/// `GET /api/v1/notifications`
#[derive(Debug, Default, Deserialize)]
pub struct UserNotificationsParams {
    pub username: Option<String>,
    /// Accepted only so it can be rejected with a helpful message.
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub page: LenientInt,
    #[serde(default, rename = "pageSize", alias = "page_size")]
    pub page_size: LenientInt,
}

/// `GET /api/v1/notifications/client`
#[derive(Debug, Default, Deserialize)]
pub struct ClientNotificationsParams {
    pub name: Option<String>,
    pub priority: Option<String>,
    #[serde(default)]
    pub page: LenientInt,
    #[serde(default, rename = "pageSize", alias = "page_size")]
    pub page_size: LenientInt,
}

/// `GET /ws`
#[derive(Debug, Default, Deserialize)]
pub struct SessionParams {
    pub username: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// Treat empty and whitespace-only values as absent.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
