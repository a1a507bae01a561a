use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed enumeration of security-relevant events. Anything not listed here
/// does not belong in the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Login,
    Logout,
    CvCreated,
    CvUpdated,
    CvDeleted,
    SettingsChanged,
    PasswordChanged,
    TwoFactorEnabled,
    TwoFactorDisabled,
    ProfileUpdated,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Login => "login",
            ActivityType::Logout => "logout",
            ActivityType::CvCreated => "cv_created",
            ActivityType::CvUpdated => "cv_updated",
            ActivityType::CvDeleted => "cv_deleted",
            ActivityType::SettingsChanged => "settings_changed",
            ActivityType::PasswordChanged => "password_changed",
            ActivityType::TwoFactorEnabled => "two_factor_enabled",
            ActivityType::TwoFactorDisabled => "two_factor_disabled",
            ActivityType::ProfileUpdated => "profile_updated",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(ActivityType::Login),
            "logout" => Ok(ActivityType::Logout),
            "cv_created" => Ok(ActivityType::CvCreated),
            "cv_updated" => Ok(ActivityType::CvUpdated),
            "cv_deleted" => Ok(ActivityType::CvDeleted),
            "settings_changed" => Ok(ActivityType::SettingsChanged),
            "password_changed" => Ok(ActivityType::PasswordChanged),
            "two_factor_enabled" => Ok(ActivityType::TwoFactorEnabled),
            "two_factor_disabled" => Ok(ActivityType::TwoFactorDisabled),
            "profile_updated" => Ok(ActivityType::ProfileUpdated),
            other => Err(format!("unknown activity type '{other}'")),
        }
    }
}

/// One immutable audit entry. Append-only; pruned by the sweeper after the
/// 90-day retention window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: Uuid,
    pub principal_id: Uuid,
    pub activity_type: ActivityType,
    pub title: String,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for the recorder.
pub struct NewActivityRecord {
    pub principal_id: Uuid,
    pub activity_type: ActivityType,
    pub title: String,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
}
