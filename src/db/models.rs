use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Mode name that makes the snapshot carry the selected playlist.
pub const PLAYLIST_MODE: &str = "playlist";

/// What the displays currently show. Singleton record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Mode {
    pub id: i64,
    pub name: String,
    pub playlist_id: Option<i64>,
}

impl Mode {
    /// Playlist to include in the snapshot, if this mode selects one.
    pub fn selected_playlist(&self) -> Option<i64> {
        if self.name == PLAYLIST_MODE {
            self.playlist_id
        } else {
            None
        }
    }
}

/// Workplace safety counters. Singleton record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Accident {
    pub id: i64,
    pub days_without_accident: i64,
    pub record_days_without_accident: i64,
    pub accidents_this_year: i64,
    pub reset_on_new_year: bool,
    pub last_updated: DateTime<Utc>,
}

/// Standby window, theme and locale configuration. Singleton record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Settings {
    pub id: i64,
    pub standby: bool,
    pub standby_start_time: String,
    pub standby_end_time: String,
    pub restart_at: String,
    pub language: String,
    pub theme: String,
    pub date: DateTime<Utc>,
}

/// Partial settings update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub standby: Option<bool>,
    pub standby_start_time: Option<String>,
    pub standby_end_time: Option<String>,
    pub restart_at: Option<String>,
    pub language: Option<String>,
    pub theme: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum DataType {
    Int,
    Boolean,
    String,
}

impl std::str::FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INT" => Ok(DataType::Int),
            "BOOLEAN" => Ok(DataType::Boolean),
            "STRING" => Ok(DataType::String),
            _ => Err(format!("Type must be INT, BOOLEAN, or STRING, got '{}'", s)),
        }
    }
}

/// A named, typed value such as a sensor reading. Values are stored as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DataEntry {
    pub id: i64,
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Playlist {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Media {
    pub id: i64,
    pub playlist_id: i64,
    pub original_file_name: String,
    pub file_name: String,
    pub path: String,
    pub format: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub media_type: String,
    /// Size in KB
    pub size: i64,
    /// Display duration in seconds
    pub duration: i64,
    pub position: i64,
}

/// Media row to insert; position is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewMedia {
    pub original_file_name: String,
    pub file_name: String,
    pub path: String,
    pub format: String,
    pub media_type: String,
    pub size: i64,
    pub duration: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistWithMedias {
    #[serde(flatten)]
    pub playlist: Playlist,
    /// Ordered by `position` ascending
    pub medias: Vec<Media>,
}

/// The composed state broadcast to every display each cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub mode: Mode,
    pub data: Vec<DataEntry>,
    pub accident: Accident,
    pub settings: Settings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist: Option<PlaylistWithMedias>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    pub fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    pub fn snapshot(mode_name: &str) -> Snapshot {
        Snapshot {
            mode: Mode {
                id: 1,
                name: mode_name.to_string(),
                playlist_id: None,
            },
            data: vec![DataEntry {
                id: 1,
                name: "temperature".to_string(),
                value: "21".to_string(),
                data_type: DataType::Int,
            }],
            accident: Accident {
                id: 1,
                days_without_accident: 12,
                record_days_without_accident: 40,
                accidents_this_year: 2,
                reset_on_new_year: false,
                last_updated: timestamp(),
            },
            settings: Settings {
                id: 1,
                standby: true,
                standby_start_time: "22:00".to_string(),
                standby_end_time: "06:00".to_string(),
                restart_at: "03:00".to_string(),
                language: "fr".to_string(),
                theme: "dark".to_string(),
                date: timestamp(),
            },
            playlist: None,
        }
    }
}
