//! Store boundary used by the snapshot assembler.
//!
//! `Store` is the read interface the broadcast path depends on. `SqliteStore`
//! implements it and additionally exposes the write operations the CLI uses
//! to operate a relay without the external management API.

use std::future::Future;

use chrono::Utc;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{FromRow, Sqlite, SqlitePool};

use crate::db::models::{
    Accident, DataEntry, DataType, Media, Mode, NewMedia, Playlist, PlaylistWithMedias, Settings,
    SettingsUpdate,
};
use crate::error::{RelayError, Result};

/// Placeholder a sensor feeder writes when it has no reading.
pub const NO_READING: &str = "---";

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// A table that logically holds exactly one row, materialized with defaults
/// on first read.
pub trait Singleton: for<'r> FromRow<'r, SqliteRow> + Clone + Send + Sync + Unpin + 'static {
    const KIND: &'static str;
    const TABLE: &'static str;
    const COLUMNS: &'static str;

    /// The record as first materialized. `id` is assigned by the store.
    fn defaults() -> Self;

    /// `INSERT ... ON CONFLICT(singleton_key) DO NOTHING` carrying `self`'s values.
    fn insert_if_absent(&self) -> SqliteQuery<'_>;
}

impl Singleton for Mode {
    const KIND: &'static str = "Mode";
    const TABLE: &'static str = "modes";
    const COLUMNS: &'static str = "id, name, playlist_id";

    fn defaults() -> Self {
        Mode {
            id: 0,
            name: "null".to_string(),
            playlist_id: None,
        }
    }

    fn insert_if_absent(&self) -> SqliteQuery<'_> {
        sqlx::query(
            "INSERT INTO modes (singleton_key, name, playlist_id) VALUES (1, ?, ?)
             ON CONFLICT(singleton_key) DO NOTHING",
        )
        .bind(&self.name)
        .bind(self.playlist_id)
    }
}

impl Singleton for Accident {
    const KIND: &'static str = "Accident";
    const TABLE: &'static str = "accidents";
    const COLUMNS: &'static str = "id, days_without_accident, record_days_without_accident, \
                                   accidents_this_year, reset_on_new_year, last_updated";

    fn defaults() -> Self {
        Accident {
            id: 0,
            days_without_accident: 0,
            record_days_without_accident: 0,
            accidents_this_year: 0,
            reset_on_new_year: false,
            last_updated: Utc::now(),
        }
    }

    fn insert_if_absent(&self) -> SqliteQuery<'_> {
        sqlx::query(
            "INSERT INTO accidents (singleton_key, days_without_accident, record_days_without_accident,
                                    accidents_this_year, reset_on_new_year, last_updated)
             VALUES (1, ?, ?, ?, ?, ?)
             ON CONFLICT(singleton_key) DO NOTHING",
        )
        .bind(self.days_without_accident)
        .bind(self.record_days_without_accident)
        .bind(self.accidents_this_year)
        .bind(self.reset_on_new_year)
        .bind(self.last_updated)
    }
}

impl Singleton for Settings {
    const KIND: &'static str = "Settings";
    const TABLE: &'static str = "settings";
    const COLUMNS: &'static str = "id, standby, standby_start_time, standby_end_time, \
                                   restart_at, language, theme, date";

    fn defaults() -> Self {
        Settings {
            id: 0,
            standby: false,
            standby_start_time: "22:00".to_string(),
            standby_end_time: "06:00".to_string(),
            restart_at: "03:00".to_string(),
            language: "fr".to_string(),
            theme: "dark".to_string(),
            date: Utc::now(),
        }
    }

    fn insert_if_absent(&self) -> SqliteQuery<'_> {
        sqlx::query(
            "INSERT INTO settings (singleton_key, standby, standby_start_time, standby_end_time,
                                   restart_at, language, theme, date)
             VALUES (1, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(singleton_key) DO NOTHING",
        )
        .bind(self.standby)
        .bind(&self.standby_start_time)
        .bind(&self.standby_end_time)
        .bind(&self.restart_at)
        .bind(&self.language)
        .bind(&self.theme)
        .bind(self.date)
    }
}

/// Read operations the snapshot assembler needs.
pub trait Store: Send + Sync + 'static {
    /// Fetch the singleton row, creating it with defaults if absent.
    /// Concurrent callers must all receive the same row.
    fn get_or_create_singleton<T: Singleton>(&self) -> impl Future<Output = Result<T>> + Send;

    fn get_all_data(&self) -> impl Future<Output = Result<Vec<DataEntry>>> + Send;

    /// Playlist with medias ordered by position, `None` if it does not exist.
    fn get_playlist_with_medias(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<PlaylistWithMedias>>> + Send;
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create or overwrite a data entry by name.
    #[tracing::instrument(skip(self))]
    pub async fn set_data(&self, name: &str, value: &str, data_type: DataType) -> Result<DataEntry> {
        if name.trim().is_empty() {
            return Err(RelayError::InvalidInput("Data name is required".to_string()));
        }
        validate_value(value, data_type)?;

        let entry = sqlx::query_as::<_, DataEntry>(
            r#"
            INSERT INTO data (name, value, type) VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET value = excluded.value, type = excluded.type
            RETURNING id, name, value, type
            "#,
        )
        .bind(name)
        .bind(value)
        .bind(data_type)
        .fetch_one(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Select what the displays show.
    #[tracing::instrument(skip(self))]
    pub async fn set_mode(&self, name: &str, playlist_id: Option<i64>) -> Result<Mode> {
        if name.trim().is_empty() {
            return Err(RelayError::InvalidInput("Mode name is required".to_string()));
        }
        if let Some(id) = playlist_id {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM playlists WHERE id = ?)")
                    .bind(id)
                    .fetch_one(&self.pool)
                    .await?;
            if !exists {
                return Err(RelayError::NotFound {
                    kind: "Playlist",
                    id,
                });
            }
        }

        let current: Mode = self.get_or_create_singleton().await?;
        let mode = sqlx::query_as::<_, Mode>(
            "UPDATE modes SET name = ?, playlist_id = ? WHERE id = ? RETURNING id, name, playlist_id",
        )
        .bind(name)
        .bind(playlist_id)
        .bind(current.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(mode)
    }

    /// Update the accident counters, raising the record when it is beaten.
    #[tracing::instrument(skip(self))]
    pub async fn update_accident(
        &self,
        days_without_accident: i64,
        accidents_this_year: i64,
        reset_on_new_year: bool,
    ) -> Result<Accident> {
        if days_without_accident < 0 || accidents_this_year < 0 {
            return Err(RelayError::InvalidInput(
                "Accident counters cannot be negative".to_string(),
            ));
        }

        let current: Accident = self.get_or_create_singleton().await?;
        let record = current
            .record_days_without_accident
            .max(days_without_accident);

        let accident = sqlx::query_as::<_, Accident>(&format!(
            "UPDATE accidents SET days_without_accident = ?, record_days_without_accident = ?,
                                  accidents_this_year = ?, reset_on_new_year = ?, last_updated = ?
             WHERE id = ? RETURNING {}",
            Accident::COLUMNS
        ))
        .bind(days_without_accident)
        .bind(record)
        .bind(accidents_this_year)
        .bind(reset_on_new_year)
        .bind(Utc::now())
        .bind(current.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(accident)
    }

    /// Partial settings update. Time strings are stored as given.
    #[tracing::instrument(skip(self))]
    pub async fn update_settings(&self, update: SettingsUpdate) -> Result<Settings> {
        let current: Settings = self.get_or_create_singleton().await?;

        let settings = sqlx::query_as::<_, Settings>(&format!(
            "UPDATE settings SET standby = ?, standby_start_time = ?, standby_end_time = ?,
                                 restart_at = ?, language = ?, theme = ?
             WHERE id = ? RETURNING {}",
            Settings::COLUMNS
        ))
        .bind(update.standby.unwrap_or(current.standby))
        .bind(update.standby_start_time.unwrap_or(current.standby_start_time))
        .bind(update.standby_end_time.unwrap_or(current.standby_end_time))
        .bind(update.restart_at.unwrap_or(current.restart_at))
        .bind(update.language.unwrap_or(current.language))
        .bind(update.theme.unwrap_or(current.theme))
        .bind(current.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(settings)
    }

    pub async fn create_playlist(&self, name: &str) -> Result<Playlist> {
        if name.trim().is_empty() {
            return Err(RelayError::InvalidInput("Name is required".to_string()));
        }

        let playlist = sqlx::query_as::<_, Playlist>(
            "INSERT INTO playlists (name) VALUES (?) RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(playlist)
    }

    /// Append a media item at the end of a playlist.
    #[tracing::instrument(skip(self, media), fields(file = %media.file_name))]
    pub async fn add_media(&self, playlist_id: i64, media: NewMedia) -> Result<Media> {
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM playlists WHERE id = ?)")
            .bind(playlist_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(RelayError::NotFound {
                kind: "Playlist",
                id: playlist_id,
            });
        }

        let position: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM medias WHERE playlist_id = ?",
        )
        .bind(playlist_id)
        .fetch_one(&mut *tx)
        .await?;

        let media = sqlx::query_as::<_, Media>(
            r#"
            INSERT INTO medias (playlist_id, original_file_name, file_name, path, format, type, size, duration, position)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, playlist_id, original_file_name, file_name, path, format, type, size, duration, position
            "#,
        )
        .bind(playlist_id)
        .bind(&media.original_file_name)
        .bind(&media.file_name)
        .bind(&media.path)
        .bind(&media.format)
        .bind(&media.media_type)
        .bind(media.size)
        .bind(media.duration)
        .bind(position)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(media)
    }
}

fn validate_value(value: &str, data_type: DataType) -> Result<()> {
    let valid = match data_type {
        DataType::Int => value == NO_READING || value.parse::<i64>().is_ok(),
        DataType::Boolean => matches!(value, "true" | "false"),
        DataType::String => true,
    };
    if valid {
        Ok(())
    } else {
        Err(RelayError::InvalidInput(format!(
            "Value '{}' is not a valid {:?}",
            value, data_type
        )))
    }
}

impl Store for SqliteStore {
    #[tracing::instrument(skip(self), fields(kind = T::KIND))]
    async fn get_or_create_singleton<T: Singleton>(&self) -> Result<T> {
        let select = format!(
            "SELECT {} FROM {} WHERE singleton_key = 1",
            T::COLUMNS,
            T::TABLE
        );

        // Steady state is a plain read; only a missing row takes the write lock.
        if let Some(row) = sqlx::query_as::<_, T>(&select)
            .fetch_optional(&self.pool)
            .await?
        {
            return Ok(row);
        }

        let defaults = T::defaults();
        let inserted = defaults.insert_if_absent().execute(&self.pool).await?;
        if inserted.rows_affected() > 0 {
            tracing::debug!("Created default {} record", T::KIND);
        }

        let row = sqlx::query_as::<_, T>(&select).fetch_one(&self.pool).await?;
        Ok(row)
    }

    async fn get_all_data(&self) -> Result<Vec<DataEntry>> {
        let data = sqlx::query_as::<_, DataEntry>("SELECT id, name, value, type FROM data ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(data)
    }

    async fn get_playlist_with_medias(&self, id: i64) -> Result<Option<PlaylistWithMedias>> {
        let Some(playlist) =
            sqlx::query_as::<_, Playlist>("SELECT id, name FROM playlists WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
        else {
            return Ok(None);
        };

        let medias = sqlx::query_as::<_, Media>(
            r#"
            SELECT id, playlist_id, original_file_name, file_name, path, format, type, size, duration, position
            FROM medias
            WHERE playlist_id = ?
            ORDER BY position ASC, id ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(PlaylistWithMedias { playlist, medias }))
    }
}
