use std::path::{Path, PathBuf};

use super::utils::{open_store, print_json};
use crate::cli::{AccidentCommands, DataCommands, ModeCommands, PlaylistCommands, SettingsCommands};
use crate::db::models::{Accident, NewMedia, SettingsUpdate};
use crate::error::Result;
use crate::store::Store;

pub async fn handle_data_command(db: Option<PathBuf>, cmd: DataCommands) -> Result<()> {
    let store = open_store(db).await?;
    match cmd {
        DataCommands::Set {
            name,
            value,
            data_type,
        } => print_json(&store.set_data(&name, &value, data_type).await?),
    }
}

pub async fn handle_mode_command(db: Option<PathBuf>, cmd: ModeCommands) -> Result<()> {
    let store = open_store(db).await?;
    match cmd {
        ModeCommands::Set { name, playlist } => print_json(&store.set_mode(&name, playlist).await?),
    }
}

pub async fn handle_accident_command(db: Option<PathBuf>, cmd: AccidentCommands) -> Result<()> {
    let store = open_store(db).await?;
    match cmd {
        AccidentCommands::Set {
            days,
            this_year,
            reset_on_new_year,
        } => {
            let current: Accident = store.get_or_create_singleton().await?;
            let accident = store
                .update_accident(
                    days.unwrap_or(current.days_without_accident),
                    this_year.unwrap_or(current.accidents_this_year),
                    reset_on_new_year.unwrap_or(current.reset_on_new_year),
                )
                .await?;
            print_json(&accident)
        },
    }
}

pub async fn handle_settings_command(db: Option<PathBuf>, cmd: SettingsCommands) -> Result<()> {
    let store = open_store(db).await?;
    match cmd {
        SettingsCommands::Set {
            standby,
            start,
            end,
            restart_at,
            language,
            theme,
        } => {
            let update = SettingsUpdate {
                standby,
                standby_start_time: start,
                standby_end_time: end,
                restart_at,
                language,
                theme,
            };
            print_json(&store.update_settings(update).await?)
        },
    }
}

pub async fn handle_playlist_command(db: Option<PathBuf>, cmd: PlaylistCommands) -> Result<()> {
    let store = open_store(db).await?;
    match cmd {
        PlaylistCommands::Create { name } => print_json(&store.create_playlist(&name).await?),
        PlaylistCommands::AddMedia {
            playlist_id,
            file_name,
            path,
            original_name,
            media_type,
            format,
            size,
            duration,
        } => {
            let format = format.unwrap_or_else(|| {
                Path::new(&file_name)
                    .extension()
                    .map(|ext| ext.to_string_lossy().to_lowercase())
                    .unwrap_or_default()
            });
            let media = NewMedia {
                original_file_name: original_name.unwrap_or_else(|| file_name.clone()),
                file_name,
                path,
                format,
                media_type,
                size,
                duration,
            };
            print_json(&store.add_media(playlist_id, media).await?)
        },
    }
}
