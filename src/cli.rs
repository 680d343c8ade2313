use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::db::models::DataType;

const LONG_ABOUT: &str = r#"
Signage Relay - live state fan-out for display screens

The relay serves one snapshot of the signage state (mode, data readings,
accident counters, settings, selected playlist) to every connected display
over WebSocket, refreshed on a fixed interval while displays are connected.

Server:
  signage serve          ← Run the relay (ws://HOST:PORT/ws)
  signage snapshot       ← Print the snapshot the relay would send

Displays:
  signage watch          ← Connect like a display and log what changes
  signage standby        ← Evaluate a standby window

State:
  signage data set temperature 21 --type INT
  signage mode set playlist --playlist 3
  signage settings set --standby true --start 22:00 --end 06:00

Environment:
  SIGNAGE_HOST, SIGNAGE_PORT, SIGNAGE_DB_PATH, SIGNAGE_BROADCAST_INTERVAL_MS,
  SIGNAGE_WS_URL, SIGNAGE_RECONNECT_DELAY_MS, SIGNAGE_RECONNECT_ATTEMPTS,
  SIGNAGE_LOG_RETENTION_DAYS
"#;

#[derive(Parser, Clone)]
#[command(name = "signage")]
#[command(about = "Signage relay - broadcast display state to connected screens")]
#[command(long_about = LONG_ABOUT)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output (-q)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output logs in JSON format
    #[arg(long)]
    pub json: bool,

    /// Database file (default: $SIGNAGE_DB_PATH or ~/.signage-relay/signage.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Run the relay server
    Serve {
        /// Address to bind (default: 0.0.0.0)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (default: 8080)
        #[arg(long)]
        port: Option<u16>,

        /// Broadcast interval in milliseconds (default: 1000)
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Connect to a relay as a display and log mode/standby transitions
    Watch {
        /// Relay WebSocket URL (default: ws://localhost:8080/ws)
        #[arg(long)]
        url: Option<String>,

        /// Delay between reconnect attempts in milliseconds (default: 5000)
        #[arg(long)]
        reconnect_delay_ms: Option<u64>,

        /// Consecutive reconnect attempts before giving up (default: 5)
        #[arg(long)]
        reconnect_attempts: Option<u32>,
    },

    /// Evaluate a standby window
    ///
    /// Windows where END is earlier than START wrap past midnight.
    ///
    /// Examples:
    ///   signage standby --start 22:00 --end 06:00 --at 23:30
    ///   signage standby --start 01:00 --end 05:00 --disabled
    Standby {
        /// Window start (HH:MM)
        #[arg(long)]
        start: String,

        /// Window end (HH:MM)
        #[arg(long)]
        end: String,

        /// Time to evaluate (HH:MM, default: now)
        #[arg(long)]
        at: Option<String>,

        /// Treat standby as disabled
        #[arg(long)]
        disabled: bool,
    },

    /// Assemble one snapshot and print it as JSON
    Snapshot,

    /// Named data values (sensor readings)
    #[command(subcommand)]
    Data(DataCommands),

    /// Display mode
    #[command(subcommand)]
    Mode(ModeCommands),

    /// Accident counters
    #[command(subcommand)]
    Accident(AccidentCommands),

    /// Display settings
    #[command(subcommand)]
    Settings(SettingsCommands),

    /// Playlists and their media
    #[command(subcommand)]
    Playlist(PlaylistCommands),
}

#[derive(Subcommand, Clone)]
pub enum DataCommands {
    /// Create or overwrite a value by name
    ///
    /// INT values must be integers (or "---" for "no reading"),
    /// BOOLEAN values must be true/false.
    Set {
        name: String,

        /// New value; may start with '-' (negative readings, "---")
        #[arg(allow_hyphen_values = true)]
        value: String,

        /// Value type: INT, BOOLEAN, STRING
        #[arg(long = "type", default_value = "STRING")]
        data_type: DataType,
    },
}

#[derive(Subcommand, Clone)]
pub enum ModeCommands {
    /// Select the display mode
    Set {
        /// Mode name (e.g. information, playlist)
        name: String,

        /// Playlist to show in "playlist" mode
        #[arg(long)]
        playlist: Option<i64>,
    },
}

#[derive(Subcommand, Clone)]
pub enum AccidentCommands {
    /// Update counters; unspecified fields keep their value
    Set {
        /// Days without accident
        #[arg(long)]
        days: Option<i64>,

        /// Accidents this year
        #[arg(long)]
        this_year: Option<i64>,

        /// Reset the yearly count on January 1st
        #[arg(long)]
        reset_on_new_year: Option<bool>,
    },
}

#[derive(Subcommand, Clone)]
pub enum SettingsCommands {
    /// Update settings; unspecified fields keep their value
    Set {
        /// Enable the standby window
        #[arg(long)]
        standby: Option<bool>,

        /// Standby start (HH:MM)
        #[arg(long)]
        start: Option<String>,

        /// Standby end (HH:MM)
        #[arg(long)]
        end: Option<String>,

        /// Daily restart time (HH:MM)
        #[arg(long)]
        restart_at: Option<String>,

        #[arg(long)]
        language: Option<String>,

        #[arg(long)]
        theme: Option<String>,
    },
}

#[derive(Subcommand, Clone)]
pub enum PlaylistCommands {
    /// Create an empty playlist
    Create { name: String },

    /// Append a media item to a playlist
    AddMedia {
        /// Playlist ID
        playlist_id: i64,

        /// Stored file name
        file_name: String,

        /// Public path served to displays
        #[arg(long)]
        path: String,

        /// Name of the file as uploaded (default: file name)
        #[arg(long)]
        original_name: Option<String>,

        /// Media type: image or video
        #[arg(long = "type", default_value = "image")]
        media_type: String,

        /// File format (default: file extension)
        #[arg(long)]
        format: Option<String>,

        /// Size in KB
        #[arg(long, default_value_t = 0)]
        size: i64,

        /// Display duration in seconds
        #[arg(long, default_value_t = 10)]
        duration: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_data_set_with_type() {
        let cli = Cli::try_parse_from(["signage", "data", "set", "temperature", "21", "--type", "int"])
            .unwrap();
        match cli.command {
            Commands::Data(DataCommands::Set {
                name,
                value,
                data_type,
            }) => {
                assert_eq!(name, "temperature");
                assert_eq!(value, "21");
                assert_eq!(data_type, DataType::Int);
            },
            _ => panic!("expected data set"),
        }
    }

    #[test]
    fn test_parse_data_set_hyphen_values() {
        for raw in ["-5", "---"] {
            let cli = Cli::try_parse_from(["signage", "data", "set", "temperature", raw, "--type", "INT"])
                .unwrap();
            match cli.command {
                Commands::Data(DataCommands::Set {
                    value, data_type, ..
                }) => {
                    assert_eq!(value, raw);
                    assert_eq!(data_type, DataType::Int);
                },
                _ => panic!("expected data set"),
            }
        }
    }

    #[test]
    fn test_global_db_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["signage", "snapshot", "--db", "/tmp/x.db"]).unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/x.db")));
    }

    #[test]
    fn test_bad_data_type_rejected() {
        assert!(Cli::try_parse_from(["signage", "data", "set", "a", "b", "--type", "FLOAT"]).is_err());
    }
}
