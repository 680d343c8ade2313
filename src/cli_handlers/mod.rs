// CLI command handlers module
//
// Relay: serve, watch, snapshot
// State: data, mode, accident, settings, playlist
// Tools: standby

pub mod relay;
pub mod standby_command;
pub mod state_commands;
pub mod utils;

pub use relay::{handle_serve, handle_snapshot, handle_watch};
pub use standby_command::handle_standby_command;
pub use state_commands::{
    handle_accident_command, handle_data_command, handle_mode_command, handle_playlist_command,
    handle_settings_command,
};
pub use utils::{open_store, print_json};
