use clap::Parser;
use signage_relay::cli::{Cli, Commands};
use signage_relay::cli_handlers::{
    handle_accident_command, handle_data_command, handle_mode_command, handle_playlist_command,
    handle_serve, handle_settings_command, handle_snapshot, handle_standby_command, handle_watch,
};
use signage_relay::error::{RelayError, Result};
use signage_relay::logging::{
    cleanup_old_logs, init_logging, log_dir, log_file_path, ApplicationMode, LoggingConfig,
};
use std::io::IsTerminal;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut log_config = LoggingConfig::from_args(cli.quiet, cli.verbose > 0, cli.json);

    // The server logs to a file when stdout is redirected (or SIGNAGE_LOG_FILE is set)
    let is_server = matches!(cli.command, Commands::Serve { .. });
    if is_server {
        let force_file_log = std::env::var("SIGNAGE_LOG_FILE").is_ok();
        if force_file_log || !std::io::stdout().is_terminal() {
            log_config = LoggingConfig::for_mode(ApplicationMode::Server);
            log_config.file_output = log_file_path(ApplicationMode::Server).ok();
        }
    } else if matches!(cli.command, Commands::Watch { .. }) {
        // Long-running: always timestamped, level and format still follow the flags
        let from_args = log_config;
        log_config = LoggingConfig::for_mode(ApplicationMode::Client);
        log_config.level = from_args.level;
        log_config.json_format = from_args.json_format;
        log_config.color = from_args.color;
    }

    if let Err(e) = init_logging(log_config) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if is_server {
        let retention_days = match signage_relay::config::log_retention_days() {
            Ok(days) => days,
            Err(e) => exit_with_error(e),
        };
        if let Some(dir) = log_dir() {
            cleanup_old_logs(&dir, retention_days).ok();
        }
    }

    if let Err(e) = run(cli).await {
        exit_with_error(e);
    }
}

fn exit_with_error(e: RelayError) -> ! {
    let error_response = e.to_error_response();
    match serde_json::to_string_pretty(&error_response) {
        Ok(json) => eprintln!("{}", json),
        Err(_) => eprintln!("{}", e),
    }
    std::process::exit(1);
}

async fn run(cli: Cli) -> Result<()> {
    let db = cli.db;
    match cli.command {
        Commands::Serve {
            host,
            port,
            interval_ms,
        } => handle_serve(db, host, port, interval_ms).await?,

        Commands::Watch {
            url,
            reconnect_delay_ms,
            reconnect_attempts,
        } => handle_watch(url, reconnect_delay_ms, reconnect_attempts).await?,

        Commands::Standby {
            start,
            end,
            at,
            disabled,
        } => handle_standby_command(&start, &end, at.as_deref(), disabled)?,

        Commands::Snapshot => handle_snapshot(db).await?,

        Commands::Data(cmd) => handle_data_command(db, cmd).await?,

        Commands::Mode(cmd) => handle_mode_command(db, cmd).await?,

        Commands::Accident(cmd) => handle_accident_command(db, cmd).await?,

        Commands::Settings(cmd) => handle_settings_command(db, cmd).await?,

        Commands::Playlist(cmd) => handle_playlist_command(db, cmd).await?,
    }

    Ok(())
}
