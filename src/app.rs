//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate command handlers.

use crate::commands;
use crate::logging;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use std::process;

/// A terminal camera and microphone recorder with a live level meter
#[derive(Parser)]
#[command(name = "mircam")]
#[command(version)]
#[command(about = "A terminal camera and microphone recorder with a live level meter")]
#[command(
    long_about = "A terminal camera and microphone recorder.\n\nShows a mirrored device preview with a live audio level meter, records\ncamera and microphone to an in-memory artifact, and lets you play back or\nsave the result.\n\nDEFAULT COMMAND:\n    If no command is specified, 'record' is used by default.\n\nEXAMPLES:\n    # Open the preview and record\n    $ mircam\n    $ mircam record\n\n    # Inspect capture devices\n    $ mircam list-devices\n\n    # Edit configuration file\n    $ mircam config"
)]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/mircam/mircam.toml\n    Logs:               ~/.local/state/mircam/mircam.log.*"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the preview and record camera and microphone (default)
    ///
    /// Space or 'r' starts and stops recording, 'p' plays back the last
    /// recording, 's' saves it to disk, Escape/q quits. Sending SIGUSR1
    /// stops an active recording externally.
    #[command(visible_alias = "r")]
    Record,

    /// Load a local image and print its inline preview URI
    ///
    /// Accepts image files only (png, jpeg, gif, webp, bmp, svg) and prints
    /// the base64 data URI the attachment surface would preview.
    #[command(visible_alias = "i")]
    Image {
        /// Path to the image file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Open configuration file in your preferred editor
    ///
    /// Edit capture devices, output directory, and meter settings.
    /// Uses $EDITOR environment variable or falls back to nano/vi.
    #[command(visible_alias = "c")]
    Config,

    /// List available capture devices
    ///
    /// Shows audio device IDs, names, and configurations plus candidate
    /// camera devices, to help fill in mircam.toml.
    #[command(name = "list-devices")]
    ListDevices,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    /// Useful for troubleshooting issues.
    Logs,

    /// Generate shell completion script
    ///
    /// Generate completion script for your shell. Save the output to your
    /// shell's completion directory or source it directly.
    ///
    /// Examples:
    ///   mircam completions bash > mircam.bash
    ///   mircam completions zsh > _mircam
    ///   mircam completions fish > mircam.fish
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the main application based on command-line arguments.
///
/// # Errors
/// - If logging initialization fails
/// - If command execution fails
pub async fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Handle commands that don't need logging setup
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "mircam", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::ListDevices) => {
            return match commands::handle_list_devices() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        Some(Commands::Logs) => {
            return match commands::handle_logs() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        _ => {}
    }

    // Initialize logging for all other commands
    logging::init_logging()?;

    match cli.command {
        None | Some(Commands::Record) => {
            commands::handle_record().await?;
        }
        Some(Commands::Image { file }) => {
            commands::handle_image(file)?;
        }
        Some(Commands::Config) => {
            commands::handle_config()?;
        }
        Some(Commands::Completions { .. }) | Some(Commands::ListDevices) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }

    Ok(())
}
