//! Application command handlers for mircam.
//!
//! This module organizes command handling into separate submodules, each
//! responsible for one application command.
//!
//! # Commands
//! - `record`: Interactive camera+mic preview and recording session
//! - `image`: Load a local image and print its inline preview URI
//! - `config`: Open configuration file in the user's preferred editor
//! - `list_devices`: List available capture devices
//! - `logs`: Display recent log entries

pub mod config;
pub mod image;
pub mod list_devices;
pub mod logs;
pub mod record;

pub use config::handle_config;
pub use image::handle_image;
pub use list_devices::handle_list_devices;
pub use logs::handle_logs;
pub use record::handle_record;
