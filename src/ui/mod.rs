//! Terminal user interface.

pub mod error;
pub mod gauge;
pub mod screen;

pub use error::ErrorScreen;
pub use screen::{RecordingScreen, SessionCommand, SessionView};
