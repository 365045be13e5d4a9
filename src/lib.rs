// Library surface for the binary and for headless integration tests.
pub mod app;
pub mod app_dirs;
pub mod config;
pub mod countdown;
pub mod error;
pub mod form;
pub mod output;
pub mod prompt;
pub mod prompt_image;
pub mod runtime;
pub mod session;
pub mod stream;
pub mod ui;

pub use app::{App, AppState, Control};
pub use error::CaptureError;
