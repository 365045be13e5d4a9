use ratatui::Frame;

use crate::app::{App, AppState};

/// A UI Screen boundary: responsible for rendering one app state
pub trait Screen {
    fn render(&self, app: &App, f: &mut Frame);
}

/// Configuration form with the stream start gate
pub struct ConfigureScreen;

impl Screen for ConfigureScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        f.render_widget(&app.form, f.area());
    }
}

/// Prompt image, countdown and next/redo controls
pub struct CaptureScreen;

impl Screen for CaptureScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        if let Some(session) = app.session.as_ref() {
            f.render_widget(session, f.area());
        }
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(state: &AppState) -> Box<dyn Screen> {
    match state {
        AppState::Configure => Box::new(ConfigureScreen),
        AppState::Capture => Box::new(CaptureScreen),
    }
}
