use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{ConfigStore, SessionConfig};
use crate::error::Result;
use crate::form::{ConfigForm, FormAction};
use crate::runtime::{AppEvent, Clock, SystemClock};
use crate::session::{Phase, SessionRunner, SessionState};
use crate::stream::SampleStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Configure,
    Capture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

pub struct App {
    pub state: AppState,
    pub form: ConfigForm,
    pub session: Option<SessionRunner>,
    stream: Arc<dyn SampleStream>,
    store: Box<dyn ConfigStore>,
    rng: StdRng,
    clock: Arc<dyn Clock>,
}

impl App {
    pub fn new(
        initial: &SessionConfig,
        stream: Arc<dyn SampleStream>,
        store: Box<dyn ConfigStore>,
    ) -> Self {
        Self {
            state: AppState::Configure,
            form: ConfigForm::from_config(initial),
            session: None,
            stream,
            store,
            rng: StdRng::from_entropy(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the wall clock driving countdowns
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the shuffle source, for reproducible sessions
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn on_event(&mut self, event: AppEvent) -> Result<Control> {
        match event {
            AppEvent::Key(key) => return self.on_key(key),
            AppEvent::Tick => {
                if let Some(session) = self.session.as_mut() {
                    session.on_tick(self.stream.as_ref(), self.clock.now())?;
                }
                self.return_if_complete();
                self.discard_idle_samples();
            }
            AppEvent::StreamReady => self.form.set_stream_ready(),
            AppEvent::Resize | AppEvent::Idle => {}
        }
        Ok(Control::Continue)
    }

    fn on_key(&mut self, key: KeyEvent) -> Result<Control> {
        let ctrl_c =
            key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c');
        if key.code == KeyCode::Esc || ctrl_c {
            return Ok(Control::Quit);
        }

        match self.state {
            AppState::Configure => {
                if self.form.on_key(key) == FormAction::Start {
                    self.start_session()?;
                }
            }
            AppState::Capture => {
                if let Some(session) = self.session.as_mut() {
                    match key.code {
                        KeyCode::Char('n') | KeyCode::Right => {
                            session.next_repetition(
                                self.stream.as_ref(),
                                &mut self.rng,
                                self.clock.now(),
                            )?
                        }
                        KeyCode::Char('r') | KeyCode::Left => session.redo_repetition(
                            self.stream.as_ref(),
                            &mut self.rng,
                            self.clock.now(),
                        )?,
                        _ => {}
                    }
                }
                self.return_if_complete();
            }
        }
        Ok(Control::Continue)
    }

    fn start_session(&mut self) -> Result<()> {
        let config = self.form.to_config();
        if let Err(e) = self.store.save(&config) {
            warn!("Could not remember session config: {}", e);
        }

        let mut session = SessionRunner::from_config(config)?;
        session.start(self.stream.as_ref(), &mut self.rng, self.clock.now())?;
        self.session = Some(session);
        self.state = AppState::Capture;
        self.return_if_complete();
        Ok(())
    }

    fn return_if_complete(&mut self) {
        if self.session.as_ref().is_some_and(|s| s.is_complete()) {
            self.session = None;
            self.state = AppState::Configure;
        }
    }

    /// Drops samples nobody will record so the buffer stays bounded between captures.
    /// Before the start gate opens the samples are left for the gate to see.
    fn discard_idle_samples(&self) {
        let idle = match self.session.as_ref().map(|s| s.state()) {
            Some(SessionState::CountingDown {
                phase: Phase::Active,
                ..
            }) => false,
            Some(_) => true,
            None => self.form.stream_ready(),
        };
        if idle {
            self.stream.reset_buffer();
        }
    }

    /// Stops the sample stream; call before tearing down the terminal
    pub fn shutdown(&self) {
        info!("Stopping sample stream");
        self.stream.stop();
    }
}
