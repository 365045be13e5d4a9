use crossterm::event::{KeyCode, KeyEvent};
use std::path::PathBuf;

use crate::config::SessionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Field {
    #[strum(to_string = "Num Reps")]
    NumReps,
    #[strum(to_string = "Time Per Rep")]
    RepTime,
    #[strum(to_string = "Time Between Reps")]
    TimeBetweenReps,
    #[strum(to_string = "Input Folder")]
    RepFolder,
    #[strum(to_string = "Output Folder")]
    OutputFolder,
    Randomize,
    Continuous,
    #[strum(to_string = "Start Training")]
    Start,
}

pub const FIELDS: [Field; 8] = [
    Field::NumReps,
    Field::RepTime,
    Field::TimeBetweenReps,
    Field::RepFolder,
    Field::OutputFolder,
    Field::Randomize,
    Field::Continuous,
    Field::Start,
];

impl Field {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Field::NumReps | Field::RepTime | Field::TimeBetweenReps)
    }

    pub fn is_text(&self) -> bool {
        self.is_numeric() || matches!(self, Field::RepFolder | Field::OutputFolder)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormAction {
    None,
    Start,
}

/// Editable state of the configuration screen
#[derive(Debug, Clone)]
pub struct ConfigForm {
    pub num_reps: String,
    pub rep_time: String,
    pub time_between_reps: String,
    pub rep_folder: String,
    pub output_folder: String,
    pub randomize: bool,
    pub continuous: bool,
    focus: usize,
    stream_ready: bool,
}

impl ConfigForm {
    pub fn from_config(cfg: &SessionConfig) -> Self {
        Self {
            num_reps: cfg.num_reps.to_string(),
            rep_time: cfg.rep_time.to_string(),
            time_between_reps: cfg.time_between_reps.to_string(),
            rep_folder: cfg.rep_folder.to_string_lossy().into_owned(),
            output_folder: cfg.output_folder.to_string_lossy().into_owned(),
            randomize: cfg.randomize,
            continuous: cfg.continuous,
            focus: 0,
            stream_ready: false,
        }
    }

    /// Snapshot of the form. Empty numeric fields read as zero.
    pub fn to_config(&self) -> SessionConfig {
        SessionConfig {
            num_reps: parse_count(&self.num_reps),
            rep_time: parse_count(&self.rep_time),
            time_between_reps: parse_count(&self.time_between_reps),
            rep_folder: PathBuf::from(&self.rep_folder),
            output_folder: PathBuf::from(&self.output_folder),
            randomize: self.randomize,
            continuous: self.continuous,
        }
    }

    pub fn focus(&self) -> Field {
        FIELDS[self.focus]
    }

    pub fn focus_next(&mut self) {
        self.focus = (self.focus + 1) % FIELDS.len();
    }

    pub fn focus_prev(&mut self) {
        self.focus = (self.focus + FIELDS.len() - 1) % FIELDS.len();
    }

    pub fn value(&self, field: Field) -> Option<&str> {
        match field {
            Field::NumReps => Some(&self.num_reps),
            Field::RepTime => Some(&self.rep_time),
            Field::TimeBetweenReps => Some(&self.time_between_reps),
            Field::RepFolder => Some(&self.rep_folder),
            Field::OutputFolder => Some(&self.output_folder),
            _ => None,
        }
    }

    fn value_mut(&mut self, field: Field) -> Option<&mut String> {
        match field {
            Field::NumReps => Some(&mut self.num_reps),
            Field::RepTime => Some(&mut self.rep_time),
            Field::TimeBetweenReps => Some(&mut self.time_between_reps),
            Field::RepFolder => Some(&mut self.rep_folder),
            Field::OutputFolder => Some(&mut self.output_folder),
            _ => None,
        }
    }

    pub fn checked(&self, field: Field) -> Option<bool> {
        match field {
            Field::Randomize => Some(self.randomize),
            Field::Continuous => Some(self.continuous),
            _ => None,
        }
    }

    pub fn input_char(&mut self, c: char) {
        let field = self.focus();
        if field.is_numeric() && !c.is_ascii_digit() {
            return;
        }
        if let Some(value) = self.value_mut(field) {
            value.push(c);
        }
    }

    pub fn backspace(&mut self) {
        let field = self.focus();
        if let Some(value) = self.value_mut(field) {
            value.pop();
        }
    }

    pub fn toggle(&mut self) {
        match self.focus() {
            Field::Randomize => self.randomize = !self.randomize,
            Field::Continuous => self.continuous = !self.continuous,
            _ => {}
        }
    }

    pub fn set_stream_ready(&mut self) {
        self.stream_ready = true;
    }

    pub fn stream_ready(&self) -> bool {
        self.stream_ready
    }

    pub fn can_start(&self) -> bool {
        self.stream_ready
    }

    pub fn on_key(&mut self, key: KeyEvent) -> FormAction {
        match key.code {
            KeyCode::Tab | KeyCode::Down => self.focus_next(),
            KeyCode::BackTab | KeyCode::Up => self.focus_prev(),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Enter => match self.focus() {
                Field::Start if self.can_start() => return FormAction::Start,
                Field::Start => {}
                Field::Randomize | Field::Continuous => self.toggle(),
                _ => self.focus_next(),
            },
            KeyCode::Char(' ') if !self.focus().is_text() => self.toggle(),
            KeyCode::Char(c) => self.input_char(c),
            _ => {}
        }
        FormAction::None
    }
}

fn parse_count(text: &str) -> u32 {
    text.trim().parse().unwrap_or(0)
}
