pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Widget, Wrap},
    Frame,
};

use crate::{
    app::App,
    form::{ConfigForm, Field, FIELDS},
    session::{Phase, SessionRunner, SessionState},
};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;

/// Draws whichever screen the app is on
pub fn draw(app: &App, f: &mut Frame) {
    screen::current_screen(&app.state).render(app, f);
}

impl Widget for &ConfigForm {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let focus_style = Style::default().fg(Color::Yellow);
        let dim_style = Style::default().add_modifier(Modifier::DIM);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(2), // title
                Constraint::Length(3), // reps / time per rep / time between reps
                Constraint::Length(3), // input folder
                Constraint::Length(3), // output folder
                Constraint::Length(2), // checkboxes
                Constraint::Length(3), // start
                Constraint::Length(1), // stream notice
                Constraint::Min(0),
                Constraint::Length(1), // legend
            ])
            .split(area);

        Paragraph::new(Span::styled(
            "Training Module",
            bold_style.fg(Color::Cyan),
        ))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

        let numbers = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
            ])
            .split(chunks[1]);

        let text_fields = [
            (Field::NumReps, numbers[0]),
            (Field::RepTime, numbers[1]),
            (Field::TimeBetweenReps, numbers[2]),
            (Field::RepFolder, chunks[2]),
            (Field::OutputFolder, chunks[3]),
        ];
        for (field, rect) in text_fields {
            let focused = self.focus() == field;
            let mut value = self.value(field).unwrap_or_default().to_string();
            if focused {
                value.push('▏');
            }
            Paragraph::new(value)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(format!("{}:", field))
                        .border_style(if focused { focus_style } else { dim_style }),
                )
                .render(rect, buf);
        }

        let checkboxes = FIELDS
            .iter()
            .filter_map(|&field| self.checked(field).map(|checked| (field, checked)))
            .flat_map(|(field, checked)| {
                let style = if self.focus() == field {
                    bold_style.patch(focus_style)
                } else {
                    bold_style
                };
                [
                    Span::styled(
                        format!("[{}] {}", if checked { "x" } else { " " }, field),
                        style,
                    ),
                    Span::raw("     "),
                ]
            })
            .collect::<Vec<Span>>();
        Paragraph::new(Line::from(checkboxes))
            .alignment(Alignment::Center)
            .render(chunks[4], buf);

        let start_style = match (self.can_start(), self.focus() == Field::Start) {
            (false, _) => dim_style,
            (true, true) => bold_style.fg(Color::Black).bg(Color::Green),
            (true, false) => bold_style.fg(Color::Green),
        };
        Paragraph::new(Span::styled(Field::Start.to_string(), start_style))
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(if self.focus() == Field::Start {
                        focus_style
                    } else {
                        dim_style
                    }),
            )
            .render(chunks[5], buf);

        if !self.stream_ready() {
            Paragraph::new(Span::styled(
                "Sample stream not receiving data...",
                bold_style.fg(Color::Red),
            ))
            .alignment(Alignment::Center)
            .render(chunks[6], buf);
        }

        Paragraph::new(Span::styled(
            "(↑/↓) move / (space) toggle / (enter) start / (esc)ape",
            Style::default().add_modifier(Modifier::ITALIC),
        ))
        .render(chunks[8], buf);
    }
}

impl Widget for &SessionRunner {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(1), // rep label
                Constraint::Length(1), // class label
                Constraint::Min(5),    // prompt
                Constraint::Length(3), // progress
                Constraint::Length(1), // seconds left
                Constraint::Length(1), // padding
                Constraint::Length(1), // legend
            ])
            .split(area);

        Paragraph::new(Span::styled(
            format!(
                "Rep {} of {}",
                self.display_repetition(),
                self.config().num_reps
            ),
            bold_style,
        ))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

        match self.current() {
            Some((prompt, phase)) => {
                Paragraph::new(Span::styled(
                    format!("Class: {}", prompt.class_name),
                    bold_style,
                ))
                .alignment(Alignment::Center)
                .render(chunks[1], buf);

                let (banner, prompt_style) = match phase {
                    Phase::Rest => ("rest", Style::default().fg(Color::DarkGray)),
                    Phase::Active => ("hold", bold_style.fg(Color::Green)),
                };
                let image_name = prompt
                    .image
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();

                let frame = Block::default()
                    .borders(Borders::ALL)
                    .title(format!("{image_name} · {banner}"))
                    .border_style(prompt_style);
                let inner = frame.inner(chunks[2]);
                frame.render(chunks[2], buf);

                // rest shows the image desaturated, active in full colour
                if let Some((image, phase)) = self.current_image() {
                    let lines = image.halfblock_lines(phase, inner.width, inner.height);
                    let top_pad = inner.height.saturating_sub(lines.len() as u16) / 2;
                    let image_area = Rect {
                        y: inner.y + top_pad,
                        height: inner.height - top_pad,
                        ..inner
                    };
                    Paragraph::new(lines)
                        .alignment(Alignment::Center)
                        .render(image_area, buf);
                }

                let countdown = self.countdown();
                Gauge::default()
                    .block(Block::default().borders(Borders::ALL))
                    .gauge_style(prompt_style)
                    .ratio((countdown.progress() / 100.0).clamp(0.0, 1.0))
                    .label(format!("{:.0}%", countdown.progress()))
                    .render(chunks[3], buf);

                Paragraph::new(Span::styled(countdown.remaining().to_string(), bold_style))
                    .alignment(Alignment::Center)
                    .render(chunks[4], buf);

                Paragraph::new(Span::styled("(esc)ape", italic_style)).render(chunks[6], buf);
            }
            None => {
                if self.state() == SessionState::AwaitingAdvance {
                    Paragraph::new(vec![
                        Line::from(Span::styled(
                            format!(
                                "Rep {} saved: {} files in {}",
                                self.display_repetition(),
                                self.last_written().len(),
                                self.config().output_folder.display()
                            ),
                            bold_style,
                        )),
                        Line::from(""),
                        Line::from(Span::styled(
                            "(n) Next Rep     (r) Redo Rep",
                            bold_style.fg(Color::Cyan),
                        )),
                    ])
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true })
                    .block(Block::default().borders(Borders::ALL))
                    .render(chunks[2], buf);
                }

                Paragraph::new(Span::styled(
                    "(n)ext rep / (r)edo rep / (esc)ape",
                    italic_style,
                ))
                .render(chunks[6], buf);
            }
        }
    }
}
