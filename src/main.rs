use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use emg_trainer::{
    app::{App, Control},
    app_dirs::AppDirs,
    config::{ConfigStore, FileConfigStore, SessionConfig},
    error::CaptureError,
    runtime::{
        spawn_stream_gate, AppEvent, AppEventSource, CrosstermEventSource, FixedTicker, Runner,
        Ticker, STREAM_POLL_INTERVAL,
    },
    stream::{SampleStream, SyntheticStream, UdpStream, DEFAULT_LISTEN_ADDR},
    ui,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    fs::{self, OpenOptions},
    io::{self, stdin},
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const REDRAW_INTERVAL_MS: u64 = 100;

/// screen guided training for recording labelled muscle-contraction data
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Guides a subject through each class image with rest and hold countdowns, capturing streamed sensor samples into one csv file per repetition and class."
)]
pub struct Cli {
    /// number of repetitions per class
    #[clap(short = 'n', long)]
    reps: Option<u32>,

    /// seconds each class is held while samples are captured
    #[clap(short = 't', long)]
    rep_time: Option<u32>,

    /// seconds of rest shown before each class
    #[clap(short = 'b', long)]
    rest_time: Option<u32>,

    /// folder holding <class>.png / <class>.jpg prompt images
    #[clap(short = 'i', long)]
    images: Option<PathBuf>,

    /// folder the recorded csv files are written to
    #[clap(short = 'o', long)]
    output: Option<PathBuf>,

    /// present the classes in a random order each repetition
    #[clap(long)]
    randomize: bool,

    /// skip the rest countdown between classes
    #[clap(long)]
    continuous: bool,

    /// udp address the sample streamer sends to
    #[clap(short = 'l', long, default_value = DEFAULT_LISTEN_ADDR)]
    listen: String,

    /// generate random samples instead of listening for a streamer
    #[clap(long)]
    synthetic: bool,

    /// channels per synthetic sample
    #[clap(long, default_value_t = 8)]
    channels: usize,

    /// synthetic samples per second
    #[clap(long, default_value_t = 200)]
    sample_rate: u32,

    /// file remembering the last session settings
    #[clap(long)]
    config: Option<PathBuf>,
}

impl Cli {
    /// Overlays explicit flags on the remembered configuration
    fn apply(&self, mut cfg: SessionConfig) -> SessionConfig {
        if let Some(reps) = self.reps {
            cfg.num_reps = reps;
        }
        if let Some(rep_time) = self.rep_time {
            cfg.rep_time = rep_time;
        }
        if let Some(rest_time) = self.rest_time {
            cfg.time_between_reps = rest_time;
        }
        if let Some(images) = &self.images {
            cfg.rep_folder = images.clone();
        }
        if let Some(output) = &self.output {
            cfg.output_folder = output.clone();
        }
        cfg.randomize |= self.randomize;
        cfg.continuous |= self.continuous;
        cfg
    }

    fn config_store(&self) -> FileConfigStore {
        self.config
            .as_ref()
            .map(|path| FileConfigStore::with_path(path))
            .unwrap_or_default()
    }

    fn open_stream(&self) -> Result<Arc<dyn SampleStream>, CaptureError> {
        if self.synthetic {
            Ok(Arc::new(SyntheticStream::start(
                self.channels,
                self.sample_rate,
            )))
        } else {
            Ok(Arc::new(UdpStream::bind(&self.listen)?))
        }
    }
}

fn init_logging() -> io::Result<PathBuf> {
    let path = AppDirs::log_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    let filter =
        EnvFilter::try_from_env("EMG_TRAINER_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(path)
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    match init_logging() {
        Ok(path) => info!("Logging to {:?}", path),
        Err(e) => eprintln!("logging disabled: {e}"),
    }

    let store = cli.config_store();
    let initial = cli.apply(store.load());
    let stream = cli.open_stream()?;

    let events = CrosstermEventSource::new();
    spawn_stream_gate(stream.clone(), events.sender(), STREAM_POLL_INTERVAL);
    let runner = Runner::new(
        events,
        FixedTicker::new(Duration::from_millis(REDRAW_INTERVAL_MS)),
    );
    let mut app = App::new(&initial, stream, Box::new(store));

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app, &runner);
    app.shutdown();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor()?;

    if let Err(e) = &result {
        error!("Session aborted: {}", e);
    }
    result
}

fn start_tui<B: Backend, E: AppEventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    terminal.draw(|f| ui::draw(app, f))?;

    loop {
        let event = runner.step();
        let redraw = !matches!(event, AppEvent::Idle);

        if app.on_event(event)? == Control::Quit {
            break;
        }
        if redraw {
            terminal.draw(|f| ui::draw(app, f))?;
        }
    }

    Ok(())
}
