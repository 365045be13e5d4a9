use rand::Rng;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::countdown::Countdown;
use crate::error::Result;
use crate::output::OutputWriter;
use crate::prompt::{Prompt, PromptSet};
use crate::prompt_image::PromptImage;
use crate::stream::{Sample, SampleStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Phase {
    /// Desaturated image, subject relaxes
    Rest,
    /// Full colour image, subject holds the pose while samples are captured
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingStart,
    CountingDown { slot: usize, phase: Phase },
    /// A repetition has been written; waiting for next or redo
    AwaitingAdvance,
    /// All repetitions done, back to the configuration screen
    Complete,
}

/// Drives one guided session: prompts, countdowns, capture and persistence.
///
/// The runner never sleeps. Every call carries the caller's `now`; a phase ends
/// on the first `on_tick` at least its full length after the phase was entered.
#[derive(Debug)]
pub struct SessionRunner {
    config: SessionConfig,
    prompts: PromptSet,
    /// Decoded up front, indexed like the canonical prompt order
    images: Vec<PromptImage>,
    writer: OutputWriter,
    state: SessionState,
    repetition: u32,
    countdown: Countdown,
    phase_started: Instant,
    captured: BTreeMap<usize, Vec<Sample>>,
    last_written: Vec<PathBuf>,
}

impl SessionRunner {
    /// Decodes every prompt image; an unreadable one fails the session before it starts
    pub fn new(config: SessionConfig, prompts: PromptSet) -> Result<Self> {
        let images = prompts
            .canonical()
            .iter()
            .map(|prompt| PromptImage::load(&prompt.image))
            .collect::<Result<Vec<_>>>()?;
        let writer = OutputWriter::new(&config.output_folder);
        Ok(Self {
            config,
            prompts,
            images,
            writer,
            state: SessionState::AwaitingStart,
            repetition: 0,
            countdown: Countdown::new(0),
            phase_started: Instant::now(),
            captured: BTreeMap::new(),
            last_written: Vec::new(),
        })
    }

    /// Builds the prompt set from the configured image folder
    pub fn from_config(config: SessionConfig) -> Result<Self> {
        let prompts = PromptSet::from_dir(&config.rep_folder)?;
        info!(
            "Loaded {} prompt images from {:?}",
            prompts.len(),
            config.rep_folder
        );
        Self::new(config, prompts)
    }

    pub fn start<R: Rng + ?Sized>(
        &mut self,
        stream: &dyn SampleStream,
        rng: &mut R,
        now: Instant,
    ) -> Result<()> {
        if self.state != SessionState::AwaitingStart {
            return Ok(());
        }
        info!(
            "Starting session: {} reps of {} classes",
            self.config.num_reps,
            self.prompts.len()
        );
        self.begin_repetition(stream, rng, now)
    }

    /// Brings the running countdown up to `now`, moving on once the phase has run its length
    pub fn on_tick(&mut self, stream: &dyn SampleStream, now: Instant) -> Result<()> {
        let SessionState::CountingDown { slot, phase } = self.state else {
            return Ok(());
        };
        let elapsed = now.saturating_duration_since(self.phase_started);
        if !self.countdown.elapse(elapsed) {
            return Ok(());
        }
        self.finish_phase(slot, phase, stream, now)
    }

    pub fn next_repetition<R: Rng + ?Sized>(
        &mut self,
        stream: &dyn SampleStream,
        rng: &mut R,
        now: Instant,
    ) -> Result<()> {
        if self.state != SessionState::AwaitingAdvance {
            return Ok(());
        }
        self.begin_repetition(stream, rng, now)
    }

    /// Runs the repetition just recorded again, overwriting its files
    pub fn redo_repetition<R: Rng + ?Sized>(
        &mut self,
        stream: &dyn SampleStream,
        rng: &mut R,
        now: Instant,
    ) -> Result<()> {
        if self.state != SessionState::AwaitingAdvance {
            return Ok(());
        }
        self.repetition = self.repetition.saturating_sub(1);
        info!("Redoing rep {}", self.repetition + 1);
        self.begin_repetition(stream, rng, now)
    }

    fn begin_repetition<R: Rng + ?Sized>(
        &mut self,
        stream: &dyn SampleStream,
        rng: &mut R,
        now: Instant,
    ) -> Result<()> {
        if self.repetition >= self.config.num_reps {
            info!("Session complete after {} reps", self.repetition);
            self.repetition = 0;
            self.state = SessionState::Complete;
            return Ok(());
        }

        if self.config.randomize {
            self.prompts.shuffle(rng);
        }
        self.captured.clear();
        info!("Rep {} of {}", self.repetition + 1, self.config.num_reps);
        self.enter(0, self.first_phase(), stream, now)
    }

    fn first_phase(&self) -> Phase {
        if self.config.continuous {
            Phase::Active
        } else {
            Phase::Rest
        }
    }

    fn enter(
        &mut self,
        slot: usize,
        phase: Phase,
        stream: &dyn SampleStream,
        now: Instant,
    ) -> Result<()> {
        let Some(prompt) = self.prompts.at(slot) else {
            return self.end_repetition();
        };
        debug!("{} phase for class {}", phase, prompt.class_name);

        let seconds = match phase {
            Phase::Rest => self.config.time_between_reps,
            Phase::Active => {
                stream.reset_buffer();
                self.config.rep_time
            }
        };
        self.countdown = Countdown::new(seconds);
        self.phase_started = now;
        self.state = SessionState::CountingDown { slot, phase };

        if self.countdown.is_finished() {
            return self.finish_phase(slot, phase, stream, now);
        }
        Ok(())
    }

    fn finish_phase(
        &mut self,
        slot: usize,
        phase: Phase,
        stream: &dyn SampleStream,
        now: Instant,
    ) -> Result<()> {
        match phase {
            Phase::Rest => self.enter(slot, Phase::Active, stream, now),
            Phase::Active => {
                if let Some(index) = self.prompts.at(slot).map(|p| p.index) {
                    let samples = stream.buffer();
                    debug!("Captured {} samples for class {}", samples.len(), index);
                    self.captured.insert(index, samples);
                }
                self.enter(slot + 1, self.first_phase(), stream, now)
            }
        }
    }

    fn end_repetition(&mut self) -> Result<()> {
        self.last_written = self
            .writer
            .write_repetition(self.repetition + 1, &self.captured)?;
        self.captured.clear();
        self.repetition += 1;
        self.state = SessionState::AwaitingAdvance;
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == SessionState::Complete
    }

    /// 0-based index of the next repetition to record
    pub fn repetition(&self) -> u32 {
        self.repetition
    }

    /// 1-based repetition number for the "Rep X of Y" label
    pub fn display_repetition(&self) -> u32 {
        match self.state {
            SessionState::AwaitingAdvance => self.repetition,
            _ => self.repetition + 1,
        }
    }

    pub fn current(&self) -> Option<(&Prompt, Phase)> {
        match self.state {
            SessionState::CountingDown { slot, phase } => self.prompts.at(slot).map(|p| (p, phase)),
            _ => None,
        }
    }

    /// Decoded image of the prompt on screen, with the phase it is shown for
    pub fn current_image(&self) -> Option<(&PromptImage, Phase)> {
        let (prompt, phase) = self.current()?;
        self.images.get(prompt.index).map(|image| (image, phase))
    }

    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn prompts(&self) -> &PromptSet {
        &self.prompts
    }

    /// Files written when the last repetition finished
    pub fn last_written(&self) -> &[PathBuf] {
        &self.last_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptureError;
    use crate::stream::MemoryStream;
    use assert_matches::assert_matches;
    use image::{Rgb, RgbImage};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    fn image_dir(names: &[&str]) -> TempDir {
        let dir = tempdir().unwrap();
        for name in names {
            RgbImage::from_pixel(4, 4, Rgb([180, 60, 60]))
                .save(dir.path().join(name))
                .unwrap();
        }
        dir
    }

    fn config(images: &Path, output: &Path, reps: u32) -> SessionConfig {
        SessionConfig {
            num_reps: reps,
            rep_time: 2,
            time_between_reps: 1,
            rep_folder: images.to_path_buf(),
            output_folder: output.to_path_buf(),
            randomize: false,
            continuous: false,
        }
    }

    /// Ticks one simulated second at a time until the repetition is written,
    /// feeding one sample per second tagged with the class index (-1 while
    /// resting). Returns every (class, phase) shown in order.
    fn run_repetition(
        runner: &mut SessionRunner,
        stream: &MemoryStream,
        clock: &mut Instant,
    ) -> Vec<(String, Phase)> {
        let mut shown: Vec<(String, Phase)> = Vec::new();
        for _ in 0..1000 {
            let Some((prompt, phase)) = runner.current() else {
                break;
            };
            let entry = (prompt.class_name.clone(), phase);
            if shown.last() != Some(&entry) {
                shown.push(entry);
            }
            let tag = if phase == Phase::Active {
                prompt.index as f64
            } else {
                -1.0
            };
            stream.push(vec![tag, tag]);
            *clock += Duration::from_secs(1);
            runner.on_tick(stream, *clock).unwrap();
        }
        shown
    }

    fn csv_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn full_run_writes_one_file_per_rep_and_class() {
        let images = image_dir(&["fist.png", "open.png"]);
        let out = tempdir().unwrap();
        let stream = MemoryStream::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut clock = Instant::now();
        let mut runner = SessionRunner::from_config(config(images.path(), out.path(), 2)).unwrap();

        runner.start(&stream, &mut rng, clock).unwrap();
        let shown = run_repetition(&mut runner, &stream, &mut clock);
        assert_eq!(
            shown,
            vec![
                ("fist".to_string(), Phase::Rest),
                ("fist".to_string(), Phase::Active),
                ("open".to_string(), Phase::Rest),
                ("open".to_string(), Phase::Active),
            ]
        );
        assert_eq!(runner.state(), SessionState::AwaitingAdvance);
        assert_eq!(runner.display_repetition(), 1);

        runner.next_repetition(&stream, &mut rng, clock).unwrap();
        run_repetition(&mut runner, &stream, &mut clock);
        runner.next_repetition(&stream, &mut rng, clock).unwrap();

        assert!(runner.is_complete());
        assert_eq!(runner.repetition(), 0);
        assert_eq!(
            csv_files(out.path()),
            vec!["R_1_C_0.csv", "R_1_C_1.csv", "R_2_C_0.csv", "R_2_C_1.csv"]
        );
        // Two active seconds per class, rest samples cleared on entry
        assert_eq!(
            fs::read_to_string(out.path().join("R_2_C_1.csv")).unwrap(),
            "1,1\n1,1\n"
        );
    }

    #[test]
    fn rest_phase_samples_are_discarded() {
        let images = image_dir(&["fist.png"]);
        let out = tempdir().unwrap();
        let stream = MemoryStream::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut clock = Instant::now();
        let mut runner = SessionRunner::from_config(config(images.path(), out.path(), 1)).unwrap();

        runner.start(&stream, &mut rng, clock).unwrap();
        run_repetition(&mut runner, &stream, &mut clock);

        let written = fs::read_to_string(out.path().join("R_1_C_0.csv")).unwrap();
        assert!(!written.contains("-1"));
    }

    #[test]
    fn active_window_lasts_full_rep_time_from_entry() {
        let images = image_dir(&["fist.png"]);
        let out = tempdir().unwrap();
        let stream = MemoryStream::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut cfg = config(images.path(), out.path(), 1);
        cfg.continuous = true;
        cfg.rep_time = 1;
        let mut runner = SessionRunner::from_config(cfg).unwrap();

        // Ticks arriving at arbitrary offsets must not cut the first second short
        let entered = Instant::now();
        runner.start(&stream, &mut rng, entered).unwrap();
        stream.push(vec![0.5]);
        runner
            .on_tick(&stream, entered + Duration::from_millis(10))
            .unwrap();
        runner
            .on_tick(&stream, entered + Duration::from_millis(999))
            .unwrap();
        assert_matches!(runner.state(), SessionState::CountingDown { .. });
        assert_eq!(runner.countdown().remaining(), 1);

        stream.push(vec![0.75]);
        runner
            .on_tick(&stream, entered + Duration::from_millis(1000))
            .unwrap();
        assert_eq!(runner.state(), SessionState::AwaitingAdvance);
        assert_eq!(
            fs::read_to_string(out.path().join("R_1_C_0.csv")).unwrap(),
            "0.5\n0.75\n"
        );
    }

    #[test]
    fn next_phase_is_timed_from_when_it_was_entered() {
        let images = image_dir(&["fist.png"]);
        let out = tempdir().unwrap();
        let stream = MemoryStream::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut runner = SessionRunner::from_config(config(images.path(), out.path(), 1)).unwrap();

        let t0 = Instant::now();
        runner.start(&stream, &mut rng, t0).unwrap();
        // Rest ends late, on a tick 1.4s in
        let rest_end = t0 + Duration::from_millis(1400);
        runner.on_tick(&stream, rest_end).unwrap();
        assert_eq!(runner.current().map(|(_, p)| p), Some(Phase::Active));

        runner
            .on_tick(&stream, rest_end + Duration::from_millis(1999))
            .unwrap();
        assert_eq!(runner.current().map(|(_, p)| p), Some(Phase::Active));
        runner
            .on_tick(&stream, rest_end + Duration::from_secs(2))
            .unwrap();
        assert_eq!(runner.state(), SessionState::AwaitingAdvance);
    }

    #[test]
    fn redo_overwrites_only_the_repeated_repetition() {
        let images = image_dir(&["a.png", "b.png"]);
        let out = tempdir().unwrap();
        let stream = MemoryStream::new();
        let mut rng = StdRng::seed_from_u64(3);
        let mut clock = Instant::now();
        let mut runner = SessionRunner::from_config(config(images.path(), out.path(), 3)).unwrap();

        runner.start(&stream, &mut rng, clock).unwrap();
        run_repetition(&mut runner, &stream, &mut clock);
        runner.next_repetition(&stream, &mut rng, clock).unwrap();
        run_repetition(&mut runner, &stream, &mut clock);
        assert_eq!(runner.repetition(), 2);

        fs::write(out.path().join("R_1_C_0.csv"), "sentinel\n").unwrap();
        fs::write(out.path().join("R_2_C_0.csv"), "sentinel\n").unwrap();

        runner.redo_repetition(&stream, &mut rng, clock).unwrap();
        assert_eq!(runner.display_repetition(), 2);
        run_repetition(&mut runner, &stream, &mut clock);
        assert_eq!(runner.repetition(), 2);

        assert_eq!(
            fs::read_to_string(out.path().join("R_1_C_0.csv")).unwrap(),
            "sentinel\n"
        );
        assert_eq!(
            fs::read_to_string(out.path().join("R_2_C_0.csv")).unwrap(),
            "0,0\n0,0\n"
        );
        assert!(!out.path().join("R_3_C_0.csv").exists());
    }

    #[test]
    fn shuffled_order_files_by_original_index() {
        let names = ["a.png", "b.png", "c.png", "d.png", "e.png", "f.png"];
        let images = image_dir(&names);
        let out = tempdir().unwrap();
        let stream = MemoryStream::new();
        let mut rng = StdRng::seed_from_u64(42);
        let mut clock = Instant::now();
        let mut cfg = config(images.path(), out.path(), 1);
        cfg.randomize = true;
        cfg.rep_time = 1;
        let mut runner = SessionRunner::from_config(cfg).unwrap();

        runner.start(&stream, &mut rng, clock).unwrap();
        run_repetition(&mut runner, &stream, &mut clock);

        for (idx, _) in names.iter().enumerate() {
            let content = fs::read_to_string(out.path().join(format!("R_1_C_{idx}.csv"))).unwrap();
            assert_eq!(content, format!("{idx},{idx}\n"));
        }
    }

    #[test]
    fn continuous_mode_shows_each_class_once() {
        let images = image_dir(&["a.png", "b.png", "c.png"]);
        let out = tempdir().unwrap();
        let stream = MemoryStream::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut clock = Instant::now();
        let mut cfg = config(images.path(), out.path(), 1);
        cfg.continuous = true;
        let mut runner = SessionRunner::from_config(cfg).unwrap();

        runner.start(&stream, &mut rng, clock).unwrap();
        let shown = run_repetition(&mut runner, &stream, &mut clock);

        assert_eq!(shown.len(), 3);
        assert!(shown.iter().all(|(_, phase)| *phase == Phase::Active));
        assert_eq!(csv_files(out.path()).len(), 3);
    }

    #[test]
    fn active_countdown_uses_rep_time_and_rest_uses_pause() {
        let images = image_dir(&["a.png"]);
        let out = tempdir().unwrap();
        let stream = MemoryStream::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut cfg = config(images.path(), out.path(), 1);
        cfg.time_between_reps = 4;
        cfg.rep_time = 6;
        let mut runner = SessionRunner::from_config(cfg).unwrap();

        let t0 = Instant::now();
        runner.start(&stream, &mut rng, t0).unwrap();
        assert_eq!(runner.countdown().total(), 4);
        for s in 1..=4 {
            runner
                .on_tick(&stream, t0 + Duration::from_secs(s))
                .unwrap();
        }
        assert_matches!(
            runner.state(),
            SessionState::CountingDown {
                phase: Phase::Active,
                ..
            }
        );
        assert_eq!(runner.countdown().total(), 6);
    }

    #[test]
    fn zero_length_phases_advance_on_entry() {
        let images = image_dir(&["a.png", "b.png"]);
        let out = tempdir().unwrap();
        let stream = MemoryStream::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut cfg = config(images.path(), out.path(), 1);
        cfg.time_between_reps = 0;
        let mut runner = SessionRunner::from_config(cfg).unwrap();

        let t0 = Instant::now();
        runner.start(&stream, &mut rng, t0).unwrap();
        assert_eq!(runner.current().map(|(_, p)| p), Some(Phase::Active));
        assert_eq!(runner.countdown().total(), 2);

        let mut cfg = config(images.path(), out.path(), 1);
        cfg.time_between_reps = 0;
        cfg.rep_time = 0;
        let mut runner = SessionRunner::from_config(cfg).unwrap();
        runner.start(&stream, &mut rng, t0).unwrap();
        assert_eq!(runner.state(), SessionState::AwaitingAdvance);
        assert_eq!(csv_files(out.path()), vec!["R_1_C_0.csv", "R_1_C_1.csv"]);
    }

    #[test]
    fn zero_reps_completes_immediately() {
        let images = image_dir(&["a.png"]);
        let out = tempdir().unwrap();
        let stream = MemoryStream::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut runner = SessionRunner::from_config(config(images.path(), out.path(), 0)).unwrap();

        runner.start(&stream, &mut rng, Instant::now()).unwrap();
        assert!(runner.is_complete());
        assert!(!out.path().join("R_1_C_0.csv").exists());
    }

    #[test]
    fn empty_image_folder_goes_straight_to_advance() {
        let images = image_dir(&[]);
        let out = tempdir().unwrap();
        let stream = MemoryStream::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut runner = SessionRunner::from_config(config(images.path(), out.path(), 1)).unwrap();

        runner.start(&stream, &mut rng, Instant::now()).unwrap();
        assert_eq!(runner.state(), SessionState::AwaitingAdvance);
        assert!(runner.last_written().is_empty());
    }

    #[test]
    fn corrupt_image_fails_before_anything_is_shown() {
        let images = image_dir(&["a.png"]);
        fs::write(images.path().join("b.png"), b"not an image").unwrap();
        let out = tempdir().unwrap();

        let err = SessionRunner::from_config(config(images.path(), out.path(), 1)).unwrap_err();
        assert_matches!(err, CaptureError::Image { path, .. } if path.ends_with("b.png"));
        assert!(csv_files(out.path()).is_empty());
    }

    #[test]
    fn shown_image_follows_prompt_and_phase() {
        let images = image_dir(&["a.png"]);
        let out = tempdir().unwrap();
        let stream = MemoryStream::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut runner = SessionRunner::from_config(config(images.path(), out.path(), 1)).unwrap();
        assert!(runner.current_image().is_none());

        let t0 = Instant::now();
        runner.start(&stream, &mut rng, t0).unwrap();
        let (image, phase) = runner.current_image().unwrap();
        assert_eq!(phase, Phase::Rest);
        let [r, g, b] = image.for_phase(phase).to_rgb8().get_pixel(0, 0).0;
        assert!(r == g && g == b);

        runner.on_tick(&stream, t0 + Duration::from_secs(1)).unwrap();
        let (image, phase) = runner.current_image().unwrap();
        assert_eq!(phase, Phase::Active);
        assert_eq!(image.for_phase(phase).to_rgb8().get_pixel(0, 0).0, [180, 60, 60]);
    }

    #[test]
    fn advance_controls_ignored_while_counting() {
        let images = image_dir(&["a.png"]);
        let out = tempdir().unwrap();
        let stream = MemoryStream::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut runner = SessionRunner::from_config(config(images.path(), out.path(), 2)).unwrap();

        let now = Instant::now();
        runner.start(&stream, &mut rng, now).unwrap();
        let before = runner.state();
        runner.redo_repetition(&stream, &mut rng, now).unwrap();
        runner.next_repetition(&stream, &mut rng, now).unwrap();
        assert_eq!(runner.state(), before);
        assert_eq!(runner.repetition(), 0);
    }
}
