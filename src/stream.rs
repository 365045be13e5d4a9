use rand::Rng;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{CaptureError, Result};

/// One multi-channel reading, values in channel order
pub type Sample = Vec<f64>;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:12345";

const READ_TIMEOUT: Duration = Duration::from_millis(200);
const SYNTHETIC_BATCH_INTERVAL: Duration = Duration::from_millis(10);

/// Source of live sensor samples buffered since the last reset.
///
/// Methods take `&self` so one stream can be shared between the UI thread and
/// the start-gate poller.
pub trait SampleStream: Send + Sync {
    fn buffered_len(&self) -> usize;

    fn is_receiving(&self) -> bool {
        self.buffered_len() > 0
    }

    fn reset_buffer(&self);

    /// Snapshot of every sample received since the last reset
    fn buffer(&self) -> Vec<Sample>;

    fn stop(&self);
}

/// Sample storage shared between a producer thread and readers
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<Sample>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Sample>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn extend<I: IntoIterator<Item = Sample>>(&self, samples: I) {
        self.lock().extend(samples);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn snapshot(&self) -> Vec<Sample> {
        self.lock().clone()
    }
}

/// Parses a datagram of newline separated rows; values split on commas or whitespace.
/// Returns None if any value is not a number.
pub fn parse_datagram(text: &str) -> Option<Vec<Sample>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|field| !field.is_empty())
                .map(|field| field.parse::<f64>().ok())
                .collect::<Option<Sample>>()
        })
        .collect()
}

/// Receives samples as text datagrams from a streamer process
pub struct UdpStream {
    buffer: SharedBuffer,
    stopped: Arc<AtomicBool>,
}

impl UdpStream {
    pub fn bind(addr: &str) -> Result<Self> {
        let socket = UdpSocket::bind(addr).map_err(|source| CaptureError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        socket.set_read_timeout(Some(READ_TIMEOUT))?;
        info!("Listening for samples on {}", addr);

        let buffer = SharedBuffer::new();
        let stopped = Arc::new(AtomicBool::new(false));

        let thread_buffer = buffer.clone();
        let thread_stopped = stopped.clone();
        thread::spawn(move || {
            let mut datagram = [0u8; 65_535];
            while !thread_stopped.load(Ordering::Relaxed) {
                let len = match socket.recv(&mut datagram) {
                    Ok(len) => len,
                    Err(e)
                        if matches!(
                            e.kind(),
                            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                        ) =>
                    {
                        continue
                    }
                    Err(e) => {
                        warn!("Sample socket failed: {}", e);
                        break;
                    }
                };
                let text = String::from_utf8_lossy(&datagram[..len]);
                match parse_datagram(&text) {
                    Some(samples) => thread_buffer.extend(samples),
                    None => warn!("Dropping malformed datagram of {} bytes", len),
                }
            }
            debug!("Sample listener exited");
        });

        Ok(Self { buffer, stopped })
    }
}

impl SampleStream for UdpStream {
    fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn reset_buffer(&self) {
        self.buffer.clear();
    }

    fn buffer(&self) -> Vec<Sample> {
        self.buffer.snapshot()
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }
}

/// Generates random samples so the workflow can be rehearsed without hardware
pub struct SyntheticStream {
    buffer: SharedBuffer,
    stopped: Arc<AtomicBool>,
}

impl SyntheticStream {
    pub fn start(channels: usize, sample_rate: u32) -> Self {
        let buffer = SharedBuffer::new();
        let stopped = Arc::new(AtomicBool::new(false));
        let per_batch = ((sample_rate as f64) * SYNTHETIC_BATCH_INTERVAL.as_secs_f64())
            .ceil()
            .max(1.0) as usize;
        info!(
            "Generating {} channels of synthetic samples at {} Hz",
            channels, sample_rate
        );

        let thread_buffer = buffer.clone();
        let thread_stopped = stopped.clone();
        thread::spawn(move || {
            let mut rng = rand::thread_rng();
            while !thread_stopped.load(Ordering::Relaxed) {
                let batch = (0..per_batch)
                    .map(|_| (0..channels).map(|_| rng.gen_range(-1.0..1.0)).collect())
                    .collect::<Vec<Sample>>();
                thread_buffer.extend(batch);
                thread::sleep(SYNTHETIC_BATCH_INTERVAL);
            }
        });

        Self { buffer, stopped }
    }
}

impl SampleStream for SyntheticStream {
    fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn reset_buffer(&self) {
        self.buffer.clear();
    }

    fn buffer(&self) -> Vec<Sample> {
        self.buffer.snapshot()
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }
}

/// Stream fed directly by the caller
#[derive(Debug, Clone, Default)]
pub struct MemoryStream {
    buffer: SharedBuffer,
    stopped: Arc<AtomicBool>,
}

impl MemoryStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, sample: Sample) {
        self.buffer.extend(std::iter::once(sample));
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }
}

impl SampleStream for MemoryStream {
    fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn reset_buffer(&self) {
        self.buffer.clear();
    }

    fn buffer(&self) -> Vec<Sample> {
        self.buffer.snapshot()
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }
}
