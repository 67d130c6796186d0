use std::path::PathBuf;
use std::time::{Duration, Instant};

mod viewer;

pub use viewer::{StepOutcome, Viewer, ViewerOptions};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("cannot schedule an empty shader catalog")]
    EmptyCatalog,
    #[error("selection {index} is outside a catalog of {len} shader(s)")]
    SelectionOutOfRange { index: usize, len: usize },
}

/// What an input device can ask the viewer to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerCommand {
    NavigatePrevious,
    NavigateNext,
    ToggleFullscreen,
    Quit,
}

/// Index of the current program plus the pending-reload flag.
///
/// Navigation never swaps programs directly; it only moves the index and
/// raises the flag, which the next loop iteration consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    index: usize,
    len: usize,
    reload_requested: bool,
}

impl Selection {
    pub fn new(index: usize, len: usize) -> Result<Self, SchedulerError> {
        if len == 0 {
            return Err(SchedulerError::EmptyCatalog);
        }
        if index >= len {
            return Err(SchedulerError::SelectionOutOfRange { index, len });
        }
        Ok(Self {
            index,
            len,
            reload_requested: true,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn reload_requested(&self) -> bool {
        self.reload_requested
    }

    pub fn next(&mut self) {
        self.index = (self.index + 1) % self.len;
        self.reload_requested = true;
    }

    pub fn previous(&mut self) {
        self.index = (self.index + self.len - 1) % self.len;
        self.reload_requested = true;
    }

    /// Returns the flag and clears it.
    pub fn take_reload(&mut self) -> bool {
        std::mem::take(&mut self.reload_requested)
    }
}

/// Periodic throughput sample for the current program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub elapsed: Duration,
    pub frames: u64,
    pub fps: f64,
}

/// Activation time and frame count of the current program.
#[derive(Debug, Clone)]
pub struct FrameClock {
    activated_at: Instant,
    frames: u64,
    report_every: u64,
}

impl FrameClock {
    pub fn new(now: Instant, report_every: u64) -> Self {
        Self {
            activated_at: now,
            frames: 0,
            report_every: report_every.max(1),
        }
    }

    pub fn restart(&mut self, now: Instant) {
        self.activated_at = now;
        self.frames = 0;
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.activated_at)
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Counts one presented frame and returns a report every `report_every`
    /// frames.
    pub fn complete_frame(&mut self, now: Instant) -> Option<FrameReport> {
        self.frames += 1;
        if self.frames % self.report_every != 0 {
            return None;
        }
        let elapsed = self.elapsed(now);
        let seconds = elapsed.as_secs_f64();
        let fps = if seconds > 0.0 {
            self.frames as f64 / seconds
        } else {
            0.0
        };
        Some(FrameReport {
            elapsed,
            frames: self.frames,
            fps,
        })
    }
}

/// Values written into the uniform block for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInputs {
    pub elapsed_seconds: f32,
    /// Always zero: no pointer device feeds the viewer.
    pub pointer: [f32; 4],
}

/// Outcome of a program load as seen by the frame loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Ready,
    /// Bytecode was missing; the loop retries after a pause.
    Unavailable { path: PathBuf, reason: String },
}

/// GPU and display work the loop drives once per frame.
pub trait FrameBackend {
    /// Destroys any resident pipeline and builds `program`.
    fn load_program(&mut self, program: &catalog::ShaderProgram) -> anyhow::Result<LoadStatus>;
    fn is_ready(&self) -> bool;
    /// Writes uniforms, submits the draw and blocks until it completes.
    fn render(&mut self, inputs: &FrameInputs) -> anyhow::Result<()>;
    fn present(&mut self) -> anyhow::Result<()>;
}

/// Non-blocking source of viewer commands.
pub trait CommandSource {
    /// Drains everything that arrived since the last call.
    fn poll(&mut self) -> Vec<ViewerCommand>;
}

impl<S: CommandSource> CommandSource for Option<S> {
    fn poll(&mut self) -> Vec<ViewerCommand> {
        match self {
            Some(source) => source.poll(),
            None => Vec::new(),
        }
    }
}

/// Side channel to whatever hosts the display.
pub trait HostSignal {
    fn toggle_fullscreen(&mut self) -> anyhow::Result<()>;
}

pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&mut self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    #[test]
    fn rejects_empty_and_out_of_range_selection() {
        assert_eq!(Selection::new(0, 0), Err(SchedulerError::EmptyCatalog));
        assert_eq!(
            Selection::new(3, 3),
            Err(SchedulerError::SelectionOutOfRange { index: 3, len: 3 })
        );
        let selection = Selection::new(2, 3).unwrap();
        assert!(selection.reload_requested());
    }

    #[test]
    fn navigation_wraps_modulo_catalog_size() {
        let mut rng = StdRng::seed_from_u64(7);
        for len in 1..=9usize {
            for _ in 0..20 {
                let start = rng.gen_range(0..len);
                let mut selection = Selection::new(start, len).unwrap();
                let mut net: i64 = 0;
                for _ in 0..rng.gen_range(0..64) {
                    if rng.gen_bool(0.5) {
                        selection.next();
                        net += 1;
                    } else {
                        selection.previous();
                        net -= 1;
                    }
                }
                let expected = (start as i64 + net).rem_euclid(len as i64) as usize;
                assert_eq!(selection.index(), expected, "len {len} start {start} net {net}");
            }
        }
    }

    #[test]
    fn single_entry_navigation_still_requests_reload() {
        let mut selection = Selection::new(0, 1).unwrap();
        assert!(selection.take_reload());
        assert!(!selection.reload_requested());

        selection.next();
        assert_eq!(selection.index(), 0);
        assert!(selection.take_reload());

        selection.previous();
        assert_eq!(selection.index(), 0);
        assert!(selection.reload_requested());
    }

    #[test]
    fn frame_clock_reports_every_interval() {
        let start = Instant::now();
        let mut clock = FrameClock::new(start, 60);
        for frame in 1..60 {
            let now = start + Duration::from_millis(frame * 10);
            assert!(clock.complete_frame(now).is_none());
        }
        let report = clock
            .complete_frame(start + Duration::from_secs(1))
            .expect("report on frame 60");
        assert_eq!(report.frames, 60);
        assert_eq!(report.elapsed, Duration::from_secs(1));
        assert!((report.fps - 60.0).abs() < 1e-9);
    }

    #[test]
    fn restart_resets_time_and_frames() {
        let start = Instant::now();
        let mut clock = FrameClock::new(start, 60);
        clock.complete_frame(start + Duration::from_secs(2));
        let later = start + Duration::from_secs(5);
        assert_eq!(clock.elapsed(later), Duration::from_secs(5));

        clock.restart(later);
        assert_eq!(clock.frames(), 0);
        assert_eq!(clock.elapsed(later), Duration::ZERO);
        assert_eq!(clock.elapsed(start), Duration::ZERO);
    }

    #[test]
    fn missing_source_yields_no_commands() {
        struct Never;
        impl CommandSource for Never {
            fn poll(&mut self) -> Vec<ViewerCommand> {
                unreachable!()
            }
        }
        let mut source: Option<Never> = None;
        assert!(source.poll().is_empty());
    }
}
