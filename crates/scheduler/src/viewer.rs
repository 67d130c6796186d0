//! The single-threaded frame loop.
//!
//! One call to [`Viewer::step`] is one pass: rebuild the pipeline if needed,
//! drain input, then render, wait and present. Navigation only marks the
//! selection dirty, so the frame already under way always finishes against
//! the pipeline it started with.
use std::time::Duration;

use anyhow::Context;
use catalog::{ShaderCatalog, ShaderProgram};
use tracing::{debug, info, warn};

use crate::{
    Clock, CommandSource, FrameBackend, FrameClock, FrameInputs, HostSignal, LoadStatus,
    SchedulerError, Selection, ViewerCommand,
};

#[derive(Debug, Clone)]
pub struct ViewerOptions {
    /// Pause after a program whose bytecode is missing.
    pub retry_delay: Duration,
    /// Frames between throughput reports.
    pub report_interval: u64,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(1),
            report_interval: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Quit,
}

pub struct Viewer<'a, B, I, H, C> {
    catalog: &'a ShaderCatalog,
    selection: Selection,
    frames: FrameClock,
    backend: B,
    input: I,
    host: H,
    clock: C,
    options: ViewerOptions,
}

impl<'a, B, I, H, C> Viewer<'a, B, I, H, C>
where
    B: FrameBackend,
    I: CommandSource,
    H: HostSignal,
    C: Clock,
{
    pub fn new(
        catalog: &'a ShaderCatalog,
        initial_index: usize,
        backend: B,
        input: I,
        host: H,
        clock: C,
        options: ViewerOptions,
    ) -> Result<Self, SchedulerError> {
        let selection = Selection::new(initial_index, catalog.len())?;
        let frames = FrameClock::new(clock.now(), options.report_interval);
        Ok(Self {
            catalog,
            selection,
            frames,
            backend,
            input,
            host,
            clock,
            options,
        })
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn current(&self) -> Option<&ShaderProgram> {
        self.catalog.get(self.selection.index())
    }

    /// Runs until a quit command arrives or a fatal error surfaces.
    pub fn run(&mut self) -> anyhow::Result<()> {
        while self.step()? == StepOutcome::Continue {}
        info!("quit requested");
        Ok(())
    }

    pub fn step(&mut self) -> anyhow::Result<StepOutcome> {
        if self.selection.take_reload() || !self.backend.is_ready() {
            self.reload()?;
        }

        for command in self.input.poll() {
            match command {
                ViewerCommand::NavigatePrevious => {
                    self.selection.previous();
                    info!(shader = self.current_name(), "<< previous");
                }
                ViewerCommand::NavigateNext => {
                    self.selection.next();
                    info!(shader = self.current_name(), ">> next");
                }
                ViewerCommand::ToggleFullscreen => {
                    if let Err(err) = self.host.toggle_fullscreen() {
                        warn!(
                            error = %format!("{err:#}"),
                            "fullscreen request failed; use the host's own shortcut instead"
                        );
                    }
                }
                ViewerCommand::Quit => return Ok(StepOutcome::Quit),
            }
        }

        if !self.backend.is_ready() {
            return Ok(StepOutcome::Continue);
        }

        let elapsed = self.frames.elapsed(self.clock.now());
        let inputs = FrameInputs {
            elapsed_seconds: elapsed.as_secs_f32(),
            pointer: [0.0; 4],
        };
        self.backend.render(&inputs).context("failed to render frame")?;
        self.backend.present().context("failed to present frame")?;

        if let Some(report) = self.frames.complete_frame(self.clock.now()) {
            info!(
                elapsed = format!("{:.1}s", report.elapsed.as_secs_f64()),
                frames = report.frames,
                fps = format!("{:.1}", report.fps),
                shader = self.current_name(),
                "frame rate"
            );
        }
        Ok(StepOutcome::Continue)
    }

    fn reload(&mut self) -> anyhow::Result<()> {
        let index = self.selection.index();
        let program = self
            .catalog
            .get(index)
            .ok_or(SchedulerError::SelectionOutOfRange {
                index,
                len: self.catalog.len(),
            })?;

        info!(shader = %program.name, "loading shader");
        let status = self
            .backend
            .load_program(program)
            .with_context(|| format!("failed to build pipeline for '{}'", program.name))?;

        match status {
            LoadStatus::Ready => {
                self.frames.restart(self.clock.now());
                debug!(shader = %program.name, "pipeline ready");
            }
            LoadStatus::Unavailable { path, reason } => {
                warn!(
                    shader = %program.name,
                    path = %path.display(),
                    %reason,
                    "shader bytecode unavailable; retrying"
                );
                self.clock.sleep(self.options.retry_delay);
            }
        }
        Ok(())
    }

    fn current_name(&self) -> &str {
        self.current().map(|p| p.name.as_str()).unwrap_or("?")
    }
}
