use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, info, warn};

use crate::config::AcquisitionConfig;
use crate::drivers::fft::{SpectralAnalyzer, SpectralResult};
use crate::drivers::frame::{decode_into, DecodeOutcome};
use crate::drivers::rate::rate_hz;
use crate::drivers::render::{RenderOutcome, Renderer, SkipReason, TailSnapshot};
use crate::drivers::source::BlockSource;
use crate::drivers::store::SeriesStore;
use crate::drivers::OxyError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopping,
    Terminated,
}
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// The stop flag was raised (Ctrl-C or the stop button).
    Interrupted,
    SurfaceClosed,
    Failed(String),
}
/// What happened during one read-decode-analyze-render pass.
#[derive(Clone, Debug)]
pub struct CycleReport {
    pub decode: DecodeOutcome,
    pub analysis: Option<SpectralResult>,
    pub render: RenderOutcome,
    pub rows: usize,
}
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub reason: ExitReason,
    pub cycles: u64,
    pub rows: usize,
}
/// Drives a block source into the store and hands the tail to a renderer.
pub struct Acquisition<S: BlockSource, R: Renderer> {
    source: S,
    renderer: R,
    store: SeriesStore,
    analyzer: SpectralAnalyzer,
    seconds_per_tick: f64,
    state: LoopState,
}
impl<S: BlockSource, R: Renderer> Acquisition<S, R> {
    pub fn new(source: S, renderer: R, config: &AcquisitionConfig) -> Result<Self, OxyError> {
        config.validate()?;
        let analyzer = SpectralAnalyzer::from_config(config)?;
        Ok(Self::with_analyzer(source, renderer, analyzer, config.seconds_per_tick))
    }
    pub fn with_analyzer(
        source: S,
        renderer: R,
        analyzer: SpectralAnalyzer,
        seconds_per_tick: f64,
    ) -> Self {
        Self {
            source,
            renderer,
            store: SeriesStore::new(),
            analyzer,
            seconds_per_tick,
            state: LoopState::Running,
        }
    }
    pub fn state(&self) -> LoopState {
        self.state
    }
    pub fn store(&self) -> &SeriesStore {
        &self.store
    }
    pub fn source(&self) -> &S {
        &self.source
    }
    pub fn renderer(&self) -> &R {
        &self.renderer
    }
    pub fn cycle(&mut self) -> Result<CycleReport, OxyError> {
        let raw = self.source.read_block()?;
        let decode = decode_into(&raw, &mut self.store)?;
        if decode == DecodeOutcome::NoData {
            debug!("no complete block from {}", self.source.describe());
        }
        let needed = self.analyzer.size();
        let analysis = if self.store.len() >= needed {
            let result = self.analyzer.analyze(&mut self.store)?;
            debug!(
                "sampling at {:.1} Hz, spectral peak at bin {:?}",
                rate_hz(result.interval, self.seconds_per_tick),
                result.peak_bin()
            );
            Some(result)
        } else {
            debug!(
                "skipping analysis, {} of {needed} rows buffered",
                self.store.len()
            );
            None
        };
        let snapshot = TailSnapshot::capture(
            &self.store,
            self.analyzer.channel(),
            needed,
            self.seconds_per_tick,
        );
        let render = self.renderer.render(&snapshot)?;
        match &render {
            RenderOutcome::Skipped(reason @ SkipReason::NonFinite(_)) => {
                warn!("plot update skipped: {reason}")
            }
            RenderOutcome::Skipped(reason) => debug!("plot update skipped: {reason}"),
            _ => {}
        }
        Ok(CycleReport {
            decode,
            analysis,
            render,
            rows: self.store.len(),
        })
    }
    /// Cycles until `stop` is raised, the render surface closes or a cycle
    /// fails, then tears down. Teardown runs once per `Acquisition`.
    pub fn run(&mut self, stop: &AtomicBool) -> RunSummary {
        let mut cycles = 0;
        if self.state != LoopState::Running {
            return RunSummary {
                reason: ExitReason::Failed("acquisition already terminated".into()),
                cycles,
                rows: self.store.len(),
            };
        }
        info!(
            "acquiring from {} ({}-point {} window on {})",
            self.source.describe(),
            self.analyzer.size(),
            self.analyzer.window_kind().name(),
            self.analyzer.channel()
        );
        let reason = loop {
            if stop.load(Ordering::SeqCst) {
                error!("forced exit requested by the user");
                break ExitReason::Interrupted;
            }
            match self.cycle() {
                Ok(report) => {
                    cycles += 1;
                    if report.render == RenderOutcome::Closed {
                        info!("render surface closed");
                        break ExitReason::SurfaceClosed;
                    }
                }
                Err(e) => {
                    error!("acquisition cycle failed: {}", error_chain(&e));
                    break ExitReason::Failed(e.to_string());
                }
            }
        };
        self.state = LoopState::Stopping;
        self.teardown();
        self.state = LoopState::Terminated;
        info!(
            "acquisition stopped after {cycles} cycles, {} rows",
            self.store.len()
        );
        RunSummary {
            reason,
            cycles,
            rows: self.store.len(),
        }
    }
    fn teardown(&mut self) {
        if let Err(e) = self.source.close() {
            error!("failed to close {}: {e}", self.source.describe());
        }
        if let Err(e) = self.renderer.close() {
            error!("failed to close the renderer: {e}");
        }
    }
}
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut message = e.to_string();
    let mut cause = e.source();
    while let Some(inner) = cause {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        cause = inner.source();
    }
    message
}
