// src/engine.rs
use crate::config::{AcquisitionConfig, SourceKind};
use crate::drivers::{
    Acquisition, BlockSource, ExitReason, OxyError, PlotData, PngRenderer, RenderOutcome,
    Renderer, RunSummary, SerialSource, SimulatedSource, TailSnapshot,
};
use crate::types::EngineMessage;
use anyhow::{Context, Result};
use log::{error, info, warn};
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Forwards plot-ready snapshots to the GUI thread.
pub struct ChannelRenderer {
    tx: Sender<EngineMessage>,
    pause: Duration,
}
impl ChannelRenderer {
    pub fn new(tx: Sender<EngineMessage>, pause: Duration) -> Self {
        Self { tx, pause }
    }
}
impl Renderer for ChannelRenderer {
    fn render(&mut self, snapshot: &TailSnapshot) -> Result<RenderOutcome, OxyError> {
        let (message, outcome) = match PlotData::from_snapshot(snapshot) {
            Ok(plot) => (EngineMessage::Plot(plot), RenderOutcome::Drawn),
            Err(reason) => (
                EngineMessage::Skipped(reason.clone()),
                RenderOutcome::Skipped(reason),
            ),
        };
        // a dropped receiver means the window is gone
        if self.tx.send(message).is_err() {
            return Ok(RenderOutcome::Closed);
        }
        thread::sleep(self.pause);
        Ok(outcome)
    }
    fn close(&mut self) -> Result<(), OxyError> {
        self.tx.send(EngineMessage::Status(false)).ok();
        Ok(())
    }
}
/// Opens the board and waits for its greeting.
fn open_serial(config: &AcquisitionConfig, tx: Option<&Sender<EngineMessage>>) -> Result<SerialSource> {
    let mut source = SerialSource::open(config).context("serial port unavailable")?;
    match source
        .handshake(config.settle())
        .context("handshake with the board failed")?
    {
        Some(banner) => {
            info!("device says: {banner}");
            if let Some(tx) = tx {
                tx.send(EngineMessage::Banner(banner)).ok();
            }
        }
        None => warn!("no greeting from the board within {:?}", config.timeout()),
    }
    Ok(source)
}
fn acquire<S: BlockSource, R: Renderer>(
    source: S,
    renderer: R,
    config: &AcquisitionConfig,
    stop: &AtomicBool,
) -> Result<RunSummary> {
    let mut acquisition =
        Acquisition::new(source, renderer, config).context("invalid acquisition setup")?;
    Ok(acquisition.run(stop))
}
/// Runs acquisition on a background thread; the store never leaves it.
pub fn spawn_thread(
    config: AcquisitionConfig,
    tx: Sender<EngineMessage>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<ExitReason> {
    thread::spawn(move || {
        tx.send(EngineMessage::Log(format!(
            "engine ready, source: {:?}",
            config.source
        )))
        .ok();
        let renderer = ChannelRenderer::new(tx.clone(), config.render_pause());
        let outcome = match config.source {
            SourceKind::Serial => open_serial(&config, Some(&tx)).and_then(|source| {
                tx.send(EngineMessage::Status(true)).ok();
                acquire(source, renderer, &config, &stop)
            }),
            SourceKind::Simulated => {
                let source =
                    SimulatedSource::new(config.simulation.clone()).paced(config.timeout());
                tx.send(EngineMessage::Status(true)).ok();
                acquire(source, renderer, &config, &stop)
            }
        };
        let reason = match outcome {
            Ok(summary) => {
                tx.send(EngineMessage::Log(format!(
                    "stopped after {} cycles ({} rows)",
                    summary.cycles, summary.rows
                )))
                .ok();
                summary.reason
            }
            Err(e) => {
                error!("engine failed to start: {e:#}");
                tx.send(EngineMessage::Log(format!("engine failed to start: {e:#}")))
                    .ok();
                ExitReason::Failed(format!("{e:#}"))
            }
        };
        tx.send(EngineMessage::Stopped(reason.clone())).ok();
        reason
    })
}
/// Runs acquisition on the calling thread, writing PNG frames.
pub fn run_headless(config: &AcquisitionConfig, stop: &AtomicBool) -> Result<RunSummary> {
    let renderer = PngRenderer::new(&config.png_path, config.png_every);
    match config.source {
        SourceKind::Serial => {
            let source = open_serial(config, None)?;
            acquire(source, renderer, config, stop)
        }
        SourceKind::Simulated => {
            let source = SimulatedSource::new(config.simulation.clone()).paced(config.timeout());
            acquire(source, renderer, config, stop)
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{Column, SeriesStore};
    use crate::config::SimulationConfig;
    use std::sync::atomic::Ordering;
    use std::sync::mpsc;

    fn warm_snapshot() -> TailSnapshot {
        let mut source = SimulatedSource::new(SimulationConfig {
            block_len: 16,
            seed: Some(3),
            send_spectrum: false,
            ..SimulationConfig::default()
        });
        let mut store = SeriesStore::new();
        store.append_block(&source.next_block());
        TailSnapshot::capture(&store, Column::A0, 16, 1e-6)
    }
    #[test]
    fn channel_renderer_forwards_plots() {
        let (tx, rx) = mpsc::channel();
        let mut renderer = ChannelRenderer::new(tx, Duration::ZERO);
        assert_eq!(
            renderer.render(&warm_snapshot()).unwrap(),
            RenderOutcome::Drawn
        );
        match rx.try_recv().unwrap() {
            EngineMessage::Plot(plot) => assert_eq!(plot.time.len(), 16),
            other => panic!("unexpected message {other:?}"),
        }
        renderer.close().unwrap();
        assert!(matches!(rx.try_recv(), Ok(EngineMessage::Status(false))));
    }
    #[test]
    fn dropped_window_reports_closed() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let mut renderer = ChannelRenderer::new(tx, Duration::ZERO);
        assert_eq!(
            renderer.render(&warm_snapshot()).unwrap(),
            RenderOutcome::Closed
        );
    }
    #[test]
    fn simulated_engine_stops_on_flag() {
        let config = AcquisitionConfig {
            source: SourceKind::Simulated,
            window_size: 32,
            render_pause_ms: 0,
            simulation: SimulationConfig {
                block_len: 16,
                interval_us: 100.0,
                seed: Some(1),
                ..SimulationConfig::default()
            },
            ..AcquisitionConfig::default()
        };
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let handle = spawn_thread(config, tx, stop.clone());
        let mut plots = 0;
        let reason = loop {
            match rx.recv_timeout(Duration::from_secs(10)).unwrap() {
                EngineMessage::Plot(plot) => {
                    assert!(plot.spectrum.is_ok());
                    plots += 1;
                    stop.store(true, Ordering::SeqCst);
                }
                EngineMessage::Stopped(reason) => break reason,
                _ => {}
            }
        };
        assert_eq!(handle.join().unwrap(), reason);
        assert!(plots >= 1);
        assert_eq!(reason, ExitReason::Interrupted);
    }
}
