use std::fmt;

use crate::drivers::store::{Column, SeriesStore};
use crate::drivers::OxyError;

/// Owned copy of the store's tail, safe to hand to another thread.
#[derive(Clone, Debug)]
pub struct TailSnapshot {
    /// Total rows in the store when the snapshot was taken.
    pub rows: usize,
    pub window_size: usize,
    pub channel: Column,
    pub seconds_per_tick: f64,
    pub ts: Vec<f64>,
    pub raw: Vec<f64>,
    pub fs: Vec<f64>,
    /// Spectrum computed by the board (`F`), `N/2` values aligned with the
    /// top `N/2` bins of `fs`.
    pub device_spectrum: Vec<f64>,
    /// Spectrum computed here (`F2`).
    pub spectrum: Vec<f64>,
}
impl TailSnapshot {
    pub fn capture(
        store: &SeriesStore,
        channel: Column,
        window_size: usize,
        seconds_per_tick: f64,
    ) -> Self {
        let bins = window_size / 2 + 1;
        Self {
            rows: store.len(),
            window_size,
            channel,
            seconds_per_tick,
            ts: store.tail(Column::Ts, window_size).to_vec(),
            raw: store.tail(channel, window_size).to_vec(),
            fs: store.tail(Column::Fs, bins).to_vec(),
            device_spectrum: store.tail(Column::F, window_size / 2).to_vec(),
            spectrum: store.tail(Column::F2, bins).to_vec(),
        }
    }
}
#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    Warmup { rows: usize, needed: usize },
    NonFinite(Column),
}
impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Warmup { rows, needed } => {
                write!(f, "waiting for samples ({rows}/{needed})")
            }
            SkipReason::NonFinite(column) => write!(f, "non-finite values in `{column}`"),
        }
    }
}
/// Points ready to draw, in seconds and hertz.
#[derive(Clone, Debug)]
pub struct PlotData {
    pub channel: Column,
    pub rows: usize,
    pub time: Vec<[f64; 2]>,
    pub spectrum: Result<SpectrumPlot, SkipReason>,
}
#[derive(Clone, Debug)]
pub struct SpectrumPlot {
    pub local: Vec<[f64; 2]>,
    /// Present only when the board sent a finite spectrum for this window.
    pub device: Option<Vec<[f64; 2]>>,
}
impl SpectrumPlot {
    pub fn max_magnitude(&self) -> f64 {
        self.local
            .iter()
            .chain(self.device.iter().flatten())
            .map(|p| p[1])
            .fold(0.0, f64::max)
    }
}
fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}
impl PlotData {
    /// Checks the snapshot before anything is drawn. Nothing is drawn for a
    /// short or corrupted time window; the spectrum is checked on its own.
    pub fn from_snapshot(snapshot: &TailSnapshot) -> Result<Self, SkipReason> {
        let needed = snapshot.window_size;
        if snapshot.rows < needed || snapshot.ts.len() < needed {
            return Err(SkipReason::Warmup {
                rows: snapshot.rows,
                needed,
            });
        }
        if !all_finite(&snapshot.ts) {
            return Err(SkipReason::NonFinite(Column::Ts));
        }
        if !all_finite(&snapshot.raw) {
            return Err(SkipReason::NonFinite(snapshot.channel));
        }
        let scale = snapshot.seconds_per_tick;
        let time = snapshot
            .ts
            .iter()
            .zip(&snapshot.raw)
            .map(|(t, v)| [t * scale, *v])
            .collect();
        Ok(Self {
            channel: snapshot.channel,
            rows: snapshot.rows,
            time,
            spectrum: Self::spectrum(snapshot),
        })
    }
    fn spectrum(snapshot: &TailSnapshot) -> Result<SpectrumPlot, SkipReason> {
        if !all_finite(&snapshot.fs) {
            return Err(SkipReason::NonFinite(Column::Fs));
        }
        if !all_finite(&snapshot.spectrum) {
            return Err(SkipReason::NonFinite(Column::F2));
        }
        let hz = 1.0 / snapshot.seconds_per_tick;
        // shorter columns line up with the end of `fs`
        let pair = |values: &[f64]| -> Vec<[f64; 2]> {
            let skip = snapshot.fs.len().saturating_sub(values.len());
            snapshot.fs[skip..]
                .iter()
                .zip(values)
                .map(|(f, m)| [f * hz, *m])
                .collect()
        };
        let device = all_finite(&snapshot.device_spectrum).then(|| pair(&snapshot.device_spectrum));
        Ok(SpectrumPlot {
            local: pair(&snapshot.spectrum),
            device,
        })
    }
}
#[derive(Clone, Debug, PartialEq)]
pub enum RenderOutcome {
    Drawn,
    Skipped(SkipReason),
    /// The render surface is gone; the acquisition loop should stop.
    Closed,
}
/// Consumer of the store's tail, called once per acquisition cycle.
pub trait Renderer {
    fn render(&mut self, snapshot: &TailSnapshot) -> Result<RenderOutcome, OxyError>;
    fn close(&mut self) -> Result<(), OxyError>;
}
#[cfg(test)]
mod tests {
    use super::*;
    fn snapshot(rows: usize) -> TailSnapshot {
        let n = 8;
        let take = rows.min(n);
        TailSnapshot {
            rows,
            window_size: n,
            channel: Column::A0,
            seconds_per_tick: 1e-6,
            ts: (0..take).map(|k| k as f64 * 1000.0).collect(),
            raw: vec![500.0; take],
            fs: (0..=n / 2).map(|k| k as f64 * 1.25e-4).collect(),
            device_spectrum: vec![f64::NAN; n / 2],
            spectrum: vec![1.0; n / 2 + 1],
        }
    }
    #[test]
    fn warmup_is_skipped() {
        assert_eq!(
            PlotData::from_snapshot(&snapshot(5)).unwrap_err(),
            SkipReason::Warmup { rows: 5, needed: 8 }
        );
    }
    #[test]
    fn units_are_converted_to_seconds_and_hertz() {
        let plot = PlotData::from_snapshot(&snapshot(20)).unwrap();
        assert!((plot.time[1][0] - 1e-3).abs() < 1e-12);
        let spectrum = plot.spectrum.unwrap();
        assert!((spectrum.local[1][0] - 125.0).abs() < 1e-9);
        assert!(spectrum.device.is_none());
        assert_eq!(spectrum.max_magnitude(), 1.0);
    }
    #[test]
    fn corrupted_samples_skip_the_update() {
        let mut snap = snapshot(20);
        snap.raw[3] = f64::NAN;
        assert_eq!(
            PlotData::from_snapshot(&snap).unwrap_err(),
            SkipReason::NonFinite(Column::A0)
        );
        let mut snap = snapshot(20);
        snap.spectrum[0] = f64::NAN;
        let plot = PlotData::from_snapshot(&snap).unwrap();
        assert_eq!(plot.spectrum.unwrap_err(), SkipReason::NonFinite(Column::F2));
    }
    #[test]
    fn device_spectrum_drawn_when_finite() {
        let mut snap = snapshot(20);
        snap.device_spectrum = vec![3.0; 4];
        let spectrum = PlotData::from_snapshot(&snap).unwrap().spectrum.unwrap();
        let device = spectrum.device.as_ref().unwrap();
        assert_eq!(device.len(), 4);
        assert_eq!(device[0][0], spectrum.local[1][0]);
        assert_eq!(spectrum.max_magnitude(), 3.0);
    }
    #[test]
    fn capture_takes_matching_tails() {
        use crate::drivers::frame::SampleBlock;
        let mut block = SampleBlock::default();
        block.insert(Column::Ts, (0..12).map(f64::from).collect()).unwrap();
        block.insert(Column::A0, vec![1.0; 12]).unwrap();
        let mut store = SeriesStore::new();
        store.append_block(&block);
        let snap = TailSnapshot::capture(&store, Column::A0, 8, 1e-6);
        assert_eq!(snap.rows, 12);
        assert_eq!(snap.ts.len(), 8);
        assert_eq!(snap.ts[0], 4.0);
        assert_eq!(snap.fs.len(), 5);
        assert_eq!(snap.device_spectrum.len(), 4);
        assert!(snap.spectrum.iter().all(|v| v.is_nan()));
    }
}
