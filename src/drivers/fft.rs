use std::f64::consts::PI;
use std::str::FromStr;
use std::sync::Arc;

use log::{debug, warn};
use ndarray::Array1;
use rustfft::{num_complex::Complex64, Fft, FftPlanner};

use crate::config::AcquisitionConfig;
use crate::drivers::rate::estimate_interval;
use crate::drivers::store::{Column, SeriesStore, Window};
use crate::drivers::OxyError;

/// Tapering applied before the transform. Coefficients use the periodic
/// (DFT-even) definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowKind {
    Boxcar,
    Hann,
    Hamming,
    Blackman,
}
impl WindowKind {
    pub fn name(self) -> &'static str {
        match self {
            WindowKind::Boxcar => "boxcar",
            WindowKind::Hann => "hann",
            WindowKind::Hamming => "hamming",
            WindowKind::Blackman => "blackman",
        }
    }
    pub fn coefficients(self, len: usize) -> Vec<f64> {
        let n = len as f64;
        (0..len)
            .map(|i| {
                let phase = 2.0 * PI * i as f64 / n;
                match self {
                    WindowKind::Boxcar => 1.0,
                    WindowKind::Hann => 0.5 - 0.5 * phase.cos(),
                    WindowKind::Hamming => 0.54 - 0.46 * phase.cos(),
                    WindowKind::Blackman => 0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos(),
                }
            })
            .collect()
    }
}
impl FromStr for WindowKind {
    type Err = OxyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "boxcar" | "rect" | "rectangular" => Ok(WindowKind::Boxcar),
            "hann" | "hanning" => Ok(WindowKind::Hann),
            "hamming" => Ok(WindowKind::Hamming),
            "blackman" => Ok(WindowKind::Blackman),
            _ => Err(OxyError::UnknownWindow(s.to_string())),
        }
    }
}
/// One analysis of the trailing window.
#[derive(Clone, Debug)]
pub struct SpectralResult {
    pub window: Vec<f64>,
    pub signal: Vec<f64>,
    /// Mean sample spacing, in device ticks.
    pub interval: f64,
    /// Cycles per device tick, `N/2 + 1` bins.
    pub frequencies: Vec<f64>,
    pub magnitudes: Vec<f64>,
}
impl SpectralResult {
    /// Bin with the largest magnitude, ignoring `NaN`.
    pub fn peak_bin(&self) -> Option<usize> {
        self.magnitudes
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.is_nan())
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k)
    }
}
/// Bin `k` maps to `k / (n * d)`.
pub fn one_sided_frequencies(n: usize, d: f64) -> Vec<f64> {
    (0..=n / 2).map(|k| k as f64 / (n as f64 * d)).collect()
}
/// Windowed FFT over the last `size` rows of one raw channel.
pub struct SpectralAnalyzer {
    size: usize,
    kind: WindowKind,
    channel: Column,
    demean: bool,
    coefficients: Array1<f64>,
    fft: Arc<dyn Fft<f64>>,
}
impl SpectralAnalyzer {
    pub fn new(size: usize, kind: WindowKind, channel: Column, demean: bool) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        Self {
            size,
            kind,
            channel,
            demean,
            coefficients: Array1::from(kind.coefficients(size)),
            fft: planner.plan_fft_forward(size),
        }
    }
    pub fn from_config(config: &AcquisitionConfig) -> Result<Self, OxyError> {
        Ok(Self::new(
            config.window_size,
            config.window_kind()?,
            config.channel_column()?,
            config.demean,
        ))
    }
    pub fn size(&self) -> usize {
        self.size
    }
    pub fn spectrum_len(&self) -> usize {
        self.size / 2 + 1
    }
    pub fn channel(&self) -> Column {
        self.channel
    }
    pub fn window_kind(&self) -> WindowKind {
        self.kind
    }
    pub fn compute(&self, window: &Window<'_>) -> Result<SpectralResult, OxyError> {
        if window.len() != self.size {
            return Err(OxyError::InsufficientWindow {
                needed: self.size,
                available: window.len(),
            });
        }
        let mut raw = Array1::from(window.column(self.channel).to_vec());
        if self.demean {
            let mean = raw.mean().unwrap_or(f64::NAN);
            raw -= mean;
        }
        let signal = &raw * &self.coefficients;
        let mut buffer: Vec<Complex64> = signal.iter().map(|&v| Complex64::new(v, 0.0)).collect();
        self.fft.process(&mut buffer);
        let magnitudes: Vec<f64> = buffer
            .iter()
            .take(self.spectrum_len())
            .map(|c| c.norm())
            .collect();
        let ts = window.column(Column::Ts);
        let interval = estimate_interval(ts).unwrap_or(f64::NAN);
        if interval.is_finite() && interval > 0.0 {
            debug!(
                "d = {interval:.3} ticks over {} samples, span {:.1} ticks",
                self.size,
                ts[ts.len() - 1] - ts[0]
            );
        } else {
            warn!("sample interval estimate is unusable: {interval}");
        }
        Ok(SpectralResult {
            window: self.coefficients.to_vec(),
            signal: signal.to_vec(),
            interval,
            frequencies: one_sided_frequencies(self.size, interval),
            magnitudes,
        })
    }
    /// Computes over the store's trailing window and writes `cadre`/`signal`
    /// over the last N rows, `fs`/`F2` over the last `N/2 + 1` rows.
    pub fn analyze(&self, store: &mut SeriesStore) -> Result<SpectralResult, OxyError> {
        let window = store
            .window(self.size)
            .ok_or(OxyError::InsufficientWindow {
                needed: self.size,
                available: store.len(),
            })?;
        let result = self.compute(&window)?;
        store.write_tail(Column::Cadre, &result.window)?;
        store.write_tail(Column::Signal, &result.signal)?;
        store.write_tail(Column::Fs, &result.frequencies)?;
        store.write_tail(Column::F2, &result.magnitudes)?;
        Ok(result)
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::frame::SampleBlock;
    fn store_with(ts: Vec<f64>, a0: Vec<f64>) -> SeriesStore {
        let mut block = SampleBlock::default();
        block.insert(Column::Ts, ts).unwrap();
        block.insert(Column::A0, a0).unwrap();
        let mut store = SeriesStore::new();
        store.append_block(&block);
        store
    }
    fn sine_store(n: usize, d: f64, f0: f64, offset: f64) -> SeriesStore {
        let ts: Vec<f64> = (0..n).map(|k| k as f64 * d).collect();
        let a0 = ts.iter().map(|t| offset + (2.0 * PI * f0 * t).sin()).collect();
        store_with(ts, a0)
    }
    #[test]
    fn window_shapes() {
        let hann = WindowKind::Hann.coefficients(8);
        assert!(hann[0].abs() < 1e-12);
        assert!((hann[4] - 1.0).abs() < 1e-12);
        assert!((WindowKind::Hamming.coefficients(8)[0] - 0.08).abs() < 1e-12);
        assert!(WindowKind::Blackman.coefficients(8)[0].abs() < 1e-12);
        assert!(WindowKind::Boxcar.coefficients(8).iter().all(|&w| w == 1.0));
        assert_eq!("Hanning".parse::<WindowKind>().unwrap(), WindowKind::Hann);
        assert!("kaiser".parse::<WindowKind>().is_err());
    }
    #[test]
    fn peak_lands_on_expected_bin() {
        let n = 256;
        let d = 2000.0; // ticks (µs)
        let f0 = 10.0e-6; // cycles per tick, 10 Hz
        let mut store = sine_store(n, d, f0, 0.0);
        let analyzer = SpectralAnalyzer::new(n, WindowKind::Hann, Column::A0, false);
        let result = analyzer.analyze(&mut store).unwrap();
        assert_eq!(result.magnitudes.len(), n / 2 + 1);
        assert_eq!(result.frequencies.len(), n / 2 + 1);
        let expected = (f0 / (1.0 / (n as f64 * d))).round() as i64;
        let peak = result.peak_bin().unwrap() as i64;
        assert!((peak - expected).abs() <= 1, "peak {peak}, expected {expected}");
        let resolution = 1.0 / (n as f64 * d);
        assert!((result.frequencies[1] - resolution).abs() < 1e-15);
    }
    #[test]
    fn demean_removes_dc_peak() {
        let n = 256;
        let d = 2000.0;
        let f0 = 10.0e-6;
        let mut store = sine_store(n, d, f0, 512.0);
        let plain = SpectralAnalyzer::new(n, WindowKind::Hann, Column::A0, false);
        assert_eq!(plain.analyze(&mut store).unwrap().peak_bin(), Some(0));
        let centred = SpectralAnalyzer::new(n, WindowKind::Hann, Column::A0, true);
        let peak = centred.analyze(&mut store).unwrap().peak_bin().unwrap();
        assert!((peak as i64 - 5).abs() <= 1);
    }
    #[test]
    fn results_are_written_right_aligned() {
        let n = 16;
        let extra = 10;
        let mut store = sine_store(n + extra, 1000.0, 1.0e-4, 0.0);
        let analyzer = SpectralAnalyzer::new(n, WindowKind::Hann, Column::A0, false);
        let result = analyzer.analyze(&mut store).unwrap();
        let rows = store.len();
        let spectral = n / 2 + 1;
        let cadre = store.column(Column::Cadre);
        assert!(cadre[..extra].iter().all(|v| v.is_nan()));
        assert_eq!(&cadre[extra..], result.window.as_slice());
        assert_eq!(store.tail(Column::Signal, n), result.signal.as_slice());
        let fs = store.column(Column::Fs);
        assert!(fs[..rows - spectral].iter().all(|v| v.is_nan()));
        assert_eq!(fs[rows - spectral], 0.0);
        assert_eq!(store.tail(Column::F2, spectral), result.magnitudes.as_slice());
    }
    #[test]
    fn nan_input_is_never_zeroed() {
        let n = 32;
        let mut store = sine_store(n, 1000.0, 1.0e-4, 0.0);
        let mut a0 = store.column(Column::A0).to_vec();
        a0[7] = f64::NAN;
        let ts = store.column(Column::Ts).to_vec();
        store = store_with(ts, a0);
        let analyzer = SpectralAnalyzer::new(n, WindowKind::Hann, Column::A0, false);
        let result = analyzer.analyze(&mut store).unwrap();
        assert!(result.signal[7].is_nan());
        assert!(result.magnitudes.iter().all(|m| m.is_nan()));
        assert_eq!(result.peak_bin(), None);
    }
    #[test]
    fn refuses_short_store() {
        let mut store = sine_store(10, 1000.0, 1.0e-4, 0.0);
        let analyzer = SpectralAnalyzer::new(16, WindowKind::Hann, Column::A0, false);
        assert!(matches!(
            analyzer.analyze(&mut store),
            Err(OxyError::InsufficientWindow { needed: 16, available: 10 })
        ));
        assert!(store.column(Column::F2).iter().all(|v| v.is_nan()));
    }
}
