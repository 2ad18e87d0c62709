use std::collections::VecDeque;
use std::f64::consts::PI;
use std::io::{self, Read};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustfft::{num_complex::Complex64, Fft, FftPlanner};
use serialport::{DataBits, SerialPort};

use crate::config::{AcquisitionConfig, SimulationConfig};
use crate::drivers::frame::{encode_block, find, SampleBlock, BLOCK_DELIMITER};
use crate::drivers::store::Column;
use crate::drivers::OxyError;

/// Bytes kept while waiting for a delimiter before the partial block is dropped.
const MAX_PENDING: usize = 1 << 20;

/// Something that yields raw, delimiter-terminated blocks.
pub trait BlockSource {
    /// Blocks for at most the read timeout. An empty buffer means no complete
    /// block arrived in time.
    fn read_block(&mut self) -> Result<Vec<u8>, OxyError>;
    /// Releases the underlying handle. Calling it twice is harmless.
    fn close(&mut self) -> Result<(), OxyError>;
    fn describe(&self) -> String;
}
pub fn available_port_names() -> Vec<String> {
    serialport::available_ports()
        .map(|ports| ports.into_iter().map(|p| p.port_name).collect())
        .unwrap_or_default()
}
/// Acquisition board on a serial line.
pub struct SerialSource {
    port_name: String,
    port: Option<Box<dyn SerialPort>>,
    timeout: Duration,
    pending: Vec<u8>,
}
impl SerialSource {
    pub fn open(config: &AcquisitionConfig) -> Result<Self, OxyError> {
        let port = serialport::new(config.port.as_str(), config.baud_rate)
            .data_bits(DataBits::Eight)
            .timeout(config.timeout())
            .open()
            .map_err(|source| OxyError::OpenPort {
                port: config.port.clone(),
                source,
                available: format!("{:?}", available_port_names()),
            })?;
        info!(
            "opened {} at {} baud, timeout {:?}",
            config.port,
            config.baud_rate,
            config.timeout()
        );
        Ok(Self {
            port_name: config.port.clone(),
            port: Some(port),
            timeout: config.timeout(),
            pending: Vec::new(),
        })
    }
    /// Waits for the board to come out of reset and returns its greeting block.
    pub fn handshake(&mut self, settle: Duration) -> Result<Option<String>, OxyError> {
        thread::sleep(settle);
        let banner = self.read_block()?;
        if banner.is_empty() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&banner).trim().to_string()))
    }
    fn absorb(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        if self.pending.len() > MAX_PENDING {
            warn!(
                "no block delimiter in {} bytes, dropping them",
                self.pending.len()
            );
            self.pending.clear();
        }
    }
    fn take_block(&mut self) -> Option<Vec<u8>> {
        let at = find(&self.pending, BLOCK_DELIMITER)?;
        let rest = self.pending.split_off(at + BLOCK_DELIMITER.len());
        Some(std::mem::replace(&mut self.pending, rest))
    }
}
impl BlockSource for SerialSource {
    fn read_block(&mut self) -> Result<Vec<u8>, OxyError> {
        let deadline = Instant::now() + self.timeout;
        let mut chunk = [0u8; 512];
        loop {
            if let Some(block) = self.take_block() {
                return Ok(block);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!("read timed out, {} bytes pending", self.pending.len());
                return Ok(Vec::new());
            }
            let port = self.port.as_mut().ok_or_else(|| {
                OxyError::Io(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "serial port already closed",
                ))
            })?;
            port.set_timeout(remaining)?;
            match port.read(&mut chunk) {
                Ok(0) => return Ok(Vec::new()),
                Ok(n) => self.absorb(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(Vec::new()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
    fn close(&mut self) -> Result<(), OxyError> {
        if self.port.take().is_some() {
            info!("released serial port {}", self.port_name);
        }
        Ok(())
    }
    fn describe(&self) -> String {
        format!("serial port {}", self.port_name)
    }
}
impl Drop for SerialSource {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
/// In-memory source useful for tests and deterministic playback.
pub struct ManualSource {
    queue: VecDeque<Vec<u8>>,
    closes: usize,
}
impl ManualSource {
    pub fn new(blocks: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            queue: blocks.into_iter().collect(),
            closes: 0,
        }
    }
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
    /// How many times `close` was called.
    pub fn closes(&self) -> usize {
        self.closes
    }
}
impl BlockSource for ManualSource {
    fn read_block(&mut self) -> Result<Vec<u8>, OxyError> {
        Ok(self.queue.pop_front().unwrap_or_default())
    }
    fn close(&mut self) -> Result<(), OxyError> {
        self.closes += 1;
        Ok(())
    }
    fn describe(&self) -> String {
        format!("manual source ({} blocks queued)", self.queue.len())
    }
}
/// Stand-in for the board: a photoplethysmogram-like pulse on `A0` with
/// microsecond timestamps, optionally followed by an on-board spectrum `F`.
pub struct SimulatedSource {
    config: SimulationConfig,
    rng: StdRng,
    clock_us: f64,
    pace: Option<Duration>,
    fft: Arc<dyn Fft<f64>>,
    closed: bool,
}
impl SimulatedSource {
    pub fn new(config: SimulationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let fft = FftPlanner::<f64>::new().plan_fft_forward(config.block_len);
        Self {
            config,
            rng,
            clock_us: 0.0,
            pace: None,
            fft,
            closed: false,
        }
    }
    /// Sleep for the block's duration on each read, capped at `timeout`.
    pub fn paced(mut self, timeout: Duration) -> Self {
        self.pace = Some(timeout);
        self
    }
    /// One block as the board frames it: `F`, when sent, is half as long as
    /// the sample columns.
    pub fn next_block(&mut self) -> SampleBlock {
        let len = self.config.block_len;
        let pulse_hz = self.config.pulse_bpm / 60.0;
        let jitter = self.config.jitter_us.abs();
        let mut ts = Vec::with_capacity(len);
        let mut a0 = Vec::with_capacity(len);
        for _ in 0..len {
            self.clock_us += self.config.interval_us + self.rng.gen_range(-jitter..=jitter);
            let t = self.clock_us * 1e-6;
            let beat = 2.0 * PI * pulse_hz * t;
            let value = 512.0 + 120.0 * beat.sin() + 40.0 * (2.0 * beat + 0.6).sin()
                + self.rng.gen_range(-4.0..=4.0);
            ts.push(self.clock_us.round());
            a0.push(value.round().clamp(0.0, 1023.0));
        }
        let mut block = SampleBlock::default();
        if self.config.send_spectrum {
            let mut buffer: Vec<Complex64> = a0.iter().map(|&v| Complex64::new(v, 0.0)).collect();
            self.fft.process(&mut buffer);
            let spectrum = buffer.iter().take(len / 2).map(|c| c.norm()).collect();
            let _ = block.insert(Column::F, spectrum);
        }
        let _ = block.insert(Column::Ts, ts);
        let _ = block.insert(Column::A0, a0);
        block
    }
}
impl BlockSource for SimulatedSource {
    fn read_block(&mut self) -> Result<Vec<u8>, OxyError> {
        if self.closed {
            return Ok(Vec::new());
        }
        if let Some(timeout) = self.pace {
            let duration = Duration::from_secs_f64(
                self.config.interval_us * self.config.block_len as f64 * 1e-6,
            );
            thread::sleep(duration.min(timeout));
        }
        Ok(encode_block(&self.next_block()))
    }
    fn close(&mut self) -> Result<(), OxyError> {
        if !self.closed {
            self.closed = true;
            info!("simulated device stopped at t = {:.3} s", self.clock_us * 1e-6);
        }
        Ok(())
    }
    fn describe(&self) -> String {
        format!(
            "simulated pulse at {} bpm, {} µs spacing",
            self.config.pulse_bpm, self.config.interval_us
        )
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::frame::parse_block;
    fn simulation() -> SimulationConfig {
        SimulationConfig {
            block_len: 32,
            seed: Some(7),
            ..SimulationConfig::default()
        }
    }
    #[test]
    fn manual_source_drains_then_times_out() {
        let mut source = ManualSource::new(vec![b"ts=[1]\r\n\r\n".to_vec()]);
        assert_eq!(source.read_block().unwrap(), b"ts=[1]\r\n\r\n".to_vec());
        assert!(source.read_block().unwrap().is_empty());
        source.close().unwrap();
        source.close().unwrap();
        assert_eq!(source.closes(), 2);
    }
    fn detached() -> SerialSource {
        SerialSource {
            port_name: "test".into(),
            port: None,
            timeout: Duration::from_secs(1),
            pending: Vec::new(),
        }
    }
    #[test]
    fn buffered_blocks_split_on_the_delimiter() {
        let mut serial = detached();
        serial.absorb(b"ts=[1]\r\n\r\nts=[2]\r\n\r\nts=[3");
        assert_eq!(serial.take_block().unwrap(), b"ts=[1]\r\n\r\n".to_vec());
        assert_eq!(serial.take_block().unwrap(), b"ts=[2]\r\n\r\n".to_vec());
        assert_eq!(serial.take_block(), None);
        assert_eq!(serial.pending, b"ts=[3".to_vec());
        serial.absorb(b"]\r\n\r\n");
        assert_eq!(serial.take_block().unwrap(), b"ts=[3]\r\n\r\n".to_vec());
        assert!(serial.pending.is_empty());
    }
    #[test]
    fn delimiter_split_across_reads_is_completed() {
        let mut serial = detached();
        serial.absorb(b"A0=[5, 6]\r\n\r");
        assert_eq!(serial.take_block(), None);
        serial.absorb(b"\n");
        assert_eq!(serial.take_block().unwrap(), b"A0=[5, 6]\r\n\r\n".to_vec());
    }
    #[test]
    fn oversized_partial_block_is_dropped() {
        let mut serial = detached();
        serial.absorb(&vec![b'7'; MAX_PENDING]);
        assert_eq!(serial.pending.len(), MAX_PENDING);
        serial.absorb(b"7");
        assert!(serial.pending.is_empty());
        serial.absorb(b"ts=[1]\r\n\r\n");
        assert_eq!(serial.take_block().unwrap(), b"ts=[1]\r\n\r\n".to_vec());
    }
    #[test]
    fn closed_port_reports_not_connected() {
        let mut serial = detached();
        serial.close().unwrap();
        assert!(matches!(serial.read_block(), Err(OxyError::Io(_))));
    }
    #[test]
    fn simulated_blocks_decode_with_padded_spectrum() {
        let mut source = SimulatedSource::new(simulation());
        let raw = source.read_block().unwrap();
        assert!(raw.ends_with(BLOCK_DELIMITER));
        let text = String::from_utf8(raw.clone()).unwrap();
        let f_line = text.lines().find(|l| l.starts_with("F=")).unwrap();
        assert_eq!(f_line.split(',').count(), 16);
        assert!(!f_line.contains("NaN"));
        let block = parse_block(&raw).unwrap();
        assert_eq!(block.rows(), 32);
        let f = block.get(Column::F).unwrap();
        assert_eq!(f.iter().filter(|v| v.is_nan()).count(), 16);
        let a0 = block.get(Column::A0).unwrap();
        assert!(a0.iter().all(|v| (0.0..=1023.0).contains(v)));
    }
    #[test]
    fn simulated_clock_is_monotonic_across_blocks() {
        let mut source = SimulatedSource::new(simulation());
        let first = source.next_block();
        let second = source.next_block();
        let ts: Vec<f64> = first
            .get(Column::Ts)
            .unwrap()
            .iter()
            .chain(second.get(Column::Ts).unwrap())
            .copied()
            .collect();
        assert!(ts.windows(2).all(|w| w[1] > w[0]));
    }
    #[test]
    fn closed_simulation_goes_quiet() {
        let mut source = SimulatedSource::new(simulation());
        source.close().unwrap();
        assert!(source.read_block().unwrap().is_empty());
    }
}
