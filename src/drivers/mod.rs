// src/drivers/mod.rs
// acquisition side: wire format, store, analysis, sources and renderers
pub mod error;
pub mod fft;
pub mod frame;
pub mod pipeline;
pub mod plot;
pub mod rate;
pub mod render;
pub mod source;
pub mod store;
// re-exported for the engine and the GUI
pub use error::{FrameError, OxyError};
pub use fft::{SpectralAnalyzer, SpectralResult, WindowKind};
pub use frame::{decode_into, DecodeOutcome, SampleBlock};
pub use pipeline::{Acquisition, CycleReport, ExitReason, LoopState, RunSummary};
pub use plot::{render_png, PlotStyle, PngRenderer};
pub use render::{PlotData, RenderOutcome, Renderer, SkipReason, SpectrumPlot, TailSnapshot};
pub use source::{BlockSource, ManualSource, SerialSource, SimulatedSource};
pub use store::{Column, SeriesStore};
