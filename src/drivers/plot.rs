use std::fs;
use std::io::Cursor;
use std::path::PathBuf;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use log::{debug, info};
use plotters::prelude::LineSeries;
use plotters::prelude::*;

use crate::drivers::render::{PlotData, RenderOutcome, Renderer, TailSnapshot};
use crate::drivers::OxyError;

#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub raw: RGBColor,
    pub device: RGBColor,
    pub local: RGBColor,
    /// Captions, axis labels and legends; needs a system font.
    pub labels: bool,
}
impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 500,
            background: RGBColor(10, 10, 10),
            raw: WHITE,
            device: CYAN,
            local: RED,
            labels: true,
        }
    }
}
/// Draws the time-domain and frequency-domain panels side by side as a PNG.
pub fn render_png(plot: &PlotData, style: &PlotStyle) -> Result<Vec<u8>, OxyError> {
    if plot.time.is_empty() {
        return Err(OxyError::Plot("time-series window has no samples".into()));
    }
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let panels = root.split_evenly((1, 2));
        let label_area = if style.labels { 45 } else { 0 };
        let t0 = plot.time[0][0];
        let t1 = plot.time[plot.time.len() - 1][0].max(t0 + 1e-6);
        let mut builder = ChartBuilder::on(&panels[0]);
        builder
            .margin(10)
            .set_label_area_size(LabelAreaPosition::Left, label_area)
            .set_label_area_size(LabelAreaPosition::Bottom, label_area);
        if style.labels {
            builder.caption(
                "Photodiode readings",
                ("sans-serif", 20).into_font().color(&WHITE),
            );
        }
        let mut chart = builder.build_cartesian_2d(t0..t1, 0f64..1030f64)?;
        if style.labels {
            chart
                .configure_mesh()
                .x_desc("Time (s)")
                .y_desc("ADC counts")
                .light_line_style(&WHITE.mix(0.1))
                .draw()?;
        }
        let raw = style.raw;
        chart
            .draw_series(LineSeries::new(plot.time.iter().map(|p| (p[0], p[1])), &raw))?
            .label(plot.channel.name())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &raw));
        if style.labels {
            chart
                .configure_series_labels()
                .border_style(&WHITE.mix(0.2))
                .background_style(&style.background)
                .draw()?;
        }
        if let Ok(spectrum) = &plot.spectrum {
            let f_max = spectrum
                .local
                .last()
                .map(|p| p[0])
                .unwrap_or(0.0)
                .max(1e-3);
            let mut builder = ChartBuilder::on(&panels[1]);
            builder
                .margin(10)
                .set_label_area_size(LabelAreaPosition::Left, label_area)
                .set_label_area_size(LabelAreaPosition::Bottom, label_area);
            if style.labels {
                builder.caption(
                    "Fourier transforms",
                    ("sans-serif", 20).into_font().color(&WHITE),
                );
            }
            let mut chart = builder
                .build_cartesian_2d(0f64..f_max, 0f64..spectrum.max_magnitude().max(1e-3))?;
            if style.labels {
                chart
                    .configure_mesh()
                    .x_desc("Frequency (Hz)")
                    .light_line_style(&WHITE.mix(0.1))
                    .draw()?;
            }
            if let Some(device) = &spectrum.device {
                let color = style.device;
                chart
                    .draw_series(LineSeries::new(device.iter().map(|p| (p[0], p[1])), &color))?
                    .label("FFT (board)")
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
            }
            let color = style.local;
            chart
                .draw_series(LineSeries::new(
                    spectrum.local.iter().map(|p| (p[0], p[1])),
                    &color,
                ))?
                .label("FFT (host)")
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
            if style.labels {
                chart
                    .configure_series_labels()
                    .border_style(&WHITE.mix(0.2))
                    .background_style(&style.background)
                    .draw()?;
            }
        }
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}
fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, OxyError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| OxyError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
/// Headless renderer: rewrites one PNG file every `every` drawable cycles.
pub struct PngRenderer {
    path: PathBuf,
    every: u32,
    drawable: u32,
    written: u32,
    style: PlotStyle,
}
impl PngRenderer {
    pub fn new(path: impl Into<PathBuf>, every: u32) -> Self {
        Self {
            path: path.into(),
            every: every.max(1),
            drawable: 0,
            written: 0,
            style: PlotStyle::default(),
        }
    }
    pub fn written(&self) -> u32 {
        self.written
    }
    fn write(&mut self, png: &[u8]) -> Result<(), OxyError> {
        // write next to the target then rename, so viewers never see half a file
        let staging = self.path.with_extension("png.tmp");
        fs::write(&staging, png)?;
        fs::rename(&staging, &self.path)?;
        self.written += 1;
        Ok(())
    }
}
impl Renderer for PngRenderer {
    fn render(&mut self, snapshot: &TailSnapshot) -> Result<RenderOutcome, OxyError> {
        let plot = match PlotData::from_snapshot(snapshot) {
            Ok(plot) => plot,
            Err(reason) => return Ok(RenderOutcome::Skipped(reason)),
        };
        if let Err(reason) = &plot.spectrum {
            debug!("spectrum panel left empty: {reason}");
        }
        self.drawable += 1;
        if (self.drawable - 1) % self.every == 0 {
            let png = render_png(&plot, &self.style)?;
            self.write(&png)?;
        }
        Ok(RenderOutcome::Drawn)
    }
    fn close(&mut self) -> Result<(), OxyError> {
        info!("wrote {} frames to {}", self.written, self.path.display());
        Ok(())
    }
}
