use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::*;

use crate::monitor::bands::Band;
use crate::monitor::error::MonitorError;
use crate::monitor::spectrum::MagnitudeSpectrum;

#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub trace: RGBColor,
    pub band_fill: RGBColor,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 900,
            height: 400,
            background: RGBColor(10, 10, 10),
            trace: CYAN,
            band_fill: YELLOW,
        }
    }
}

/// Render one channel's analysis window as a PNG time series.
pub fn render_waveform_png(
    samples: &[f32],
    sample_rate_hz: f32,
    label: &str,
    style: &PlotStyle,
) -> Result<Vec<u8>, MonitorError> {
    if samples.is_empty() {
        return Err(MonitorError::Plot("waveform has no samples".into()));
    }
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let y_min = samples.iter().copied().fold(f32::INFINITY, f32::min);
        let y_max = samples.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let y_bounds = if (y_max - y_min).abs() < f32::EPSILON {
            (y_min - 1.0, y_max + 1.0)
        } else {
            (y_min, y_max)
        };
        let duration = samples.len() as f32 / sample_rate_hz;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(label, ("sans-serif", 20).into_font().color(&WHITE))
            .set_label_area_size(LabelAreaPosition::Left, 45)
            .set_label_area_size(LabelAreaPosition::Bottom, 40)
            .build_cartesian_2d(0f32..duration, y_bounds.0..y_bounds.1)?;
        chart
            .configure_mesh()
            .light_line_style(WHITE.mix(0.1))
            .draw()?;
        let series = samples
            .iter()
            .enumerate()
            .map(|(i, v)| (i as f32 / sample_rate_hz, *v));
        chart.draw_series(LineSeries::new(series, &style.trace))?;
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}

/// Render a magnitude spectrum as a PNG, shading the configured bands.
pub fn render_spectrum_png(
    spectrum: &MagnitudeSpectrum,
    bands: &[Band],
    label: &str,
    style: &PlotStyle,
) -> Result<Vec<u8>, MonitorError> {
    if spectrum.is_empty() {
        return Err(MonitorError::Plot("spectrum has no magnitudes".into()));
    }
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let max_hz = spectrum.bin_hz(spectrum.len() - 1);
        let y_max = spectrum
            .magnitudes()
            .iter()
            .skip(1)
            .copied()
            .fold(0.0f32, f32::max)
            .max(1e-3);
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(label, ("sans-serif", 20).into_font().color(&WHITE))
            .set_label_area_size(LabelAreaPosition::Left, 45)
            .set_label_area_size(LabelAreaPosition::Bottom, 40)
            .build_cartesian_2d(0f32..max_hz, 0f32..y_max)?;
        chart
            .configure_mesh()
            .light_line_style(WHITE.mix(0.1))
            .draw()?;
        chart.draw_series(bands.iter().map(|band| {
            Rectangle::new(
                [(band.low_hz, 0.0), (band.high_hz, y_max)],
                style.band_fill.mix(0.15).filled(),
            )
        }))?;
        // skip the DC bin, consistent with every power calculation
        let series = (1..spectrum.len()).map(|k| (spectrum.bin_hz(k), spectrum.magnitudes()[k]));
        chart.draw_series(LineSeries::new(series, &style.trace))?;
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}

fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, MonitorError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| MonitorError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    DynamicImage::ImageRgb8(image).write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
