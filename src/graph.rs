#![cfg(not(tarpaulin_include))]
#![cfg(feature = "web")]
use crate::error::ChartError;
use plotters::prelude::*;
use std::io::Cursor;

/// Look of the decision trajectory chart served at `/chart.png`
#[derive(Clone, Debug)]
pub struct GraphOptions {
    pub title: String,

    /// Horizontal axis: the row index of each decision in the upload
    pub x_label: String,

    /// Vertical axis: the value read from the selected column
    pub y_label: String,

    /// Canvas size in pixels
    pub width: u32,
    pub height: u32,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            title: "Decision trajectory".to_string(),
            x_label: "Step".to_string(),
            y_label: "Weight".to_string(),
            width: 800,
            height: 400,
        }
    }
}

/// Render a trajectory as a PNG line chart
///
/// The chart is drawn into an in-memory RGB buffer and encoded as PNG, so
/// concurrent requests never share a scratch file.
///
/// # Arguments
/// * `values` - One value per step, plotted against the step index
/// * `options` - Graph styling options
///
/// # Returns
/// * A Result containing the PNG image data as bytes or an error
///
/// # Errors
/// * `ChartError::EmptySeries` when there is nothing to plot
/// * `ChartError::Draw` / `ChartError::Encode` when plotters or the PNG
///   encoder fail
pub fn render_trajectory(values: &[f64], options: &GraphOptions) -> Result<Vec<u8>, ChartError> {
    if values.is_empty() {
        return Err(ChartError::EmptySeries);
    }

    let (width, height) = (options.width, options.height);
    let mut pixels = vec![0u8; width as usize * height as usize * 3];

    {
        let root = BitMapBackend::with_buffer(&mut pixels, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_error)?;

        let (x_range, y_range) = plot_ranges(values);

        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 24).into_font())
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(50)
            .build_cartesian_2d(x_range, y_range)
            .map_err(draw_error)?;

        chart
            .configure_mesh()
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()
            .map_err(draw_error)?;

        chart
            .draw_series(LineSeries::new(
                values.iter().enumerate().map(|(i, v)| (i as f64, *v)),
                &GREEN,
            ))
            .map_err(draw_error)?;

        root.present().map_err(draw_error)?;
    }

    encode_png(pixels, width, height)
}

/// Axis ranges with padding so flat or single-point series still draw
fn plot_ranges(values: &[f64]) -> (std::ops::Range<f64>, std::ops::Range<f64>) {
    let min_y = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max_y = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let span = max_y - min_y;
    let pad = if span > 0.0 { span * 0.05 } else { min_y.abs().max(1.0) * 0.1 };

    let max_x = (values.len().saturating_sub(1)).max(1) as f64;
    (0.0..max_x, (min_y - pad)..(max_y + pad))
}

fn encode_png(pixels: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>, ChartError> {
    let image = image::RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| ChartError::Encode("pixel buffer size mismatch".to_string()))?;

    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut png), image::ImageOutputFormat::Png)
        .map_err(|e| ChartError::Encode(e.to_string()))?;

    Ok(png)
}

fn draw_error<E: std::fmt::Display>(e: E) -> ChartError {
    ChartError::Draw(e.to_string())
}
