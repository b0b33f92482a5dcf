use std::io::Cursor;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::LineSeries;
use plotters::prelude::*;
use crate::drivers::error::AcquisitionError;
use crate::drivers::DisplayFrame;
#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub palette: Vec<RGBColor>,
}
impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 900,
            height: 400,
            background: RGBColor(10, 10, 10),
            palette: vec![BLUE, RED, GREEN, CYAN, MAGENTA, YELLOW, WHITE],
        }
    }
}
/// (x range, y range) over every present point. Flat data gets a fixed band.
pub fn frame_bounds(frame: &DisplayFrame) -> Option<((f64, f64), (f64, f64))> {
    let points = frame.series.values().flat_map(|w| {
        w.times
            .iter()
            .zip(&w.values)
            .filter_map(|(t, v)| v.map(|v| (*t, v)))
    });
    let mut bounds: Option<((f64, f64), (f64, f64))> = None;
    for (t, v) in points {
        let ((x0, x1), (y0, y1)) = bounds.get_or_insert(((t, t), (v, v)));
        *x0 = x0.min(t);
        *x1 = x1.max(t);
        *y0 = y0.min(v);
        *y1 = y1.max(v);
    }
    bounds.map(|((x0, x1), (y0, y1))| {
        let x = if x1 - x0 < f64::EPSILON { (x0, x0 + 1.0) } else { (x0, x1) };
        let y = if y1 - y0 < f64::EPSILON {
            (y0 - 50.0, y0 + 50.0)
        } else {
            (y0, y1)
        };
        (x, y)
    })
}
/// Renders one display refresh as a PNG. Gaps (ticks without data) split lines.
pub fn render_frame_png(frame: &DisplayFrame, style: PlotStyle) -> Result<Vec<u8>, AcquisitionError> {
    let ((x0, x1), (y0, y1)) = frame_bounds(frame)
        .ok_or_else(|| AcquisitionError::Plot("display frame has no samples".into()))?;
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption("Sensors", ("sans-serif", 20).into_font().color(&WHITE))
            .set_label_area_size(LabelAreaPosition::Left, 45)
            .set_label_area_size(LabelAreaPosition::Bottom, 40)
            .build_cartesian_2d(x0..x1, y0..y1)?;
        chart
            .configure_mesh()
            .light_line_style(&WHITE.mix(0.1))
            .x_desc("t [s]")
            .draw()?;
        for (idx, (id, window)) in frame.series.iter().enumerate() {
            let color = series_color(&style.palette, idx);
            let mut labelled = false;
            for run in contiguous_runs(&window.times, &window.values) {
                let drawn = chart.draw_series(LineSeries::new(run, &color))?;
                if !labelled {
                    drawn
                        .label(id.to_string())
                        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
                    labelled = true;
                }
            }
        }
        chart
            .configure_series_labels()
            .border_style(&WHITE.mix(0.2))
            .background_style(&style.background)
            .draw()?;
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}
/// Palette entry for series `idx`, cycling; an empty palette draws everything white.
fn series_color(palette: &[RGBColor], idx: usize) -> RGBColor {
    if palette.is_empty() {
        return WHITE;
    }
    palette[idx % palette.len()]
}
fn contiguous_runs(times: &[f64], values: &[Option<f64>]) -> Vec<Vec<(f64, f64)>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for (t, v) in times.iter().zip(values) {
        match v {
            Some(v) => current.push((*t, *v)),
            None if !current.is_empty() => runs.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}
fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, AcquisitionError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| AcquisitionError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
