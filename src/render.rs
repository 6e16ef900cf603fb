use std::f64::consts::PI;
use std::io::Cursor;

use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::bands::parse_hex_color;
use crate::charts::{
    BarChart, ChartArtifact, GaugeChart, HistogramChart, RadarChart, MEAN_MARKER_COLOR,
};
use crate::error::RenderingUnavailable;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const GRID: Rgb<u8> = Rgb([221, 221, 221]);
const AXIS: Rgb<u8> = Rgb([120, 120, 120]);
const NEEDLE: Rgb<u8> = Rgb([220, 0, 0]);
const FALLBACK: Rgb<u8> = Rgb([128, 128, 128]);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterImage {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: String,
}

impl RasterImage {
    pub fn png(bytes: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            bytes,
            width,
            height,
            format: "png".to_string(),
        }
    }

    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height.max(1))
    }
}

/// Implementations run on tokio's blocking pool. A call that outlives its
/// timeout is abandoned, not cancelled, and keeps its thread until it returns.
pub trait ChartRenderer: Send + Sync {
    fn render(&self, artifact: &ChartArtifact) -> Result<RasterImage, RenderingUnavailable>;
}

/// Flat PNG charts. Output depends only on the artifact.
#[derive(Debug, Clone, Copy)]
pub struct RasterRenderer {
    /// Pixel multiplier applied to every base canvas size.
    pub scale: u32,
}

impl Default for RasterRenderer {
    fn default() -> Self {
        Self { scale: 2 }
    }
}

impl ChartRenderer for RasterRenderer {
    fn render(&self, artifact: &ChartArtifact) -> Result<RasterImage, RenderingUnavailable> {
        let (width, height) = self.canvas_size(artifact);
        let mut canvas = Canvas::new(width, height);
        match artifact {
            ChartArtifact::Gauge(chart) => canvas.gauge(chart),
            ChartArtifact::Histogram(chart) => canvas.histogram(chart),
            ChartArtifact::Radar(chart) => canvas.radar(chart),
            ChartArtifact::GroupedBar(chart) | ChartArtifact::BandDistribution(chart) => {
                canvas.bars(chart)
            }
        }
        canvas.encode()
    }
}

impl RasterRenderer {
    fn canvas_size(&self, artifact: &ChartArtifact) -> (u32, u32) {
        let (width, height) = match artifact {
            ChartArtifact::Gauge(_) => (500, 160),
            ChartArtifact::Histogram(_) => (500, 250),
            ChartArtifact::Radar(_) => (300, 300),
            ChartArtifact::GroupedBar(_) => (340, 280),
            ChartArtifact::BandDistribution(_) => (500, 230),
        };
        let scale = self.scale.max(1);
        (width * scale, height * scale)
    }
}

fn color(hex: &str) -> Rgb<u8> {
    parse_hex_color(hex).map(Rgb).unwrap_or(FALLBACK)
}

struct Canvas {
    image: RgbImage,
}

impl Canvas {
    fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, BACKGROUND),
        }
    }

    fn width(&self) -> f64 {
        f64::from(self.image.width())
    }

    fn height(&self) -> f64 {
        f64::from(self.image.height())
    }

    fn fill_rect(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, fill: Rgb<u8>) {
        let (w, h) = (self.image.width() as i64, self.image.height() as i64);
        let left = (x0.min(x1).round() as i64).clamp(0, w);
        let right = (x0.max(x1).round() as i64).clamp(0, w);
        let top = (y0.min(y1).round() as i64).clamp(0, h);
        let bottom = (y0.max(y1).round() as i64).clamp(0, h);
        for y in top..bottom {
            for x in left..right {
                self.image.put_pixel(x as u32, y as u32, fill);
            }
        }
    }

    fn line(&mut self, from: (f64, f64), to: (f64, f64), stroke: Rgb<u8>) {
        let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs()).ceil().max(1.0) as usize;
        for step in 0..=steps {
            let t = step as f64 / steps as f64;
            let x = from.0 + (to.0 - from.0) * t;
            let y = from.1 + (to.1 - from.1) * t;
            self.dot(x, y, stroke);
        }
    }

    fn dot(&mut self, x: f64, y: f64, fill: Rgb<u8>) {
        self.fill_rect(x - 1.0, y - 1.0, x + 1.0, y + 1.0, fill);
    }

    fn triangle(&mut self, apex: (f64, f64), half_width: f64, height: f64, fill: Rgb<u8>) {
        let rows = height.abs().ceil() as usize;
        for row in 0..rows {
            let t = row as f64 / rows.max(1) as f64;
            let half = half_width * t;
            let y = apex.1 + height.signum() * row as f64;
            self.fill_rect(apex.0 - half, y, apex.0 + half + 1.0, y + 1.0, fill);
        }
    }

    fn gauge(&mut self, chart: &GaugeChart) {
        let (min, max) = chart.range;
        let pad = self.width() * 0.04;
        let span = self.width() - pad * 2.0;
        let to_x = |value: f64| pad + (value - min) / (max - min) * span;
        let band_top = self.height() * 0.45;
        let band_bottom = self.height() * 0.7;

        for zone in &chart.zones {
            self.fill_rect(
                to_x(zone.lower),
                band_top,
                to_x(zone.upper),
                band_bottom,
                color(&zone.color),
            );
        }
        for zone in &chart.zones {
            let x = to_x(zone.lower);
            self.line((x, band_bottom), (x, band_bottom + self.height() * 0.08), AXIS);
        }
        let needle_x = to_x(chart.needle);
        self.triangle(
            (needle_x, band_top - 2.0),
            self.width() * 0.02,
            -self.height() * 0.2,
            NEEDLE,
        );
    }

    fn plot_area(&self) -> (f64, f64, f64, f64) {
        let left = self.width() * 0.08;
        let right = self.width() * 0.96;
        let top = self.height() * 0.08;
        let bottom = self.height() * 0.88;
        (left, top, right, bottom)
    }

    fn axes(&mut self, left: f64, top: f64, right: f64, bottom: f64) {
        for step in 1..=4 {
            let y = bottom - (bottom - top) * f64::from(step) / 4.0;
            self.line((left, y), (right, y), GRID);
        }
        self.line((left, bottom), (right, bottom), AXIS);
        self.line((left, top), (left, bottom), AXIS);
    }

    fn histogram(&mut self, chart: &HistogramChart) {
        let (left, top, right, bottom) = self.plot_area();
        self.axes(left, top, right, bottom);
        let (Some(&first), Some(&last)) = (chart.edges.first(), chart.edges.last()) else {
            return;
        };
        let span = (last - first).max(f64::EPSILON);
        let to_x = |value: f64| left + (value - first) / span * (right - left);
        let to_y = |count: f64| bottom - count / chart.y_max * (bottom - top);
        let fill = color(&chart.color);

        for (window, &count) in chart.edges.windows(2).zip(&chart.counts) {
            if count == 0 {
                continue;
            }
            self.fill_rect(
                to_x(window[0]) + 1.0,
                to_y(count as f64),
                to_x(window[1]) - 1.0,
                bottom,
                fill,
            );
        }

        let mean_x = to_x(chart.mean_marker.clamp(first, last));
        let marker = color(MEAN_MARKER_COLOR);
        let mut y = top;
        while y < bottom {
            self.line((mean_x, y), (mean_x, (y + 6.0).min(bottom)), marker);
            y += 12.0;
        }
    }

    fn radar(&mut self, chart: &RadarChart) {
        let center = (self.width() / 2.0, self.height() / 2.0);
        let radius = self.width().min(self.height()) * 0.42;
        let (low, high) = chart.range;
        let axes = chart.axes.len().max(1);
        let point = |index: usize, fraction: f64| {
            let angle = -PI / 2.0 + 2.0 * PI * index as f64 / axes as f64;
            (
                center.0 + radius * fraction * angle.cos(),
                center.1 + radius * fraction * angle.sin(),
            )
        };

        for ring in 1..=4 {
            let fraction = f64::from(ring) / 4.0;
            for index in 0..axes {
                self.line(point(index, fraction), point((index + 1) % axes, fraction), GRID);
            }
        }
        for index in 0..axes {
            self.line(center, point(index, 1.0), GRID);
        }

        let stroke = color(crate::charts::HISTOGRAM_COLOR);
        let fractions: Vec<f64> = chart
            .values
            .iter()
            .map(|value| ((value - low) / (high - low)).clamp(0.0, 1.0))
            .collect();
        for (index, fraction) in fractions.iter().enumerate() {
            let next = (index + 1) % fractions.len();
            self.line(point(index, *fraction), point(next, fractions[next]), stroke);
            let (x, y) = point(index, *fraction);
            self.fill_rect(x - 3.0, y - 3.0, x + 3.0, y + 3.0, stroke);
        }
    }

    fn bars(&mut self, chart: &BarChart) {
        let (left, top, right, bottom) = self.plot_area();
        self.axes(left, top, right, bottom);
        if chart.values.is_empty() {
            return;
        }
        let slot = (right - left) / chart.values.len() as f64;
        let gap = slot * 0.125;
        for (index, value) in chart.values.iter().enumerate() {
            let x0 = left + slot * index as f64 + gap;
            let x1 = x0 + slot - gap * 2.0;
            let y = bottom - value.max(0.0) / chart.y_max * (bottom - top);
            let fill = chart.colors.get(index).map(|hex| color(hex)).unwrap_or(FALLBACK);
            self.fill_rect(x0, y, x1, bottom, fill);
        }
    }

    fn encode(self) -> Result<RasterImage, RenderingUnavailable> {
        let (width, height) = self.image.dimensions();
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(self.image)
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .map_err(|err| RenderingUnavailable::renderer(format!("png encoding failed: {err}")))?;
        Ok(RasterImage::png(bytes, width, height))
    }
}
