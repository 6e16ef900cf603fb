//! Report assembly onto fixed-size pages.
//!
//! Coordinates are millimetres from the top-left corner of the page. Images
//! are fitted into their zone with a single scale factor and centred
//! horizontally, so they are never stretched. Zones whose chart is missing
//! are skipped.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use unicode_width::UnicodeWidthStr;
use uuid::Uuid;

use crate::bands::BandCount;
use crate::charts::ChartSlot;
use crate::config::PageConfig;
use crate::labels::ReportLabels;
use crate::models::SampleStatistics;
use crate::render::RasterImage;

const HEADER_HEIGHT: f64 = 25.0;
const FOOTER_SPACE: f64 = 15.0;
const PRIMARY_CHART_WIDTH: f64 = 175.0;
const GRID_CELL_WIDTH: f64 = 85.0;
const GRID_GAP: f64 = 8.0;
const GRID_CAPTION: f64 = 6.0;
const GRID_IMAGE_HEIGHT: f64 = 56.0;
const BAND_CHART_HEIGHT: f64 = 70.0;
const HEADING_HEIGHT: f64 = 10.0;
const ROW_GAP: f64 = 5.0;
const RULE_SPACE: f64 = 7.0;
const MIN_ZONE_HEIGHT: f64 = 20.0;
const FIT_SLACK: f64 = 1.0;
const KPI_ROW_HEIGHT: f64 = 8.0;
const TABLE_ROW_HEIGHT: f64 = 6.5;
const PT_TO_MM: f64 = 0.3528;
const MAX_GRID_SLOTS: usize = 4;

const PRIMARY_ROWS: [([ChartSlot; 2], f64); 2] = [
    ([ChartSlot::ScoreGauge, ChartSlot::AcceptabilityGauge], 40.0),
    ([ChartSlot::Histogram, ChartSlot::Radar], 80.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn contains(&self, other: &Rect) -> bool {
        const EPS: f64 = 1e-9;
        other.x >= self.x - EPS
            && other.y >= self.y - EPS
            && other.right() <= self.right() + EPS
            && other.bottom() <= self.bottom() + EPS
    }
}

/// Largest undistorted placement of a `width`×`height` image inside `zone`,
/// centred horizontally and aligned to the zone top.
pub fn fit_image(zone: Rect, width: u32, height: u32) -> Rect {
    let (width, height) = (f64::from(width.max(1)), f64::from(height.max(1)));
    let scale = (zone.width / width).min(zone.height / height);
    let placed_width = width * scale;
    let placed_height = height * scale;
    Rect::new(
        zone.x + (zone.width - placed_width) / 2.0,
        zone.y,
        placed_width,
        placed_height,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextStyle {
    Title,
    Subtitle,
    Heading,
    Body,
    Caption,
    Footer,
}

impl TextStyle {
    pub fn font_size(&self) -> f64 {
        match self {
            TextStyle::Title => 18.0,
            TextStyle::Heading => 14.0,
            TextStyle::Body => 11.0,
            TextStyle::Subtitle => 10.0,
            TextStyle::Caption => 10.0,
            TextStyle::Footer => 9.0,
        }
    }

    pub fn line_height(&self) -> f64 {
        self.font_size() * PT_TO_MM * 1.4
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Align {
    Left,
    Center,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Text {
        bbox: Rect,
        text: String,
        style: TextStyle,
        align: Align,
    },
    Table {
        bbox: Rect,
        column_widths: Vec<f64>,
        header: Option<Vec<String>>,
        rows: Vec<Vec<String>>,
    },
    Image {
        bbox: Rect,
        slot: ChartSlot,
        source: String,
        image: RasterImage,
    },
    Rule {
        bbox: Rect,
    },
}

impl Element {
    pub fn bbox(&self) -> &Rect {
        match self {
            Element::Text { bbox, .. }
            | Element::Table { bbox, .. }
            | Element::Image { bbox, .. }
            | Element::Rule { bbox } => bbox,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub number: usize,
    pub elements: Vec<Element>,
}

impl Page {
    pub fn images(&self) -> impl Iterator<Item = (&ChartSlot, &Rect, &RasterImage)> {
        self.elements.iter().filter_map(|element| match element {
            Element::Image { slot, bbox, image, .. } => Some((slot, bbox, image)),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub id: Uuid,
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub page_width: f64,
    pub page_height: f64,
    pub pages: Vec<Page>,
}

impl ReportDocument {
    pub fn images(&self) -> impl Iterator<Item = (&ChartSlot, &Rect, &RasterImage)> {
        self.pages.iter().flat_map(|page| page.images())
    }

    pub fn has_table(&self) -> bool {
        self.pages
            .iter()
            .flat_map(|page| &page.elements)
            .any(|element| matches!(element, Element::Table { .. }))
    }
}

/// Everything the assembler places.
pub struct ReportContent<'a> {
    pub stats: &'a SampleStatistics,
    pub band_counts: &'a [BandCount],
    pub images: &'a BTreeMap<ChartSlot, RasterImage>,
    /// Caption per category slot, indexed like `ChartSlot::Category`.
    pub category_titles: &'a [String],
    pub prose: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
}

impl PageGeometry {
    pub fn from_config(page: &PageConfig) -> Self {
        let (width, height) = page.dimensions();
        Self {
            width,
            height,
            margin: page.margin_mm,
        }
    }

    pub fn content_left(&self) -> f64 {
        self.margin
    }

    pub fn content_width(&self) -> f64 {
        self.width - self.margin * 2.0
    }

    pub fn content_top(&self) -> f64 {
        self.margin + HEADER_HEIGHT
    }

    pub fn content_bottom(&self) -> f64 {
        self.height - FOOTER_SPACE.max(self.margin + 5.0)
    }

    pub fn content_area(&self) -> Rect {
        Rect::new(
            self.content_left(),
            self.content_top(),
            self.content_width(),
            self.content_bottom() - self.content_top(),
        )
    }
}

pub struct ReportAssembler {
    pub geometry: PageGeometry,
    pub labels: &'static ReportLabels,
    pub footer: String,
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
}

struct Flow<'a> {
    assembler: &'a ReportAssembler,
    pages: Vec<Page>,
    cursor: f64,
}

impl<'a> Flow<'a> {
    fn new(assembler: &'a ReportAssembler) -> Self {
        let mut flow = Self {
            assembler,
            pages: Vec::new(),
            cursor: 0.0,
        };
        flow.new_page();
        flow
    }

    fn geometry(&self) -> &PageGeometry {
        &self.assembler.geometry
    }

    fn new_page(&mut self) {
        let number = self.pages.len() + 1;
        let geometry = self.geometry();
        let (left, width, top) = (
            geometry.content_left(),
            geometry.content_width(),
            geometry.margin,
        );
        let footer_y = geometry.height - FOOTER_SPACE;
        let labels = self.assembler.labels;

        let elements = vec![
            Element::Text {
                bbox: Rect::new(left, top, width, 10.0),
                text: labels.title.to_string(),
                style: TextStyle::Title,
                align: Align::Left,
            },
            Element::Text {
                bbox: Rect::new(left, top + 10.0, width, 6.0),
                text: format!(
                    "{} {}",
                    labels.generated_on,
                    self.assembler.generated_at.format("%d/%m/%Y %H:%M")
                ),
                style: TextStyle::Subtitle,
                align: Align::Left,
            },
            Element::Rule {
                bbox: Rect::new(left, top + 19.0, width, 0.0),
            },
            Element::Text {
                bbox: Rect::new(left, footer_y, width, 10.0),
                text: format!("{} - {number}", self.assembler.footer),
                style: TextStyle::Footer,
                align: Align::Center,
            },
        ];

        self.cursor = self.geometry().content_top();
        self.pages.push(Page { number, elements });
    }

    fn remaining(&self) -> f64 {
        self.geometry().content_bottom() - self.cursor
    }

    /// Reserves `height` on the current page, breaking first when it does not
    /// fit and the page already holds content.
    fn reserve(&mut self, height: f64) -> f64 {
        if height > self.remaining() && self.cursor > self.geometry().content_top() {
            self.new_page();
        }
        let y = self.cursor;
        self.cursor += height;
        y
    }

    fn gap(&mut self, height: f64) {
        self.cursor = (self.cursor + height).min(self.geometry().content_bottom());
    }

    fn push(&mut self, element: Element) {
        if let Some(page) = self.pages.last_mut() {
            page.elements.push(element);
        }
    }

    fn heading(&mut self, text: &str) {
        let y = self.reserve(HEADING_HEIGHT);
        let (left, width) = (self.geometry().content_left(), self.geometry().content_width());
        self.push(Element::Text {
            bbox: Rect::new(left, y, width, HEADING_HEIGHT),
            text: text.to_string(),
            style: TextStyle::Heading,
            align: Align::Left,
        });
    }

    fn rule(&mut self, before: f64, after: f64) {
        self.gap(before);
        let (left, width) = (self.geometry().content_left(), self.geometry().content_width());
        let y = self.cursor;
        self.push(Element::Rule {
            bbox: Rect::new(left, y, width, 0.0),
        });
        self.gap(after);
    }

    fn table(
        &mut self,
        column_widths: Vec<f64>,
        header: Option<Vec<String>>,
        rows: Vec<Vec<String>>,
        row_height: f64,
    ) {
        let lines = rows.len() + usize::from(header.is_some());
        let height = lines as f64 * row_height;
        let y = self.reserve(height);
        let left = self.geometry().content_left();
        self.push(Element::Table {
            bbox: Rect::new(left, y, column_widths.iter().sum(), height),
            column_widths,
            header,
            rows,
        });
    }

    fn image(&mut self, slot: ChartSlot, zone: Rect, image: &RasterImage) {
        let bbox = fit_image(zone, image.width, image.height);
        self.push(Element::Image {
            bbox,
            slot,
            source: format!("charts/{}.png", slot.file_stem()),
            image: image.clone(),
        });
    }

    /// Full-width chart zone.
    fn chart_zone(&mut self, slot: ChartSlot, image: &RasterImage, height: f64) {
        let width = PRIMARY_CHART_WIDTH.min(self.geometry().content_width());
        let height = height.min(self.geometry().content_area().height);
        let y = self.reserve(height);
        let x = self.geometry().content_left() + (self.geometry().content_width() - width) / 2.0;
        self.image(slot, Rect::new(x, y, width, height), image);
        self.gap(ROW_GAP);
    }

    /// Left edge and cell width of a centred two-column grid.
    fn two_columns(&self, max_cell_width: f64) -> (f64, f64) {
        let geometry = self.geometry();
        let cell_width = max_cell_width.min((geometry.content_width() - GRID_GAP) / 2.0);
        let used = cell_width * 2.0 + GRID_GAP;
        let left = geometry.content_left() + (geometry.content_width() - used) / 2.0;
        (left, cell_width)
    }

    fn chart_row(&mut self, cells: &[GridCell<'_>], left: f64, cell_width: f64, image_height: f64) {
        let caption_height = if cells.iter().any(|cell| cell.caption.is_some()) {
            GRID_CAPTION
        } else {
            0.0
        };
        let y = self.reserve(caption_height + image_height);
        for cell in cells {
            let x = left + cell.column as f64 * (cell_width + GRID_GAP);
            if let Some(caption) = cell.caption {
                self.push(Element::Text {
                    bbox: Rect::new(x, y, cell_width, GRID_CAPTION),
                    text: caption.to_string(),
                    style: TextStyle::Caption,
                    align: Align::Center,
                });
            }
            let zone = Rect::new(x, y + caption_height, cell_width, image_height);
            self.image(cell.slot, zone, cell.image);
        }
        self.gap(ROW_GAP);
    }

    fn paragraph(&mut self, text: &str, style: TextStyle) {
        let width = self.geometry().content_width();
        let left = self.geometry().content_left();
        let line_height = style.line_height();
        for line in wrap_text(text, width, style.font_size()) {
            if line.is_empty() {
                self.gap(line_height / 2.0);
                continue;
            }
            let y = self.reserve(line_height);
            self.push(Element::Text {
                bbox: Rect::new(left, y, width, line_height),
                text: line,
                style,
                align: Align::Left,
            });
        }
    }
}

impl ReportAssembler {
    pub fn new(
        page: &PageConfig,
        labels: &'static ReportLabels,
        id: Uuid,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            geometry: PageGeometry::from_config(page),
            labels,
            footer: page.footer.clone(),
            id,
            generated_at,
        }
    }

    pub fn assemble(&self, content: &ReportContent<'_>) -> ReportDocument {
        let mut flow = Flow::new(self);

        self.summary_page(&mut flow, content);

        flow.new_page();
        self.classification_page(&mut flow, content);

        if let Some(prose) = content.prose.filter(|text| !text.trim().is_empty()) {
            flow.new_page();
            flow.heading(self.labels.summary_heading);
            flow.gap(3.0);
            flow.paragraph(prose, TextStyle::Body);
        }

        let document = ReportDocument {
            id: self.id,
            title: self.labels.title.to_string(),
            generated_at: self.generated_at,
            page_width: self.geometry.width,
            page_height: self.geometry.height,
            pages: flow.pages,
        };
        debug!(
            pages = document.pages.len(),
            images = document.images().count(),
            "assembled report"
        );
        document
    }

    /// KPI table, then the gauges and the histogram/radar pair as two
    /// side-by-side rows sized to the space left on the page.
    fn summary_page(&self, flow: &mut Flow<'_>, content: &ReportContent<'_>) {
        flow.heading(self.labels.statistics_heading);
        flow.rule(3.0, 6.0);
        flow.table(
            vec![60.0, 40.0],
            None,
            kpi_rows(self.labels, content.stats),
            KPI_ROW_HEIGHT,
        );
        flow.gap(5.0);

        let rows: Vec<(Vec<GridCell<'_>>, f64)> = PRIMARY_ROWS
            .iter()
            .filter_map(|(slots, nominal)| {
                let cells: Vec<GridCell<'_>> = slots
                    .iter()
                    .enumerate()
                    .filter_map(|(column, slot)| match content.images.get(slot) {
                        Some(image) => Some(GridCell {
                            slot: *slot,
                            image,
                            column,
                            caption: None,
                        }),
                        None => {
                            warn!(slot = ?slot, "chart missing, skipping zone");
                            None
                        }
                    })
                    .collect();
                (!cells.is_empty()).then_some((cells, *nominal))
            })
            .collect();

        let nominal: Vec<f64> = rows.iter().map(|(_, height)| *height).collect();
        let available = flow.remaining() - ROW_GAP * rows.len() as f64 - FIT_SLACK;
        let factor = shrink_factor(available, &nominal);
        let (left, cell_width) = flow.two_columns(f64::INFINITY);
        for (cells, height) in &rows {
            flow.chart_row(cells, left, cell_width, height * factor);
        }
    }

    /// Band chart, band table and category grid, shrunk together so they
    /// share one page.
    fn classification_page(&self, flow: &mut Flow<'_>, content: &ReportContent<'_>) {
        flow.heading(self.labels.classification_heading);
        flow.gap(2.0);

        let band_chart = content.images.get(&ChartSlot::BandDistribution);
        if band_chart.is_none() {
            warn!(slot = ?ChartSlot::BandDistribution, "chart missing, skipping zone");
        }
        let cells = category_cells(content);
        let grid_rows = cells.len().div_ceil(2);
        let table_height = (content.band_counts.len() + 1) as f64 * TABLE_ROW_HEIGHT;

        let mut nominal = Vec::new();
        let mut fixed = table_height + RULE_SPACE;
        if band_chart.is_some() {
            nominal.push(BAND_CHART_HEIGHT);
            fixed += ROW_GAP;
        }
        if grid_rows > 0 {
            nominal.extend(std::iter::repeat(GRID_IMAGE_HEIGHT).take(grid_rows));
            fixed += HEADING_HEIGHT + grid_rows as f64 * (GRID_CAPTION + ROW_GAP);
        }
        let factor = shrink_factor(flow.remaining() - fixed - FIT_SLACK, &nominal);

        if let Some(image) = band_chart {
            flow.chart_zone(ChartSlot::BandDistribution, image, BAND_CHART_HEIGHT * factor);
        }

        let labels = self.labels;
        let header = vec![
            labels.band.to_string(),
            labels.range.to_string(),
            labels.count.to_string(),
            labels.share.to_string(),
        ];
        let rows = content
            .band_counts
            .iter()
            .map(|entry| {
                vec![
                    entry.band.label.clone(),
                    entry.band.range_label(),
                    entry.count.to_string(),
                    format!("{:.1}%", entry.percent),
                ]
            })
            .collect();
        let widths = vec![70.0, 40.0, 30.0, 30.0];
        let scale = (self.geometry.content_width() / widths.iter().sum::<f64>()).min(1.0);
        flow.table(
            widths.into_iter().map(|w| w * scale).collect(),
            Some(header),
            rows,
            TABLE_ROW_HEIGHT,
        );
        flow.rule(4.0, 3.0);

        if cells.is_empty() {
            return;
        }
        flow.heading(self.labels.categories_heading);
        let (left, cell_width) = flow.two_columns(GRID_CELL_WIDTH);
        for row in cells.chunks(2) {
            flow.chart_row(row, left, cell_width, GRID_IMAGE_HEIGHT * factor);
        }
    }
}

struct GridCell<'c> {
    slot: ChartSlot,
    image: &'c RasterImage,
    column: usize,
    caption: Option<&'c str>,
}

/// Up to four category charts. Missing charts leave no placeholder: present
/// charts fill the grid in order.
fn category_cells<'c>(content: &ReportContent<'c>) -> Vec<GridCell<'c>> {
    content
        .images
        .iter()
        .filter_map(|(slot, image)| match slot {
            ChartSlot::Category(index) => Some((*slot, image, *index)),
            _ => None,
        })
        .take(MAX_GRID_SLOTS)
        .enumerate()
        .map(|(position, (slot, image, index))| GridCell {
            slot,
            image,
            column: position % 2,
            caption: Some(
                content
                    .category_titles
                    .get(index)
                    .map(String::as_str)
                    .unwrap_or_default(),
            ),
        })
        .collect()
}

/// Factor applied to `nominal` zone heights so they fit in `available`.
/// Stays at 1.0 when they already fit, or when shrinking would make the
/// smallest zone unreadable and pagination is preferable.
fn shrink_factor(available: f64, nominal: &[f64]) -> f64 {
    let total: f64 = nominal.iter().sum();
    if total <= 0.0 || available >= total {
        return 1.0;
    }
    let factor = available.max(0.0) / total;
    let smallest = nominal.iter().copied().fold(f64::INFINITY, f64::min);
    if smallest * factor < MIN_ZONE_HEIGHT {
        1.0
    } else {
        factor
    }
}

fn kpi_rows(labels: &ReportLabels, stats: &SampleStatistics) -> Vec<Vec<String>> {
    let row = |label: &str, value: String| vec![format!("{label} :"), value];
    if stats.is_empty() {
        return vec![
            row(labels.respondents, "0".to_string()),
            row(labels.mean, labels.no_data.to_string()),
        ];
    }

    let mut rows = vec![
        row(labels.respondents, stats.count.to_string()),
        row(labels.mean, format!("{:.1}", stats.mean)),
    ];
    for share in &stats.thresholds {
        rows.push(row(
            &format!("{} {:.0}", labels.at_least, share.cutoff),
            format!("{:.1}%", share.percent),
        ));
    }
    rows.extend([
        row(labels.median, format!("{:.1}", stats.median)),
        row(labels.std_dev, format!("{:.2}", stats.std_dev)),
        row(labels.min, format!("{:.1}", stats.min)),
        row(labels.max, format!("{:.1}", stats.max)),
        row(labels.q1, format!("{:.1}", stats.q1)),
        row(labels.q3, format!("{:.1}", stats.q3)),
        row(labels.iqr, format!("{:.1}", stats.iqr)),
    ]);
    rows
}

/// Greedy word wrap by display width. Words wider than a line are split.
/// Blank input lines are kept as empty strings to mark paragraph breaks.
pub fn wrap_text(text: &str, max_width_mm: f64, font_size_pt: f64) -> Vec<String> {
    let char_width = font_size_pt * PT_TO_MM * 0.5;
    let columns = ((max_width_mm / char_width).floor() as usize).max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        if paragraph.trim().is_empty() {
            lines.push(String::new());
            continue;
        }
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word = word.to_string();
            while word.width() > columns {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let split = split_at_width(&word, columns);
                let rest = word.split_off(split);
                lines.push(word);
                word = rest;
            }
            let needed = if current.is_empty() {
                word.width()
            } else {
                current.width() + 1 + word.width()
            };
            if needed > columns {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    lines
}

fn split_at_width(word: &str, columns: usize) -> usize {
    let mut width = 0;
    for (index, ch) in word.char_indices() {
        width += unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if width > columns {
            return index.max(ch.len_utf8());
        }
    }
    word.len()
}
