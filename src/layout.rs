//! Closed-form geometry for the dashboard charts.
//!
//! Every adapter here is a pure function of its aggregate input and the
//! display options, so identical inputs always give identical geometry. When
//! there is nothing to draw the adapters return [`Layout::NoData`] instead of
//! dividing by zero. The force-directed network lives in `force`.

use crate::aggregate::{Bucket, CrossTab, TreeNode};
use lazy_static::lazy_static;
use serde::Serialize;
use std::collections::HashMap;
use std::f64::consts::TAU;

pub const NO_DATA_MESSAGE: &str = "No data available";

/// Geometry ready to paint, or the placeholder shown for an empty selection.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Layout<T> {
    Ready { geometry: T },
    NoData { message: String },
}

impl<T> Layout<T> {
    pub fn ready(geometry: T) -> Self {
        Layout::Ready { geometry }
    }

    pub fn no_data() -> Self {
        Layout::NoData {
            message: NO_DATA_MESSAGE.to_string(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Layout::Ready { .. })
    }

    pub fn geometry(&self) -> Option<&T> {
        match self {
            Layout::Ready { geometry } => Some(geometry),
            Layout::NoData { .. } => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Layout<U> {
        match self {
            Layout::Ready { geometry } => Layout::Ready {
                geometry: f(geometry),
            },
            Layout::NoData { message } => Layout::NoData { message },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Margin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

/// Canvas size and spacing shared by the cartesian and circular charts.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayOptions {
    pub width: f64,
    pub height: f64,
    pub margin: Margin,
    /// Gap between the pie and the canvas edge.
    pub pie_inset: f64,
    /// Inner radius of a donut as a fraction of its outer radius.
    pub donut_ratio: f64,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            width: 500.0,
            height: 320.0,
            margin: Margin {
                top: 40.0,
                right: 30.0,
                bottom: 70.0,
                left: 50.0,
            },
            pie_inset: 40.0,
            donut_ratio: 0.5,
        }
    }
}

impl DisplayOptions {
    pub fn inner_width(&self) -> f64 {
        (self.width - self.margin.left - self.margin.right).max(0.0)
    }

    pub fn inner_height(&self) -> f64 {
        (self.height - self.margin.top - self.margin.bottom).max(0.0)
    }

    pub fn with_left_margin(mut self, left: f64) -> Self {
        self.margin.left = left;
        self
    }
}

/// Padding of a band scale, as fractions of a step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Padding {
    pub inner: f64,
    pub outer: f64,
}

impl Padding {
    pub fn uniform(padding: f64) -> Self {
        Padding {
            inner: padding,
            outer: padding,
        }
    }

    pub fn inner_only(padding: f64) -> Self {
        Padding {
            inner: padding,
            outer: 0.0,
        }
    }
}

/// Evenly spaced bands across a range, centred when padding leaves slack.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BandScale {
    start: f64,
    step: f64,
    bandwidth: f64,
}

impl BandScale {
    pub fn new(count: usize, range: (f64, f64), padding: Padding) -> Self {
        let (r0, r1) = range;
        let n = count as f64;
        let step = (r1 - r0) / (n - padding.inner + 2.0 * padding.outer).max(1.0);
        let start = r0 + ((r1 - r0) - step * (n - padding.inner)) * 0.5;
        BandScale {
            start,
            step,
            bandwidth: step * (1.0 - padding.inner),
        }
    }

    pub fn position(&self, index: usize) -> f64 {
        self.start + self.step * index as f64
    }

    pub fn center(&self, index: usize) -> f64 {
        self.position(index) + self.bandwidth / 2.0
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    pub fn step(&self) -> f64 {
        self.step
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearScale {
    domain: (f64, f64),
    range: (f64, f64),
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        LinearScale { domain, range }
    }

    pub fn map(&self, value: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        if d1 == d0 {
            return r0;
        }
        r0 + (value - d0) / (d1 - d0) * (r1 - r0)
    }
}

/// Round `max` up to a tidy tick boundary for roughly `ticks` ticks.
pub fn nice_max(max: f64, ticks: usize) -> f64 {
    if max <= 0.0 || !max.is_finite() {
        return max.max(0.0);
    }
    let raw = max / ticks.max(1) as f64;
    let power = 10f64.powf(raw.log10().floor());
    let error = raw / power;
    let factor = if error >= 50f64.sqrt() {
        10.0
    } else if error >= 10f64.sqrt() {
        5.0
    } else if error >= 2f64.sqrt() {
        2.0
    } else {
        1.0
    };
    let step = factor * power;
    (max / step).ceil() * step
}

/// Area-proportional radius: `sqrt(value)` mapped linearly onto `range`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SqrtScale {
    max: f64,
    range: (f64, f64),
}

impl SqrtScale {
    pub fn new(max: f64, range: (f64, f64)) -> Self {
        SqrtScale { max, range }
    }

    pub fn map(&self, value: f64) -> f64 {
        let (lo, hi) = self.range;
        if self.max <= 0.0 {
            return lo;
        }
        lo + (value.max(0.0) / self.max).sqrt() * (hi - lo)
    }
}

/// How the value axis of a column chart is bounded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AxisMax {
    Fixed(f64),
    /// Nice-rounded data maximum, never below the given floor.
    Nice { at_least: f64 },
}

impl AxisMax {
    fn resolve(&self, data_max: f64) -> f64 {
        match *self {
            AxisMax::Fixed(max) => max,
            AxisMax::Nice { at_least } => nice_max(data_max, 10).max(at_least),
        }
    }
}

// ---------------------------------------------------------------------------
// Circular subdivision
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArcSlice {
    pub key: String,
    pub count: usize,
    pub percentage: f64,
    pub start_angle: f64,
    pub end_angle: f64,
    pub label_x: f64,
    pub label_y: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PieGeometry {
    pub center_x: f64,
    pub center_y: f64,
    pub inner_radius: f64,
    pub outer_radius: f64,
    pub total: usize,
    pub slices: Vec<ArcSlice>,
}

/// Split the circle between `buckets` in the order given.
///
/// Angles run clockwise from twelve o'clock. A donut keeps the same angles
/// with a hole of `donut_ratio` × outer radius.
pub fn pie_layout(buckets: &[Bucket], options: &DisplayOptions, donut: bool) -> Layout<PieGeometry> {
    let total: usize = buckets.iter().map(|b| b.count).sum();
    if total == 0 {
        return Layout::no_data();
    }

    let outer_radius = (options.width.min(options.height) / 2.0 - options.pie_inset).max(0.0);
    let inner_radius = if donut {
        outer_radius * options.donut_ratio
    } else {
        0.0
    };
    let label_radius = outer_radius * 0.75;
    let per_unit = TAU / total as f64;

    let mut angle = 0.0;
    let slices = buckets
        .iter()
        .map(|bucket| {
            let start_angle = angle;
            angle += bucket.count as f64 * per_unit;
            let middle = (start_angle + angle) / 2.0;
            ArcSlice {
                key: bucket.key.clone(),
                count: bucket.count,
                percentage: bucket.percentage,
                start_angle,
                end_angle: angle,
                label_x: label_radius * middle.sin(),
                label_y: -label_radius * middle.cos(),
            }
        })
        .collect();

    Layout::ready(PieGeometry {
        center_x: options.width / 2.0,
        center_y: options.height / 2.0,
        inner_radius,
        outer_radius,
        total,
        slices,
    })
}

// ---------------------------------------------------------------------------
// Categorical axis
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BarRect {
    pub key: String,
    pub value: f64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BarGeometry {
    pub inner_width: f64,
    pub inner_height: f64,
    pub axis_max: f64,
    pub bars: Vec<BarRect>,
}

/// One vertical bar per item, values measured up from the bottom edge.
pub fn bar_layout(
    items: &[(String, f64)],
    padding: Padding,
    axis: AxisMax,
    options: &DisplayOptions,
) -> Layout<BarGeometry> {
    if items.is_empty() {
        return Layout::no_data();
    }
    let inner_width = options.inner_width();
    let inner_height = options.inner_height();
    let data_max = items.iter().map(|(_, v)| *v).fold(0.0, f64::max);
    let axis_max = axis.resolve(data_max);
    let x = BandScale::new(items.len(), (0.0, inner_width), padding);
    let y = LinearScale::new((0.0, axis_max), (inner_height, 0.0));

    let bars = items
        .iter()
        .enumerate()
        .map(|(i, (key, value))| {
            let top = y.map(*value);
            BarRect {
                key: key.clone(),
                value: *value,
                x: x.position(i),
                y: top,
                width: x.bandwidth(),
                height: inner_height - top,
            }
        })
        .collect();

    Layout::ready(BarGeometry {
        inner_width,
        inner_height,
        axis_max,
        bars,
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LinePoint {
    pub key: String,
    pub value: f64,
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineGeometry {
    pub inner_width: f64,
    pub inner_height: f64,
    pub axis_max: f64,
    pub points: Vec<LinePoint>,
}

/// The same band axis as [`bar_layout`], with one point per band centre.
pub fn line_layout(
    items: &[(String, f64)],
    padding: Padding,
    axis: AxisMax,
    options: &DisplayOptions,
) -> Layout<LineGeometry> {
    bar_layout(items, padding, axis, options).map(|bars| LineGeometry {
        inner_width: bars.inner_width,
        inner_height: bars.inner_height,
        axis_max: bars.axis_max,
        points: bars
            .bars
            .into_iter()
            .map(|bar| LinePoint {
                key: bar.key,
                value: bar.value,
                x: bar.x + bar.width / 2.0,
                y: bar.y,
            })
            .collect(),
    })
}

/// Horizontal bars: categories down the left edge, values to the right.
pub fn horizontal_bar_layout(items: &[(String, f64)], options: &DisplayOptions) -> Layout<BarGeometry> {
    if items.is_empty() {
        return Layout::no_data();
    }
    let inner_width = options.inner_width();
    let inner_height = options.inner_height();
    let axis_max = items.iter().map(|(_, v)| *v).fold(0.0, f64::max);
    let x = LinearScale::new((0.0, axis_max), (0.0, inner_width));
    let y = BandScale::new(items.len(), (0.0, inner_height), Padding::uniform(0.1));

    let bars = items
        .iter()
        .enumerate()
        .map(|(i, (key, value))| BarRect {
            key: key.clone(),
            value: *value,
            x: 0.0,
            y: y.position(i),
            width: x.map(*value),
            height: y.bandwidth(),
        })
        .collect();

    Layout::ready(BarGeometry {
        inner_width,
        inner_height,
        axis_max,
        bars,
    })
}

/// One category with a value per series, in series order.
#[derive(Clone, Debug, PartialEq)]
pub struct SeriesRow {
    pub key: String,
    pub values: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackSegment {
    pub series: String,
    pub value: f64,
    /// Running total below and at the top of this segment, in data units.
    pub lower: f64,
    pub upper: f64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StackedColumn {
    pub key: String,
    pub total: f64,
    pub segments: Vec<StackSegment>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackedGeometry {
    pub inner_width: f64,
    pub inner_height: f64,
    pub axis_max: f64,
    pub series: Vec<String>,
    pub columns: Vec<StackedColumn>,
}

/// Stack each row's series values bottom-up in the order of `series`.
pub fn stacked_layout(
    rows: &[SeriesRow],
    series: &[String],
    padding: Padding,
    axis: AxisMax,
    options: &DisplayOptions,
) -> Layout<StackedGeometry> {
    if rows.is_empty() || series.is_empty() {
        return Layout::no_data();
    }
    let inner_width = options.inner_width();
    let inner_height = options.inner_height();
    let data_max = rows
        .iter()
        .map(|row| row.values.iter().sum::<f64>())
        .fold(0.0, f64::max);
    let axis_max = axis.resolve(data_max);
    let x = BandScale::new(rows.len(), (0.0, inner_width), padding);
    let y = LinearScale::new((0.0, axis_max), (inner_height, 0.0));

    let columns = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut running = 0.0;
            let segments = series
                .iter()
                .enumerate()
                .map(|(s, name)| {
                    let value = row.values.get(s).copied().unwrap_or(0.0);
                    let lower = running;
                    running += value;
                    let top = y.map(running);
                    StackSegment {
                        series: name.clone(),
                        value,
                        lower,
                        upper: running,
                        x: x.position(i),
                        y: top,
                        width: x.bandwidth(),
                        height: y.map(lower) - top,
                    }
                })
                .collect();
            StackedColumn {
                key: row.key.clone(),
                total: running,
                segments,
            }
        })
        .collect();

    Layout::ready(StackedGeometry {
        inner_width,
        inner_height,
        axis_max,
        series: series.to_vec(),
        columns,
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupedColumn {
    pub key: String,
    pub x: f64,
    pub bars: Vec<BarRect>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedGeometry {
    pub inner_width: f64,
    pub inner_height: f64,
    pub axis_max: f64,
    pub series: Vec<String>,
    pub columns: Vec<GroupedColumn>,
}

/// Side-by-side bars: each category band is split into equal sub-bands, one
/// per series. Bar `x` positions are absolute within the plot area.
pub fn grouped_layout(
    rows: &[SeriesRow],
    series: &[String],
    padding: Padding,
    sub_padding: f64,
    axis: AxisMax,
    options: &DisplayOptions,
) -> Layout<GroupedGeometry> {
    if rows.is_empty() || series.is_empty() {
        return Layout::no_data();
    }
    let inner_width = options.inner_width();
    let inner_height = options.inner_height();
    let data_max = rows
        .iter()
        .flat_map(|row| row.values.iter().copied())
        .fold(0.0, f64::max);
    let axis_max = axis.resolve(data_max);
    let x = BandScale::new(rows.len(), (0.0, inner_width), padding);
    let sub = BandScale::new(series.len(), (0.0, x.bandwidth()), Padding::uniform(sub_padding));
    let y = LinearScale::new((0.0, axis_max), (inner_height, 0.0));

    let columns = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let left = x.position(i);
            let bars = series
                .iter()
                .enumerate()
                .map(|(s, name)| {
                    let value = row.values.get(s).copied().unwrap_or(0.0);
                    let top = y.map(value);
                    BarRect {
                        key: name.clone(),
                        value,
                        x: left + sub.position(s),
                        y: top,
                        width: sub.bandwidth(),
                        height: inner_height - top,
                    }
                })
                .collect();
            GroupedColumn {
                key: row.key.clone(),
                x: left,
                bars,
            }
        })
        .collect();

    Layout::ready(GroupedGeometry {
        inner_width,
        inner_height,
        axis_max,
        series: series.to_vec(),
        columns,
    })
}

// ---------------------------------------------------------------------------
// Two-way grid (bubbles / heatmap)
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCell {
    pub row: String,
    pub column: String,
    pub count: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub center_x: f64,
    pub center_y: f64,
    pub radius: f64,
    /// count / largest count, for the heatmap colour ramp.
    pub intensity: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridGeometry {
    pub inner_width: f64,
    pub inner_height: f64,
    pub x_keys: Vec<String>,
    pub y_keys: Vec<String>,
    pub cells: Vec<GridCell>,
}

/// Lay a cross-tab out as a grid: row keys across, column keys upwards.
///
/// Every cell gets both a heatmap rectangle and a bubble whose area tracks its
/// count (radius 5–50).
pub fn grid_layout(tab: &CrossTab, options: &DisplayOptions) -> Layout<GridGeometry> {
    if tab.is_empty() {
        return Layout::no_data();
    }
    let inner_width = options.inner_width();
    let inner_height = options.inner_height();
    let x = BandScale::new(tab.row_keys.len(), (0.0, inner_width), Padding::uniform(0.2));
    let y = BandScale::new(tab.column_keys.len(), (0.0, inner_height), Padding::uniform(0.2));
    let max = tab.max_count();
    let size = SqrtScale::new(max as f64, (5.0, 50.0));
    let last_y = tab.column_keys.len().saturating_sub(1);

    let cells = tab
        .cells
        .iter()
        .map(|cell| {
            let xi = tab.row_keys.iter().position(|k| *k == cell.row).unwrap_or(0);
            let yi = tab.column_keys.iter().position(|k| *k == cell.column).unwrap_or(0);
            // first column key sits at the bottom
            let top = y.position(last_y - yi);
            GridCell {
                row: cell.row.clone(),
                column: cell.column.clone(),
                count: cell.count,
                x: x.position(xi),
                y: top,
                width: x.bandwidth(),
                height: y.bandwidth(),
                center_x: x.center(xi),
                center_y: top + y.bandwidth() / 2.0,
                radius: size.map(cell.count as f64),
                intensity: if max == 0 {
                    0.0
                } else {
                    cell.count as f64 / max as f64
                },
            }
        })
        .collect();

    Layout::ready(GridGeometry {
        inner_width,
        inner_height,
        x_keys: tab.row_keys.clone(),
        y_keys: tab.column_keys.clone(),
        cells,
    })
}

// ---------------------------------------------------------------------------
// Bubble map
// ---------------------------------------------------------------------------

lazy_static! {
    /// Anchor points for frequent countries, as fractions of the plot area.
    static ref KNOWN_LOCATIONS: HashMap<&'static str, (f64, f64)> = {
        let mut m = HashMap::new();
        m.insert("USA", (1.0 / 3.0, 1.0 / 2.0));
        m.insert("United States of America", (1.0 / 3.0, 1.0 / 2.0));
        m.insert("Canada", (1.0 / 3.0, 1.0 / 3.0));
        m.insert("United Kingdom", (1.0 / 2.0, 1.0 / 3.0));
        m.insert("Germany", (1.0 / 2.0, 1.0 / 2.0));
        m.insert("Australia", (2.0 / 3.0, 2.0 / 3.0));
        m.insert("India", (2.0 / 3.0, 1.0 / 2.0));
        m.insert("Brazil", (1.0 / 3.0, 2.0 / 3.0));
        m.insert("France", (1.0 / 2.0, 1.0 / 2.5));
        m.insert("Russia", (2.0 / 3.0, 1.0 / 3.0));
        m.insert("Japan", (3.0 / 4.0, 1.0 / 2.0));
        m
    };
}

const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MapBubble {
    pub location: String,
    pub count: usize,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub labelled: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LegendBubble {
    pub value: f64,
    pub radius: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BubbleMapGeometry {
    pub inner_width: f64,
    pub inner_height: f64,
    pub bubbles: Vec<MapBubble>,
    pub legend: Vec<LegendBubble>,
}

/// Place one bubble per location.
///
/// Well-known countries sit at fixed anchors; the rest follow a golden-angle
/// spiral around the centre in bucket order, so placement is repeatable.
pub fn bubble_map_layout(buckets: &[Bucket], options: &DisplayOptions) -> Layout<BubbleMapGeometry> {
    if buckets.is_empty() {
        return Layout::no_data();
    }
    let inner_width = options.inner_width();
    let inner_height = options.inner_height();
    let max = buckets.iter().map(|b| b.count).max().unwrap_or(0) as f64;
    let size = SqrtScale::new(max, (5.0, 30.0));

    let unknown_total = buckets
        .iter()
        .filter(|b| !KNOWN_LOCATIONS.contains_key(b.key.as_str()))
        .count()
        .max(1) as f64;
    let mut unknown_index = 0usize;

    let bubbles = buckets
        .iter()
        .map(|bucket| {
            let (fx, fy) = match KNOWN_LOCATIONS.get(bucket.key.as_str()) {
                Some(anchor) => *anchor,
                None => {
                    let i = unknown_index as f64;
                    unknown_index += 1;
                    let reach = 0.45 * ((i + 1.0) / unknown_total).sqrt();
                    let angle = i * GOLDEN_ANGLE;
                    (
                        (0.5 + reach * angle.cos()).clamp(0.0, 1.0),
                        (0.5 + reach * angle.sin()).clamp(0.0, 1.0),
                    )
                }
            };
            MapBubble {
                location: bucket.key.clone(),
                count: bucket.count,
                x: fx * inner_width,
                y: fy * inner_height,
                radius: size.map(bucket.count as f64),
                labelled: bucket.count as f64 > max / 10.0,
            }
        })
        .collect();

    let legend = [max, max / 2.0, max / 5.0]
        .into_iter()
        .map(|value| LegendBubble {
            value,
            radius: size.map(value),
        })
        .collect();

    Layout::ready(BubbleMapGeometry {
        inner_width,
        inner_height,
        bubbles,
        legend,
    })
}

// ---------------------------------------------------------------------------
// Hierarchical tree
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PositionedNode {
    pub name: String,
    pub depth: usize,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TreeLink {
    pub source: usize,
    pub target: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TreeGeometry {
    pub width: f64,
    pub height: f64,
    pub nodes: Vec<PositionedNode>,
    pub links: Vec<TreeLink>,
}

impl TreeGeometry {
    /// The root's children, in layout order.
    pub fn branches(&self) -> impl Iterator<Item = &PositionedNode> {
        self.nodes.iter().filter(|n| n.depth == 1)
    }

    /// Position among `branches()` of the top-level category node `index`
    /// descends from. `None` for the root.
    pub fn branch_of(&self, index: usize) -> Option<usize> {
        let mut current = index;
        loop {
            let node = self.nodes.get(current)?;
            match node.depth {
                0 => return None,
                1 => break,
                _ => current = node.parent?,
            }
        }
        Some(self.nodes[..current].iter().filter(|n| n.depth == 1).count())
    }
}

/// Horizontal tree: depth runs left to right across `width`, leaves are evenly
/// spaced down `height` and every parent is centred on its children.
///
/// Leaf radii follow a square-root scale of their value over `radius`; inner
/// nodes use the smallest radius.
pub fn tree_layout(root: &TreeNode, width: f64, height: f64, radius: (f64, f64)) -> TreeGeometry {
    let mut leaves = Vec::new();
    collect_leaves(root, &mut leaves);
    let max_depth = depth_of(root).max(1) as f64;
    let max_value = leaves.iter().filter_map(|n| n.value).max().unwrap_or(0) as f64;
    let size = SqrtScale::new(max_value, radius);
    let leaf_gap = height / leaves.len().max(1) as f64;

    let mut nodes = Vec::new();
    let mut links = Vec::new();
    let mut next_leaf = 0usize;
    place(
        root,
        0,
        None,
        &mut TreePlacement {
            width,
            max_depth,
            leaf_gap,
            size,
            min_radius: radius.0,
            next_leaf: &mut next_leaf,
            nodes: &mut nodes,
            links: &mut links,
        },
    );

    TreeGeometry {
        width,
        height,
        nodes,
        links,
    }
}

struct TreePlacement<'a> {
    width: f64,
    max_depth: f64,
    leaf_gap: f64,
    size: SqrtScale,
    min_radius: f64,
    next_leaf: &'a mut usize,
    nodes: &'a mut Vec<PositionedNode>,
    links: &'a mut Vec<TreeLink>,
}

fn place(node: &TreeNode, depth: usize, parent: Option<usize>, ctx: &mut TreePlacement<'_>) -> f64 {
    let index = ctx.nodes.len();
    ctx.nodes.push(PositionedNode {
        name: node.name.clone(),
        depth,
        x: depth as f64 / ctx.max_depth * ctx.width,
        y: 0.0,
        radius: ctx.min_radius,
        value: node.value,
        percentage: node.percentage,
        parent,
    });
    if let Some(parent) = parent {
        ctx.links.push(TreeLink {
            source: parent,
            target: index,
        });
    }

    let y = if node.is_leaf() {
        let slot = *ctx.next_leaf;
        *ctx.next_leaf += 1;
        ctx.nodes[index].radius = ctx.size.map(node.value.unwrap_or(0) as f64);
        (slot as f64 + 0.5) * ctx.leaf_gap
    } else {
        let children: Vec<f64> = node
            .children
            .iter()
            .map(|child| place(child, depth + 1, Some(index), ctx))
            .collect();
        children.iter().sum::<f64>() / children.len() as f64
    };
    ctx.nodes[index].y = y;
    y
}

fn collect_leaves<'a>(node: &'a TreeNode, out: &mut Vec<&'a TreeNode>) {
    if node.is_leaf() {
        out.push(node);
    } else {
        for child in &node.children {
            collect_leaves(child, out);
        }
    }
}

fn depth_of(node: &TreeNode) -> usize {
    node.children.iter().map(|c| depth_of(c) + 1).max().unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Zoom
// ---------------------------------------------------------------------------

/// Zoom factor applied by the tree and network views.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Zoom {
    pub level: f64,
    pub min: f64,
    pub max: f64,
}

impl Zoom {
    pub const STEP: f64 = 0.2;

    pub fn tree() -> Self {
        Zoom {
            level: 1.0,
            min: 0.5,
            max: 2.0,
        }
    }

    pub fn network() -> Self {
        Zoom {
            level: 1.0,
            min: 0.1,
            max: 2.0,
        }
    }

    pub fn with_level(self, level: f64) -> Self {
        let level = if level.is_finite() { level } else { 1.0 };
        Zoom {
            level: level.clamp(self.min, self.max),
            ..self
        }
    }

    pub fn zoom_in(self) -> Self {
        self.with_level(self.level + Self::STEP)
    }

    pub fn zoom_out(self) -> Self {
        self.with_level(self.level - Self::STEP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{CrossCell, Dimension};

    fn bucket(key: &str, count: usize, total: usize) -> Bucket {
        Bucket {
            key: key.to_string(),
            count,
            percentage: count as f64 / total as f64 * 100.0,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn band_scale_matches_uniform_padding() {
        // 3 bands over 300px with padding 0.2: step = 300 / 3.2
        let scale = BandScale::new(3, (0.0, 300.0), Padding::uniform(0.2));
        let step = 300.0 / 3.2;
        assert!(close(scale.step(), step));
        assert!(close(scale.bandwidth(), step * 0.8));
        assert!(close(scale.position(0), step * 0.2));
        assert!(close(scale.position(2) + scale.bandwidth(), 300.0 - step * 0.2));
    }

    #[test]
    fn band_scale_without_outer_padding_fills_range() {
        let scale = BandScale::new(3, (0.0, 420.0), Padding::inner_only(0.1));
        assert!(close(scale.position(0), 0.0));
        assert!(close(scale.position(2) + scale.bandwidth(), 420.0));
    }

    #[test]
    fn nice_max_rounds_up() {
        assert_eq!(nice_max(87.0, 10), 90.0);
        assert_eq!(nice_max(6.0, 10), 6.0);
        assert_eq!(nice_max(143.0, 10), 150.0);
        assert_eq!(nice_max(0.0, 10), 0.0);
    }

    #[test]
    fn sqrt_scale_is_area_proportional() {
        let scale = SqrtScale::new(100.0, (0.0, 10.0));
        assert!(close(scale.map(25.0), 5.0));
        assert!(close(scale.map(100.0), 10.0));
        assert_eq!(SqrtScale::new(0.0, (3.0, 15.0)).map(7.0), 3.0);
    }

    #[test]
    fn pie_spans_are_proportional_and_ordered() {
        let buckets = vec![bucket("0-20", 1, 4), bucket("21-30", 2, 4), bucket("31-40", 1, 4)];
        let options = DisplayOptions::default();
        let pie = pie_layout(&buckets, &options, false);
        let geometry = pie.geometry().unwrap();

        assert_eq!(geometry.outer_radius, 120.0);
        assert_eq!(geometry.inner_radius, 0.0);
        assert_eq!(geometry.total, 4);
        let keys: Vec<_> = geometry.slices.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["0-20", "21-30", "31-40"]);
        assert!(close(geometry.slices[0].start_angle, 0.0));
        assert!(close(geometry.slices[1].end_angle - geometry.slices[1].start_angle, TAU / 2.0));
        assert!(close(geometry.slices[2].end_angle, TAU));
        for pair in geometry.slices.windows(2) {
            assert_eq!(pair[0].end_angle, pair[1].start_angle);
        }
        // first quarter: label sits up and to the right
        assert!(geometry.slices[0].label_x > 0.0 && geometry.slices[0].label_y < 0.0);
    }

    #[test]
    fn donut_has_inner_radius() {
        let buckets = vec![bucket("Male", 3, 3)];
        let pie = pie_layout(&buckets, &DisplayOptions::default(), true);
        let geometry = pie.geometry().unwrap();
        assert_eq!(geometry.inner_radius, 60.0);
    }

    #[test]
    fn adapters_report_no_data() {
        let options = DisplayOptions::default();
        assert_eq!(pie_layout(&[], &options, false), Layout::no_data());
        assert!(!bar_layout(&[], Padding::uniform(0.3), AxisMax::Fixed(100.0), &options).is_ready());
        assert!(!horizontal_bar_layout(&[], &options).is_ready());
        assert!(!stacked_layout(&[], &["a".into()], Padding::uniform(0.2), AxisMax::Nice { at_least: 0.0 }, &options).is_ready());
        assert!(!bubble_map_layout(&[], &options).is_ready());
        let empty_tab = CrossTab {
            rows: Dimension::FamilyHistory,
            columns: Dimension::SoughtTreatment,
            row_keys: vec!["No".into(), "Yes".into()],
            column_keys: vec!["No".into(), "Yes".into()],
            cells: Vec::new(),
            total: 0,
        };
        assert!(!grid_layout(&empty_tab, &options).is_ready());
    }

    #[test]
    fn bars_grow_from_bottom() {
        let items = vec![("1-5".to_string(), 50.0), ("6-25".to_string(), 100.0)];
        let options = DisplayOptions::default();
        let layout = bar_layout(&items, Padding::uniform(0.3), AxisMax::Fixed(100.0), &options);
        let bars = &layout.geometry().unwrap().bars;
        let inner_height = options.inner_height();
        assert!(close(bars[0].height, inner_height / 2.0));
        assert!(close(bars[1].y, 0.0));
        assert!(close(bars[0].y + bars[0].height, inner_height));
        assert!(bars[0].x < bars[1].x);
        assert_eq!(bars[0].width, bars[1].width);
    }

    #[test]
    fn line_points_sit_on_band_centres() {
        let items = vec![("a".to_string(), 10.0), ("b".to_string(), 20.0)];
        let options = DisplayOptions::default();
        let bars = bar_layout(&items, Padding::uniform(0.3), AxisMax::Fixed(100.0), &options);
        let line = line_layout(&items, Padding::uniform(0.3), AxisMax::Fixed(100.0), &options);
        let bar = &bars.geometry().unwrap().bars[1];
        let point = &line.geometry().unwrap().points[1];
        assert!(close(point.x, bar.x + bar.width / 2.0));
        assert!(close(point.y, bar.y));
    }

    #[test]
    fn stacking_accumulates_in_series_order() {
        let rows = vec![SeriesRow {
            key: "21-30".into(),
            values: vec![4.0, 6.0],
        }];
        let series = vec!["notSought".to_string(), "sought".to_string()];
        let options = DisplayOptions::default();
        let layout = stacked_layout(&rows, &series, Padding::uniform(0.2), AxisMax::Nice { at_least: 0.0 }, &options);
        let geometry = layout.geometry().unwrap();
        let column = &geometry.columns[0];

        assert_eq!(geometry.axis_max, 10.0);
        assert_eq!(column.total, 10.0);
        assert_eq!(column.segments[0].series, "notSought");
        assert_eq!((column.segments[0].lower, column.segments[0].upper), (0.0, 4.0));
        assert_eq!((column.segments[1].lower, column.segments[1].upper), (4.0, 10.0));
        // second segment sits directly on top of the first
        assert!(close(column.segments[1].y + column.segments[1].height, column.segments[0].y));
        assert!(close(column.segments[1].y, 0.0));
    }

    #[test]
    fn grouped_bars_share_each_band_equally() {
        let rows = vec![
            SeriesRow {
                key: "Sought Treatment".into(),
                values: vec![50.0, 60.0, 10.0],
            },
            SeriesRow {
                key: "Family History".into(),
                values: vec![40.0, 45.0, 0.0],
            },
        ];
        let series = vec!["male".to_string(), "female".to_string(), "undecided".to_string()];
        let options = DisplayOptions::default();
        let layout = grouped_layout(&rows, &series, Padding::inner_only(0.1), 0.05, AxisMax::Fixed(100.0), &options);
        let geometry = layout.geometry().unwrap();
        let outer = BandScale::new(2, (0.0, options.inner_width()), Padding::inner_only(0.1));

        for (i, column) in geometry.columns.iter().enumerate() {
            assert_eq!(column.bars.len(), 3);
            let widths: Vec<f64> = column.bars.iter().map(|b| b.width).collect();
            assert!(widths.iter().all(|w| close(*w, widths[0])));
            assert!(column.bars[0].x >= outer.position(i));
            let last = &column.bars[2];
            assert!(last.x + last.width <= outer.position(i) + outer.bandwidth() + 1e-9);
        }
        assert_eq!(geometry.columns[1].bars[2].height, 0.0);
    }

    #[test]
    fn grid_places_first_column_key_at_bottom() {
        let cells = vec![
            ("No", "No", 4),
            ("No", "Yes", 1),
            ("Yes", "No", 0),
            ("Yes", "Yes", 9),
        ]
        .into_iter()
        .map(|(row, column, count)| CrossCell {
            row: row.into(),
            column: column.into(),
            count,
            percentage: count as f64 / 14.0 * 100.0,
        })
        .collect();
        let tab = CrossTab {
            rows: Dimension::FamilyHistory,
            columns: Dimension::SoughtTreatment,
            row_keys: vec!["No".into(), "Yes".into()],
            column_keys: vec!["No".into(), "Yes".into()],
            cells,
            total: 14,
        };
        let layout = grid_layout(&tab, &DisplayOptions::default());
        let geometry = layout.geometry().unwrap();
        let no_no = &geometry.cells[0];
        let no_yes = &geometry.cells[1];
        let yes_yes = &geometry.cells[3];

        assert!(no_no.center_y > no_yes.center_y);
        assert!(yes_yes.center_x > no_yes.center_x);
        assert_eq!(yes_yes.radius, 50.0);
        assert_eq!(geometry.cells[2].radius, 5.0);
        assert_eq!(yes_yes.intensity, 1.0);
    }

    #[test]
    fn bubble_map_is_repeatable() {
        let buckets = vec![
            bucket("USA", 40, 60),
            bucket("Narnia", 12, 60),
            bucket("Atlantis", 5, 60),
            bucket("Canada", 3, 60),
        ];
        let options = DisplayOptions::default().with_left_margin(80.0);
        let first = bubble_map_layout(&buckets, &options);
        let second = bubble_map_layout(&buckets, &options);
        assert_eq!(first, second);

        let geometry = first.geometry().unwrap();
        let usa = &geometry.bubbles[0];
        assert!(close(usa.x, options.inner_width() / 3.0));
        assert!(usa.labelled);
        assert!(!geometry.bubbles[3].labelled);
        for bubble in &geometry.bubbles {
            assert!(bubble.x >= 0.0 && bubble.x <= options.inner_width());
            assert!(bubble.y >= 0.0 && bubble.y <= options.inner_height());
        }
        assert_eq!(geometry.legend.len(), 3);
        assert_eq!(geometry.legend[0].radius, 30.0);
    }

    #[test]
    fn tree_spaces_leaves_and_centres_parents() {
        let leaf = |name: &str, value: usize| TreeNode {
            name: name.into(),
            value: Some(value),
            percentage: None,
            children: Vec::new(),
        };
        let root = TreeNode {
            name: "root".into(),
            value: None,
            percentage: None,
            children: vec![
                TreeNode {
                    name: "a".into(),
                    value: None,
                    percentage: None,
                    children: vec![leaf("a1", 16), leaf("a2", 4)],
                },
                TreeNode {
                    name: "b".into(),
                    value: None,
                    percentage: None,
                    children: vec![leaf("b1", 0)],
                },
            ],
        };
        let geometry = tree_layout(&root, 90.0, 60.0, (3.0, 7.0));
        let find = |name: &str| geometry.nodes.iter().find(|n| n.name == name).unwrap();

        assert_eq!(geometry.nodes.len(), 6);
        assert_eq!(geometry.links.len(), 5);
        assert_eq!(find("root").x, 0.0);
        assert_eq!(find("a").x, 45.0);
        assert_eq!(find("a1").x, 90.0);
        assert_eq!(find("a1").y, 10.0);
        assert_eq!(find("a2").y, 30.0);
        assert_eq!(find("b1").y, 50.0);
        assert_eq!(find("a").y, 20.0);
        assert_eq!(find("root").y, 35.0);
        assert_eq!(find("a1").radius, 7.0);
        assert_eq!(find("a2").radius, 5.0);
        assert_eq!(find("b1").radius, 3.0);
        assert_eq!(find("b").radius, 3.0);

        let branches: Vec<_> = geometry.branches().map(|n| n.name.as_str()).collect();
        assert_eq!(branches, vec!["a", "b"]);
        let branch = |name: &str| {
            let index = geometry.nodes.iter().position(|n| n.name == name).unwrap();
            geometry.branch_of(index)
        };
        assert_eq!(branch("root"), None);
        assert_eq!(branch("a"), Some(0));
        assert_eq!(branch("a2"), Some(0));
        assert_eq!(branch("b1"), Some(1));
    }

    #[test]
    fn zoom_is_clamped() {
        let zoom = Zoom::tree().zoom_out().zoom_out().zoom_out();
        assert_eq!(zoom.level, 0.5);
        let mut zoom = Zoom::network();
        for _ in 0..10 {
            zoom = zoom.zoom_in();
        }
        assert_eq!(zoom.level, 2.0);
        assert_eq!(Zoom::network().with_level(0.01).level, 0.1);
    }
}
