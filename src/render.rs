#![cfg(not(tarpaulin_include))]
#![cfg(feature = "web")]
//! Static SVG previews of chart views, drawn with plotters.
//!
//! Only shapes are drawn (bars, arcs, bubbles, links) so no font backend is
//! needed; the interactive client adds axes and labels itself.

use crate::charts::{
    COMPACT_HEIGHT, COMPACT_WIDTH, ChartGeometry, ChartId, ChartMode, ChartView, PALETTE,
};
use crate::error::{DashboardError, Result};
use crate::layout::{Layout, Margin, PieGeometry};
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;

type Area<'a> = DrawingArea<SVGBackend<'a>, Shift>;
type DrawResult = std::result::Result<(), DrawingAreaErrorKind<std::io::Error>>;

/// Compact views (tree, network) are laid out in a 100×75 box with this inset.
const COMPACT_INSET: f64 = 3.0;
const ARC_STEP: f64 = 0.05;
const ROOT_NODE: RGBColor = RGBColor(107, 114, 128);

/// Render a chart view as a standalone SVG document
///
/// # Arguments
/// * `view` - The chart to draw, as produced by `charts::build_chart`
///
/// # Returns
/// * `Result<String>` - SVG markup sized to the view's display options
///
/// # Examples
/// ```no_run
/// use survey_dashboard::charts::{ChartId, ChartRequest, build_chart};
/// use survey_dashboard::layout::DisplayOptions;
/// use survey_dashboard::render::render_svg;
///
/// let view = build_chart(ChartId::AgeGroups, &[], &ChartRequest::default(), &DisplayOptions::default()).unwrap();
/// let svg = render_svg(&view).unwrap();
/// assert!(svg.contains("No data available"));
/// ```
pub fn render_svg(view: &ChartView) -> Result<String> {
    let width = view.display.width.max(1.0).round() as u32;
    let height = view.display.height.max(1.0).round() as u32;
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;
        match &view.layout {
            Layout::Ready { geometry } => draw(&root, view, geometry).map_err(render_error)?,
            Layout::NoData { .. } => root
                .draw(&Rectangle::new(
                    [(1, 1), (width as i32 - 1, height as i32 - 1)],
                    ShapeStyle::from(&RGBColor(209, 213, 219)).stroke_width(1),
                ))
                .map_err(render_error)?,
        }
        root.present().map_err(render_error)?;
    }

    if let Layout::NoData { message } = &view.layout {
        svg = with_caption(svg, message, width, height);
    }
    Ok(svg)
}

fn render_error<E: std::fmt::Display>(e: E) -> DashboardError {
    DashboardError::Render(e.to_string())
}

fn draw(root: &Area<'_>, view: &ChartView, geometry: &ChartGeometry) -> DrawResult {
    let margin = view.display.margin;
    match geometry {
        ChartGeometry::Pie(pie) => draw_pie(root, pie),
        ChartGeometry::Bars(bars) => {
            // ranked locations get one colour per bar
            let horizontal = view.chart == ChartId::Geography;
            for (i, bar) in bars.bars.iter().enumerate() {
                let color = if horizontal { palette(i) } else { palette(0) };
                draw_rect(root, &margin, bar.x, bar.y, bar.width, bar.height, color.filled())?;
            }
            Ok(())
        }
        ChartGeometry::Line(line) => {
            let points: Vec<(i32, i32)> = line
                .points
                .iter()
                .map(|p| shift(&margin, p.x, p.y))
                .collect();
            root.draw(&PathElement::new(
                points.clone(),
                ShapeStyle::from(&palette(0)).stroke_width(3),
            ))?;
            for point in points {
                root.draw(&Circle::new(point, 5, palette(0).filled()))?;
            }
            Ok(())
        }
        ChartGeometry::Stacked(stack) => {
            for column in &stack.columns {
                for (s, segment) in column.segments.iter().enumerate() {
                    let style = palette(s).filled();
                    draw_rect(root, &margin, segment.x, segment.y, segment.width, segment.height, style)?;
                }
            }
            Ok(())
        }
        ChartGeometry::Grouped(grouped) => {
            for column in &grouped.columns {
                for (s, bar) in column.bars.iter().enumerate() {
                    draw_rect(root, &margin, bar.x, bar.y, bar.width, bar.height, palette(s).filled())?;
                }
            }
            Ok(())
        }
        ChartGeometry::Grid(grid) => {
            let heatmap = view.mode == ChartMode::Heatmap;
            for cell in &grid.cells {
                // one legend colour per column key
                let column = grid.y_keys.iter().position(|k| *k == cell.column).unwrap_or(0);
                if heatmap {
                    let color = blend(palette(column), cell.intensity);
                    draw_rect(root, &margin, cell.x, cell.y, cell.width, cell.height, color.filled())?;
                } else {
                    let center = shift(&margin, cell.center_x, cell.center_y);
                    root.draw(&Circle::new(center, px(cell.radius), palette(column).mix(0.7).filled()))?;
                }
            }
            Ok(())
        }
        ChartGeometry::BubbleMap(map) => {
            for bubble in &map.bubbles {
                let center = shift(&margin, bubble.x, bubble.y);
                root.draw(&Circle::new(center, px(bubble.radius), palette(0).mix(0.6).filled()))?;
                root.draw(&Circle::new(
                    center,
                    px(bubble.radius),
                    ShapeStyle::from(&palette(0)).stroke_width(1),
                ))?;
            }
            Ok(())
        }
        ChartGeometry::Tree { tree, zoom } => {
            let frame = CompactFrame::new(view, zoom.level);
            for link in &tree.links {
                let (a, b) = (&tree.nodes[link.source], &tree.nodes[link.target]);
                root.draw(&PathElement::new(
                    vec![frame.point(a.x, a.y), frame.point(b.x, b.y)],
                    ShapeStyle::from(&RGBColor(156, 163, 175)).stroke_width(1),
                ))?;
            }
            for (i, node) in tree.nodes.iter().enumerate() {
                let style = match tree.branch_of(i) {
                    Some(branch) => palette(branch).filled(),
                    None => ROOT_NODE.filled(),
                };
                root.draw(&Circle::new(frame.point(node.x, node.y), frame.length(node.radius), style))?;
            }
            Ok(())
        }
        ChartGeometry::Network { network, zoom } => {
            let frame = CompactFrame::new(view, zoom.level);
            for link in &network.links {
                let (a, b) = (&network.nodes[link.source], &network.nodes[link.target]);
                let width = (link.value.sqrt() * 2.0 * frame.scale).round().max(1.0) as u32;
                root.draw(&PathElement::new(
                    vec![frame.point(a.x, a.y), frame.point(b.x, b.y)],
                    ShapeStyle::from(&blend(palette(1), link.correlation)).stroke_width(width),
                ))?;
            }
            for node in &network.nodes {
                let color = palette(node.group.saturating_sub(1) as usize);
                root.draw(&Circle::new(frame.point(node.x, node.y), frame.length(node.radius), color.filled()))?;
                root.draw(&Circle::new(
                    frame.point(node.x, node.y),
                    frame.length(node.radius),
                    WHITE.stroke_width(1),
                ))?;
            }
            Ok(())
        }
    }
}

fn draw_pie(root: &Area<'_>, pie: &PieGeometry) -> DrawResult {
    let center = (pie.center_x, pie.center_y);
    for (i, slice) in pie.slices.iter().enumerate() {
        let mut outline = arc(center, pie.outer_radius, slice.start_angle, slice.end_angle);
        if pie.inner_radius > 0.0 {
            let mut inner = arc(center, pie.inner_radius, slice.start_angle, slice.end_angle);
            inner.reverse();
            outline.extend(inner);
        } else {
            outline.push((px(center.0), px(center.1)));
        }
        root.draw(&Polygon::new(outline.clone(), palette(i).filled()))?;
        outline.push(outline[0]);
        root.draw(&PathElement::new(outline, WHITE.stroke_width(1)))?;
    }
    Ok(())
}

/// Points along an arc, angles clockwise from twelve o'clock.
fn arc(center: (f64, f64), radius: f64, start: f64, end: f64) -> Vec<(i32, i32)> {
    let steps = ((end - start).abs() / ARC_STEP).ceil().max(1.0) as usize;
    (0..=steps)
        .map(|i| {
            let angle = start + (end - start) * i as f64 / steps as f64;
            (
                px(center.0 + radius * angle.sin()),
                px(center.1 - radius * angle.cos()),
            )
        })
        .collect()
}

fn draw_rect(
    root: &Area<'_>,
    margin: &Margin,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    style: ShapeStyle,
) -> DrawResult {
    if width <= 0.0 || height <= 0.0 {
        return Ok(());
    }
    root.draw(&Rectangle::new(
        [shift(margin, x, y), shift(margin, x + width, y + height)],
        style,
    ))
}

/// Maps the compact tree/network coordinate space onto the canvas.
struct CompactFrame {
    scale: f64,
    offset: (f64, f64),
}

impl CompactFrame {
    fn new(view: &ChartView, zoom: f64) -> Self {
        let box_width = COMPACT_WIDTH + 2.0 * COMPACT_INSET;
        let box_height = COMPACT_HEIGHT + 2.0 * COMPACT_INSET;
        let scale = (view.display.width / box_width).min(view.display.height / box_height) * zoom;
        CompactFrame {
            scale,
            offset: (COMPACT_INSET * scale, COMPACT_INSET * scale),
        }
    }

    fn point(&self, x: f64, y: f64) -> (i32, i32) {
        (px(self.offset.0 + x * self.scale), px(self.offset.1 + y * self.scale))
    }

    fn length(&self, value: f64) -> i32 {
        px(value * self.scale).max(1)
    }
}

fn shift(margin: &Margin, x: f64, y: f64) -> (i32, i32) {
    (px(margin.left + x), px(margin.top + y))
}

fn px(value: f64) -> i32 {
    value.round() as i32
}

fn palette(index: usize) -> RGBColor {
    let hex = PALETTE[index % PALETTE.len()];
    let channel = |range: std::ops::Range<usize>| {
        hex.get(range)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .unwrap_or(0)
    };
    RGBColor(channel(1..3), channel(3..5), channel(5..7))
}

/// Blend from white towards `color` by `amount` in [0, 1].
fn blend(color: RGBColor, amount: f64) -> RGBColor {
    let t = amount.clamp(0.0, 1.0);
    let mix = |c: u8| (255.0 + (c as f64 - 255.0) * t).round() as u8;
    RGBColor(mix(color.0), mix(color.1), mix(color.2))
}

fn with_caption(mut svg: String, message: &str, width: u32, height: u32) -> String {
    let escaped = message
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    let caption = format!(
        "<text x=\"{}\" y=\"{}\" text-anchor=\"middle\" dominant-baseline=\"middle\" font-family=\"sans-serif\" font-size=\"14\" fill=\"#6B7280\">{}</text>\n",
        width / 2,
        height / 2,
        escaped
    );
    match svg.rfind("</svg>") {
        Some(end) => svg.insert_str(end, &caption),
        None => svg.push_str(&caption),
    }
    svg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::{ChartRequest, build_chart};
    use crate::layout::DisplayOptions;
    use crate::record::{AgeGroup, FamilyHistory, Gender, NewSurveyRecord};
    use crate::store::SurveyStore;

    fn store() -> SurveyStore {
        SurveyStore::with_records(
            (0..8)
                .map(|i| NewSurveyRecord {
                    age_group: Some(if i < 5 { AgeGroup::Twenties } else { AgeGroup::Thirties }),
                    gender: Some(if i % 2 == 0 { Gender::Male } else { Gender::Female }),
                    family_history: Some(if i % 2 == 0 { FamilyHistory::Yes } else { FamilyHistory::No }),
                    sought_treatment: i % 3 == 0,
                    location: Some("USA".into()),
                    ..Default::default()
                })
                .collect(),
        )
    }

    fn svg_for(chart: ChartId, mode: ChartMode) -> String {
        let store = store();
        let request = ChartRequest {
            mode: Some(mode),
            zoom: None,
        };
        let view = build_chart(chart, store.all(), &request, &DisplayOptions::default()).unwrap();
        render_svg(&view).unwrap()
    }

    #[test]
    fn empty_view_shows_placeholder() {
        let view = build_chart(ChartId::CompanySize, &[], &ChartRequest::default(), &DisplayOptions::default()).unwrap();
        let svg = render_svg(&view).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("No data available"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn pie_draws_one_polygon_per_slice() {
        let svg = svg_for(ChartId::AgeGroups, ChartMode::Pie);
        assert_eq!(svg.matches("<polygon").count(), 2);
    }

    #[test]
    fn bubble_views_draw_circles() {
        assert!(svg_for(ChartId::Geography, ChartMode::Map).contains("<circle"));
        assert!(svg_for(ChartId::Network, ChartMode::Network).contains("<circle"));
    }

    #[test]
    fn bar_views_draw_rectangles() {
        assert!(svg_for(ChartId::TreatmentSeeking, ChartMode::Stacked).contains("<rect"));
        assert!(svg_for(ChartId::GenderFactors, ChartMode::Bar).contains("<rect"));
    }

    #[test]
    fn legend_colours_appear_in_the_drawing() {
        let cases = [
            (ChartId::OutcomeTree, ChartMode::Tree),
            (ChartId::FamilyHistoryTreatment, ChartMode::Scatter),
            (ChartId::TreatmentSeeking, ChartMode::Stacked),
            (ChartId::TreatmentSeeking, ChartMode::Grouped),
        ];
        let store = store();
        for (chart, mode) in cases {
            let request = ChartRequest {
                mode: Some(mode),
                zoom: None,
            };
            let view = build_chart(chart, store.all(), &request, &DisplayOptions::default()).unwrap();
            let svg = render_svg(&view).unwrap();
            assert!(!view.legend.is_empty());
            for entry in &view.legend {
                assert!(svg.contains(entry.color), "{} / {}: {} missing", chart, mode, entry.label);
            }
        }
    }

    #[test]
    fn tree_nodes_take_their_category_colour() {
        let store = store();
        let view = build_chart(ChartId::OutcomeTree, store.all(), &ChartRequest::default(), &DisplayOptions::default()).unwrap();
        let Some(ChartGeometry::Tree { tree, .. }) = view.layout.geometry() else {
            panic!("expected a tree");
        };
        for (i, node) in tree.nodes.iter().enumerate().skip(1) {
            let branch = tree.branch_of(i).unwrap();
            let category = tree.branches().nth(branch).unwrap();
            assert_eq!(view.legend[branch].label, category.name, "{}", node.name);
        }
    }

    #[test]
    fn blend_runs_from_white() {
        let base = RGBColor(79, 70, 229);
        assert_eq!(blend(base, 0.0), RGBColor(255, 255, 255));
        assert_eq!(blend(base, 1.0), base);
        assert_eq!(palette(0), base);
    }
}
