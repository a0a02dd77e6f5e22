//! The eight dashboard charts.
//!
//! Each chart is one aggregation feeding one layout adapter. A chart offers a
//! small set of display modes (the first is the default); asking for any other
//! mode is an error rather than a silent fallback.

use crate::aggregate::{
    Dimension, Predicate, count_by, count_matching, cross_tab, format_percentage,
    outcome_hierarchy, rate_by_bucket, rate_by_group,
};
use crate::error::{DashboardError, Result};
use crate::force::{ForceSimulation, NodeSpec};
use crate::layout::{
    AxisMax, BarGeometry, BubbleMapGeometry, DisplayOptions, GridGeometry, GroupedGeometry,
    Layout, LineGeometry, Padding, PieGeometry, SeriesRow, StackedGeometry, TreeGeometry, Zoom,
    bar_layout, bubble_map_layout, grid_layout, grouped_layout, horizontal_bar_layout, line_layout,
    pie_layout, stacked_layout, tree_layout,
};
use crate::record::SurveyRecord;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

pub const PALETTE: [&str; 5] = ["#4F46E5", "#10B981", "#F59E0B", "#DC2626", "#8B5CF6"];

/// Square drawing area used by the tree and network views.
pub const COMPACT_WIDTH: f64 = 94.0;
pub const COMPACT_HEIGHT: f64 = 69.0;
const TREE_RADIUS: (f64, f64) = (3.0, 6.0);
const NETWORK_MAX_TICKS: usize = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartId {
    GenderFactors,
    CompanySize,
    Geography,
    FamilyHistoryTreatment,
    AgeGroups,
    TreatmentSeeking,
    OutcomeTree,
    Network,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartMode {
    Bar,
    Stacked,
    Grouped,
    Line,
    Scatter,
    Heatmap,
    Pie,
    Donut,
    Map,
    Tree,
    Network,
}

impl ChartMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartMode::Bar => "bar",
            ChartMode::Stacked => "stacked",
            ChartMode::Grouped => "grouped",
            ChartMode::Line => "line",
            ChartMode::Scatter => "scatter",
            ChartMode::Heatmap => "heatmap",
            ChartMode::Pie => "pie",
            ChartMode::Donut => "donut",
            ChartMode::Map => "map",
            ChartMode::Tree => "tree",
            ChartMode::Network => "network",
        }
    }
}

impl fmt::Display for ChartMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mode = match s {
            "bar" => ChartMode::Bar,
            "stacked" => ChartMode::Stacked,
            "grouped" => ChartMode::Grouped,
            "line" => ChartMode::Line,
            "scatter" => ChartMode::Scatter,
            "heatmap" => ChartMode::Heatmap,
            "pie" => ChartMode::Pie,
            "donut" => ChartMode::Donut,
            "map" => ChartMode::Map,
            "tree" => ChartMode::Tree,
            "network" => ChartMode::Network,
            other => return Err(other.to_string()),
        };
        Ok(mode)
    }
}

impl ChartId {
    pub const ALL: [ChartId; 8] = [
        ChartId::GenderFactors,
        ChartId::CompanySize,
        ChartId::Geography,
        ChartId::FamilyHistoryTreatment,
        ChartId::AgeGroups,
        ChartId::TreatmentSeeking,
        ChartId::OutcomeTree,
        ChartId::Network,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            ChartId::GenderFactors => "gender-factors",
            ChartId::CompanySize => "company-size",
            ChartId::Geography => "geography",
            ChartId::FamilyHistoryTreatment => "family-history-treatment",
            ChartId::AgeGroups => "age-groups",
            ChartId::TreatmentSeeking => "treatment-seeking",
            ChartId::OutcomeTree => "outcome-tree",
            ChartId::Network => "network",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ChartId::GenderFactors => "Mental Health Factors by Gender",
            ChartId::CompanySize => "Mental Health Issues by Company Size",
            ChartId::Geography => "Geographic Distribution",
            ChartId::FamilyHistoryTreatment => "Family History vs. Treatment",
            ChartId::AgeGroups => "Age Group Distribution",
            ChartId::TreatmentSeeking => "Treatment Seeking by Age Group",
            ChartId::OutcomeTree => "Mental Health Outcomes",
            ChartId::Network => "Mental Health Factor Network",
        }
    }

    /// Supported modes, default first.
    pub fn modes(&self) -> &'static [ChartMode] {
        match self {
            ChartId::GenderFactors => &[ChartMode::Bar, ChartMode::Stacked],
            ChartId::CompanySize => &[ChartMode::Bar, ChartMode::Line],
            ChartId::Geography => &[ChartMode::Map, ChartMode::Bar],
            ChartId::FamilyHistoryTreatment => &[ChartMode::Scatter, ChartMode::Heatmap],
            ChartId::AgeGroups => &[ChartMode::Pie, ChartMode::Donut],
            ChartId::TreatmentSeeking => &[ChartMode::Stacked, ChartMode::Grouped],
            ChartId::OutcomeTree => &[ChartMode::Tree],
            ChartId::Network => &[ChartMode::Network],
        }
    }

    pub fn default_mode(&self) -> ChartMode {
        self.modes()[0]
    }

    /// Resolve a requested mode, falling back to the default when none is given.
    pub fn resolve_mode(&self, requested: Option<ChartMode>) -> Result<ChartMode> {
        match requested {
            None => Ok(self.default_mode()),
            Some(mode) if self.modes().contains(&mode) => Ok(mode),
            Some(mode) => Err(DashboardError::UnsupportedMode {
                chart: self.slug().to_string(),
                mode: mode.to_string(),
            }),
        }
    }

    /// Per-chart adjustments of the shared canvas.
    pub fn display_options(&self, base: DisplayOptions) -> DisplayOptions {
        match self {
            ChartId::GenderFactors => {
                let mut options = base;
                options.margin.bottom = 60.0;
                options
            }
            ChartId::Geography => base.with_left_margin(80.0),
            _ => base,
        }
    }
}

impl fmt::Display for ChartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ChartId {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        ChartId::ALL
            .into_iter()
            .find(|id| id.slug() == s)
            .ok_or_else(|| DashboardError::UnknownChart(s.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartInfo {
    pub id: ChartId,
    pub title: &'static str,
    pub modes: &'static [ChartMode],
    pub default_mode: ChartMode,
}

pub fn catalogue() -> Vec<ChartInfo> {
    ChartId::ALL
        .iter()
        .map(|id| ChartInfo {
            id: *id,
            title: id.title(),
            modes: id.modes(),
            default_mode: id.default_mode(),
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LegendEntry {
    pub label: String,
    pub color: &'static str,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ChartGeometry {
    Pie(PieGeometry),
    Bars(BarGeometry),
    Line(LineGeometry),
    Stacked(StackedGeometry),
    Grouped(GroupedGeometry),
    Grid(GridGeometry),
    BubbleMap(BubbleMapGeometry),
    Tree { tree: TreeGeometry, zoom: Zoom },
    Network { network: ForceSimulation, zoom: Zoom },
}

/// Everything the client needs to paint one chart.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartView {
    pub chart: ChartId,
    pub title: &'static str,
    pub mode: ChartMode,
    pub modes: &'static [ChartMode],
    pub records: usize,
    pub display: DisplayOptions,
    pub legend: Vec<LegendEntry>,
    pub layout: Layout<ChartGeometry>,
}

/// Options a caller may set per request.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ChartRequest {
    pub mode: Option<ChartMode>,
    pub zoom: Option<f64>,
}

/// Aggregate `records` (already filtered) and lay them out for `chart`.
///
/// # Arguments
///
/// * `chart` - Which chart to build
/// * `records` - The filtered record set
/// * `request` - Requested mode and zoom level
/// * `base` - Canvas defaults; per-chart margin tweaks are applied on top
///
/// # Returns
///
/// The chart view, whose layout is `NoData` when `records` is empty, or an
/// `UnsupportedMode` error when the chart cannot be drawn in the requested mode
pub fn build_chart(
    chart: ChartId,
    records: &[SurveyRecord],
    request: &ChartRequest,
    base: &DisplayOptions,
) -> Result<ChartView> {
    let mode = chart.resolve_mode(request.mode)?;
    let display = chart.display_options(*base);

    let (legend, layout) = if records.is_empty() {
        (Vec::new(), Layout::no_data())
    } else {
        match chart {
            ChartId::GenderFactors => gender_factors(records, mode, &display),
            ChartId::CompanySize => company_size(records, mode, &display),
            ChartId::Geography => geography(records, mode, &display),
            ChartId::FamilyHistoryTreatment => family_history_treatment(records, &display),
            ChartId::AgeGroups => age_groups(records, mode, &display),
            ChartId::TreatmentSeeking => treatment_seeking(records, mode, &display),
            ChartId::OutcomeTree => outcome_tree(records, request.zoom),
            ChartId::Network => network(records, request.zoom),
        }
    };

    Ok(ChartView {
        chart,
        title: chart.title(),
        mode,
        modes: chart.modes(),
        records: records.len(),
        display,
        legend,
        layout,
    })
}

type Built = (Vec<LegendEntry>, Layout<ChartGeometry>);

fn legend(labels: &[&str]) -> Vec<LegendEntry> {
    labels
        .iter()
        .enumerate()
        .map(|(i, label)| LegendEntry {
            label: label.to_string(),
            color: PALETTE[i % PALETTE.len()],
        })
        .collect()
}

fn gender_factors(records: &[SurveyRecord], mode: ChartMode, display: &DisplayOptions) -> Built {
    let factors = [
        Predicate::SoughtTreatment,
        Predicate::FamilyHistory,
        Predicate::PreferAnonymity,
    ];
    let grouped = rate_by_group(records, &factors, Dimension::Gender);
    let series: Vec<String> = Dimension::Gender.domain(records);
    let rows: Vec<SeriesRow> = grouped
        .into_iter()
        .map(|g| SeriesRow {
            key: g.factor,
            values: g.slices.iter().map(|s| s.percentage).collect(),
        })
        .collect();

    let labels: Vec<&str> = series.iter().map(String::as_str).collect();
    let layout = if mode == ChartMode::Stacked {
        stacked_layout(&rows, &series, Padding::inner_only(0.1), AxisMax::Nice { at_least: 100.0 }, display)
            .map(ChartGeometry::Stacked)
    } else {
        grouped_layout(&rows, &series, Padding::inner_only(0.1), 0.05, AxisMax::Fixed(100.0), display)
            .map(ChartGeometry::Grouped)
    };
    (legend(&labels), layout)
}

fn company_size(records: &[SurveyRecord], mode: ChartMode, display: &DisplayOptions) -> Built {
    let items: Vec<(String, f64)> =
        rate_by_bucket(records, Dimension::CompanySize, &Predicate::mental_health_issue())
            .into_iter()
            .map(|b| (b.key, b.percentage))
            .collect();
    let padding = Padding::uniform(0.3);
    let axis = AxisMax::Fixed(100.0);
    let layout = if mode == ChartMode::Line {
        line_layout(&items, padding, axis, display).map(ChartGeometry::Line)
    } else {
        bar_layout(&items, padding, axis, display).map(ChartGeometry::Bars)
    };
    (legend(&["Mental Health Issues"]), layout)
}

fn geography(records: &[SurveyRecord], mode: ChartMode, display: &DisplayOptions) -> Built {
    let buckets = count_by(records, Dimension::Location);
    let layout = if mode == ChartMode::Bar {
        let top: Vec<(String, f64)> = buckets
            .iter()
            .take(10)
            .map(|b| (b.key.clone(), b.count as f64))
            .collect();
        horizontal_bar_layout(&top, display).map(ChartGeometry::Bars)
    } else {
        bubble_map_layout(&buckets, display).map(ChartGeometry::BubbleMap)
    };
    (legend(&["Respondents"]), layout)
}

fn family_history_treatment(records: &[SurveyRecord], display: &DisplayOptions) -> Built {
    let tab = cross_tab(records, Dimension::FamilyHistory, Dimension::SoughtTreatment);
    (
        legend(&["Did Not Seek Treatment", "Sought Treatment"]),
        grid_layout(&tab, display).map(ChartGeometry::Grid),
    )
}

fn age_groups(records: &[SurveyRecord], mode: ChartMode, display: &DisplayOptions) -> Built {
    let buckets = count_by(records, Dimension::AgeGroup);
    let labels: Vec<String> = buckets
        .iter()
        .map(|b| format!("{} ({})", b.key, format_percentage(b.percentage)))
        .collect();
    let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
    let layout = pie_layout(&buckets, display, mode == ChartMode::Donut).map(ChartGeometry::Pie);
    (legend(&labels), layout)
}

fn treatment_seeking(records: &[SurveyRecord], mode: ChartMode, display: &DisplayOptions) -> Built {
    let tab = cross_tab(records, Dimension::AgeGroup, Dimension::SoughtTreatment);
    // column keys are ["No", "Yes"]
    let rows = tab.rows_with_data();
    let padding = Padding::uniform(0.2);
    let axis = AxisMax::Nice { at_least: 0.0 };

    let series: Vec<String> = if mode == ChartMode::Grouped {
        vec!["sought".to_string(), "notSought".to_string()]
    } else {
        vec!["notSought".to_string(), "sought".to_string()]
    };
    let rows: Vec<SeriesRow> = rows
        .into_iter()
        .map(|(key, counts)| SeriesRow {
            key,
            values: series
                .iter()
                .map(|s| (if s == "sought" { counts[1] } else { counts[0] }) as f64)
                .collect(),
        })
        .collect();
    let labels: Vec<&str> = series.iter().map(|s| treatment_label(s)).collect();

    let layout = if mode == ChartMode::Grouped {
        grouped_layout(&rows, &series, padding, 0.05, axis, display).map(ChartGeometry::Grouped)
    } else {
        stacked_layout(&rows, &series, padding, axis, display).map(ChartGeometry::Stacked)
    };
    (legend(&labels), layout)
}

fn treatment_label(series: &str) -> &'static str {
    if series == "sought" {
        "Sought Treatment"
    } else {
        "Did Not Seek Treatment"
    }
}

fn outcome_tree(records: &[SurveyRecord], zoom: Option<f64>) -> Built {
    let root = outcome_hierarchy(records);
    let tree = tree_layout(&root, COMPACT_WIDTH, COMPACT_HEIGHT, TREE_RADIUS);
    let zoom = Zoom::tree().with_level(zoom.unwrap_or(1.0));
    // one colour per top-level category, in layout order
    let categories: Vec<&str> = tree.branches().map(|n| n.name.as_str()).collect();
    let entries = legend(&categories);
    (entries, Layout::ready(ChartGeometry::Tree { tree, zoom }))
}

/// The five factors shown as network nodes, with their group numbers.
fn network_nodes() -> [(&'static str, u32, Predicate); 5] {
    [
        ("FamilyHistory", 1, Predicate::FamilyHistory),
        ("SoughtTreatment", 2, Predicate::SoughtTreatment),
        ("Diagnosis", 3, Predicate::Diagnosed),
        ("DiscussMHProblems", 4, Predicate::DiscussesProblems),
        ("ResponsibleEmployer", 5, Predicate::ResponsibleEmployer),
    ]
}

// ResponsibleEmployer → SoughtTreatment → FamilyHistory → Diagnosis →
// DiscussMHProblems → ResponsibleEmployer
const NETWORK_LINKS: [(usize, usize, f64, f64); 5] = [
    (4, 1, 1.0, 0.8),
    (1, 0, 1.0, 0.8),
    (0, 2, 1.0, 0.8),
    (2, 3, 1.0, 0.8),
    (3, 4, 1.0, 0.8),
];

fn network(records: &[SurveyRecord], zoom: Option<f64>) -> Built {
    let nodes: Vec<NodeSpec> = network_nodes()
        .into_iter()
        .map(|(id, group, predicate)| NodeSpec {
            id: id.to_string(),
            group,
            count: count_matching(records, &predicate),
        })
        .collect();
    let labels: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect::<Vec<_>>();
    let entries = legend(&labels);
    let network = ForceSimulation::new(nodes, &NETWORK_LINKS, COMPACT_WIDTH, COMPACT_HEIGHT)
        .run_until_settled(NETWORK_MAX_TICKS);
    let zoom = Zoom::network().with_level(zoom.unwrap_or(1.0));
    (entries, Layout::ready(ChartGeometry::Network { network, zoom }))
}
