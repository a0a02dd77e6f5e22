/*!
# Survey Dashboard

Backend for an interactive dashboard over the "Mental Health in Tech" survey,
built in Rust.

## Overview

Survey responses are uploaded as CSV files or JSON batches and kept in an
in-memory store. Every chart on the dashboard is computed on demand from the
currently filtered slice of that store: the records are grouped and counted,
the counts are turned into percentages and the result is laid out as chart
geometry the browser only has to paint.

## Architecture

### Data Layer
- **record**: the `SurveyRecord` model and its closed answer domains
  (family history, company size, age group, gender)
- **store**: the owned record collection with sequential ids
- **ingest**: CSV import keyed by the survey's column headers
- **export**: CSV and XLSX export of the whole collection

### Analysis Layer
- **filter**: the year / gender / company size / age group filter
- **aggregate**: single-dimension counts, cross-tabulations, conditional
  rates, per-group rates, the outcome hierarchy and the summary cards

### Presentation Layer
- **layout**: band, linear and square-root scales plus the pie, bar,
  stacked, grouped, grid, bubble map and tree adapters
- **force**: the force-directed network layout, as a pure step function
- **charts**: the eight dashboard charts and their display modes
- **render**: SVG previews of chart views (plotters)

### Web Layer (feature `web`)
- **app**: axum routes, application state and JSON errors
- **config**: command-line configuration and logging setup

## Design Highlights

- Pure aggregation functions over borrowed slices; the store is injected,
  never global
- Percentages stay unrounded until they are formatted for display
- Records missing a value are left out of that grouping's denominator
- Every layout is deterministic; empty input yields a "No data available"
  placeholder instead of an error

## REST API Endpoints

- `GET/POST/DELETE /api/survey-data` - List, insert one, clear
- `POST /api/survey-data/bulk` - Insert a JSON batch (`?clear=true` replaces)
- `POST /api/survey-data/upload` - Insert a CSV upload (multipart `file`)
- `GET /api/survey-data/export.csv`, `/export.xlsx` - Download everything
- `GET /api/filters` - Dropdown options
- `GET /api/summary` - Summary cards for the filtered records
- `GET /api/charts` - Chart catalogue
- `GET /api/charts/{chart}` - Chart view JSON (`mode`, `zoom`, filters)
- `GET /api/charts/{chart}/svg` - Chart preview
*/

pub mod aggregate;
pub mod app;
pub mod charts;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod force;
pub mod ingest;
pub mod layout;
pub mod record;
pub mod render;
pub mod store;

pub use aggregate::{
    Bucket, CrossTab, Dimension, GroupedRate, Predicate, RateBucket, Summary, TreeNode, count_by,
    cross_tab, outcome_hierarchy, rate_by_bucket, rate_by_group, summarize,
};
pub use charts::{ChartId, ChartMode, ChartRequest, ChartView, build_chart};
pub use error::{DashboardError, Result};
pub use filter::{FilterOptions, FilterState};
pub use layout::{DisplayOptions, Layout};
pub use record::{AgeGroup, CompanySize, FamilyHistory, Gender, NewSurveyRecord, SurveyRecord};
pub use store::SurveyStore;
