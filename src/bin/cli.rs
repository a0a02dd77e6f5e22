#![cfg(not(tarpaulin_include))]

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::info;
use survey_dashboard::aggregate::{format_percentage, summarize};
use survey_dashboard::charts::{ChartId, ChartMode, ChartRequest, build_chart, catalogue};
use survey_dashboard::config::{LogArgs, init_logging};
use survey_dashboard::export;
use survey_dashboard::filter::{self, FilterState};
use survey_dashboard::ingest;
use survey_dashboard::layout::DisplayOptions;
use survey_dashboard::render::render_svg;
use survey_dashboard::store::SurveyStore;

#[derive(Parser)]
#[command(name = "survey-cli")]
#[command(about = "Offline reports over a mental health in tech survey export", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    log: LogArgs,
}

#[derive(Args)]
struct FilterArgs {
    #[arg(long)]
    year: Option<String>,
    #[arg(long)]
    gender: Option<String>,
    #[arg(long)]
    company_size: Option<String>,
    #[arg(long)]
    age_group: Option<String>,
}

impl From<FilterArgs> for FilterState {
    fn from(args: FilterArgs) -> Self {
        FilterState {
            year: args.year,
            gender: args.gender,
            company_size: args.company_size,
            age_group: args.age_group,
        }
        .normalized()
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the available charts and their modes
    Charts,
    /// Print the summary cards
    Summary {
        #[arg(long)]
        csv: PathBuf,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Build one chart as JSON, or as SVG with --svg
    Chart {
        /// Chart id, e.g. age-groups
        chart: String,
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        mode: Option<String>,
        #[arg(long)]
        zoom: Option<f64>,
        /// Write an SVG preview here instead of printing JSON
        #[arg(long)]
        svg: Option<PathBuf>,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Convert a survey CSV to the dashboard's CSV or XLSX export
    Export {
        #[arg(long)]
        csv: PathBuf,
        /// Output file; .xlsx writes a workbook, anything else CSV
        #[arg(long)]
        out: PathBuf,
    },
}

fn load(path: &PathBuf) -> anyhow::Result<SurveyStore> {
    let records = ingest::from_path(path)
        .with_context(|| format!("failed to load survey data from {}", path.display()))?;
    info!("loaded {} records from {}", records.len(), path.display());
    Ok(SurveyStore::with_records(records))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log);

    match cli.command {
        Commands::Charts => {
            for chart in catalogue() {
                let modes: Vec<&str> = chart.modes.iter().map(|m| m.as_str()).collect();
                println!("{:<26} {:<40} {}", chart.id.slug(), chart.title, modes.join(", "));
            }
        }
        Commands::Summary { csv, filters } => {
            let store = load(&csv)?;
            let records = filter::apply(store.all(), &filters.into());
            let summary = summarize(&records);
            println!("Total respondents:  {}", summary.total_respondents);
            println!(
                "Sought treatment:   {}",
                format_percentage(summary.sought_treatment_percentage)
            );
            println!(
                "Family history:     {}",
                format_percentage(summary.family_history_percentage)
            );
            println!("Countries:          {}", summary.countries);
        }
        Commands::Chart {
            chart,
            csv,
            mode,
            zoom,
            svg,
            filters,
        } => {
            let chart: ChartId = chart.parse()?;
            let mode = match mode {
                Some(raw) => Some(
                    raw.parse::<ChartMode>()
                        .map_err(|m| anyhow::anyhow!("unknown chart mode: {}", m))?,
                ),
                None => None,
            };
            let store = load(&csv)?;
            let records = filter::apply(store.all(), &filters.into());
            let view = build_chart(
                chart,
                &records,
                &ChartRequest { mode, zoom },
                &DisplayOptions::default(),
            )?;

            match svg {
                Some(path) => {
                    fs::write(&path, render_svg(&view)?)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Wrote {}", path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&view)?),
            }
        }
        Commands::Export { csv, out } => {
            let store = load(&csv)?;
            let is_xlsx = out
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));
            if is_xlsx {
                fs::write(&out, export::to_xlsx(store.all())?)?;
            } else {
                fs::write(&out, export::to_csv(store.all())?)?;
            }
            println!("Exported {} records to {}", store.len(), out.display());
        }
    }

    Ok(())
}
