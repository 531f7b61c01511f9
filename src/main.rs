use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::debug;

use lapfix::aggregate::format_duration;
use lapfix::export::tcx::TcxExporter;
use lapfix::export::{self, LapReport};
use lapfix::import::{ImportManager, ImportedFile};
use lapfix::logging::init_logging;
use lapfix::{synthesize, AppConfig, BulkEdit, EditPlan, EditSession, LapSelection, LapSummary};

/// lapfix - treadmill lap correction CLI
///
/// Rewrites the distance, speed and altitude of recorded TCX laps so they
/// match what was actually run, and collapses long pauses in the timeline.
#[derive(Parser)]
#[command(name = "lapfix")]
#[command(version)]
#[command(about = "Treadmill lap correction for TCX files", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the laps and totals of a TCX file
    Show {
        /// Input TCX file
        file: PathBuf,

        /// Print the lap report as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Normalise a lap selection expression such as "1-3, 5"
    Select {
        /// Selection expression
        expr: String,

        /// Number of laps in the activity; out of range entries are reported
        #[arg(short, long)]
        laps: Option<u32>,
    },

    /// Apply lap edits and write a corrected TCX file
    Correct {
        /// Input TCX file
        file: PathBuf,

        /// Output file (default: <input>_corrected.tcx)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Edit plan (TOML) applied before command line edits
        #[arg(long, value_name = "FILE")]
        plan: Option<PathBuf>,

        #[command(flatten)]
        edit: EditArgs,

        /// Also write the corrected distance/altitude profile as CSV
        #[arg(long, value_name = "FILE")]
        profile: Option<PathBuf>,

        /// Also write the lap report as JSON
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },

    /// Show or create the configuration file
    Config {
        /// Print the effective configuration
        #[arg(long)]
        show: bool,

        /// Write the default configuration to the config path
        #[arg(long)]
        init: bool,
    },
}

/// Bulk edit given on the command line
#[derive(Args)]
struct EditArgs {
    /// Laps to edit (default: all laps)
    #[arg(long, value_name = "EXPR")]
    laps: Option<String>,

    /// Speed in km/h
    #[arg(long, conflicts_with = "distance", allow_negative_numbers = true)]
    speed: Option<f64>,

    /// Lap distance in km
    #[arg(long, allow_negative_numbers = true)]
    distance: Option<f64>,

    /// Incline in percent
    #[arg(long, conflicts_with = "elevation", allow_negative_numbers = true)]
    incline: Option<f64>,

    /// Elevation gain in meters
    #[arg(long, allow_negative_numbers = true)]
    elevation: Option<f64>,
}

#[derive(Tabled)]
struct LapRow {
    #[tabled(rename = "Lap")]
    lap: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Speed (km/h)")]
    speed: String,
    #[tabled(rename = "Distance (m)")]
    distance: String,
    #[tabled(rename = "Incline (%)")]
    incline: String,
    #[tabled(rename = "Elevation (m)")]
    elevation: String,
}

impl From<&LapSummary> for LapRow {
    fn from(lap: &LapSummary) -> Self {
        let lap_label = if lap.is_modified() {
            format!("{}*", lap.lap_number)
        } else {
            lap.lap_number.to_string()
        };
        Self {
            lap: lap_label,
            time: format_duration(lap.total_time_seconds),
            speed: format!("{:.1}", lap.edited_speed_kmh),
            distance: format!("{:.0}", lap.edited_distance_meters()),
            incline: format!("{:.1}", lap.edited_incline_percent),
            elevation: format!("{:.1}", lap.edited_elevation_gain_meters()),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match (&cli.command, cli.config.as_deref()) {
        (Commands::Config { init: true, .. }, Some(path)) if !path.exists() => AppConfig::default(),
        (_, path) => AppConfig::load(path)?,
    };
    config.logging.level = config.logging.level.raised_by(cli.verbose);
    init_logging(&config.logging)?;

    if cli.verbose > 0 {
        eprintln!("{}", format!("Log level: {}", config.logging.level.to_filter()).dimmed());
    }

    match cli.command {
        Commands::Show { file, json } => show(&file, json),
        Commands::Select { expr, laps } => select(&expr, laps),
        Commands::Correct {
            file,
            output,
            plan,
            edit,
            profile,
            report,
        } => correct(
            &config,
            &file,
            output,
            plan.as_deref(),
            &edit,
            profile.as_deref(),
            report.as_deref(),
        ),
        Commands::Config { show, init } => manage_config(&config, cli.config.as_deref(), show, init),
    }
}

fn show(file: &Path, json: bool) -> Result<()> {
    let document = ImportManager::new()
        .import_file(file)
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    let session = EditSession::from_document(&document)
        .with_context(|| format!("Failed to read laps from {}", file.display()))?;

    if json {
        let report = LapReport::from_session(&session, Some(file.display().to_string()));
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", format!("{}", file.display()).bold());
    print_session(&session);
    Ok(())
}

fn select(expr: &str, lap_count: Option<u32>) -> Result<()> {
    let selection = LapSelection::parse(expr);
    if selection.is_empty() {
        bail!("No laps selected by \"{}\"", expr);
    }

    println!("{}", selection.to_string().green().bold());
    if let Some(count) = lap_count {
        let outside = selection.above(count);
        if !outside.is_empty() {
            println!(
                "{}",
                format!("Not in a {}-lap activity: {}", count, outside).yellow()
            );
        }
    }
    Ok(())
}

fn correct(
    config: &AppConfig,
    file: &Path,
    output: Option<PathBuf>,
    plan: Option<&Path>,
    edit: &EditArgs,
    profile: Option<&Path>,
    report: Option<&Path>,
) -> Result<()> {
    let ImportedFile { source, document } = ImportManager::new()
        .import_with_source(file)
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    let mut session = EditSession::from_document(&document)
        .with_context(|| format!("Failed to read laps from {}", file.display()))?;

    if let Some(plan_path) = plan {
        let plan = EditPlan::load_from_file(plan_path)
            .with_context(|| format!("Failed to load edit plan {}", plan_path.display()))?;
        plan.apply(&mut session)?;
    }

    let bulk = BulkEdit::from_fields(edit.speed, edit.distance, edit.incline, edit.elevation)?;
    if !bulk.is_empty() {
        let selection = match &edit.laps {
            Some(expr) => LapSelection::parse(expr),
            None => LapSelection::all(session.lap_count() as u32),
        };
        let updated = session.apply_bulk(&selection, &bulk)?;
        debug!(updated, "Applied command line edit");
    } else if edit.laps.is_some() {
        bail!("--laps needs at least one of --speed, --distance, --incline or --elevation");
    }

    print_session(&session);

    let corrected = synthesize(session.laps(), &document.timeline(), &config.synthesis.options())?;
    let output = output.unwrap_or_else(|| config.output.corrected_path(file));
    TcxExporter::new(config.output.decimals)
        .export_corrected(&source, &corrected, &output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if let Some(path) = profile {
        export::csv::export_profile(&corrected, path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("  Profile: {}", path.display());
    }
    if let Some(path) = report {
        let lap_report = LapReport::from_session(&session, Some(file.display().to_string()));
        export::json::export_lap_report(&lap_report, path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("  Report: {}", path.display());
    }

    println!(
        "{}",
        format!(
            "✓ Wrote {} ({} laps edited, {} trackpoints)",
            output.display(),
            session.modified_count(),
            corrected.sample_count()
        )
        .green()
    );
    Ok(())
}

fn manage_config(config: &AppConfig, path: Option<&Path>, show: bool, init: bool) -> Result<()> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::default_config_path);

    if init {
        if path.exists() {
            bail!("Configuration already exists at {}", path.display());
        }
        AppConfig::default().save_to_file(&path)?;
        println!("{}", format!("✓ Wrote default configuration to {}", path.display()).green());
    }

    if show || !init {
        println!("{}", format!("# {}", path.display()).dimmed());
        print!("{}", toml::to_string_pretty(config).context("Failed to serialize configuration")?);
    }
    Ok(())
}

fn print_session(session: &EditSession) {
    let rows: Vec<LapRow> = session.laps().iter().map(LapRow::from).collect();
    println!("{}", Table::new(rows).with(Style::rounded()));

    let totals = session.totals();
    println!(
        "{} {}   {} {:.2} km   {} {:.1} km/h   {} {:.0} m",
        "Time".bold(),
        format_duration(totals.total_time_seconds),
        "Distance".bold(),
        totals.total_distance_km(),
        "Avg speed".bold(),
        totals.avg_speed_kmh,
        "Climb".bold(),
        totals.total_climb_meters,
    );
    if session.modified_count() > 0 {
        println!("{}", format!("{} laps edited (*)", session.modified_count()).yellow());
    }
}
