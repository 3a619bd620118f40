use crate::cli::ScoreArgs;
use drive_score::config::{AppConfig, ScoringConfig};
use drive_score::error::AppError;
use drive_score::export::{CsvSummaryWriter, ReportSink};
use drive_score::ingest::MovementReportImporter;
use drive_score::scoring::{ScoreOutcome, ScoringEngine, SuppressionMode};
use drive_score::speed_limits::SpeedLimitLookup;
use drive_score::telemetry;
use std::path::{Path, PathBuf};

const DEFAULT_REPORTS_DIR: &str = "reports";

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let scoring = apply_flags(config.scoring, &args);
    let ScoreArgs {
        report,
        reports_dir,
        confirm_lookups,
        target,
        summary_csv,
        reference_date,
        json,
        ..
    } = args;

    let engine = ScoringEngine::new(scoring.policy(confirm_lookups));

    let path = match report {
        Some(path) => path,
        None => MovementReportImporter::latest_in(
            reports_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_REPORTS_DIR)),
        )?,
    };
    let movement = MovementReportImporter::from_path(&path)?;

    let client = if scoring.use_speed_lookup {
        config.speed_limits.client()?
    } else {
        None
    };
    let lookup = client.as_ref().map(|client| client as &dyn SpeedLimitLookup);

    let outcome = engine.score_source(&movement, lookup)?;

    if json {
        let stdout = std::io::stdout();
        serde_json::to_writer_pretty(stdout.lock(), &outcome).map_err(std::io::Error::from)?;
        println!();
    } else {
        render_score_report(&path, movement.vehicle.as_deref(), &outcome);
    }

    if let Some(summary_path) = summary_csv {
        let target = target
            .or_else(|| movement.vehicle.clone())
            .or_else(|| file_stem(&path))
            .unwrap_or_default();
        let reference_date = reference_date.unwrap_or(outcome.window.last_date);
        let writer = CsvSummaryWriter::new(summary_path);
        writer.write(&target, reference_date, &outcome.report)?;
        if !json {
            println!("\nSummary row '{}' written to {}", target, writer.path().display());
        }
    }

    Ok(())
}

/// Command line flags win over the environment in both directions.
fn apply_flags(mut scoring: ScoringConfig, args: &ScoreArgs) -> ScoringConfig {
    if args.full_month || args.no_full_month {
        scoring.full_month = args.full_month;
    }
    if args.speed_lookup || args.no_speed_lookup {
        scoring.use_speed_lookup = args.speed_lookup;
    }
    if let Some(limit) = args.default_speed_limit {
        scoring.default_speed_limit = limit;
    }
    if args.min_gap {
        scoring.suppression = SuppressionMode::MinimumGap;
    } else if args.predecessor_gap {
        scoring.suppression = SuppressionMode::PredecessorDelta;
    }
    scoring
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}

pub(crate) fn render_score_report(path: &Path, vehicle: Option<&str>, outcome: &ScoreOutcome) {
    println!("Driving score for {}", vehicle.unwrap_or("unnamed vehicle"));
    println!("- Report: {}", path.display());
    println!(
        "- Window: {} to {} ({}, {} days)",
        outcome.window.first_date,
        outcome.window.last_date,
        outcome.window_mode.label(),
        outcome.window.day_count()
    );
    println!("- No-drive days: {}", outcome.report.no_drive_days);

    println!("\nHarsh maneuvers");
    for violation in &outcome.violations {
        println!(
            "  - {}: {} counted | {} points",
            violation.category, violation.occurrences, violation.points
        );
    }

    println!(
        "\nSpeed violations ({}) | {} points",
        outcome.speed_limit_source.label(),
        outcome.speed_penalty_total
    );
    if outcome.speed_lines.is_empty() {
        println!("  - none above the scoring floor");
    }
    for line in &outcome.speed_lines {
        println!(
            "  - {} | {:.1} km/h in a {} zone (+{:.1}) | {} points",
            line.timestamp.format("%Y-%m-%d %H:%M"),
            line.speed,
            line.speed_limit,
            line.delta,
            line.penalty_points
        );
    }

    println!("\nNight driving");
    if outcome.night_lines.is_empty() {
        println!("  - no trips between 23:00 and 05:00");
    }
    for line in &outcome.night_lines {
        println!(
            "  - Trip {}: {} to {} ({} min) | {} points",
            line.trip_id,
            line.start_time.format("%Y-%m-%d %H:%M"),
            line.end_time.format("%H:%M"),
            line.duration().num_minutes(),
            line.penalty_points
        );
    }

    println!("\nTotals");
    println!("- Driving penalty: {}", outcome.report.driving_penalty_total);
    println!("- Night penalty: {}", outcome.report.night_penalty_total);
    println!("- Distance: {:.0} km", outcome.report.distance_km);

    if !outcome.warnings.is_empty() {
        println!("\nWarnings ({})", outcome.warnings.len());
        for warning in &outcome.warnings {
            println!("  - {}", warning);
        }
    }
}
