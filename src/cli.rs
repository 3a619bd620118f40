use crate::render::run_score;
use crate::server;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use drive_score::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "drive-score",
    about = "Score driving behaviour from vehicle movement reports",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Score a movement report and print the breakdown
    Score(ScoreArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ScoreArgs {
    /// Movement report CSV to score
    #[arg(long, conflicts_with = "reports_dir")]
    pub(crate) report: Option<PathBuf>,
    /// Score the newest CSV in this directory (defaults to ./reports)
    #[arg(long)]
    pub(crate) reports_dir: Option<PathBuf>,
    /// Count no-drive days through the end of the month
    #[arg(long, conflicts_with = "no_full_month")]
    pub(crate) full_month: bool,
    /// Stop the window at the last report date even if SCORE_FULL_MONTH is set
    #[arg(long)]
    pub(crate) no_full_month: bool,
    /// Look up posted speed limits instead of using the default limit
    #[arg(long, conflicts_with = "no_speed_lookup")]
    pub(crate) speed_lookup: bool,
    /// Use the default limit even if SCORE_USE_SPEED_LOOKUP is set
    #[arg(long)]
    pub(crate) no_speed_lookup: bool,
    /// Allow lookups even when the batch exceeds the confirmation threshold
    #[arg(long)]
    pub(crate) confirm_lookups: bool,
    /// Default speed limit in km/h
    #[arg(long)]
    pub(crate) default_speed_limit: Option<u32>,
    /// Measure the false-alarm window from the last counted alert
    #[arg(long, conflicts_with = "predecessor_gap")]
    pub(crate) min_gap: bool,
    /// Measure the false-alarm window from the preceding alert even if
    /// SCORE_SUPPRESSION=min-gap
    #[arg(long)]
    pub(crate) predecessor_gap: bool,
    /// Summary row name (defaults to the report's vehicle or file name)
    #[arg(long)]
    pub(crate) target: Option<String>,
    /// Write the score into this summary CSV
    #[arg(long)]
    pub(crate) summary_csv: Option<PathBuf>,
    /// Date stored with the summary row (YYYY-MM-DD, defaults to the window end)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) reference_date: Option<NaiveDate>,
    /// Print the full outcome as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        // Posted-limit lookups use a blocking HTTP client.
        Command::Score(args) => tokio::task::block_in_place(|| run_score(args)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_flags_parse() {
        let cli = Cli::try_parse_from([
            "drive-score",
            "score",
            "--report",
            "may.csv",
            "--full-month",
            "--default-speed-limit",
            "80",
            "--reference-date",
            "2025-05-31",
        ])
        .expect("arguments parse");

        let Some(Command::Score(args)) = cli.command else {
            panic!("expected score command");
        };
        assert_eq!(args.report, Some(PathBuf::from("may.csv")));
        assert!(args.full_month);
        assert!(!args.speed_lookup);
        assert_eq!(args.default_speed_limit, Some(80));
        assert_eq!(args.reference_date, NaiveDate::from_ymd_opt(2025, 5, 31));
    }

    #[test]
    fn opposing_flags_conflict() {
        let result = Cli::try_parse_from([
            "drive-score",
            "score",
            "--full-month",
            "--no-full-month",
        ]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from(["drive-score", "score", "--no-speed-lookup"])
            .expect("arguments parse");
        let Some(Command::Score(args)) = cli.command else {
            panic!("expected score command");
        };
        assert!(args.no_speed_lookup);
        assert!(!args.speed_lookup);
    }

    #[test]
    fn report_and_reports_dir_conflict() {
        let result = Cli::try_parse_from([
            "drive-score",
            "score",
            "--report",
            "may.csv",
            "--reports-dir",
            "reports",
        ]);
        assert!(result.is_err());
    }
}
