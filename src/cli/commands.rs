use crate::api::{StationFeedClient, SyntheticFeed, MAX_SYNTHETIC_HOURS};
use crate::cli::render;
use crate::config::{
    default_stations, load_stations, select_stations, validate_stations, PipelineConfig,
    SunshineMode,
};
use crate::error::{AppError, Result};
use crate::models::{RunReport, Station, StationFailure, StationReport};
use crate::pipeline::{process_table, table_from_json};
use crate::projection::project;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// CLI tool for ACINN weather-station telemetry
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Command to run; omit for the interactive menu
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct GlobalArgs {
    /// Feed root URL (env: ACINN_BASE_URL)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Lookback window appended to the feed URL (env: ACINN_LOOKBACK_HOURS)
    #[arg(long, global = true)]
    pub lookback_hours: Option<u32>,

    /// Periodic rain-sum bucket width in minutes, 10 to 10080 (env: ACINN_RAIN_BUCKET_MINUTES)
    #[arg(long, global = true)]
    pub rain_bucket_minutes: Option<i64>,

    /// Sunshine shown as current value (env: ACINN_SUNSHINE_MODE)
    #[arg(long, value_enum, global = true)]
    pub sunshine_mode: Option<SunshineMode>,

    /// HTTP request timeout in seconds (env: ACINN_TIMEOUT_SECS)
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// JSON file replacing the built-in station registry
    #[arg(long = "stations", id = "stations_file", global = true)]
    pub stations: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Fetch stations and print daily statistics and current values
    Report(ReportArgs),

    /// List the station registry with map coordinates
    Stations,

    /// Project latitude/longitude onto web-map coordinates
    Project(ProjectArgs),

    /// Run the pipeline on a synthetic feed (no network)
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default, Clone)]
pub struct ReportArgs {
    /// Station id to include (repeatable; default: all stations)
    #[arg(short, long = "station")]
    pub stations: Vec<String>,

    /// Print the full run as JSON instead of tables
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Latitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,
}

#[derive(Args, Debug, Clone)]
pub struct DemoArgs {
    /// Seed for the synthetic feed
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Hours of synthetic data to generate (at most one month)
    #[arg(
        long,
        default_value = "48",
        value_parser = clap::value_parser!(u32).range(0..=MAX_SYNTHETIC_HOURS as i64)
    )]
    pub hours: u32,

    /// Print the run as JSON instead of tables
    #[arg(long)]
    pub json: bool,
}

/// CLI application
pub struct App {
    config: PipelineConfig,
    stations: Vec<Station>,
    client: StationFeedClient,
}

impl App {
    /// Create the application from CLI flags, environment and defaults.
    pub fn new(args: &GlobalArgs) -> Result<Self> {
        let mut builder = PipelineConfig::builder();
        if let Some(url) = &args.base_url {
            builder = builder.base_url(url.clone());
        }
        if let Some(hours) = args.lookback_hours {
            builder = builder.lookback_hours(hours);
        }
        if let Some(minutes) = args.rain_bucket_minutes {
            builder = builder.rain_bucket_minutes(minutes);
        }
        if let Some(mode) = args.sunshine_mode {
            builder = builder.sunshine_mode(mode);
        }
        if let Some(secs) = args.timeout_secs {
            builder = builder.timeout_secs(secs);
        }
        let config = builder.with_env_defaults()?.build()?;

        let stations = match &args.stations {
            Some(path) => load_stations(path)?,
            None => default_stations(),
        };

        Self::with_parts(config, stations)
    }

    /// Create the application from an explicit configuration and registry.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the registry fails [`validate_stations`].
    pub fn with_parts(config: PipelineConfig, stations: Vec<Station>) -> Result<Self> {
        validate_stations(&stations)?;
        let client = StationFeedClient::new(&config)?;
        info!(
            "Application configured for {} station(s) at {}",
            stations.len(),
            config.base_url
        );
        Ok(Self {
            config,
            stations,
            client,
        })
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    /// Run one command
    pub async fn run_command(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Report(args) => self.report(&args).await,
            Commands::Stations => self.list_stations(),
            Commands::Project(args) => self.project(args.lat, args.lon),
            Commands::Demo(args) => self.demo(&args),
        }
    }

    async fn report(&self, args: &ReportArgs) -> Result<()> {
        let selected = select_stations(&self.stations, &args.stations)?;
        let run = self.collect(&selected).await?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&run)?);
        } else {
            print_run(&run);
        }
        Ok(())
    }

    /// Fetches and processes every station concurrently. Ingestion failures are
    /// recorded per station; any other error aborts the run.
    pub async fn collect(&self, stations: &[Station]) -> Result<RunReport> {
        info!("Processing {} station(s)", stations.len());

        let pb = ProgressBar::new(stations.len() as u64);
        pb.set_style(
            ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")?
                .progress_chars("=> "),
        );

        let mut set = JoinSet::new();
        for (index, station) in stations.iter().cloned().enumerate() {
            let client = self.client.clone();
            let config = self.config.clone();
            let pb = pb.clone();
            set.spawn(async move {
                let result = match client.fetch_table(&station.id).await {
                    Ok(table) => process_table(&station, &table, &config),
                    Err(e) => Err(e),
                };
                pb.set_message(station.id.clone());
                pb.inc(1);
                (index, station, result)
            });
        }

        let mut slots: Vec<Option<(Station, Result<StationReport>)>> =
            (0..stations.len()).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            let (index, station, result) = joined
                .map_err(|e| AppError::Logic(format!("station task did not complete: {}", e)))?;
            slots[index] = Some((station, result));
        }
        pb.finish_and_clear();

        let mut run = RunReport::default();
        for (station, result) in slots.into_iter().flatten() {
            match result {
                Ok(report) => run.reports.push(report),
                Err(e) if e.is_station_failure() => {
                    warn!("Skipping station {}: {}", station.id, e);
                    run.failures.push(StationFailure {
                        station: station.id,
                        error: e.to_string(),
                    });
                },
                Err(e) => {
                    error!("Aborting run at station {}: {:?}", station.id, e);
                    return Err(e);
                },
            }
        }

        info!(
            "Run finished: {} station(s) processed, {} failed",
            run.reports.len(),
            run.failures.len()
        );
        Ok(run)
    }

    fn list_stations(&self) -> Result<()> {
        let mut points = Vec::with_capacity(self.stations.len());
        for station in &self.stations {
            points.push((station, station.map_point()?));
        }
        println!("{}", render::stations_table(&points));
        Ok(())
    }

    fn project(&self, lat: f64, lon: f64) -> Result<()> {
        let point = project(lat, lon)?;
        println!("x = {:.3} m", point.x);
        println!("y = {:.3} m", point.y);
        Ok(())
    }

    fn demo(&self, args: &DemoArgs) -> Result<()> {
        let station = self
            .stations
            .first()
            .ok_or_else(|| AppError::Config("station registry is empty".to_string()))?;
        info!(
            "Running demo for {} with seed {} over {} h",
            station.id, args.seed, args.hours
        );

        let body = SyntheticFeed::new(args.seed).records(Utc::now(), args.hours);
        let table = table_from_json(&station.id, &body)?;
        let report = process_table(station, &table, &self.config)?;
        let run = RunReport {
            reports: vec![report],
            failures: Vec::new(),
        };

        if args.json {
            println!("{}", serde_json::to_string_pretty(&run)?);
        } else {
            print_run(&run);
        }
        Ok(())
    }
}

fn print_run(run: &RunReport) {
    for report in &run.reports {
        println!(
            "\n{} ({} records)",
            report.station.display_name().cyan().bold(),
            report.table.len()
        );
        if report.table.is_empty() {
            println!("{}", "No observations in the lookback window.".yellow());
            continue;
        }
        if let Some(ts) = report.summary.current.timestamp {
            println!("Current values at {}", ts.format("%Y-%m-%d %H:%M UTC"));
        }
        if !report.summary.current.is_empty() {
            println!("{}", render::snapshot_table(&report.summary.current));
        }
        if !report.summary.daily.is_empty() {
            println!("{}", "Daily statistics".bold());
            println!("{}", render::daily_table(&report.summary.daily));
        }
        if !report.table.rain_buckets().is_empty() {
            println!("{}", "Periodic rain sums".bold());
            println!("{}", render::rain_buckets_table(report.table.rain_buckets()));
        }
        for warning in report.table.warnings() {
            println!(
                "{} {} value(s) in '{}' treated as missing (e.g. {})",
                "Note:".yellow(),
                warning.count,
                warning.column,
                warning.example
            );
        }
    }

    for failure in &run.failures {
        println!(
            "{} {}: {}",
            "Failed:".red(),
            failure.station,
            failure.error.red()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Column, Field};
    use chrono::{Duration, TimeZone};

    fn app_for(server: &mockito::ServerGuard, ids: &[&str]) -> App {
        let config = PipelineConfig::builder()
            .base_url(server.url())
            .lookback_hours(7)
            .rain_bucket_minutes(60)
            .timeout_secs(5)
            .build()
            .unwrap();
        let stations = ids
            .iter()
            .map(|id| Station::new(id, 47.0, 11.4, None))
            .collect();
        App::with_parts(config, stations).unwrap()
    }

    fn feed_body() -> String {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 23, 50, 0).unwrap();
        serde_json::json!([
            {"datumsec": t0.timestamp_millis(), "tl": 9.0, "rr": 12.0},
            {"datumsec": (t0 + Duration::minutes(10)).timestamp_millis(), "tl": 8.5, "rr": 18.0},
        ])
        .to_string()
    }

    #[tokio::test]
    async fn test_failing_station_does_not_abort_others() {
        let mut server = mockito::Server::new_async().await;
        let _ok = server
            .mock("GET", "/innsbruck/7")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(feed_body())
            .create_async()
            .await;
        let _down = server
            .mock("GET", "/sattelberg/7")
            .with_status(500)
            .create_async()
            .await;
        let _bad = server
            .mock("GET", "/obergurgl/7")
            .with_status(200)
            .with_body(r#"{"error": "no data"}"#)
            .create_async()
            .await;

        let app = app_for(&server, &["innsbruck", "sattelberg", "obergurgl"]);
        let run = app.collect(app.stations()).await.unwrap();

        assert_eq!(run.reports.len(), 1);
        assert_eq!(run.reports[0].station.id, "innsbruck");
        let failed: Vec<&str> = run.failures.iter().map(|f| f.station.as_str()).collect();
        assert_eq!(failed, vec!["sattelberg", "obergurgl"]);
    }

    #[tokio::test]
    async fn test_report_contains_derived_outputs() {
        let mut server = mockito::Server::new_async().await;
        let _ok = server
            .mock("GET", "/innsbruck/7")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(feed_body())
            .create_async()
            .await;

        let app = app_for(&server, &["innsbruck"]);
        let run = app.collect(app.stations()).await.unwrap();
        let report = &run.reports[0];

        assert_eq!(
            report.table.column(Column::RainCum).unwrap(),
            &[Some(2.0), Some(3.0)]
        );
        assert_eq!(report.summary.daily.days.len(), 2);
        assert_eq!(
            report.summary.current.columns(),
            vec![
                Column::Raw(Field::Temperature),
                Column::Raw(Field::RainRate),
                Column::RainCum
            ]
        );
        assert!(serde_json::to_string(&run).unwrap().contains("rr_periodic_sum"));
    }

    #[tokio::test]
    async fn test_report_rejects_unknown_station() {
        let server = mockito::Server::new_async().await;
        let app = app_for(&server, &["innsbruck"]);
        let args = ReportArgs {
            stations: vec!["zugspitze".to_string()],
            json: false,
        };
        let result = app.report(&args).await;
        match result {
            Err(AppError::Cli(msg)) => assert!(msg.contains("Unknown station")),
            other => panic!("Expected CliError, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_demo_runs_offline() {
        let app = App::with_parts(PipelineConfig::default(), default_stations()).unwrap();
        let args = DemoArgs {
            seed: 5,
            hours: 12,
            json: true,
        };
        assert!(app.demo(&args).is_ok());
    }

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "acinn-weather",
            "report",
            "--station",
            "innsbruck",
            "--rain-bucket-minutes",
            "60",
            "--sunshine-mode",
            "per-interval",
        ])
        .unwrap();
        assert_eq!(cli.global.rain_bucket_minutes, Some(60));
        assert_eq!(cli.global.sunshine_mode, Some(SunshineMode::PerInterval));
        match cli.command {
            Some(Commands::Report(args)) => assert_eq!(args.stations, vec!["innsbruck"]),
            other => panic!("Expected report command, got {:?}", other),
        }
    }

    #[test]
    fn test_project_accepts_negative_coordinates() {
        let cli = Cli::try_parse_from([
            "acinn-weather",
            "project",
            "--lat",
            "-33.9",
            "--lon",
            "-70.6",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Project(args)) => {
                assert_eq!(args.lat, -33.9);
                assert_eq!(args.lon, -70.6);
            },
            other => panic!("Expected project command, got {:?}", other),
        }
    }

    #[test]
    fn test_demo_hours_are_bounded() {
        let max = MAX_SYNTHETIC_HOURS.to_string();
        let cli = Cli::try_parse_from(["acinn-weather", "demo", "--hours", max.as_str()]).unwrap();
        match cli.command {
            Some(Commands::Demo(args)) => assert_eq!(args.hours, MAX_SYNTHETIC_HOURS),
            other => panic!("Expected demo command, got {:?}", other),
        }

        let result = Cli::try_parse_from(["acinn-weather", "demo", "--hours", "4294967295"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unprojectable_station_is_rejected_before_fetching() {
        let stations = vec![
            Station::new("innsbruck", 47.263631, 11.385571, Some(578.0)),
            Station::new("polar", 95.0, 11.0, None),
        ];
        let result = App::with_parts(PipelineConfig::default(), stations);
        match result {
            Err(AppError::Config(msg)) => assert!(msg.contains("polar")),
            Err(other) => panic!("Expected ConfigError, got {:?}", other),
            Ok(_) => panic!("Expected ConfigError, got an application"),
        }
    }
}
