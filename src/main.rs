mod api;
mod cli;
mod config;
mod error;
mod models;
mod pipeline;
mod projection;

use clap::Parser;
use cli::{App, Cli, Commands, DemoArgs, ProjectArgs, ReportArgs};
use colored::*;
use config::ENV_LOG_DIR;
use dialoguer::{theme::ColorfulTheme, Select};
use error::Result;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Logs to stderr, plus a daily-rolling JSON file when `ACINN_LOG_DIR` is set.
/// The returned guard must be held until exit so the file writer flushes.
fn init_logging() -> Option<WorkerGuard> {
    let (file_layer, guard) = match std::env::var(ENV_LOG_DIR) {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir.trim(), "acinn-weather.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().json().with_writer(writer)), Some(guard))
        },
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let _guard = init_logging();

    let cli = Cli::parse();
    info!("Initializing ACINN weather app...");

    let app = match App::new(&cli.global) {
        Ok(app) => {
            info!("Application initialized successfully.");
            app
        },
        Err(e) => {
            error!("Failed to initialize application: {:?}", e);
            println!("{} {}", "Error:".red(), e.to_string().red());
            return Err(e);
        },
    };

    if let Some(command) = cli.command {
        return app.run_command(command).await;
    }

    println!("{}", "Welcome to the ACINN Weather CLI!".cyan().bold());

    loop {
        let options = &[
            "Station report",
            "List stations",
            "Project coordinates",
            "Run synthetic demo",
            "Exit",
        ];

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("What would you like to do?")
            .items(options)
            .default(0)
            .interact_opt()?
            .unwrap_or(options.len() - 1);

        println!("\n---\n");

        let command_result = match selection {
            0 => match cli::prompt_stations(app.stations()) {
                Ok(stations) => {
                    app.run_command(Commands::Report(ReportArgs {
                        stations,
                        json: false,
                    }))
                    .await
                },
                Err(e) => {
                    println!("{} {}", "Failed to get station:".red(), e);
                    continue;
                },
            },
            1 => app.run_command(Commands::Stations).await,
            2 => {
                let lat = match cli::prompt_coordinate("latitude") {
                    Ok(v) => v,
                    Err(e) => {
                        println!("{} {}", "Failed to get latitude:".red(), e);
                        continue;
                    },
                };
                let lon = match cli::prompt_coordinate("longitude") {
                    Ok(v) => v,
                    Err(e) => {
                        println!("{} {}", "Failed to get longitude:".red(), e);
                        continue;
                    },
                };
                app.run_command(Commands::Project(ProjectArgs { lat, lon }))
                    .await
            },
            3 => match cli::prompt_seed() {
                Ok(seed) => {
                    app.run_command(Commands::Demo(DemoArgs {
                        seed,
                        hours: 48,
                        json: false,
                    }))
                    .await
                },
                Err(e) => {
                    println!("{} {}", "Failed to get seed:".red(), e);
                    continue;
                },
            },
            4 => {
                println!("{}", "Exiting application. Goodbye!".green());
                break;
            },
            _ => unreachable!(),
        };

        if let Err(e) = command_result {
            error!("Command execution failed: {:?}", e);
            println!(
                "{} {}",
                "Error executing command:".red(),
                e.to_string().red()
            );
            if e.is_fatal() {
                return Err(e);
            }
        }

        println!("\n---\n");
    }

    Ok(())
}
