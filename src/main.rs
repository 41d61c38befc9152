use clap::Parser;
use serde::Serialize;
use std::process::ExitCode;
use vigie_immo::analysis::Analyzer;
use vigie_immo::config::AppConfig;
use vigie_immo::error::ResolutionFailure;
use vigie_immo::geo::GeoPoint;
use vigie_immo::location::{AddressResolution, ResolvedAddress};

/// Vigie Immo: property risk analysis for Québec addresses
///
/// Geocodes the address, queries flood, contamination, emergency services,
/// hydrants, seismic, air quality, disaster history, property assessment and
/// crime sources, then prints a JSON report with a 0-100 risk score.
///
/// Examples:
///   vigie "1000 rue Sherbrooke Ouest, Montréal"
///   vigie --pretty "2500 boulevard Laurier, Québec"
///   vigie --lat 45.4042 --lon -71.8929 --municipality Sherbrooke
#[derive(Parser)]
#[command(name = "vigie", version, about, long_about = None)]
struct Cli {
    /// Free-text civic address.
    #[arg(index = 1, conflicts_with_all = ["lat", "lon"])]
    address: Option<String>,

    /// Latitude (-90 to 90); skips geocoding.
    #[arg(long, allow_hyphen_values = true, requires = "lon")]
    lat: Option<f64>,

    /// Longitude (-180 to 180); skips geocoding.
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    lon: Option<f64>,

    /// Municipality attached to a --lat/--lon analysis.
    #[arg(long)]
    municipality: Option<String>,

    /// Pretty-print the JSON report.
    #[arg(long)]
    pretty: bool,

    /// Tracing filter, overrides VIGIE_LOG_LEVEL (e.g. debug, vigie_immo=trace).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match AppConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(level) = &cli.log_level {
        config.telemetry.log_level = level.clone();
    }
    if let Err(err) = vigie_immo::telemetry::init(&config.telemetry) {
        eprintln!("Error: {err}");
        return ExitCode::FAILURE;
    }

    let analyzer = Analyzer::from_config(&config);
    let result = match (&cli.address, cli.lat, cli.lon) {
        (_, Some(lat), Some(lon)) => {
            analyzer
                .analyze_point(GeoPoint::new(lat, lon), cli.municipality.as_deref())
                .await
        }
        (Some(address), _, _) => analyzer.analyze(address).await,
        _ => Err(ResolutionFailure::NoInput),
    };

    match result {
        Ok(report) => {
            if let Err(err) = print_json(&report, cli.pretty) {
                eprintln!("Error: {err}");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(failure) => {
            tracing::error!(error = %failure, "analysis aborted");
            let envelope = AddressResolution::from(&Err::<ResolvedAddress, _>(failure));
            if let Err(err) = print_json(&envelope, cli.pretty) {
                eprintln!("Error: {err}");
            }
            ExitCode::FAILURE
        }
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> serde_json::Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{json}");
    Ok(())
}
