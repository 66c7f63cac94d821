use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;

use crate::api::run_http_server;
use crate::config::{AppConfig, DEFAULT_PORT, MAX_HORIZON_YEARS};
use crate::core::{
    Allocation, AssetClass, DEFAULT_PATH_COUNT, RiskProfile, SimulationParams, SimulationResult,
    normalize_allocation, run_projection, run_projection_seeded,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliRiskProfile {
    Conservative,
    Moderate,
    Aggressive,
    VeryAggressive,
}

impl From<CliRiskProfile> for RiskProfile {
    fn from(value: CliRiskProfile) -> Self {
        match value {
            CliRiskProfile::Conservative => RiskProfile::Conservative,
            CliRiskProfile::Moderate => RiskProfile::Moderate,
            CliRiskProfile::Aggressive => RiskProfile::Aggressive,
            CliRiskProfile::VeryAggressive => RiskProfile::VeryAggressive,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "fundcast",
    about = "Monte Carlo projection of monthly investing across an asset mix"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        help = "JSON file mapping asset class to {meanReturn, volatility}; replaces the built-in table"
    )]
    assumptions: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Normalize the asset mix and project it forward
    Project(ProjectArgs),
    /// Print the normalized allocation
    Normalize(MixArgs),
    /// Serve the HTTP API
    Serve {
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
}

#[derive(Args, Debug)]
struct MixArgs {
    #[arg(
        long = "weight",
        value_name = "CLASS=PCT",
        value_parser = parse_weight,
        help = "Raw weight for one asset class; repeat per class. Defaults to the profile mix"
    )]
    weights: Vec<(AssetClass, f64)>,
    #[arg(long = "exclude", value_name = "CLASS", help = "Asset class to leave out")]
    exclude: Vec<String>,
    #[arg(
        long,
        value_enum,
        default_value_t = CliRiskProfile::Moderate,
        help = "Profile used as the starting mix and as the fallback when nothing is left"
    )]
    profile: CliRiskProfile,
}

#[derive(Args, Debug)]
struct ProjectArgs {
    #[command(flatten)]
    mix: MixArgs,
    #[arg(long, default_value_t = 0.0)]
    starting_balance: f64,
    #[arg(long)]
    monthly_contribution: f64,
    #[arg(long, help = "Projection horizon in whole years")]
    years: u32,
    #[arg(long, default_value_t = 0.0, help = "Annual fee in percent, e.g. 0.25")]
    annual_fee: f64,
    #[arg(long, default_value_t = DEFAULT_PATH_COUNT)]
    paths: usize,
    #[arg(long, help = "Seed for a reproducible run")]
    seed: Option<u64>,
    #[arg(
        long,
        default_value_t = false,
        help = "Step the profile down for short horizons (and up for very long ones)"
    )]
    adjust_for_horizon: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MonthlyAmount {
    asset_class: AssetClass,
    amount: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectionReport {
    profile: RiskProfile,
    allocation: Allocation,
    monthly_amounts: Vec<MonthlyAmount>,
    result: SimulationResult,
}

fn parse_weight(raw: &str) -> Result<(AssetClass, f64), String> {
    let (class, pct) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected CLASS=PCT, got '{raw}'"))?;
    let class = class.trim();
    if class.is_empty() {
        return Err(format!("missing asset class in '{raw}'"));
    }
    let pct = pct
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid weight in '{raw}': {e}"))?;
    if !pct.is_finite() || pct < 0.0 {
        return Err(format!("weight in '{raw}' must be >= 0"));
    }
    Ok((AssetClass::from(class), pct))
}

fn resolve_allocation(mix: &MixArgs, profile: RiskProfile) -> Allocation {
    let fallback = profile.allocation();
    let raw = if mix.weights.is_empty() {
        fallback.clone()
    } else {
        Allocation::from_pairs(mix.weights.iter().cloned())
    };
    let excluded: Vec<AssetClass> = mix
        .exclude
        .iter()
        .map(|c| AssetClass::from(c.as_str()))
        .collect();
    normalize_allocation(&raw, &excluded, &fallback)
}

fn build_params(
    args: &ProjectArgs,
    config: &AppConfig,
) -> Result<(RiskProfile, SimulationParams), String> {
    if args.years == 0 || args.years > MAX_HORIZON_YEARS {
        return Err(format!("--years must be between 1 and {MAX_HORIZON_YEARS}"));
    }
    if !(0.0..=100.0).contains(&args.annual_fee) {
        return Err("--annual-fee must be between 0 and 100 percent".to_string());
    }
    if args.paths == 0 {
        return Err("--paths must be at least 1".to_string());
    }

    let selected: RiskProfile = args.mix.profile.into();
    let profile = if args.adjust_for_horizon {
        selected.adjusted_for_horizon(args.years)
    } else {
        selected
    };
    if profile != selected {
        info!(?selected, ?profile, years = args.years, "adjusted profile for horizon");
    }

    Ok((
        profile,
        SimulationParams {
            starting_balance: args.starting_balance,
            monthly_contribution: args.monthly_contribution,
            horizon_years: args.years,
            allocation: resolve_allocation(&args.mix, profile),
            annual_fee: args.annual_fee / 100.0,
            assumptions: config.assumptions.clone(),
        },
    ))
}

fn project(args: &ProjectArgs, config: &AppConfig) -> Result<ProjectionReport, String> {
    let (profile, params) = build_params(args, config)?;
    let result = match args.seed {
        Some(seed) => run_projection_seeded(&params, Some(args.paths), seed),
        None => run_projection(&params, Some(args.paths)),
    }
    .map_err(|e| e.to_string())?;

    let monthly_amounts = params
        .allocation
        .split_amount(params.monthly_contribution)
        .into_iter()
        .map(|(asset_class, amount)| MonthlyAmount {
            asset_class,
            amount,
        })
        .collect();

    Ok(ProjectionReport {
        profile,
        allocation: params.allocation,
        monthly_amounts,
        result,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let json =
        serde_json::to_string_pretty(value).map_err(|e| format!("Failed to encode output: {e}"))?;
    println!("{json}");
    Ok(())
}

pub async fn run(cli: Cli) -> Result<(), String> {
    let config = AppConfig::load(cli.assumptions.as_deref())?;
    match cli.command {
        Command::Project(args) => print_json(&project(&args, &config)?),
        Command::Normalize(mix) => print_json(&resolve_allocation(&mix, mix.profile.into())),
        Command::Serve { port } => run_http_server(port, config)
            .await
            .map_err(|e| format!("Server error: {e}")),
    }
}
