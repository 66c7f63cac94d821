use rayon::prelude::*;
use tracing::{debug, warn};

use super::error::ProjectionError;
use super::rng::{PathRng, UniformSource, derive_seed, sample_normal};
use super::types::{
    AssetClass, FinalPercentiles, SimulationParams, SimulationResult, YearlyPercentiles,
};

pub const DEFAULT_PATH_COUNT: usize = 1000;
const MONTHS_PER_YEAR: usize = 12;

#[derive(Debug, Clone, Copy)]
struct WeightedAsset {
    weight: f64,
    monthly_mean: f64,
    monthly_stdev: f64,
}

#[derive(Debug)]
struct SamplePath {
    yearly_balances: Vec<f64>,
}

impl SamplePath {
    fn final_value(&self) -> f64 {
        self.yearly_balances.last().copied().unwrap_or(0.0)
    }
}

/// Validated, per-month view of one projection request.
#[derive(Debug)]
struct ProjectionRun {
    assets: Vec<WeightedAsset>,
    missing_assumptions: Vec<AssetClass>,
    starting_balance: f64,
    monthly_contribution: f64,
    horizon_years: usize,
    fee_multiplier: f64,
    path_count: usize,
}

impl ProjectionRun {
    fn new(params: &SimulationParams, path_count: usize) -> Result<Self, ProjectionError> {
        validate(params, path_count)?;

        let month_fraction = 1.0 / MONTHS_PER_YEAR as f64;
        let mut assets = Vec::new();
        let mut missing_assumptions = Vec::new();
        for (class, weight) in params.allocation.iter() {
            if weight <= 0.0 {
                continue;
            }
            match params.assumptions.get(class) {
                Some(assumption) => assets.push(WeightedAsset {
                    weight: weight / 100.0,
                    monthly_mean: assumption.mean_return * month_fraction,
                    monthly_stdev: assumption.volatility * month_fraction.sqrt(),
                }),
                None => {
                    warn!(
                        asset_class = %class,
                        weight,
                        "no return assumption for allocated asset class; its return is taken as zero"
                    );
                    missing_assumptions.push(class.clone());
                }
            }
        }

        Ok(Self {
            assets,
            missing_assumptions,
            starting_balance: params.starting_balance,
            monthly_contribution: params.monthly_contribution,
            horizon_years: params.horizon_years as usize,
            fee_multiplier: 1.0 - params.annual_fee,
            path_count,
        })
    }

    fn simulate_path<S: UniformSource + ?Sized>(&self, source: &mut S) -> SamplePath {
        let mut balance = self.starting_balance;
        let mut yearly_balances = Vec::with_capacity(self.horizon_years);

        for _ in 0..self.horizon_years {
            for _ in 0..MONTHS_PER_YEAR {
                balance += self.monthly_contribution;
                let monthly_return: f64 = self
                    .assets
                    .iter()
                    .map(|asset| {
                        asset.weight
                            * sample_normal(source, asset.monthly_mean, asset.monthly_stdev)
                    })
                    .sum();
                balance *= 1.0 + monthly_return;
            }
            balance *= self.fee_multiplier;
            yearly_balances.push(balance);
        }

        SamplePath { yearly_balances }
    }

    fn summarize(self, paths: Vec<SamplePath>) -> SimulationResult {
        let mut finals: Vec<f64> = paths.iter().map(SamplePath::final_value).collect();
        let average = finals.iter().sum::<f64>() / finals.len() as f64;
        let (p10, p50, p90) = percentile_band(&mut finals);

        let mut yearly = YearlyPercentiles {
            years: (1..=self.horizon_years as u32).collect(),
            p10: Vec::with_capacity(self.horizon_years),
            p50: Vec::with_capacity(self.horizon_years),
            p90: Vec::with_capacity(self.horizon_years),
        };
        let mut year_values = Vec::with_capacity(paths.len());
        for year_idx in 0..self.horizon_years {
            year_values.clear();
            year_values.extend(paths.iter().map(|p| p.yearly_balances[year_idx]));
            let (low, mid, high) = percentile_band(&mut year_values);
            yearly.p10.push(low);
            yearly.p50.push(mid);
            yearly.p90.push(high);
        }

        SimulationResult {
            final_percentiles: FinalPercentiles {
                p10,
                p50,
                p90,
                average,
            },
            yearly_percentiles: yearly,
            path_count: self.path_count,
            missing_assumptions: self.missing_assumptions,
        }
    }
}

fn validate(params: &SimulationParams, path_count: usize) -> Result<(), ProjectionError> {
    if params.allocation.is_empty() {
        return Err(ProjectionError::invalid("allocation is empty"));
    }
    for (class, weight) in params.allocation.iter() {
        if !weight.is_finite() || weight < 0.0 {
            return Err(ProjectionError::invalid(format!(
                "allocation weight for {class} must be a non-negative number"
            )));
        }
    }
    if params.allocation.total() <= 0.0 {
        return Err(ProjectionError::invalid("allocation weights sum to zero"));
    }
    if params.horizon_years == 0 {
        return Err(ProjectionError::invalid("horizon must be at least one year"));
    }
    if path_count == 0 {
        return Err(ProjectionError::invalid("path count must be positive"));
    }
    if !params.starting_balance.is_finite() || params.starting_balance < 0.0 {
        return Err(ProjectionError::invalid(
            "starting balance must be a non-negative number",
        ));
    }
    if !params.monthly_contribution.is_finite() || params.monthly_contribution < 0.0 {
        return Err(ProjectionError::invalid(
            "monthly contribution must be a non-negative number",
        ));
    }
    if !params.annual_fee.is_finite() || !(0.0..=1.0).contains(&params.annual_fee) {
        return Err(ProjectionError::invalid(
            "annual fee must be a fraction between 0 and 1",
        ));
    }
    for (class, weight) in params.allocation.iter() {
        if weight <= 0.0 {
            continue;
        }
        if let Some(assumption) = params.assumptions.get(class) {
            if !assumption.mean_return.is_finite() {
                return Err(ProjectionError::invalid(format!(
                    "mean return for {class} must be finite"
                )));
            }
            if !assumption.volatility.is_finite() || assumption.volatility < 0.0 {
                return Err(ProjectionError::invalid(format!(
                    "volatility for {class} must be a non-negative number"
                )));
            }
        }
    }
    Ok(())
}

/// Runs the projection with a fresh, unseeded random stream.
pub fn run_projection(
    params: &SimulationParams,
    path_count: Option<usize>,
) -> Result<SimulationResult, ProjectionError> {
    let path_count = path_count.unwrap_or(DEFAULT_PATH_COUNT);
    let run = ProjectionRun::new(params, path_count)?;
    Ok(run_parallel(run, rand::random()))
}

/// Same as [`run_projection`] but reproducible: each path draws from its own
/// generator derived from `seed` and the path index, so the result does not
/// depend on how rayon schedules the paths.
pub fn run_projection_seeded(
    params: &SimulationParams,
    path_count: Option<usize>,
    seed: u64,
) -> Result<SimulationResult, ProjectionError> {
    let path_count = path_count.unwrap_or(DEFAULT_PATH_COUNT);
    let run = ProjectionRun::new(params, path_count)?;
    Ok(run_parallel(run, seed))
}

/// Runs every path in order against one caller-supplied source.
pub fn run_projection_with_source<S: UniformSource + ?Sized>(
    params: &SimulationParams,
    path_count: Option<usize>,
    source: &mut S,
) -> Result<SimulationResult, ProjectionError> {
    let path_count = path_count.unwrap_or(DEFAULT_PATH_COUNT);
    let run = ProjectionRun::new(params, path_count)?;
    debug!(
        path_count,
        horizon_years = run.horizon_years,
        "running projection on injected source"
    );
    let paths = (0..path_count).map(|_| run.simulate_path(source)).collect();
    Ok(run.summarize(paths))
}

fn run_parallel(run: ProjectionRun, seed: u64) -> SimulationResult {
    debug!(
        path_count = run.path_count,
        horizon_years = run.horizon_years,
        assets = run.assets.len(),
        seed,
        "running projection"
    );
    let paths = (0..run.path_count)
        .into_par_iter()
        .map(|path_id| {
            let mut rng = PathRng::new(derive_seed(seed, path_id as u64));
            run.simulate_path(&mut rng)
        })
        .collect();
    run.summarize(paths)
}

fn percentile_index(len: usize, q: f64) -> usize {
    let idx = (len as f64 * q).floor() as usize;
    idx.min(len.saturating_sub(1))
}

/// Sorts `values` and reads the 10th, 50th and 90th percentiles.
fn percentile_band(values: &mut [f64]) -> (f64, f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    (
        values[percentile_index(n, 0.10)],
        values[percentile_index(n, 0.50)],
        values[percentile_index(n, 0.90)],
    )
}
