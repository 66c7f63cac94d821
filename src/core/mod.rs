mod allocation;
mod engine;
mod error;
mod profiles;
mod rng;
mod types;

pub use allocation::{normalize_allocation, rebalance_allocation};
pub use engine::{
    DEFAULT_PATH_COUNT, run_projection, run_projection_seeded, run_projection_with_source,
};
pub use error::ProjectionError;
pub use profiles::{RiskProfile, custom_mix_assumptions, default_assumptions};
pub use rng::{PathRng, RandSource, UniformSource, sample_normal, standard_normal};
pub use types::{
    Allocation, AssetAssumption, AssetClass, Assumptions, FinalPercentiles, SimulationParams,
    SimulationResult, YearlyPercentiles,
};
