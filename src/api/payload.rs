use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{AppConfig, MAX_HORIZON_YEARS, MAX_PATHS};
use crate::core::{
    Allocation, AssetClass, Assumptions, ProjectionError, RiskProfile, SimulationParams,
    SimulationResult, normalize_allocation, rebalance_allocation, run_projection,
    run_projection_seeded,
};

const ALLOCATION_TOLERANCE: f64 = 0.1;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct NormalizePayload {
    #[serde(alias = "allocations", alias = "allocation")]
    weights: Option<Allocation>,
    excluded: Vec<AssetClass>,
    #[serde(alias = "profile")]
    fallback_profile: Option<RiskProfile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct RebalancePayload {
    #[serde(alias = "allocations")]
    allocation: Option<Allocation>,
    changed: Option<AssetClass>,
    value: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct SimulatePayload {
    starting_balance: Option<f64>,
    #[serde(alias = "monthlyContribution")]
    monthly_investment: Option<f64>,
    #[serde(alias = "horizonYears", alias = "years")]
    time_horizon: Option<i64>,
    #[serde(alias = "allocation")]
    allocations: Option<Allocation>,
    excluded: Vec<AssetClass>,
    profile: Option<RiskProfile>,
    adjust_for_horizon: bool,
    annual_fee: Option<f64>,
    assumptions: Option<Assumptions>,
    paths: Option<usize>,
    seed: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ProfilesQuery {
    pub(crate) years: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct QuestionnairePayload {
    answers: String,
}

#[derive(Debug)]
pub(crate) struct SimulateRequest {
    pub(crate) params: SimulationParams,
    pub(crate) profile: Option<RiskProfile>,
    paths: Option<usize>,
    seed: Option<u64>,
}

impl SimulateRequest {
    pub(crate) fn run(&self) -> Result<SimulationResult, ProjectionError> {
        match self.seed {
            Some(seed) => run_projection_seeded(&self.params, self.paths, seed),
            None => run_projection(&self.params, self.paths),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AllocationResponse {
    allocation: Allocation,
    is_normalized: bool,
}

impl From<Allocation> for AllocationResponse {
    fn from(allocation: Allocation) -> Self {
        Self {
            is_normalized: allocation.is_normalized(),
            allocation,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SimulateResponse<'a> {
    allocation: &'a Allocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<RiskProfile>,
    #[serde(flatten)]
    result: &'a SimulationResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProfileSummary {
    profile: RiskProfile,
    allocation: Allocation,
    adjusted_profile: RiskProfile,
    adjusted_allocation: Allocation,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProfilesResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    years: Option<u32>,
    profiles: Vec<ProfileSummary>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionnaireResponse {
    profile: RiskProfile,
    allocation: Allocation,
}

pub(crate) fn normalize_from_payload(payload: NormalizePayload) -> Result<Allocation, String> {
    let weights = payload.weights.ok_or("Missing weights")?;
    let fallback = payload.fallback_profile.unwrap_or_default().allocation();
    Ok(normalize_allocation(&weights, &payload.excluded, &fallback))
}

pub(crate) fn rebalance_from_payload(payload: RebalancePayload) -> Result<Allocation, String> {
    let allocation = match payload.allocation {
        Some(allocation) if !allocation.is_empty() => allocation,
        _ => return Err("Missing or empty allocation".to_string()),
    };
    let changed = payload.changed.ok_or("Missing changed asset class")?;
    let value = match payload.value {
        Some(value) if value.is_finite() => value,
        _ => return Err("Missing or invalid slider value".to_string()),
    };
    Ok(rebalance_allocation(&allocation, &changed, value))
}

pub(crate) fn simulate_request_from_payload(
    payload: SimulatePayload,
    config: &AppConfig,
) -> Result<SimulateRequest, String> {
    let horizon_years = match payload.time_horizon {
        Some(years) if years > 0 && years <= MAX_HORIZON_YEARS as i64 => years as u32,
        Some(years) if years > 0 => {
            return Err(format!(
                "Time horizon must be at most {MAX_HORIZON_YEARS} years"
            ));
        }
        _ => return Err("Invalid time horizon".to_string()),
    };

    if let Some(paths) = payload.paths {
        if paths == 0 || paths > MAX_PATHS {
            return Err(format!("paths must be between 1 and {MAX_PATHS}"));
        }
    }

    let profile = payload.profile.map(|profile| {
        if payload.adjust_for_horizon {
            profile.adjusted_for_horizon(horizon_years)
        } else {
            profile
        }
    });
    let fallback = profile.unwrap_or_default().allocation();
    let (raw, custom_mix) = match (payload.allocations, profile) {
        (Some(allocation), _) if !allocation.is_empty() => (allocation, true),
        (_, Some(profile)) => (profile.allocation(), false),
        _ => return Err("Missing or invalid allocations".to_string()),
    };

    let total = raw.total();
    if (total - 100.0).abs() > ALLOCATION_TOLERANCE {
        warn!(total, "received allocations not summing to 100; normalizing");
    }
    let allocation = normalize_allocation(&raw, &payload.excluded, &fallback);

    let mut assumptions = if custom_mix {
        config.custom_mix_assumptions.clone()
    } else {
        config.assumptions.clone()
    };
    if let Some(overrides) = payload.assumptions {
        assumptions.extend(overrides);
    }

    Ok(SimulateRequest {
        params: SimulationParams {
            starting_balance: payload.starting_balance.unwrap_or(0.0),
            monthly_contribution: payload.monthly_investment.unwrap_or(0.0),
            horizon_years,
            allocation,
            annual_fee: payload.annual_fee.unwrap_or(0.0),
            assumptions,
        },
        profile,
        paths: payload.paths,
        seed: payload.seed,
    })
}

pub(crate) fn build_simulate_response<'a>(
    request: &'a SimulateRequest,
    result: &'a SimulationResult,
) -> SimulateResponse<'a> {
    SimulateResponse {
        allocation: &request.params.allocation,
        profile: request.profile,
        result,
    }
}

pub(crate) fn build_profiles_response(years: Option<u32>) -> ProfilesResponse {
    let profiles = RiskProfile::ALL
        .into_iter()
        .map(|profile| {
            let adjusted = years.map_or(profile, |y| profile.adjusted_for_horizon(y));
            ProfileSummary {
                profile,
                allocation: profile.allocation(),
                adjusted_profile: adjusted,
                adjusted_allocation: adjusted.allocation(),
            }
        })
        .collect();
    ProfilesResponse { years, profiles }
}

pub(crate) fn questionnaire_from_payload(
    payload: QuestionnairePayload,
) -> Result<QuestionnaireResponse, String> {
    let profile = RiskProfile::from_questionnaire(&payload.answers).map_err(|e| e.to_string())?;
    Ok(QuestionnaireResponse {
        profile,
        allocation: profile.allocation(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AssetAssumption;

    fn simulate_from_json(json: &str) -> Result<SimulateRequest, String> {
        let payload = serde_json::from_str::<SimulatePayload>(json)
            .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
        simulate_request_from_payload(payload, &AppConfig::default())
    }

    #[test]
    fn simulate_payload_parses_web_keys() {
        let request = simulate_from_json(
            r#"{
                "startingBalance": 10000,
                "monthlyInvestment": 500,
                "timeHorizon": 10,
                "allocations": {"stock": 60, "bond": 40, "crypto": 0, "gold": 0},
                "annualFee": 0.005,
                "seed": 7,
                "paths": 250
            }"#,
        )
        .unwrap();

        let params = &request.params;
        assert_eq!(params.starting_balance, 10_000.0);
        assert_eq!(params.monthly_contribution, 500.0);
        assert_eq!(params.horizon_years, 10);
        assert_eq!(params.annual_fee, 0.005);
        assert_eq!(params.allocation.weight("stock"), 60.0);
        assert_eq!(params.allocation.weight("gold"), 0.0);
        assert_eq!(request.paths, Some(250));
        assert_eq!(request.seed, Some(7));
        assert!(params.assumptions.contains_key(&AssetClass::from("stock")));
    }

    #[test]
    fn simulate_payload_accepts_aliases_and_overrides_assumptions() {
        let request = simulate_from_json(
            r#"{
                "monthlyContribution": 100,
                "horizonYears": 3,
                "allocation": {"stock": 1, "bond": 1},
                "assumptions": {"stock": {"mean": 0.05, "vol": 0.0}}
            }"#,
        )
        .unwrap();

        let params = &request.params;
        assert_eq!(params.monthly_contribution, 100.0);
        assert_eq!(params.allocation.weight("stock"), 50.0);
        assert_eq!(params.allocation.weight("bond"), 50.0);
        let stock = params.assumptions[&AssetClass::from("stock")];
        assert_eq!(stock.mean_return, 0.05);
        assert_eq!(stock.volatility, 0.0);
        // untouched defaults survive the merge
        assert!(params.assumptions.contains_key(&AssetClass::from("gold")));
    }

    #[test]
    fn simulate_payload_uses_profile_when_allocations_are_missing() {
        let request = simulate_from_json(
            r#"{"timeHorizon": 3, "profile": "aggressive", "adjustForHorizon": true}"#,
        )
        .unwrap();
        assert_eq!(request.profile, Some(RiskProfile::Moderate));
        assert_eq!(request.params.allocation, RiskProfile::Moderate.allocation());
    }

    #[test]
    fn simulate_payload_falls_back_to_profile_when_allocations_are_empty() {
        let request = simulate_from_json(
            r#"{"timeHorizon": 10, "allocations": {}, "profile": "conservative"}"#,
        )
        .unwrap();
        assert_eq!(request.params.allocation, RiskProfile::Conservative.allocation());
    }

    #[test]
    fn simulate_payload_picks_assumption_table_by_request_shape() {
        let crypto = AssetClass::from("crypto");

        let request = simulate_from_json(
            r#"{"timeHorizon": 10,
                "allocations": {"stock": 50, "bond": 30, "crypto": 10, "gold": 10}}"#,
        )
        .unwrap();
        let assumption = request.params.assumptions[&crypto];
        assert_eq!(assumption.mean_return, 0.15);
        assert_eq!(assumption.volatility, 0.50);
        assert_eq!(
            request.params.assumptions[&AssetClass::from("gold")],
            AssetAssumption::new(0.04, 0.18)
        );

        let request = simulate_from_json(r#"{"timeHorizon": 10, "profile": "very-aggressive"}"#)
            .unwrap();
        let assumption = request.params.assumptions[&crypto];
        assert_eq!(assumption.mean_return, 0.20);
        assert_eq!(assumption.volatility, 0.65);
    }

    #[test]
    fn simulate_payload_applies_exclusions() {
        let request = simulate_from_json(
            r#"{"timeHorizon": 5, "allocations": {"stock": 50, "bond": 50, "crypto": 200}, "excluded": ["crypto"]}"#,
        )
        .unwrap();
        assert_eq!(
            request.params.allocation,
            Allocation::from_pairs([("stock", 50.0), ("bond", 50.0), ("crypto", 0.0)])
        );
    }

    #[test]
    fn simulate_payload_rejects_invalid_requests() {
        let err = simulate_from_json(r#"{"allocations": {"stock": 100}}"#).unwrap_err();
        assert_eq!(err, "Invalid time horizon");

        let err = simulate_from_json(r#"{"timeHorizon": -2, "allocations": {"stock": 100}}"#)
            .unwrap_err();
        assert_eq!(err, "Invalid time horizon");

        let err = simulate_from_json(r#"{"timeHorizon": 500, "allocations": {"stock": 100}}"#)
            .unwrap_err();
        assert!(err.contains("at most"));

        let err = simulate_from_json(r#"{"timeHorizon": 5}"#).unwrap_err();
        assert_eq!(err, "Missing or invalid allocations");

        let err = simulate_from_json(r#"{"timeHorizon": 5, "allocations": {}}"#).unwrap_err();
        assert_eq!(err, "Missing or invalid allocations");

        let err = simulate_from_json(
            r#"{"timeHorizon": 5, "allocations": {"stock": 100}, "paths": 0}"#,
        )
        .unwrap_err();
        assert!(err.contains("paths"));
    }

    #[test]
    fn simulate_response_serialization_contains_expected_fields() {
        let request = simulate_from_json(
            r#"{"startingBalance": 1000, "monthlyInvestment": 100, "timeHorizon": 2,
                "allocations": {"stock": 70, "bond": 30}, "seed": 11, "paths": 40}"#,
        )
        .unwrap();
        let result = request.run().unwrap();
        let json = serde_json::to_value(build_simulate_response(&request, &result)).unwrap();

        assert_eq!(json["allocation"]["stock"], 70.0);
        assert_eq!(json["pathCount"], 40);
        assert_eq!(json["yearlyPercentiles"]["years"], serde_json::json!([1, 2]));
        for key in ["p10", "p50", "p90", "average"] {
            assert!(json["finalPercentiles"][key].is_number(), "{key}");
        }
        assert!(json.get("profile").is_none());
        assert!(json.get("missingAssumptions").is_none());
    }

    #[test]
    fn normalize_payload_falls_back_to_requested_profile() {
        let payload: NormalizePayload = serde_json::from_str(
            r#"{"weights": {"stock": 0, "bond": 0}, "fallbackProfile": "conservative"}"#,
        )
        .unwrap();
        assert_eq!(
            normalize_from_payload(payload).unwrap(),
            RiskProfile::Conservative.allocation()
        );

        let payload: NormalizePayload = serde_json::from_str(r#"{}"#).unwrap();
        assert!(normalize_from_payload(payload).is_err());
    }

    #[test]
    fn rebalance_payload_moves_one_slider() {
        let payload: RebalancePayload = serde_json::from_str(
            r#"{"allocation": {"stock": 60, "bond": 30, "gold": 10}, "changed": "gold", "value": 20}"#,
        )
        .unwrap();
        let out = rebalance_from_payload(payload).unwrap();
        assert_eq!(out.weight("stock"), 53.0);
        assert_eq!(out.weight("bond"), 27.0);
        assert_eq!(out.weight("gold"), 20.0);

        let payload: RebalancePayload =
            serde_json::from_str(r#"{"allocation": {"stock": 100}, "value": 20}"#).unwrap();
        assert_eq!(
            rebalance_from_payload(payload).unwrap_err(),
            "Missing changed asset class"
        );
    }

    #[test]
    fn profiles_response_reports_horizon_adjustment() {
        let json = serde_json::to_value(build_profiles_response(Some(3))).unwrap();
        let profiles = json["profiles"].as_array().unwrap();
        assert_eq!(profiles.len(), 4);
        assert_eq!(profiles[1]["profile"], "moderate");
        assert_eq!(profiles[1]["adjustedProfile"], "conservative");
        assert_eq!(profiles[1]["allocation"]["usStocks"], 52.0);

        let json = serde_json::to_value(build_profiles_response(None)).unwrap();
        assert!(json.get("years").is_none());
        assert_eq!(json["profiles"][3]["adjustedProfile"], "very-aggressive");
    }

    #[test]
    fn questionnaire_payload_suggests_profile() {
        let payload: QuestionnairePayload =
            serde_json::from_str(r#"{"answers": "ccccc"}"#).unwrap();
        let response = questionnaire_from_payload(payload).unwrap();
        assert_eq!(response.profile, RiskProfile::Aggressive);

        let payload: QuestionnairePayload = serde_json::from_str(r#"{"answers": "ab"}"#).unwrap();
        assert!(questionnaire_from_payload(payload).is_err());
    }
}
