use serde::{Deserialize, Serialize};

use super::error::ProjectionError;
use super::types::{Allocation, AssetAssumption, AssetClass, Assumptions};

pub const US_STOCKS: &str = "usStocks";
pub const GLOBAL_STOCKS: &str = "globalStocks";
pub const BONDS: &str = "bonds";
pub const CRYPTO: &str = "crypto";

const QUESTION_COUNT: usize = 5;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskProfile {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
    #[serde(alias = "veryAggressive", alias = "very_aggressive")]
    VeryAggressive,
}

impl RiskProfile {
    pub const ALL: [RiskProfile; 4] = [
        RiskProfile::Conservative,
        RiskProfile::Moderate,
        RiskProfile::Aggressive,
        RiskProfile::VeryAggressive,
    ];

    pub fn allocation(self) -> Allocation {
        let (us, global, bonds, crypto) = match self {
            RiskProfile::Conservative => (40.0, 25.0, 33.0, 2.0),
            RiskProfile::Moderate => (52.0, 35.0, 8.0, 5.0),
            RiskProfile::Aggressive => (60.0, 28.0, 2.0, 10.0),
            RiskProfile::VeryAggressive => (55.0, 25.0, 0.0, 20.0),
        };
        Allocation::from_pairs([
            (US_STOCKS, us),
            (GLOBAL_STOCKS, global),
            (BONDS, bonds),
            (CRYPTO, crypto),
        ])
    }

    /// Short horizons step down one level; very long ones lift conservative.
    pub fn adjusted_for_horizon(self, years: u32) -> RiskProfile {
        if years < 5 {
            match self {
                RiskProfile::Conservative | RiskProfile::Moderate => RiskProfile::Conservative,
                RiskProfile::Aggressive => RiskProfile::Moderate,
                RiskProfile::VeryAggressive => RiskProfile::Aggressive,
            }
        } else if years > 25 && self == RiskProfile::Conservative {
            RiskProfile::Moderate
        } else {
            self
        }
    }

    /// Scores five multiple-choice answers (`a`..`d`, worth 1..4).
    pub fn from_questionnaire(answers: &str) -> Result<RiskProfile, ProjectionError> {
        let letters: Vec<char> = answers
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ',')
            .collect();
        if letters.len() != QUESTION_COUNT {
            return Err(ProjectionError::invalid(format!(
                "expected {QUESTION_COUNT} answers, got {}",
                letters.len()
            )));
        }

        let mut score = 0;
        for letter in letters {
            score += match letter.to_ascii_lowercase() {
                'a' => 1,
                'b' => 2,
                'c' => 3,
                'd' => 4,
                other => {
                    return Err(ProjectionError::invalid(format!(
                        "unknown questionnaire answer '{other}'"
                    )));
                }
            };
        }

        Ok(match score {
            0..=7 => RiskProfile::Conservative,
            8..=11 => RiskProfile::Moderate,
            12..=15 => RiskProfile::Aggressive,
            _ => RiskProfile::VeryAggressive,
        })
    }
}

/// Built-in return/volatility table for the risk-profile asset classes.
pub fn default_assumptions() -> Assumptions {
    [
        (US_STOCKS, 0.10, 0.15),
        (GLOBAL_STOCKS, 0.08, 0.17),
        (BONDS, 0.03, 0.05),
        (CRYPTO, 0.20, 0.65),
        ("stock", 0.08, 0.15),
        ("bond", 0.03, 0.05),
        ("gold", 0.04, 0.18),
    ]
    .into_iter()
    .map(|(class, mean, vol)| (AssetClass::from(class), AssetAssumption::new(mean, vol)))
    .collect()
}

/// Table for hand-picked stock/bond/crypto/gold mixes sent to the simulate
/// endpoint. Crypto is projected more conservatively here than in the
/// profile table; the profile classes are carried over unchanged.
pub fn custom_mix_assumptions() -> Assumptions {
    let mut assumptions = default_assumptions();
    assumptions.extend(
        [
            ("stock", 0.08, 0.15),
            ("bond", 0.03, 0.05),
            (CRYPTO, 0.15, 0.50),
            ("gold", 0.04, 0.18),
        ]
        .into_iter()
        .map(|(class, mean, vol)| (AssetClass::from(class), AssetAssumption::new(mean, vol))),
    );
    assumptions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_profile_is_a_normalized_allocation_with_assumptions() {
        let assumptions = default_assumptions();
        for profile in RiskProfile::ALL {
            let allocation = profile.allocation();
            assert!(allocation.is_normalized(), "{profile:?}");
            for class in allocation.classes() {
                assert!(assumptions.contains_key(class), "{profile:?} {class}");
            }
        }
    }

    #[test]
    fn custom_mix_table_differs_from_profile_table_only_for_crypto() {
        let profile = default_assumptions();
        let custom = custom_mix_assumptions();
        let crypto = AssetClass::from(CRYPTO);
        assert_eq!(profile[&crypto], AssetAssumption::new(0.20, 0.65));
        assert_eq!(custom[&crypto], AssetAssumption::new(0.15, 0.50));
        for (class, assumption) in &profile {
            if *class != crypto {
                assert_eq!(custom[class], *assumption, "{class}");
            }
        }
        assert_eq!(custom.len(), profile.len());
    }

    #[test]
    fn short_horizons_step_down_and_long_horizons_lift_conservative() {
        use RiskProfile::*;
        assert_eq!(Moderate.adjusted_for_horizon(3), Conservative);
        assert_eq!(Conservative.adjusted_for_horizon(3), Conservative);
        assert_eq!(Aggressive.adjusted_for_horizon(4), Moderate);
        assert_eq!(VeryAggressive.adjusted_for_horizon(1), Aggressive);
        assert_eq!(Aggressive.adjusted_for_horizon(5), Aggressive);
        assert_eq!(Conservative.adjusted_for_horizon(25), Conservative);
        assert_eq!(Conservative.adjusted_for_horizon(26), Moderate);
        assert_eq!(Aggressive.adjusted_for_horizon(40), Aggressive);
    }

    #[test]
    fn questionnaire_scores_map_to_profiles() {
        assert_eq!(
            RiskProfile::from_questionnaire("aaaaa").unwrap(),
            RiskProfile::Conservative
        );
        // 1 + 2 + 2 + 1 + 1 = 7
        assert_eq!(
            RiskProfile::from_questionnaire("abbaa").unwrap(),
            RiskProfile::Conservative
        );
        assert_eq!(
            RiskProfile::from_questionnaire("b, b, b, b, a").unwrap(),
            RiskProfile::Moderate
        );
        assert_eq!(
            RiskProfile::from_questionnaire("CCCCC").unwrap(),
            RiskProfile::Aggressive
        );
        assert_eq!(
            RiskProfile::from_questionnaire("ddddc").unwrap(),
            RiskProfile::VeryAggressive
        );
    }

    #[test]
    fn questionnaire_rejects_incomplete_or_unknown_answers() {
        assert!(RiskProfile::from_questionnaire("abcd").is_err());
        assert!(RiskProfile::from_questionnaire("abcdab").is_err());
        assert!(RiskProfile::from_questionnaire("abcde").is_err());
    }

    #[test]
    fn profile_names_accept_camel_case_alias() {
        let profile: RiskProfile = serde_json::from_str(r#""veryAggressive""#).unwrap();
        assert_eq!(profile, RiskProfile::VeryAggressive);
        assert_eq!(
            serde_json::to_string(&RiskProfile::VeryAggressive).unwrap(),
            r#""very-aggressive""#
        );
    }
}
