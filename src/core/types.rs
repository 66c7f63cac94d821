use std::collections::HashMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetClass(String);

impl AssetClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetClass {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for AssetClass {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Percentage weight per asset class, kept in caller order.
///
/// The order matters: it is the tie-break order used when rounding drift has
/// to be absorbed by one class. Serialized as a JSON object whose key order
/// is preserved in both directions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Allocation {
    entries: Vec<(AssetClass, f64)>,
}

impl Allocation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an allocation from pairs. A repeated class keeps its first
    /// position and takes the last weight given for it.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<AssetClass>,
    {
        let mut allocation = Self::new();
        for (class, weight) in pairs {
            allocation.set(class.into(), weight);
        }
        allocation
    }

    pub fn with(mut self, class: impl Into<AssetClass>, weight: f64) -> Self {
        self.set(class.into(), weight);
        self
    }

    fn set(&mut self, class: AssetClass, weight: f64) {
        match self.entries.iter_mut().find(|(c, _)| *c == class) {
            Some(entry) => entry.1 = weight,
            None => self.entries.push((class, weight)),
        }
    }

    pub fn get(&self, class: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(c, _)| c.as_str() == class)
            .map(|(_, w)| *w)
    }

    pub fn weight(&self, class: &str) -> f64 {
        self.get(class).unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AssetClass, f64)> {
        self.entries.iter().map(|(c, w)| (c, *w))
    }

    pub fn classes(&self) -> impl Iterator<Item = &AssetClass> {
        self.entries.iter().map(|(c, _)| c)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, w)| *w).sum()
    }

    /// True when every weight is a non-negative integer and they add to 100.
    pub fn is_normalized(&self) -> bool {
        self.entries
            .iter()
            .all(|(_, w)| *w >= 0.0 && w.fract() == 0.0)
            && self.total() == 100.0
    }

    /// Money per class when `amount` is split by this allocation.
    pub fn split_amount(&self, amount: f64) -> Vec<(AssetClass, f64)> {
        self.entries
            .iter()
            .map(|(c, w)| (c.clone(), amount * w / 100.0))
            .collect()
    }
}

impl Serialize for Allocation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (class, weight) in &self.entries {
            map.serialize_entry(class, weight)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Allocation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AllocationVisitor;

        impl<'de> Visitor<'de> for AllocationVisitor {
            type Value = Allocation;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of asset class to percentage weight")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Allocation, A::Error> {
                let mut allocation = Allocation::new();
                while let Some((class, weight)) = access.next_entry::<AssetClass, f64>()? {
                    allocation.set(class, weight);
                }
                Ok(allocation)
            }
        }

        deserializer.deserialize_map(AllocationVisitor)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAssumption {
    #[serde(alias = "mean", alias = "expectedReturn")]
    pub mean_return: f64,
    #[serde(alias = "vol", alias = "stdDev")]
    pub volatility: f64,
}

impl AssetAssumption {
    pub const fn new(mean_return: f64, volatility: f64) -> Self {
        Self {
            mean_return,
            volatility,
        }
    }
}

pub type Assumptions = HashMap<AssetClass, AssetAssumption>;

#[derive(Debug, Clone)]
pub struct SimulationParams {
    pub starting_balance: f64,
    pub monthly_contribution: f64,
    pub horizon_years: u32,
    pub allocation: Allocation,
    pub annual_fee: f64,
    pub assumptions: Assumptions,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct FinalPercentiles {
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyPercentiles {
    pub years: Vec<u32>,
    pub p10: Vec<f64>,
    pub p50: Vec<f64>,
    pub p90: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub final_percentiles: FinalPercentiles,
    pub yearly_percentiles: YearlyPercentiles,
    pub path_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_assumptions: Vec<AssetClass>,
}
