use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for an experiment set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SetId(pub String);

impl SetId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for SetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier for a trial within a set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrialId(pub String);

impl TrialId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for TrialId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TrialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One variant's raw outcome counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    pub conversions: u64,
    pub visitors: u64,
}

impl Variant {
    /// Conversion rate in [0, 1]. Zero visitors yield a zero rate.
    #[must_use]
    pub fn conversion_rate(&self) -> f64 {
        if self.visitors == 0 {
            return 0.0;
        }
        self.conversions as f64 / self.visitors as f64
    }
}

/// A raw A/B trial record. Append-only input; winner and lift are derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    #[serde(default)]
    pub id: TrialId,
    pub name: String,
    /// Display label for the comparison, e.g. "blue button vs green button".
    pub variants_label: String,
    /// At least two variants; input order breaks rate ties.
    pub variants: Vec<Variant>,
}

/// Derived winner and lift for a trial, computed at read time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialOutcome {
    /// Name of the winning variant.
    pub winner: String,
    /// Relative improvement of the winner over the runner-up, in percent.
    /// Zero when undefined (see `lift_defined`).
    pub lift_pct: f64,
    /// False when the runner-up's rate is exactly zero, which makes the
    /// relative lift undefined.
    pub lift_defined: bool,
}

impl Trial {
    /// Computes the winner and lift for this trial.
    ///
    /// The winner is the variant with the highest conversion rate, ties
    /// broken toward the variant listed first. Lift compares the winner
    /// against the best of the rest.
    #[must_use]
    pub fn outcome(&self) -> TrialOutcome {
        debug_assert!(self.variants.len() >= 2, "validated at ingestion");

        let mut winner = 0;
        for (idx, variant) in self.variants.iter().enumerate().skip(1) {
            if variant.conversion_rate() > self.variants[winner].conversion_rate() {
                winner = idx;
            }
        }
        let runner_up_rate = self
            .variants
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != winner)
            .map(|(_, v)| v.conversion_rate())
            .fold(0.0_f64, f64::max);

        let winner_rate = self.variants[winner].conversion_rate();
        let (lift_pct, lift_defined) = if runner_up_rate > 0.0 {
            ((winner_rate - runner_up_rate) / runner_up_rate * 100.0, true)
        } else {
            (0.0, false)
        };

        TrialOutcome { winner: self.variants[winner].name.clone(), lift_pct, lift_defined }
    }
}
