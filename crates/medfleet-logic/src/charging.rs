//! Charging priority: how urgently a robot should go and recharge.
//!
//! Two interchangeable strategies produce a 0–10 score:
//!
//! - [`FuzzyInference`]: four inputs fuzzified into overlapping
//!   triangular/trapezoidal sets, a fixed rule list combined max-of-min, and
//!   a centroid over the output universe.
//! - [`ThresholdTable`]: a crisp table keyed on battery charge.
//!
//! [`ChargingAdvisor`] picks one at construction and applies the shared
//! contract on top: an empty battery is always 10.0, and anything at or
//! above the critical threshold preempts the robot's work.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Highest possible priority.
pub const MAX_PRIORITY: f64 = 10.0;

/// A membership function over one input universe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Membership {
    /// Rises from `a` to a peak at `b`, falls to zero at `c`.
    Triangle(f64, f64, f64),
    /// Rises from `a` to `b`, flat at 1 until `c`, falls to zero at `d`.
    Trapezoid(f64, f64, f64, f64),
}

impl Membership {
    pub fn degree(&self, x: f64) -> f64 {
        match *self {
            Membership::Triangle(a, b, c) => Membership::Trapezoid(a, b, b, c).degree(x),
            Membership::Trapezoid(a, b, c, d) => {
                if x < a || x > d {
                    0.0
                } else if x >= b && x <= c {
                    1.0
                } else if x < b {
                    (x - a) / (b - a)
                } else {
                    (d - x) / (d - c)
                }
            }
        }
    }
}

/// Battery charge terms (0–100 %).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChargeLevel {
    Critical,
    Low,
    Medium,
    High,
    Full,
}

impl ChargeLevel {
    pub const ALL: [ChargeLevel; 5] = [
        ChargeLevel::Critical,
        ChargeLevel::Low,
        ChargeLevel::Medium,
        ChargeLevel::High,
        ChargeLevel::Full,
    ];

    pub fn membership(self) -> Membership {
        match self {
            ChargeLevel::Critical => Membership::Trapezoid(0.0, 0.0, 15.0, 25.0),
            ChargeLevel::Low => Membership::Triangle(15.0, 30.0, 45.0),
            ChargeLevel::Medium => Membership::Triangle(35.0, 50.0, 65.0),
            ChargeLevel::High => Membership::Triangle(55.0, 70.0, 85.0),
            ChargeLevel::Full => Membership::Trapezoid(75.0, 90.0, 100.0, 100.0),
        }
    }
}

/// Velocity rating terms (0–30).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pace {
    Slow,
    Medium,
    Fast,
}

impl Pace {
    pub const ALL: [Pace; 3] = [Pace::Slow, Pace::Medium, Pace::Fast];

    pub fn membership(self) -> Membership {
        match self {
            Pace::Slow => Membership::Trapezoid(0.0, 0.0, 8.0, 15.0),
            Pace::Medium => Membership::Triangle(12.0, 18.0, 24.0),
            Pace::Fast => Membership::Trapezoid(20.0, 25.0, 30.0, 30.0),
        }
    }
}

/// Workload terms (tasks since last charge, 0–20).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Workload {
    Light,
    Moderate,
    Heavy,
}

impl Workload {
    pub const ALL: [Workload; 3] = [Workload::Light, Workload::Moderate, Workload::Heavy];

    pub fn membership(self) -> Membership {
        match self {
            Workload::Light => Membership::Trapezoid(0.0, 0.0, 3.0, 7.0),
            Workload::Moderate => Membership::Triangle(5.0, 10.0, 15.0),
            Workload::Heavy => Membership::Trapezoid(12.0, 17.0, 20.0, 20.0),
        }
    }
}

/// Distance-to-station terms (cells, 0–50).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StationDistance {
    Near,
    Medium,
    Far,
}

impl StationDistance {
    pub const ALL: [StationDistance; 3] = [
        StationDistance::Near,
        StationDistance::Medium,
        StationDistance::Far,
    ];

    pub fn membership(self) -> Membership {
        match self {
            StationDistance::Near => Membership::Trapezoid(0.0, 0.0, 5.0, 12.0),
            StationDistance::Medium => Membership::Triangle(10.0, 20.0, 30.0),
            StationDistance::Far => Membership::Trapezoid(25.0, 35.0, 50.0, 50.0),
        }
    }
}

/// Output terms over the 0–10 priority universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriorityLevel {
    VeryLow,
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityLevel {
    pub const ALL: [PriorityLevel; 5] = [
        PriorityLevel::VeryLow,
        PriorityLevel::Low,
        PriorityLevel::Medium,
        PriorityLevel::High,
        PriorityLevel::Critical,
    ];

    pub fn membership(self) -> Membership {
        match self {
            PriorityLevel::VeryLow => Membership::Trapezoid(0.0, 0.0, 1.0, 2.0),
            PriorityLevel::Low => Membership::Triangle(1.0, 2.5, 4.0),
            PriorityLevel::Medium => Membership::Triangle(3.0, 5.0, 7.0),
            PriorityLevel::High => Membership::Triangle(6.0, 7.5, 9.0),
            PriorityLevel::Critical => Membership::Trapezoid(8.0, 9.0, 10.0, 10.0),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Crisp inputs to a charging decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChargingInputs {
    /// Battery percentage, 0–100.
    pub charge: f64,
    /// Velocity rating, 0–30.
    pub velocity: f64,
    /// Tasks completed since the last charge, 0–20.
    pub workload: f64,
    /// Cells to the nearest charging station, 0–50.
    pub station_distance: f64,
}

impl ChargingInputs {
    /// Clamp every input into its universe.
    pub fn clamped(self) -> Self {
        Self {
            charge: self.charge.clamp(0.0, 100.0),
            velocity: self.velocity.clamp(0.0, 30.0),
            workload: self.workload.clamp(0.0, 20.0),
            station_distance: self.station_distance.clamp(0.0, 50.0),
        }
    }
}

/// Membership degree of every term for one set of inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fuzzified {
    pub charge: [f64; 5],
    pub pace: [f64; 3],
    pub workload: [f64; 3],
    pub distance: [f64; 3],
}

impl Fuzzified {
    pub fn of(inputs: &ChargingInputs) -> Self {
        let i = inputs.clamped();
        Self {
            charge: ChargeLevel::ALL.map(|t| t.membership().degree(i.charge)),
            pace: Pace::ALL.map(|t| t.membership().degree(i.velocity)),
            workload: Workload::ALL.map(|t| t.membership().degree(i.workload)),
            distance: StationDistance::ALL.map(|t| t.membership().degree(i.station_distance)),
        }
    }
}

/// One antecedent clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Charge(ChargeLevel),
    Pace(Pace),
    Workload(Workload),
    Distance(StationDistance),
}

impl Condition {
    fn truth(self, f: &Fuzzified) -> f64 {
        match self {
            Condition::Charge(t) => f.charge[t as usize],
            Condition::Pace(t) => f.pace[t as usize],
            Condition::Workload(t) => f.workload[t as usize],
            Condition::Distance(t) => f.distance[t as usize],
        }
    }
}

/// `when` clauses ANDed together (min) imply `then`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rule {
    pub when: &'static [Condition],
    pub then: PriorityLevel,
}

impl Rule {
    /// Firing strength: the weakest clause.
    pub fn strength(&self, f: &Fuzzified) -> f64 {
        self.when
            .iter()
            .map(|c| c.truth(f))
            .fold(1.0, f64::min)
    }
}

use ChargeLevel as Ch;
use Condition::{Charge, Distance, Pace as P, Workload as W};

/// The rule base, evaluated in order.
#[rustfmt::skip]
pub static BASE_RULES: [Rule; 13] = [
    Rule { when: &[Charge(Ch::Critical)], then: PriorityLevel::Critical },
    Rule { when: &[Charge(Ch::Low), Distance(StationDistance::Far)], then: PriorityLevel::Critical },
    Rule { when: &[Charge(Ch::Low), W(Workload::Heavy)], then: PriorityLevel::High },
    Rule { when: &[Charge(Ch::Low), P(Pace::Slow)], then: PriorityLevel::High },
    Rule {
        when: &[Charge(Ch::Medium), W(Workload::Heavy), P(Pace::Slow)],
        then: PriorityLevel::High,
    },
    Rule { when: &[Charge(Ch::Medium), W(Workload::Moderate)], then: PriorityLevel::Medium },
    Rule { when: &[Charge(Ch::Medium), Distance(StationDistance::Near)], then: PriorityLevel::Medium },
    Rule {
        when: &[Charge(Ch::Low), W(Workload::Light), P(Pace::Fast)],
        then: PriorityLevel::Medium,
    },
    Rule { when: &[Charge(Ch::High), W(Workload::Light)], then: PriorityLevel::Low },
    Rule {
        when: &[Charge(Ch::Medium), P(Pace::Fast), W(Workload::Light)],
        then: PriorityLevel::Low,
    },
    Rule { when: &[Charge(Ch::High), P(Pace::Fast)], then: PriorityLevel::Low },
    Rule { when: &[Charge(Ch::Full)], then: PriorityLevel::VeryLow },
    Rule {
        when: &[Charge(Ch::High), W(Workload::Light), P(Pace::Fast)],
        then: PriorityLevel::VeryLow,
    },
];

/// Single-clause rules so every charge level fires on its own. Without them
/// some mid-charge inputs fire nothing and fall through to the table.
#[rustfmt::skip]
pub static COVERAGE_RULES: [Rule; 3] = [
    Rule { when: &[Charge(Ch::Low)], then: PriorityLevel::High },
    Rule { when: &[Charge(Ch::Medium)], then: PriorityLevel::Medium },
    Rule { when: &[Charge(Ch::High)], then: PriorityLevel::Low },
];

/// Score band of a crisp priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PriorityBand {
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityBand {
    pub fn of(score: f64) -> Self {
        if score >= 8.5 {
            PriorityBand::Critical
        } else if score >= 6.0 {
            PriorityBand::High
        } else if score >= 3.5 {
            PriorityBand::Medium
        } else {
            PriorityBand::Low
        }
    }
}

/// Which strategy an advisor uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Fuzzy,
    ThresholdTable,
}

/// Maps charging inputs to a 0–10 priority.
pub trait ChargingPriorityStrategy: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;
    fn priority(&self, inputs: &ChargingInputs) -> f64;
}

/// Crisp table keyed on battery charge, with a slow-robot bump.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdTable;

impl ChargingPriorityStrategy for ThresholdTable {
    fn name(&self) -> &'static str {
        "threshold_table"
    }

    fn priority(&self, inputs: &ChargingInputs) -> f64 {
        let charge = inputs.charge;
        if charge < 15.0 {
            10.0
        } else if charge < 25.0 && inputs.velocity < 15.0 {
            9.0
        } else if charge < 35.0 {
            7.5
        } else if charge < 60.0 {
            4.5
        } else if charge < 75.0 {
            2.5
        } else {
            1.0
        }
    }
}

/// Mamdani inference over [`BASE_RULES`] and [`COVERAGE_RULES`] with
/// centroid defuzzification.
#[derive(Debug, Clone, Copy)]
pub struct FuzzyInference {
    /// Sampling step over the output universe.
    step: f64,
    coverage: bool,
}

impl Default for FuzzyInference {
    fn default() -> Self {
        Self {
            step: 0.05,
            coverage: true,
        }
    }
}

impl FuzzyInference {
    /// Inference over [`BASE_RULES`] alone.
    pub fn base_rules_only() -> Self {
        Self {
            coverage: false,
            ..Self::default()
        }
    }

    fn rules(&self) -> impl Iterator<Item = &'static Rule> {
        let coverage: &'static [Rule] = if self.coverage { &COVERAGE_RULES } else { &[] };
        BASE_RULES.iter().chain(coverage)
    }

    /// Strongest activation per output term.
    pub fn activations(&self, f: &Fuzzified) -> [f64; 5] {
        let mut out = [0.0_f64; 5];
        for rule in self.rules() {
            let i = rule.then.index();
            out[i] = out[i].max(rule.strength(f));
        }
        out
    }

    /// Centroid of the clipped, max-combined output set. `None` when no rule
    /// fired at all.
    pub fn defuzzify(&self, activations: &[f64; 5]) -> Option<f64> {
        let samples = (MAX_PRIORITY / self.step).round() as usize;
        let mut area = 0.0;
        let mut moment = 0.0;
        for i in 0..=samples {
            let y = i as f64 * self.step;
            let mu = PriorityLevel::ALL
                .iter()
                .map(|level| activations[level.index()].min(level.membership().degree(y)))
                .fold(0.0, f64::max);
            area += mu;
            moment += mu * y;
        }
        (area > f64::EPSILON).then(|| moment / area)
    }
}

impl ChargingPriorityStrategy for FuzzyInference {
    fn name(&self) -> &'static str {
        "fuzzy"
    }

    fn priority(&self, inputs: &ChargingInputs) -> f64 {
        let fuzzified = Fuzzified::of(inputs);
        match self.defuzzify(&self.activations(&fuzzified)) {
            Some(score) => score,
            None => {
                log::debug!("no charging rule fired for {inputs:?}, using threshold table");
                ThresholdTable.priority(inputs)
            }
        }
    }
}

/// Strategy plus the preemption threshold.
#[derive(Debug)]
pub struct ChargingAdvisor {
    strategy: Box<dyn ChargingPriorityStrategy>,
    critical_threshold: f64,
}

impl ChargingAdvisor {
    pub fn new(kind: StrategyKind, critical_threshold: f64) -> Self {
        let strategy: Box<dyn ChargingPriorityStrategy> = match kind {
            StrategyKind::Fuzzy => Box::new(FuzzyInference::default()),
            StrategyKind::ThresholdTable => Box::new(ThresholdTable),
        };
        Self::with_strategy(strategy, critical_threshold)
    }

    pub fn with_strategy(
        strategy: Box<dyn ChargingPriorityStrategy>,
        critical_threshold: f64,
    ) -> Self {
        Self {
            strategy,
            critical_threshold,
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn critical_threshold(&self) -> f64 {
        self.critical_threshold
    }

    /// Priority in `[0, 10]`. An empty battery is always `10.0`.
    pub fn priority(&self, inputs: &ChargingInputs) -> f64 {
        if inputs.charge <= 0.0 {
            return MAX_PRIORITY;
        }
        self.strategy
            .priority(&inputs.clamped())
            .clamp(0.0, MAX_PRIORITY)
    }

    pub fn band(&self, inputs: &ChargingInputs) -> PriorityBand {
        PriorityBand::of(self.priority(inputs))
    }

    /// Whether the robot should drop its work and go charge.
    pub fn must_charge(&self, inputs: &ChargingInputs) -> bool {
        self.priority(inputs) >= self.critical_threshold
    }
}
