//! Ordered heuristic rules over a feature vector; the first full match wins.

use super::{bounded_confidence, ThreatType, Verdict};
use crate::config::RuleConfig;
use crate::features::{Feature, FeatureVector};

/// Quantity a condition looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measure {
    Feature(Feature),
    /// |src_ip_entropy - dst_ip_entropy|
    EntropyAsymmetry,
}

impl Measure {
    pub fn observe(self, fv: &FeatureVector) -> f64 {
        match self {
            Measure::Feature(f) => fv[f],
            Measure::EntropyAsymmetry => {
                (fv[Feature::SrcIpEntropy] - fv[Feature::DstIpEntropy]).abs()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    AtLeast(f64),
    AtMost(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Condition {
    pub measure: Measure,
    pub bound: Bound,
}

impl Condition {
    pub fn at_least(measure: Measure, threshold: f64) -> Self {
        Self {
            measure,
            bound: Bound::AtLeast(threshold),
        }
    }

    pub fn at_most(measure: Measure, threshold: f64) -> Self {
        Self {
            measure,
            bound: Bound::AtMost(threshold),
        }
    }

    pub fn holds(&self, fv: &FeatureVector) -> bool {
        let v = self.measure.observe(fv);
        match self.bound {
            Bound::AtLeast(t) => v >= t,
            Bound::AtMost(t) => v <= t,
        }
    }

    /// How close the observation is to satisfying the bound, in `[0, 1]`.
    fn closeness(&self, fv: &FeatureVector) -> f64 {
        let v = self.measure.observe(fv);
        let c = match self.bound {
            Bound::AtLeast(t) if t <= 0.0 => 1.0,
            Bound::AtLeast(t) => v / t,
            Bound::AtMost(t) if v <= t => 1.0,
            Bound::AtMost(t) => t.max(0.0) / v,
        };
        bounded_confidence(c)
    }
}

/// A named threat with its conditions; the first condition is the primary
/// measure used for confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub threat: ThreatType,
    pub conditions: Vec<Condition>,
}

impl Rule {
    pub fn matches(&self, fv: &FeatureVector) -> bool {
        !self.conditions.is_empty() && self.conditions.iter().all(|c| c.holds(fv))
    }

    /// Confidence of a match: 0.5 at the threshold, approaching 1 as the
    /// primary measure grows past it.
    fn match_confidence(&self, fv: &FeatureVector) -> f64 {
        let Some(primary) = self.conditions.first() else {
            return 0.0;
        };
        let v = primary.measure.observe(fv);
        let c = match primary.bound {
            Bound::AtLeast(t) if t <= 0.0 || v <= 0.0 => 1.0,
            Bound::AtLeast(t) => 0.5 + 0.5 * (1.0 - t / v),
            Bound::AtMost(_) => 0.5,
        };
        bounded_confidence(c)
    }

    fn closeness(&self, fv: &FeatureVector) -> f64 {
        self.conditions
            .iter()
            .map(|c| c.closeness(fv))
            .fold(1.0, f64::min)
    }
}

pub struct RuleBasedClassifier {
    rules: Vec<Rule>,
}

impl RuleBasedClassifier {
    pub fn new(config: &RuleConfig) -> Self {
        let rules = vec![
            Rule {
                threat: ThreatType::PortScan,
                conditions: vec![
                    Condition::at_least(
                        Measure::Feature(Feature::UniqueDstPorts),
                        config.port_scan_min_ports as f64,
                    ),
                    Condition::at_least(
                        Measure::Feature(Feature::TotalPackets),
                        config.port_scan_min_packets as f64,
                    ),
                ],
            },
            Rule {
                threat: ThreatType::DdosAttack,
                conditions: vec![
                    Condition::at_least(
                        Measure::Feature(Feature::PacketsPerSecond),
                        config.ddos_min_pps,
                    ),
                    Condition::at_least(
                        Measure::Feature(Feature::TotalPackets),
                        config.ddos_min_packets as f64,
                    ),
                    Condition::at_least(
                        Measure::Feature(Feature::TopSrcIpRatio),
                        config.ddos_min_top_src_ratio,
                    ),
                ],
            },
            Rule {
                threat: ThreatType::MalwareDetected,
                conditions: vec![Condition::at_least(
                    Measure::Feature(Feature::SuspiciousPortPackets),
                    config.malware_min_packets as f64,
                )],
            },
            Rule {
                threat: ThreatType::DataExfiltration,
                conditions: vec![
                    Condition::at_least(Measure::EntropyAsymmetry, config.exfil_entropy_delta),
                    Condition::at_least(
                        Measure::Feature(Feature::TotalBytes),
                        config.exfil_min_bytes as f64,
                    ),
                ],
            },
        ];
        Self::with_rules(rules)
    }

    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn predict(&self, fv: &FeatureVector) -> Verdict {
        if let Some(rule) = self.rules.iter().find(|r| r.matches(fv)) {
            return Verdict::new(rule.threat, rule.match_confidence(fv));
        }
        let closest = self
            .rules
            .iter()
            .map(|r| r.closeness(fv))
            .fold(0.0, f64::max);
        Verdict::new(ThreatType::Normal, 1.0 - closest)
    }
}
