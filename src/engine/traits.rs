//! Trait inference: answer outcomes nudge a bounded three-axis vector, and
//! a qualitative read (archetype, routing bias) is derived from it.
//!
//! Axes:
//! - **X** logical style: Analytical (-) to Innovative (+)
//! - **Y** framing: Conventional (-) to Radical (+)
//! - **Z** epistemic: Figurative (-) to Empirical (+)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::content::QuestionId;

use super::question::OutcomeClass;
use super::state::ClassTally;

pub const AXIS_LIMIT: f64 = 9.0;
/// Axis magnitude above which an archetype tag is earned
pub const ARCHETYPE_THRESHOLD: f64 = 3.2;
/// Axis magnitude at which routing starts to lean
pub const ROUTING_THRESHOLD: f64 = 2.0;
/// Confidence below which the narrator stays quiet
pub const INTRUSION_CONFIDENCE: f64 = 0.55;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TraitVector {
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
    #[serde(rename = "Z")]
    pub z: f64,
}

impl TraitVector {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    fn set(&mut self, axis: Axis, value: f64) {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
        }
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Axis-wise add, each axis clamped to [-9, 9] on its own.
    pub fn add_clamped(&self, delta: &TraitVector) -> TraitVector {
        let mut out = *self;
        for axis in Axis::ALL {
            let v = (self.get(axis) + delta.get(axis)).clamp(-AXIS_LIMIT, AXIS_LIMIT);
            out.set(axis, v);
        }
        out
    }
}

/// Base nudge per outcome class, before per-question weighting.
pub fn base_vector(outcome: OutcomeClass) -> TraitVector {
    match outcome {
        // literal, conventional, empirical
        OutcomeClass::Typical => TraitVector::new(-0.4, -0.6, 0.8),
        // lateral, radical, figurative
        OutcomeClass::Revelatory => TraitVector::new(0.8, 0.7, -0.8),
        OutcomeClass::Wrong => TraitVector::new(-0.6, 0.2, -0.2),
    }
}

// =============================================================================
// Per-question axis configuration
// =============================================================================

/// Vector with any subset of axes present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialVector {
    #[serde(rename = "X", default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(rename = "Y", default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(rename = "Z", default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl PartialVector {
    pub fn get(&self, axis: Axis) -> Option<f64> {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassOverrides {
    #[serde(rename = "TYPICAL", alias = "Typical", default, skip_serializing_if = "Option::is_none")]
    pub typical: Option<PartialVector>,
    #[serde(rename = "REVELATORY", alias = "Revelatory", default, skip_serializing_if = "Option::is_none")]
    pub revelatory: Option<PartialVector>,
    #[serde(rename = "WRONG", alias = "Wrong", default, skip_serializing_if = "Option::is_none")]
    pub wrong: Option<PartialVector>,
}

impl ClassOverrides {
    pub fn get(&self, outcome: OutcomeClass) -> Option<&PartialVector> {
        match outcome {
            OutcomeClass::Typical => self.typical.as_ref(),
            OutcomeClass::Revelatory => self.revelatory.as_ref(),
            OutcomeClass::Wrong => self.wrong.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisWeightConfig {
    /// Missing axes weigh 1.0
    #[serde(default)]
    pub axis_weight: PartialVector,
    #[serde(default)]
    pub overrides: ClassOverrides,
    /// Keyed by answer label, so it survives answer shuffling
    #[serde(default)]
    pub overrides_by_answer: BTreeMap<String, PartialVector>,
}

impl AxisWeightConfig {
    /// Per-answer override beats per-class override; the chosen map is
    /// consulted axis by axis, falling back to the weighted base.
    pub fn delta(&self, outcome: OutcomeClass, label: Option<&str>) -> TraitVector {
        let base = base_vector(outcome);
        let chosen = label
            .and_then(|l| self.overrides_by_answer.get(l))
            .or_else(|| self.overrides.get(outcome));

        let mut out = TraitVector::default();
        for axis in Axis::ALL {
            let weighted = base.get(axis) * self.axis_weight.get(axis).unwrap_or(1.0);
            let d = chosen.and_then(|ov| ov.get(axis)).unwrap_or(weighted);
            out.set(axis, d);
        }
        out
    }
}

/// Question id to axis configuration. Unlisted ids use weight 1 everywhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraitLoadings(pub BTreeMap<QuestionId, AxisWeightConfig>);

impl TraitLoadings {
    pub fn get(&self, id: QuestionId) -> Option<&AxisWeightConfig> {
        self.0.get(&id)
    }

    pub fn insert(&mut self, id: QuestionId, cfg: AxisWeightConfig) {
        self.0.insert(id, cfg);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Trait change for one answered question.
    pub fn delta_for(&self, id: QuestionId, outcome: OutcomeClass, label: Option<&str>) -> TraitVector {
        match self.get(id) {
            Some(cfg) => cfg.delta(outcome, label),
            None => base_vector(outcome),
        }
    }

    /// The only way trait vectors move.
    pub fn apply_delta(
        &self,
        traits: &TraitVector,
        id: QuestionId,
        outcome: OutcomeClass,
        label: Option<&str>,
    ) -> TraitVector {
        traits.add_clamped(&self.delta_for(id, outcome, label))
    }
}

// =============================================================================
// Read
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archetype {
    pub name: String,
    pub tags: Vec<String>,
    pub strength: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraitRead {
    pub traits: TraitVector,
    pub answers: u32,
    pub norm: f64,
    pub confidence: f64,
    /// Dominant axis with sign, e.g. `"Z+"`
    pub primary_axis: String,
    pub archetype: Archetype,
    /// Content-group tags the draw should lean toward
    pub routing_bias: Vec<String>,
    pub intrusion: Option<String>,
}

/// Pure; safe to recompute whenever.
pub fn compute_read(traits: &TraitVector, tally: &ClassTally) -> TraitRead {
    let n = tally.total() as f64;
    let norm = traits.norm() / (AXIS_LIMIT * 3f64.sqrt());
    let confidence = norm * (n / (n + 6.0)).sqrt();

    TraitRead {
        traits: *traits,
        answers: tally.total(),
        norm,
        confidence,
        primary_axis: primary_axis(traits),
        archetype: archetype(traits, confidence),
        routing_bias: routing_bias(traits),
        intrusion: intrusion_line(traits, tally, confidence),
    }
}

fn primary_axis(t: &TraitVector) -> String {
    let (ax, ay, az) = (t.x.abs(), t.y.abs(), t.z.abs());
    let axis = if ax >= ay && ax >= az {
        Axis::X
    } else if ay >= az {
        Axis::Y
    } else {
        Axis::Z
    };
    let sign = if t.get(axis) >= 0.0 { '+' } else { '-' };
    format!("{:?}{}", axis, sign)
}

fn archetype(t: &TraitVector, confidence: f64) -> Archetype {
    let mut tags = Vec::new();
    let poles = [
        (t.x, "Innovative", "Analytical"),
        (t.y, "Radical", "Conventional"),
        (t.z, "Empirical", "Figurative"),
    ];
    for (v, pos, neg) in poles {
        if v > ARCHETYPE_THRESHOLD {
            tags.push(pos.to_string());
        } else if v < -ARCHETYPE_THRESHOLD {
            tags.push(neg.to_string());
        }
    }

    let name = match tags.len() {
        0 => "Unresolved Pattern".to_string(),
        1 => format!("The {}", tags[0]),
        2 => format!("The {} {}", tags[0], tags[1]),
        _ => "The Contradiction".to_string(),
    };

    Archetype {
        name,
        tags,
        strength: confidence,
    }
}

fn routing_bias(t: &TraitVector) -> Vec<String> {
    let mut prefer = Vec::new();
    if t.z >= ROUTING_THRESHOLD {
        prefer.push("factual_literal".to_string());
    }
    if t.z <= -ROUTING_THRESHOLD {
        prefer.push("lateral_wordplay".to_string());
        prefer.push("uncanny_perception".to_string());
    }
    if t.y >= ROUTING_THRESHOLD {
        prefer.push("framing_morality".to_string());
    }
    prefer
}

fn intrusion_line(t: &TraitVector, tally: &ClassTally, confidence: f64) -> Option<String> {
    if confidence < INTRUSION_CONFIDENCE {
        return None;
    }
    let line = if t.z >= 3.0 && t.x <= -1.0 {
        "You're measuring the doorframe again. You will fit."
    } else if t.z <= -3.0 && t.x >= 2.0 {
        "You never answer the question asked. That's why you're interesting."
    } else if t.y >= 3.0 {
        "One of you keeps tugging the plan sideways. They're usually right, at first."
    } else if tally.wrong >= 3 && tally.total() >= 6 {
        "Stop performing for each other. I already know."
    } else {
        return None;
    };
    Some(line.to_string())
}
