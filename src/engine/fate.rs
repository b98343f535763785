//! Fate cards: arming, choice dispatch, and round-end resolution of staged
//! effects.
//!
//! | Kind             | Applied at        | Target                       |
//! |------------------|-------------------|------------------------------|
//! | IMMEDIATE_SCORE  | resolution        | global score bonus           |
//! | SCORE            | choice            | round score                  |
//! | POWER_UP         | choice            | active power-ups             |
//! | APPLY_WAGER      | resolution        | round bank delta             |
//! | TALLY_TABLE      | resolution        | bank multiplier / global     |
//! | ROUND_PREDICTION | resolution        | bank multiplier              |
//! | ROUND_MODIFIER   | resolution        | global score bonus (if won)  |
//! | ROUND_START      | next round start  | starting thread              |
//!
//! Unrecognized kinds are staged as raw JSON and ignored at resolution.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::GameConfig;
use crate::content::{FateCard, FateChoice};
use crate::error::EngineError;
use crate::logging::{self, obj, v_int, v_str, Domain};

use super::state::{EffectTag, GameState, Phase, Slot, StatePatch, Tally};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reward {
    Score { value: i64 },
    DoubleRoundScore,
    /// Reward kind this build does not know; pays nothing
    #[serde(other)]
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FateEffect {
    ImmediateScore {
        value: i64,
    },
    Score {
        value: i64,
    },
    PowerUp {
        power: String,
    },
    ApplyWager {
        target: Slot,
        reward: Reward,
    },
    /// Keyed by the decimal tally count
    TallyTable {
        target: Slot,
        #[serde(default)]
        table: BTreeMap<String, Reward>,
    },
    RoundPrediction {
        #[serde(alias = "predict")]
        prediction: Slot,
    },
    RoundModifier {
        #[serde(default)]
        modifier: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reward: Option<Reward>,
    },
    RoundStart {
        #[serde(rename = "threadDelta", default)]
        thread_delta: i64,
    },
}

impl FateEffect {
    pub fn kind(&self) -> &'static str {
        match self {
            FateEffect::ImmediateScore { .. } => "IMMEDIATE_SCORE",
            FateEffect::Score { .. } => "SCORE",
            FateEffect::PowerUp { .. } => "POWER_UP",
            FateEffect::ApplyWager { .. } => "APPLY_WAGER",
            FateEffect::TallyTable { .. } => "TALLY_TABLE",
            FateEffect::RoundPrediction { .. } => "ROUND_PREDICTION",
            FateEffect::RoundModifier { .. } => "ROUND_MODIFIER",
            FateEffect::RoundStart { .. } => "ROUND_START",
        }
    }

    fn note(&self) -> String {
        match self {
            FateEffect::ImmediateScore { value } => format!("+{} now", value),
            FateEffect::Score { value } => format!("{:+} to round", value),
            FateEffect::PowerUp { power } => power.clone(),
            FateEffect::ApplyWager { target, reward } => match reward {
                Reward::Score { value } => format!("+{} per {}", value, target.as_str()),
                Reward::DoubleRoundScore => format!("x2 per {}", target.as_str()),
                Reward::Unrecognized => format!("wager on {}", target.as_str()),
            },
            FateEffect::TallyTable { .. } => "tally rule".to_string(),
            FateEffect::RoundPrediction { prediction } => format!("predict {}", prediction.as_str()),
            FateEffect::RoundModifier { modifier, .. } => modifier.to_uppercase(),
            FateEffect::RoundStart { thread_delta } => format!("thread {:+}", thread_delta),
        }
    }
}

/// Either an effect this build understands or the raw record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Effect {
    Known(FateEffect),
    Unrecognized(Value),
}

impl Effect {
    pub fn kind(&self) -> String {
        match self {
            Effect::Known(e) => e.kind().to_string(),
            Effect::Unrecognized(raw) => raw
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("EFFECT")
                .to_string(),
        }
    }
}

/// A choice may carry one effect or several.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EffectSpec {
    Many(Vec<Effect>),
    One(Effect),
}

impl EffectSpec {
    pub fn effects(&self) -> Vec<&Effect> {
        match self {
            EffectSpec::Many(list) => list.iter().collect(),
            EffectSpec::One(e) => vec![e],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StagedEffect {
    pub effect: Effect,
    pub card_title: String,
}

/// Scratch state between a Fate choice and round resolution. Held by the
/// session, handed to `resolve_round`, empty afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeferredEffectBuffer {
    immediate_score: i64,
    staged: Vec<StagedEffect>,
}

impl DeferredEffectBuffer {
    pub fn is_empty(&self) -> bool {
        self.immediate_score == 0 && self.staged.is_empty()
    }

    pub fn immediate_score(&self) -> i64 {
        self.immediate_score
    }

    pub fn staged(&self) -> &[StagedEffect] {
        &self.staged
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FateResolution {
    pub global_score_delta: i64,
    pub round_score_delta: i64,
    pub round_score_multiplier: u32,
}

impl Default for FateResolution {
    fn default() -> Self {
        Self {
            global_score_delta: 0,
            round_score_delta: 0,
            round_score_multiplier: 1,
        }
    }
}

// =============================================================================
// Deck and arming
// =============================================================================

/// Uniform pick among cards not yet completed and unlocked by audacity.
pub fn draw_fate_card<'a, R: Rng + ?Sized>(
    deck: &'a [FateCard],
    completed: &BTreeSet<String>,
    audacity: u32,
    rng: &mut R,
) -> Option<&'a FateCard> {
    let open: Vec<&FateCard> = deck
        .iter()
        .filter(|c| !completed.contains(&c.id) && c.audacity_min <= audacity)
        .collect();
    open.choose(rng).copied()
}

/// Pad 1..3 choices to exactly three slots.
pub fn normalize_choices(card: &FateCard) -> [Option<FateChoice>; 3] {
    let mut out: [Option<FateChoice>; 3] = [None, None, None];
    for (slot, choice) in out.iter_mut().zip(card.choices.iter()) {
        *slot = Some(choice.clone());
    }
    out
}

pub fn arm_fate(state: &GameState, card: &FateCard) -> Result<StatePatch, EngineError> {
    if let Some(active) = &state.active_fate_card {
        return Err(EngineError::InvariantViolation(format!(
            "card {} armed while {} is unresolved",
            card.id, active.id
        )));
    }
    if !state.round.active_round_effects.is_empty() {
        return Err(EngineError::InvariantViolation(format!(
            "card {} armed but this round already has a Fate effect",
            card.id
        )));
    }
    if state.completed_fate_ids.contains(&card.id) {
        return Err(EngineError::InvariantViolation(format!("card {} already completed", card.id)));
    }
    if card.choices.is_empty() {
        return Err(EngineError::missing("arm_fate", format!("card {} has no choices", card.id)));
    }
    if !matches!(state.phase, Phase::Lobby | Phase::Active) {
        return Err(EngineError::InvariantViolation(format!(
            "card {} armed during {:?}",
            card.id, state.phase
        )));
    }

    Ok(StatePatch {
        phase: Some(Phase::Fate),
        resume_phase: Some(Some(state.phase)),
        active_fate_card: Some(Some(card.clone())),
        fate_choices: Some(normalize_choices(card)),
        ..Default::default()
    })
}

// =============================================================================
// Choice dispatch
// =============================================================================

fn push_tag(tags: &mut Vec<EffectTag>, kind: &str, card_title: &str, note: String) {
    if !tags.iter().any(|t| t.card_title == card_title) {
        tags.push(EffectTag {
            kind: kind.to_string(),
            card_title: card_title.to_string(),
            note,
        });
    }
}

/// Apply the chosen option of the armed card. Instant effects land in the
/// returned patch, deferred ones in `buffer`. The card is consumed either way.
pub fn apply_choice(
    state: &GameState,
    buffer: &mut DeferredEffectBuffer,
    choice_index: usize,
) -> Result<StatePatch, EngineError> {
    let card = state
        .active_fate_card
        .as_ref()
        .ok_or_else(|| EngineError::missing("apply_fate_choice", "no armed card"))?;
    let choice = state
        .fate_choices
        .get(choice_index)
        .and_then(|c| c.as_ref())
        .ok_or_else(|| {
            EngineError::missing("apply_fate_choice", format!("card {} has no choice at {}", card.id, choice_index))
        })?;

    let mut round = state.round.clone();
    let mut power_ups = state.active_power_ups.clone();
    let mut thread_bonus = state.pending_thread_bonus;
    let mut staged = Vec::new();
    let mut immediate = 0i64;

    let effects = choice.effect.as_ref().map(|s| s.effects()).unwrap_or_default();
    for effect in &effects {
        let known = match effect {
            Effect::Known(e) => e,
            Effect::Unrecognized(_) => {
                let kind = effect.kind();
                let err = EngineError::UnknownEffectKind(kind.clone());
                logging::warn(
                    Domain::Fate,
                    "effect_unknown",
                    obj(&[("card", v_str(&card.id)), ("kind", v_str(&kind)), ("msg", v_str(&err.to_string()))]),
                );
                staged.push(StagedEffect {
                    effect: (*effect).clone(),
                    card_title: card.title.clone(),
                });
                push_tag(&mut round.active_round_effects, &kind, &card.title, String::new());
                continue;
            }
        };

        match known {
            FateEffect::ImmediateScore { value } => immediate += value,
            FateEffect::Score { value } => round.round_score = (round.round_score + value).max(0),
            FateEffect::PowerUp { power } => power_ups.push(power.clone()),
            FateEffect::RoundStart { thread_delta } => thread_bonus += thread_delta,
            FateEffect::ApplyWager { .. }
            | FateEffect::TallyTable { .. }
            | FateEffect::RoundPrediction { .. }
            | FateEffect::RoundModifier { .. } => staged.push(StagedEffect {
                effect: (*effect).clone(),
                card_title: card.title.clone(),
            }),
        }
        push_tag(&mut round.active_round_effects, known.kind(), &card.title, known.note());
    }

    buffer.immediate_score += immediate;
    buffer.staged.extend(staged);

    let mut completed = state.completed_fate_ids.clone();
    completed.insert(card.id.clone());

    logging::info(
        Domain::Fate,
        "fate_choice",
        obj(&[
            ("card", v_str(&card.id)),
            ("choice", v_str(&choice.label)),
            ("effects", v_int(effects.len() as i64)),
            ("staged", v_int(buffer.staged.len() as i64)),
        ]),
    );

    let audacity = if effects.is_empty() { state.audacity } else { state.audacity + 1 };

    Ok(StatePatch {
        phase: Some(state.resume_phase.unwrap_or(Phase::Lobby)),
        resume_phase: Some(None),
        round: Some(round),
        active_power_ups: Some(power_ups),
        pending_thread_bonus: Some(thread_bonus),
        completed_fate_ids: Some(completed),
        audacity: Some(audacity),
        active_fate_card: Some(None),
        fate_choices: Some([None, None, None]),
        ..Default::default()
    })
}

// =============================================================================
// Resolution
// =============================================================================

/// Fold staged effects in arming order against the round tally. The
/// buffer is empty when this returns.
pub fn resolve_round(
    buffer: &mut DeferredEffectBuffer,
    tally: &Tally,
    won: bool,
    cfg: &GameConfig,
) -> FateResolution {
    let scratch = std::mem::take(buffer);
    let mut res = FateResolution {
        global_score_delta: scratch.immediate_score,
        ..Default::default()
    };

    for staged in &scratch.staged {
        let effect = match &staged.effect {
            Effect::Known(e) => e,
            Effect::Unrecognized(_) => {
                logging::debug(
                    Domain::Fate,
                    "effect_skipped",
                    obj(&[("kind", v_str(&staged.effect.kind())), ("card", v_str(&staged.card_title))]),
                );
                continue;
            }
        };

        match effect {
            FateEffect::ApplyWager { target, reward } => {
                if let Reward::Score { value } = reward {
                    res.round_score_delta += value * tally.get(*target) as i64;
                }
            }
            FateEffect::TallyTable { target, table } => {
                match table.get(&tally.get(*target).to_string()) {
                    Some(Reward::DoubleRoundScore) => res.round_score_multiplier *= 2,
                    Some(Reward::Score { value }) => res.global_score_delta += value,
                    Some(Reward::Unrecognized) | None => {}
                }
            }
            FateEffect::RoundPrediction { prediction } => {
                if tally.leaders().contains(prediction) {
                    res.round_score_multiplier *= 2;
                }
            }
            FateEffect::RoundModifier { reward, .. } => {
                if won {
                    res.global_score_delta += match reward {
                        Some(Reward::Score { value }) => *value,
                        _ => cfg.modifier_bonus,
                    };
                }
            }
            // applied on choice or at round start; nothing left to fold
            FateEffect::ImmediateScore { .. }
            | FateEffect::Score { .. }
            | FateEffect::PowerUp { .. }
            | FateEffect::RoundStart { .. } => {}
        }
    }

    logging::info(
        Domain::Fate,
        "fate_resolved",
        obj(&[
            ("staged", v_int(scratch.staged.len() as i64)),
            ("global_delta", v_int(res.global_score_delta)),
            ("round_delta", v_int(res.round_score_delta)),
            ("multiplier", v_int(res.round_score_multiplier as i64)),
        ]),
    );

    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use serde_json::json;

    fn effect(v: Value) -> Effect {
        serde_json::from_value(v).unwrap()
    }

    fn stage(buffer: &mut DeferredEffectBuffer, v: Value) {
        buffer.staged.push(StagedEffect {
            effect: effect(v),
            card_title: "test".to_string(),
        });
    }

    fn card(id: &str, choices: Value) -> FateCard {
        serde_json::from_value(json!({"id": id, "title": format!("Card {}", id), "choices": choices})).unwrap()
    }

    fn armed(card: &FateCard) -> GameState {
        let mut state = GameState::new(&GameConfig::default());
        arm_fate(&state, card).unwrap().apply(&mut state);
        state
    }

    #[test]
    fn test_parse_known_and_unknown_effects() {
        let e = effect(json!({"type": "APPLY_WAGER", "target": "answer-c", "reward": {"type": "SCORE", "value": 1}}));
        assert_eq!(
            e,
            Effect::Known(FateEffect::ApplyWager {
                target: Slot::C,
                reward: Reward::Score { value: 1 }
            })
        );
        let e = effect(json!({"type": "ROUND_PREDICTION", "predict": "b"}));
        assert_eq!(e, Effect::Known(FateEffect::RoundPrediction { prediction: Slot::B }));

        let e = effect(json!({"type": "SUMMON_MOTH", "wings": 2}));
        assert!(matches!(e, Effect::Unrecognized(_)));
        assert_eq!(e.kind(), "SUMMON_MOTH");
    }

    #[test]
    fn test_resolve_empty_is_identity() {
        let mut buffer = DeferredEffectBuffer::default();
        let res = resolve_round(&mut buffer, &Tally::default(), true, &GameConfig::default());
        assert_eq!(res, FateResolution::default());
        assert_eq!(
            res,
            FateResolution {
                global_score_delta: 0,
                round_score_delta: 0,
                round_score_multiplier: 1
            }
        );
    }

    #[test]
    fn test_wager_scales_with_tally() {
        let mut buffer = DeferredEffectBuffer::default();
        stage(&mut buffer, json!({"type": "APPLY_WAGER", "target": "A", "reward": {"type": "SCORE", "value": 1}}));
        let res = resolve_round(&mut buffer, &Tally::new(2, 1, 0), false, &GameConfig::default());
        assert_eq!(res.round_score_delta, 2);
    }

    #[test]
    fn test_tally_table_lookup() {
        let table = json!({"type": "TALLY_TABLE", "target": "C", "table": {"0": {"type": "DOUBLE_ROUND_SCORE"}}});
        let cfg = GameConfig::default();

        let mut buffer = DeferredEffectBuffer::default();
        stage(&mut buffer, table.clone());
        let res = resolve_round(&mut buffer, &Tally::new(3, 0, 0), false, &cfg);
        assert_eq!(res.round_score_multiplier, 2);

        stage(&mut buffer, table);
        let res = resolve_round(&mut buffer, &Tally::new(3, 0, 1), false, &cfg);
        assert_eq!(res, FateResolution::default());
    }

    #[test]
    fn test_tally_table_skips_unknown_reward_only() {
        let raw = json!({"type": "TALLY_TABLE", "target": "C", "table": {
            "0": {"type": "DOUBLE_ROUND_SCORE"},
            "1": {"type": "SUMMON_MOTH", "wings": 2}
        }});
        let parsed = effect(raw.clone());
        assert!(matches!(parsed, Effect::Known(FateEffect::TallyTable { .. })));

        let cfg = GameConfig::default();
        let mut buffer = DeferredEffectBuffer::default();
        stage(&mut buffer, raw.clone());
        assert_eq!(resolve_round(&mut buffer, &Tally::new(1, 1, 0), false, &cfg).round_score_multiplier, 2);

        stage(&mut buffer, raw);
        assert_eq!(resolve_round(&mut buffer, &Tally::new(1, 1, 1), false, &cfg), FateResolution::default());
    }

    #[test]
    fn test_tally_table_score_goes_global() {
        let mut buffer = DeferredEffectBuffer::default();
        stage(
            &mut buffer,
            json!({"type": "TALLY_TABLE", "target": "B", "table": {"2": {"type": "SCORE", "value": 5}}}),
        );
        let res = resolve_round(&mut buffer, &Tally::new(0, 2, 0), false, &GameConfig::default());
        assert_eq!(res.global_score_delta, 5);
        assert_eq!(res.round_score_multiplier, 1);
    }

    #[test]
    fn test_prediction_tie_rule() {
        let cfg = GameConfig::default();
        let tally = Tally::new(2, 2, 1);

        let mut buffer = DeferredEffectBuffer::default();
        stage(&mut buffer, json!({"type": "ROUND_PREDICTION", "prediction": "B"}));
        assert_eq!(resolve_round(&mut buffer, &tally, false, &cfg).round_score_multiplier, 2);

        stage(&mut buffer, json!({"type": "ROUND_PREDICTION", "prediction": "C"}));
        assert_eq!(resolve_round(&mut buffer, &tally, false, &cfg).round_score_multiplier, 1);
    }

    #[test]
    fn test_multipliers_compound_in_order() {
        let mut buffer = DeferredEffectBuffer::default();
        stage(&mut buffer, json!({"type": "ROUND_PREDICTION", "prediction": "A"}));
        stage(&mut buffer, json!({"type": "TALLY_TABLE", "target": "C", "table": {"0": {"type": "DOUBLE_ROUND_SCORE"}}}));
        let res = resolve_round(&mut buffer, &Tally::new(1, 0, 0), false, &GameConfig::default());
        assert_eq!(res.round_score_multiplier, 4);
    }

    #[test]
    fn test_modifier_pays_only_when_won() {
        let cfg = GameConfig::default();
        let mut buffer = DeferredEffectBuffer::default();
        stage(&mut buffer, json!({"type": "ROUND_MODIFIER", "modifier": "VEIL"}));
        assert_eq!(resolve_round(&mut buffer, &Tally::default(), true, &cfg).global_score_delta, 3);

        stage(&mut buffer, json!({"type": "ROUND_MODIFIER", "modifier": "VEIL"}));
        assert_eq!(resolve_round(&mut buffer, &Tally::default(), false, &cfg).global_score_delta, 0);

        stage(
            &mut buffer,
            json!({"type": "ROUND_MODIFIER", "modifier": "WEIGHT", "reward": {"type": "SCORE", "value": 7}}),
        );
        assert_eq!(resolve_round(&mut buffer, &Tally::default(), true, &cfg).global_score_delta, 7);
    }

    #[test]
    fn test_unknown_effect_is_noop_and_buffer_empties() {
        let mut buffer = DeferredEffectBuffer::default();
        buffer.immediate_score = 4;
        stage(&mut buffer, json!({"type": "SUMMON_MOTH"}));
        let res = resolve_round(&mut buffer, &Tally::new(1, 1, 1), true, &GameConfig::default());
        assert_eq!(res.global_score_delta, 4);
        assert_eq!(res.round_score_multiplier, 1);
        assert!(buffer.is_empty());
        assert_eq!(buffer.immediate_score(), 0);
        assert!(buffer.staged().is_empty());
    }

    #[test]
    fn test_normalize_pads_to_three() {
        let c = card("X", json!([{"label": "Only"}]));
        let choices = normalize_choices(&c);
        assert_eq!(choices[0].as_ref().unwrap().label, "Only");
        assert!(choices[1].is_none() && choices[2].is_none());
    }

    #[test]
    fn test_arm_second_card_is_invariant_violation() {
        let first = card("A1", json!([{"label": "x"}]));
        let second = card("A2", json!([{"label": "y"}]));
        let state = armed(&first);
        let err = arm_fate(&state, &second).unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation(_)));
    }

    #[test]
    fn test_arm_blocked_once_round_has_effect() {
        let mut state = GameState::new(&GameConfig::default());
        state.round.active_round_effects.push(EffectTag {
            kind: "SCORE".to_string(),
            card_title: "Earlier".to_string(),
            note: String::new(),
        });
        let err = arm_fate(&state, &card("B", json!([{"label": "x"}]))).unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation(_)));
    }

    #[test]
    fn test_apply_choice_without_card_is_missing_context() {
        let state = GameState::new(&GameConfig::default());
        let mut buffer = DeferredEffectBuffer::default();
        let err = apply_choice(&state, &mut buffer, 0).unwrap_err();
        assert!(matches!(err, EngineError::MissingContext { .. }));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_apply_padded_slot_is_missing_context() {
        let c = card("P", json!([{"label": "Only"}]));
        let state = armed(&c);
        let mut buffer = DeferredEffectBuffer::default();
        assert!(apply_choice(&state, &mut buffer, 2).is_err());
        assert!(state.active_fate_card.is_some());
    }

    #[test]
    fn test_ignore_choice_consumes_card() {
        let c = card("IGN", json!([{"label": "Ignore"}]));
        let mut state = armed(&c);
        let mut buffer = DeferredEffectBuffer::default();
        apply_choice(&state, &mut buffer, 0).unwrap().apply(&mut state);
        assert!(state.completed_fate_ids.contains("IGN"));
        assert!(state.active_fate_card.is_none());
        assert!(state.round.active_round_effects.is_empty());
        assert!(buffer.is_empty());
        assert_eq!(state.phase, Phase::Lobby);
        assert_eq!(state.audacity, 0);
    }

    #[test]
    fn test_instant_and_staged_dispatch() {
        let c = card(
            "MIX",
            json!([{"label": "All", "effect": [
                {"type": "SCORE", "value": 2},
                {"type": "IMMEDIATE_SCORE", "value": 3},
                {"type": "POWER_UP", "power": "REMOVE_WRONG_ANSWER"},
                {"type": "ROUND_START", "threadDelta": 1},
                {"type": "APPLY_WAGER", "target": "A", "reward": {"type": "SCORE", "value": 1}},
                {"type": "MYSTERY"}
            ]}]),
        );
        let mut state = armed(&c);
        let mut buffer = DeferredEffectBuffer::default();
        apply_choice(&state, &mut buffer, 0).unwrap().apply(&mut state);

        assert_eq!(state.round.round_score, 2);
        assert_eq!(state.active_power_ups, vec!["REMOVE_WRONG_ANSWER"]);
        assert_eq!(state.pending_thread_bonus, 1);
        assert_eq!(buffer.immediate_score(), 3);
        assert_eq!(buffer.staged().len(), 2);
        // one HUD tag per card
        assert_eq!(state.round.active_round_effects.len(), 1);
        assert_eq!(state.audacity, 1);
    }

    #[test]
    fn test_negative_score_floors_round_score() {
        let c = card("NEG", json!([{"label": "Turn it down", "effect": {"type": "SCORE", "value": -1}}]));
        let mut state = armed(&c);
        let mut buffer = DeferredEffectBuffer::default();
        apply_choice(&state, &mut buffer, 0).unwrap().apply(&mut state);
        assert_eq!(state.round.round_score, 0);
    }

    #[test]
    fn test_draw_skips_completed_and_locked_cards() {
        let deck = vec![
            card("C1", json!([{"label": "x"}])),
            card("C2", json!([{"label": "x"}])),
            serde_json::from_value::<FateCard>(
                json!({"id": "C3", "title": "Locked", "audacityMin": 2, "choices": [{"label": "x"}]}),
            )
            .unwrap(),
        ];
        let completed: BTreeSet<String> = ["C1".to_string()].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..20 {
            assert_eq!(draw_fate_card(&deck, &completed, 0, &mut rng).unwrap().id, "C2");
        }
        let all: BTreeSet<String> = ["C1", "C2", "C3"].iter().map(|s| s.to_string()).collect();
        assert!(draw_fate_card(&deck, &all, 5, &mut rng).is_none());
    }
}
