//! Question draws and answer evaluation.

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::GameConfig;
use crate::content::{Question, QuestionId};
use crate::error::EngineError;

use super::state::{DifficultyState, GameState, Phase, Reveal, Slot, StatePatch};
use super::traits::{TraitLoadings, TraitVector};

/// Points doubled by a primed Weave
pub const WEAVE_MULTIPLIER: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeClass {
    #[serde(alias = "Typical")]
    Typical,
    #[serde(alias = "Revelatory")]
    Revelatory,
    #[serde(alias = "Wrong")]
    Wrong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeEffect {
    pub points: i64,
    pub thread_delta: i64,
}

impl OutcomeClass {
    pub fn effect(self) -> OutcomeEffect {
        match self {
            OutcomeClass::Typical => OutcomeEffect { points: 2, thread_delta: 0 },
            OutcomeClass::Revelatory => OutcomeEffect { points: 1, thread_delta: 1 },
            OutcomeClass::Wrong => OutcomeEffect { points: 0, thread_delta: -1 },
        }
    }

    pub fn is_wrong(self) -> bool {
        matches!(self, OutcomeClass::Wrong)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeClass::Typical => "TYPICAL",
            OutcomeClass::Revelatory => "REVELATORY",
            OutcomeClass::Wrong => "WRONG",
        }
    }
}

// =============================================================================
// Draw
// =============================================================================

#[derive(Debug, Clone)]
pub struct DrawOutcome {
    /// Question with answers in display order
    pub question: Question,
    /// Every id had been answered; the exclusion set starts over
    pub exclusions_reset: bool,
}

/// Draw inputs that come from session state.
#[derive(Debug, Clone, Copy)]
pub struct DrawContext<'a> {
    pub level: u8,
    pub excluded: &'a BTreeSet<QuestionId>,
    pub bias: &'a [String],
    pub tier_seen: &'a BTreeMap<u8, u32>,
}

/// Candidates at or below `level`, widening upward until something is left.
fn eligible<'a>(pool: &'a [Question], level: u8, excluded: &BTreeSet<QuestionId>) -> Vec<&'a Question> {
    let max_tier = pool.iter().map(|q| q.tier).max().unwrap_or(level);
    let mut ceiling = level;
    loop {
        let found: Vec<&Question> = pool
            .iter()
            .filter(|q| q.tier <= ceiling && !excluded.contains(&q.id))
            .collect();
        if !found.is_empty() || ceiling >= max_tier {
            return found;
        }
        ceiling += 1;
    }
}

pub fn draw<R: Rng + ?Sized>(
    pool: &[Question],
    ctx: DrawContext<'_>,
    cfg: &GameConfig,
    rng: &mut R,
) -> Option<DrawOutcome> {
    if pool.is_empty() {
        return None;
    }

    let mut exclusions_reset = false;
    let mut candidates = eligible(pool, ctx.level, ctx.excluded);
    if candidates.is_empty() {
        exclusions_reset = true;
        candidates = eligible(pool, ctx.level, &BTreeSet::new());
    }

    let picked = pick(&candidates, ctx, cfg, rng)?;
    let mut question = picked.clone();
    question.answers.shuffle(rng);

    Some(DrawOutcome {
        question,
        exclusions_reset,
    })
}

/// Uniform without a bias list; otherwise weighted: bias multiplies the
/// weight per matching tag, plus a novelty term and bounded jitter.
fn pick<'a, R: Rng + ?Sized>(
    candidates: &[&'a Question],
    ctx: DrawContext<'_>,
    cfg: &GameConfig,
    rng: &mut R,
) -> Option<&'a Question> {
    if ctx.bias.is_empty() {
        return candidates.choose(rng).copied();
    }

    let weights: Vec<f64> = candidates
        .iter()
        .map(|q| {
            let matches = q.tags.iter().filter(|t| ctx.bias.contains(t)).count() as i32;
            let seen = ctx.tier_seen.get(&q.tier).copied().unwrap_or(0) as f64;
            let novelty = cfg.novelty_weight / (1.0 + seen);
            let jitter = if cfg.jitter > 0.0 { rng.gen_range(0.0..cfg.jitter) } else { 0.0 };
            cfg.bias_factor.powi(matches) + novelty + jitter
        })
        .collect();

    match WeightedIndex::new(&weights) {
        Ok(dist) => candidates.get(dist.sample(rng)).copied(),
        Err(_) => candidates.choose(rng).copied(),
    }
}

// =============================================================================
// Evaluate
// =============================================================================

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub outcome: OutcomeClass,
    pub slot: Slot,
    pub score_delta: i64,
    pub thread_delta: i64,
    pub trait_delta: TraitVector,
    pub patch: StatePatch,
}

/// Two consecutive non-wrong answers raise the level (capped); a wrong
/// answer resets the streak but never lowers the level.
pub fn advance_difficulty(d: DifficultyState, outcome: OutcomeClass, cfg: &GameConfig) -> DifficultyState {
    if outcome.is_wrong() {
        return DifficultyState {
            level: d.level,
            streak_since_last_level: 0,
        };
    }
    let streak = d.streak_since_last_level + 1;
    if streak >= cfg.streak_to_level {
        DifficultyState {
            level: (d.level + 1).min(cfg.max_difficulty),
            streak_since_last_level: 0,
        }
    } else {
        DifficultyState {
            level: d.level,
            streak_since_last_level: streak,
        }
    }
}

/// Resolve the chosen answer of the active question. Nothing in `state`
/// changes until the returned patch is applied.
pub fn evaluate(
    state: &GameState,
    choice_index: usize,
    loadings: &TraitLoadings,
    cfg: &GameConfig,
) -> Result<Evaluation, EngineError> {
    let question = state
        .current_question
        .as_ref()
        .ok_or_else(|| EngineError::missing("evaluate", "no active question"))?;
    let slot = Slot::from_index(choice_index)
        .ok_or_else(|| EngineError::missing("evaluate", format!("answer index {} out of range", choice_index)))?;
    let answer = question.answers.get(choice_index).ok_or_else(|| {
        EngineError::missing("evaluate", format!("question {} has no answer at {}", question.id, slot.as_str()))
    })?;

    let outcome = answer.outcome;
    let effect = outcome.effect();
    let doubled = state.round.weave_primed;
    let points = if doubled { effect.points * WEAVE_MULTIPLIER } else { effect.points };

    let mut round = state.round.clone();
    round.round_score = (round.round_score + points).max(0);
    round.thread = (round.thread as i64 + effect.thread_delta).max(0) as u32;
    round.weave_primed = false;
    round.not_wrong_count = if outcome.is_wrong() { 0 } else { round.not_wrong_count + 1 };
    round.round_answer_tally.increment(slot);

    let mut answered = state.answered_ids.clone();
    answered.insert(question.id);
    let mut tier_seen = state.tier_seen.clone();
    *tier_seen.entry(question.tier).or_insert(0) += 1;
    let mut class_tally = state.class_tally;
    class_tally.record(outcome);

    let trait_delta = loadings.delta_for(question.id, outcome, Some(&answer.label));
    let traits = loadings.apply_delta(&state.traits, question.id, outcome, Some(&answer.label));
    let difficulty = advance_difficulty(state.difficulty, outcome, cfg);

    let reveal = Reveal {
        question_id: question.id,
        slot,
        label: answer.label.clone(),
        outcome,
        explanation: answer.explanation.clone(),
        points,
        doubled,
    };

    let patch = StatePatch {
        phase: Some(Phase::Reveal),
        round: Some(round),
        answered_ids: Some(answered),
        tier_seen: Some(tier_seen),
        class_tally: Some(class_tally),
        traits: Some(traits),
        difficulty: Some(difficulty),
        current_question: Some(None),
        last_reveal: Some(Some(reveal)),
        ..Default::default()
    };

    Ok(Evaluation {
        outcome,
        slot,
        score_delta: points,
        thread_delta: effect.thread_delta,
        trait_delta,
        patch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Answer;

    fn question(id: QuestionId, tier: u8, tags: &[&str]) -> Question {
        Question {
            id,
            tier,
            category: "Mind".to_string(),
            title: format!("Q{}", id),
            text: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            answers: vec![
                Answer::new("Typical", OutcomeClass::Typical),
                Answer::new("Revelatory", OutcomeClass::Revelatory),
                Answer::new("Wrong", OutcomeClass::Wrong),
            ],
        }
    }

    fn ctx<'a>(level: u8, excluded: &'a BTreeSet<QuestionId>, bias: &'a [String], seen: &'a BTreeMap<u8, u32>) -> DrawContext<'a> {
        DrawContext {
            level,
            excluded,
            bias,
            tier_seen: seen,
        }
    }

    fn state_with(q: Question) -> GameState {
        let mut state = GameState::new(&GameConfig::default());
        state.phase = Phase::Question;
        state.round.thread = 3;
        state.current_question = Some(q);
        state
    }

    fn index_of(state: &GameState, outcome: OutcomeClass) -> usize {
        state
            .current_question
            .as_ref()
            .unwrap()
            .answers
            .iter()
            .position(|a| a.outcome == outcome)
            .unwrap()
    }

    #[test]
    fn test_draw_empty_pool_returns_none() {
        let mut rng = StdRng::seed_from_u64(1);
        let none = BTreeSet::new();
        let seen = BTreeMap::new();
        assert!(draw(&[], ctx(1, &none, &[], &seen), &GameConfig::default(), &mut rng).is_none());
    }

    #[test]
    fn test_draw_respects_tier_ceiling() {
        let pool = vec![question(1, 1, &[]), question(2, 3, &[]), question(3, 1, &[])];
        let none = BTreeSet::new();
        let seen = BTreeMap::new();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..40 {
            let out = draw(&pool, ctx(1, &none, &[], &seen), &GameConfig::default(), &mut rng).unwrap();
            assert_eq!(out.question.tier, 1);
            assert!(!out.exclusions_reset);
        }
    }

    #[test]
    fn test_draw_widens_upward_when_level_exhausted() {
        let pool = vec![question(1, 1, &[]), question(2, 3, &[])];
        let excluded: BTreeSet<QuestionId> = [1].into_iter().collect();
        let seen = BTreeMap::new();
        let mut rng = StdRng::seed_from_u64(3);
        let out = draw(&pool, ctx(1, &excluded, &[], &seen), &GameConfig::default(), &mut rng).unwrap();
        assert_eq!(out.question.id, 2);
        assert!(!out.exclusions_reset);
    }

    #[test]
    fn test_draw_never_widens_downward() {
        let pool = vec![question(1, 1, &[]), question(2, 2, &[])];
        let none = BTreeSet::new();
        let seen = BTreeMap::new();
        let mut rng = StdRng::seed_from_u64(9);
        // level above every tier still sees the whole pool
        let out = draw(&pool, ctx(5, &none, &[], &seen), &GameConfig::default(), &mut rng).unwrap();
        assert!(out.question.id == 1 || out.question.id == 2);
    }

    #[test]
    fn test_draw_resets_exclusions_when_everything_answered() {
        let pool = vec![question(1, 1, &[]), question(2, 2, &[])];
        let excluded: BTreeSet<QuestionId> = [1, 2].into_iter().collect();
        let seen = BTreeMap::new();
        let mut rng = StdRng::seed_from_u64(5);
        let out = draw(&pool, ctx(1, &excluded, &[], &seen), &GameConfig::default(), &mut rng).unwrap();
        assert!(out.exclusions_reset);
        assert_eq!(out.question.id, 1);
    }

    #[test]
    fn test_draw_shuffles_but_keeps_answers() {
        let pool = vec![question(1, 1, &[])];
        let none = BTreeSet::new();
        let seen = BTreeMap::new();
        let mut rng = StdRng::seed_from_u64(11);
        let out = draw(&pool, ctx(1, &none, &[], &seen), &GameConfig::default(), &mut rng).unwrap();
        let mut labels: Vec<_> = out.question.answers.iter().map(|a| a.label.clone()).collect();
        labels.sort();
        assert_eq!(labels, vec!["Revelatory", "Typical", "Wrong"]);
    }

    #[test]
    fn test_bias_leans_but_does_not_override() {
        let pool = vec![question(1, 1, &["factual_literal"]), question(2, 1, &["lateral_wordplay"])];
        let none = BTreeSet::new();
        let seen = BTreeMap::new();
        let bias = vec!["factual_literal".to_string()];
        let mut rng = StdRng::seed_from_u64(21);
        let mut hits = [0u32; 2];
        for _ in 0..2000 {
            let out = draw(&pool, ctx(1, &none, &bias, &seen), &GameConfig::default(), &mut rng).unwrap();
            hits[(out.question.id - 1) as usize] += 1;
        }
        assert!(hits[0] > hits[1], "biased group should win more often: {:?}", hits);
        assert!(hits[1] > 0, "unbiased group must stay reachable");
    }

    #[test]
    fn test_evaluate_without_question_is_missing_context() {
        let state = GameState::new(&GameConfig::default());
        let err = evaluate(&state, 0, &TraitLoadings::default(), &GameConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::MissingContext { op: "evaluate", .. }));
    }

    #[test]
    fn test_evaluate_out_of_range_is_missing_context() {
        let state = state_with(question(1, 1, &[]));
        let err = evaluate(&state, 3, &TraitLoadings::default(), &GameConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::MissingContext { .. }));
    }

    #[test]
    fn test_evaluate_revelatory() {
        let state = state_with(question(7, 1, &[]));
        let idx = index_of(&state, OutcomeClass::Revelatory);
        let eval = evaluate(&state, idx, &TraitLoadings::default(), &GameConfig::default()).unwrap();

        assert_eq!(eval.outcome, OutcomeClass::Revelatory);
        assert_eq!(eval.score_delta, 1);
        assert_eq!(eval.thread_delta, 1);

        let round = eval.patch.round.as_ref().unwrap();
        assert_eq!(round.thread, 4);
        assert_eq!(round.round_score, 1);
        assert_eq!(round.not_wrong_count, 1);
        assert_eq!(round.round_answer_tally.get(eval.slot), 1);
        assert!(eval.patch.answered_ids.as_ref().unwrap().contains(&7));
        assert_eq!(eval.patch.phase, Some(Phase::Reveal));
        assert_eq!(eval.patch.current_question, Some(None));
    }

    #[test]
    fn test_evaluate_wrong_resets_not_wrong_and_floors_thread() {
        let mut state = state_with(question(1, 1, &[]));
        state.round.thread = 0;
        state.round.not_wrong_count = 2;
        let idx = index_of(&state, OutcomeClass::Wrong);
        let eval = evaluate(&state, idx, &TraitLoadings::default(), &GameConfig::default()).unwrap();
        let round = eval.patch.round.unwrap();
        assert_eq!(round.thread, 0);
        assert_eq!(round.not_wrong_count, 0);
        assert_eq!(round.round_score, 0);
    }

    #[test]
    fn test_weave_doubles_then_clears() {
        let mut state = state_with(question(1, 1, &[]));
        state.round.weave_primed = true;
        let idx = index_of(&state, OutcomeClass::Typical);
        let eval = evaluate(&state, idx, &TraitLoadings::default(), &GameConfig::default()).unwrap();
        assert_eq!(eval.score_delta, 4);
        let round = eval.patch.round.unwrap();
        assert!(!round.weave_primed);
        assert!(eval.patch.last_reveal.unwrap().unwrap().doubled);
    }

    #[test]
    fn test_weave_consumed_even_by_wrong_answer() {
        let mut state = state_with(question(1, 1, &[]));
        state.round.weave_primed = true;
        let idx = index_of(&state, OutcomeClass::Wrong);
        let eval = evaluate(&state, idx, &TraitLoadings::default(), &GameConfig::default()).unwrap();
        assert!(!eval.patch.round.unwrap().weave_primed);
    }

    #[test]
    fn test_difficulty_ramp() {
        let cfg = GameConfig::default();
        let d = DifficultyState::default();
        let d = advance_difficulty(d, OutcomeClass::Typical, &cfg);
        assert_eq!((d.level, d.streak_since_last_level), (1, 1));
        let d = advance_difficulty(d, OutcomeClass::Revelatory, &cfg);
        assert_eq!((d.level, d.streak_since_last_level), (2, 0));

        let d = advance_difficulty(d, OutcomeClass::Typical, &cfg);
        let d = advance_difficulty(d, OutcomeClass::Wrong, &cfg);
        assert_eq!((d.level, d.streak_since_last_level), (2, 0));
        let d = advance_difficulty(d, OutcomeClass::Typical, &cfg);
        assert_eq!(d.level, 2);
    }

    #[test]
    fn test_difficulty_caps_at_max() {
        let cfg = GameConfig::default();
        let mut d = DifficultyState::default();
        for _ in 0..40 {
            d = advance_difficulty(d, OutcomeClass::Typical, &cfg);
        }
        assert_eq!(d.level, 7);
    }
}
