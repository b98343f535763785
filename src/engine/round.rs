//! Round lifecycle: the Thread economy and the phase transitions around it.
//!
//! ```text
//! LOBBY ─start─► ACTIVE ─pull─► QUESTION ─answer─► REVEAL ─┬─► ACTIVE
//!                  │  ▲                                     └─► (thread 0) SEVER
//!                  │  └─weave
//!                  ├─tie_off─► FATE_RESOLUTION ─finalize─► LOBBY | GAME_COMPLETE | GAME_OVER
//!                  └─sever───► FATE_RESOLUTION
//! ```
//!
//! Calls from the wrong phase return an empty patch. Gameplay input never
//! produces an error here.

use rand::Rng;

use crate::config::GameConfig;
use crate::content::Question;
use crate::error::EngineError;
use crate::logging::{self, obj, v_bool, v_int, v_str, Domain};

use super::fate::FateResolution;
use super::question::{self, DrawContext};
use super::state::{GameState, Phase, RoundEnd, RoundState, StatePatch};
use super::traits::compute_read;

const ROUND_START_KIND: &str = "ROUND_START";

fn rejected(op: &str, state: &GameState) -> StatePatch {
    logging::warn(
        Domain::Round,
        "op_rejected",
        obj(&[
            ("op", v_str(op)),
            ("phase", v_str(state.phase.as_str())),
            ("thread", v_int(state.round.thread as i64)),
        ]),
    );
    StatePatch::default()
}

/// Open a round from the lobby. Starting thread is the carried-over value
/// (or base) plus any pending ROUND_START bonus, which is consumed. Score
/// and HUD tags from a card taken in the lobby carry into the round.
pub fn start_round(state: &GameState, cfg: &GameConfig) -> StatePatch {
    if state.phase != Phase::Lobby {
        return rejected("start_round", state);
    }

    let carried = state.next_round_thread.unwrap_or(cfg.base_thread);
    let thread = (carried as i64 + state.pending_thread_bonus).max(0) as u32;
    let kept: Vec<_> = state
        .round
        .active_round_effects
        .iter()
        .filter(|t| t.kind != ROUND_START_KIND)
        .cloned()
        .collect();
    let mut round = RoundState::fresh(thread, kept);
    round.round_score = state.round.round_score.max(0);

    logging::info(
        Domain::Round,
        "round_started",
        obj(&[
            ("round", v_int(state.round_number as i64)),
            ("thread", v_int(thread as i64)),
            ("bonus", v_int(state.pending_thread_bonus)),
            ("carried_score", v_int(round.round_score)),
        ]),
    );

    StatePatch {
        phase: Some(Phase::Active),
        round: Some(round),
        pending_thread_bonus: Some(0),
        next_round_thread: Some(None),
        pending_bank: Some(0),
        last_reveal: Some(None),
        ..Default::default()
    }
}

/// Spend one thread, then draw. An empty draw leaves the phase at ACTIVE.
pub fn pull<R: Rng + ?Sized>(state: &GameState, pool: &[Question], cfg: &GameConfig, rng: &mut R) -> StatePatch {
    if state.phase != Phase::Active || state.round.thread == 0 {
        return rejected("pull", state);
    }

    let mut round = state.round.clone();
    round.thread -= 1;

    let read = compute_read(&state.traits, &state.class_tally);
    let ctx = DrawContext {
        level: state.difficulty.level,
        excluded: &state.answered_ids,
        bias: &read.routing_bias,
        tier_seen: &state.tier_seen,
    };

    let mut patch = StatePatch {
        round: Some(round),
        ..Default::default()
    };

    match question::draw(pool, ctx, cfg, rng) {
        Some(drawn) => {
            if drawn.exclusions_reset {
                patch.answered_ids = Some(Default::default());
            }
            logging::info(
                Domain::Question,
                "question_drawn",
                obj(&[
                    ("id", v_int(drawn.question.id as i64)),
                    ("tier", v_int(drawn.question.tier as i64)),
                    ("level", v_int(state.difficulty.level as i64)),
                    ("reset", v_bool(drawn.exclusions_reset)),
                ]),
            );
            patch.phase = Some(Phase::Question);
            patch.current_question = Some(Some(drawn.question));
        }
        None => {
            logging::warn(Domain::Question, "pool_empty", obj(&[("round", v_int(state.round_number as i64))]));
        }
    }
    patch
}

/// Prime a doubled next answer for one thread. Does not stack.
pub fn weave(state: &GameState) -> StatePatch {
    if state.phase != Phase::Active || state.round.thread == 0 || state.round.weave_primed {
        return rejected("weave", state);
    }
    let mut round = state.round.clone();
    round.thread -= 1;
    round.weave_primed = true;

    logging::info(Domain::Round, "weave_primed", obj(&[("thread", v_int(round.thread as i64))]));

    StatePatch {
        round: Some(round),
        ..Default::default()
    }
}

/// Leave the reveal screen. Thread exhausted means the round is severed.
pub fn after_reveal(state: &GameState, cfg: &GameConfig) -> StatePatch {
    if state.phase != Phase::Reveal {
        return rejected("after_reveal", state);
    }
    if state.round.thread == 0 {
        return end_by_sever(state, cfg);
    }
    StatePatch {
        phase: Some(Phase::Active),
        ..Default::default()
    }
}

/// Voluntary end: bank the round and carry leftover thread forward.
pub fn tie_off(state: &GameState, cfg: &GameConfig) -> StatePatch {
    if state.phase != Phase::Active {
        return rejected("tie_off", state);
    }

    let cap = cfg.thread_cap(state.audacity);
    let next = (cfg.base_thread + state.round.thread).clamp(cfg.min_carry_thread, cap);
    let mut round = state.round.clone();
    round.round_won = round.is_won();
    round.ended_by = Some(RoundEnd::TieOff);

    logging::info(
        Domain::Round,
        "round_tied_off",
        obj(&[
            ("bank", v_int(round.round_score)),
            ("leftover", v_int(round.thread as i64)),
            ("next_thread", v_int(next as i64)),
            ("won", v_bool(round.round_won)),
        ]),
    );

    StatePatch {
        phase: Some(Phase::FateResolution),
        pending_bank: Some(round.round_score),
        next_round_thread: Some(Some(next)),
        round: Some(round),
        ..Default::default()
    }
}

/// Forced end once thread is spent: nothing banked, one life lost, next
/// round at base thread.
pub fn sever(state: &GameState, cfg: &GameConfig) -> StatePatch {
    if !matches!(state.phase, Phase::Active | Phase::Reveal) || state.round.thread > 0 {
        return rejected("sever", state);
    }
    end_by_sever(state, cfg)
}

fn end_by_sever(state: &GameState, cfg: &GameConfig) -> StatePatch {
    let mut round = state.round.clone();
    round.round_won = round.is_won();
    round.ended_by = Some(RoundEnd::Sever);
    let lives = state.lives.saturating_sub(1);

    logging::info(
        Domain::Round,
        "round_severed",
        obj(&[
            ("lives", v_int(lives as i64)),
            ("lost_score", v_int(round.round_score)),
            ("next_thread", v_int(cfg.base_thread as i64)),
            ("won", v_bool(round.round_won)),
        ]),
    );

    StatePatch {
        phase: Some(Phase::FateResolution),
        pending_bank: Some(0),
        lives: Some(lives),
        next_round_thread: Some(None),
        round: Some(round),
        ..Default::default()
    }
}

/// Points a resolved round adds to the global score.
pub fn settle(pending_bank: i64, res: &FateResolution) -> i64 {
    let banked = ((pending_bank + res.round_score_delta) as f64 * res.round_score_multiplier as f64).floor() as i64;
    banked.max(0) + res.global_score_delta
}

/// Merge the Fate resolution into the score and close the round.
pub fn finalize_round(state: &GameState, res: &FateResolution) -> StatePatch {
    if state.phase != Phase::FateResolution {
        return rejected("finalize_round", state);
    }

    let gained = settle(state.pending_bank, res);
    let score = (state.score + gained).max(0);
    // a severed round keeps its win flag for Fate, never for the count
    let won = state.round.round_won && state.round.ended_by == Some(RoundEnd::TieOff);
    let rounds_won = if won { state.rounds_won + 1 } else { state.rounds_won };

    if rounds_won > state.rounds_to_win {
        let err = EngineError::InvariantViolation(format!(
            "rounds won {} exceeds target {}",
            rounds_won, state.rounds_to_win
        ));
        logging::warn(
            Domain::Round,
            "invariant_violation",
            obj(&[("reason", v_str(err.reason_code())), ("msg", v_str(&err.to_string()))]),
        );
    }

    // lives first: a simultaneous win still ends the game
    let phase = if state.lives == 0 {
        Phase::GameOver
    } else if rounds_won >= state.rounds_to_win {
        Phase::GameComplete
    } else {
        Phase::Lobby
    };

    logging::info(
        Domain::Round,
        "round_finalized",
        obj(&[
            ("round", v_int(state.round_number as i64)),
            ("gained", v_int(gained)),
            ("score", v_int(score)),
            ("rounds_won", v_int(rounds_won as i64)),
            ("next_phase", v_str(phase.as_str())),
        ]),
    );

    StatePatch {
        phase: Some(phase),
        resume_phase: Some(None),
        score: Some(score),
        rounds_won: Some(rounds_won),
        round_number: Some(state.round_number + 1),
        pending_bank: Some(0),
        round: Some(RoundState::default()),
        active_power_ups: Some(Vec::new()),
        current_question: Some(None),
        active_fate_card: Some(None),
        fate_choices: Some([None, None, None]),
        last_reveal: Some(None),
        last_resolution: Some(Some(*res)),
        ..Default::default()
    }
}
