//! Seeded headless player used by the binaries and integration tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::config::GameConfig;
use crate::content::ContentPack;
use crate::engine::reducer::{reduce, Action};
use crate::engine::session::GameSession;
use crate::engine::state::{GameState, Phase};
use crate::engine::traits::TraitVector;
use crate::logging::{self, obj, v_int, v_str, Domain};

/// Hard stop for a single playthrough.
pub const MAX_STEPS: usize = 2_000;

#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Chance of drawing a Fate card when one may be armed
    pub tempt_rate: f64,
    /// Chance of priming Weave when thread allows
    pub weave_rate: f64,
    /// Tie off once this many non-wrong answers are in
    pub tie_off_at: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            tempt_rate: 0.35,
            weave_rate: 0.2,
            tie_off_at: 3,
        }
    }
}

/// Pick the next action from what the state allows.
pub fn choose_action<R: Rng + ?Sized>(state: &GameState, policy: &PolicyConfig, rng: &mut R) -> Option<Action> {
    let round = &state.round;
    let may_tempt = state.active_fate_card.is_none() && round.active_round_effects.is_empty();

    let action = match state.phase {
        Phase::Lobby => {
            if may_tempt && rng.gen_bool(policy.tempt_rate) {
                Action::TemptFate
            } else {
                Action::StartRound
            }
        }
        Phase::Active => {
            if round.thread == 0 || round.not_wrong_count >= policy.tie_off_at {
                Action::TieOff
            } else if round.thread >= 2 && !round.weave_primed && rng.gen_bool(policy.weave_rate) {
                Action::Weave
            } else {
                Action::Pull
            }
        }
        Phase::Question => {
            let n = state.current_question.as_ref().map(|q| q.answers.len()).unwrap_or(3).max(1);
            Action::Answer(rng.gen_range(0..n))
        }
        Phase::Reveal => Action::ContinueAfterReveal,
        Phase::Fate => {
            let open: Vec<usize> = state
                .fate_choices
                .iter()
                .enumerate()
                .filter(|(_, c)| c.is_some())
                .map(|(i, _)| i)
                .collect();
            let idx = open.get(rng.gen_range(0..open.len().max(1))).copied().unwrap_or(0);
            Action::ChooseFate(idx)
        }
        Phase::FateResolution => Action::Accept,
        Phase::GameComplete | Phase::GameOver => return None,
    };
    Some(action)
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaySummary {
    pub seed: u64,
    pub outcome: Phase,
    pub score: i64,
    pub rounds_won: u32,
    pub rounds_played: u32,
    pub lives: u32,
    pub answers: u32,
    pub fate_cards: usize,
    pub audacity: u32,
    pub traits: TraitVector,
    pub archetype: String,
    pub confidence: f64,
    pub steps: usize,
    pub errors: usize,
    pub state_hash: String,
}

/// Drive one session to a terminal phase (or the step limit).
pub fn play_session(cfg: &GameConfig, content: &ContentPack, policy: &PolicyConfig, seed: u64) -> PlaySummary {
    let mut session = GameSession::with_seed(cfg.clone(), content.clone(), seed);
    // separate stream so policy choices do not perturb engine draws
    let mut rng = StdRng::seed_from_u64(seed ^ 0x9e37_79b9_7f4a_7c15);
    let mut steps = 0;
    let mut errors = 0;

    while steps < MAX_STEPS {
        let Some(action) = choose_action(session.state(), policy, &mut rng) else {
            break;
        };
        let out = reduce(&mut session, action);
        if let Some(err) = out.error {
            errors += 1;
            logging::debug(
                Domain::Session,
                "action_error",
                obj(&[("action", v_str(action.name())), ("reason", v_str(err.reason_code()))]),
            );
        }
        steps += 1;
    }

    let state = session.state();
    let read = session.trait_read();
    let summary = PlaySummary {
        seed,
        outcome: state.phase,
        score: state.score,
        rounds_won: state.rounds_won,
        rounds_played: state.round_number.saturating_sub(1),
        lives: state.lives,
        answers: state.class_tally.total(),
        fate_cards: state.completed_fate_ids.len(),
        audacity: state.audacity,
        traits: state.traits,
        archetype: read.archetype.name,
        confidence: read.confidence,
        steps,
        errors,
        state_hash: format!("{:016x}", state.hash()),
    };

    logging::info(
        Domain::Session,
        "session_finished",
        obj(&[
            ("seed", v_str(&seed.to_string())),
            ("outcome", v_str(summary.outcome.as_str())),
            ("score", v_int(summary.score)),
            ("steps", v_int(steps as i64)),
        ]),
    );
    summary
}
