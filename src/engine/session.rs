//! `GameSession`: the owned context object the caller drives.
//!
//! Holds config, content, the state record, the single seeded RNG and the
//! Fate buffer. Each operation computes a patch against the current state,
//! applies it, and hands the patch back so the caller can re-render.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::GameConfig;
use crate::content::{ContentPack, FateCard, Question};
use crate::error::EngineError;
use crate::logging::{self, obj, v_int, v_str, Domain};

use super::fate::{self, DeferredEffectBuffer, FateResolution};
use super::question::{self, DrawContext, Evaluation};
use super::round;
use super::state::{GameState, Phase, StatePatch, Tally};
use super::traits::{compute_read, TraitRead};

pub struct GameSession {
    cfg: GameConfig,
    content: ContentPack,
    state: GameState,
    rng: StdRng,
    buffer: DeferredEffectBuffer,
    /// Resolution computed this round, consumed by finalize
    resolved: Option<FateResolution>,
}

impl GameSession {
    pub fn new(cfg: GameConfig, content: ContentPack) -> Self {
        let seed = cfg.seed;
        Self::with_seed(cfg, content, seed)
    }

    pub fn with_seed(cfg: GameConfig, content: ContentPack, seed: u64) -> Self {
        let state = GameState::new(&cfg);
        logging::info(
            Domain::Session,
            "session_created",
            obj(&[
                ("seed", v_str(&seed.to_string())),
                ("lives", v_int(state.lives as i64)),
                ("rounds_to_win", v_int(state.rounds_to_win as i64)),
                ("content", v_str(&content.fingerprint)),
            ]),
        );
        Self {
            cfg,
            content,
            state,
            rng: StdRng::seed_from_u64(seed),
            buffer: DeferredEffectBuffer::default(),
            resolved: None,
        }
    }

    /// Continue from a persisted state record. Staged Fate effects are
    /// process-local and do not survive a restore.
    pub fn resume(cfg: GameConfig, content: ContentPack, state: GameState, seed: u64) -> Self {
        let mut session = Self::with_seed(cfg, content, seed);
        session.state = state;
        session
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn config(&self) -> &GameConfig {
        &self.cfg
    }

    pub fn content(&self) -> &ContentPack {
        &self.content
    }

    pub fn buffer(&self) -> &DeferredEffectBuffer {
        &self.buffer
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn trait_read(&self) -> TraitRead {
        compute_read(&self.state.traits, &self.state.class_tally)
    }

    fn commit(&mut self, action: &str, patch: StatePatch) -> StatePatch {
        patch.apply(&mut self.state);
        logging::log_audit(action, self.state.round_number, self.state.hash());
        patch
    }

    // =========================================================================
    // Round lifecycle
    // =========================================================================

    pub fn start_round(&mut self) -> StatePatch {
        let patch = round::start_round(&self.state, &self.cfg);
        if !patch.is_empty() {
            self.resolved = None;
        }
        self.commit("start_round", patch)
    }

    /// Spend a thread and draw the next question.
    pub fn pull(&mut self) -> StatePatch {
        let patch = round::pull(&self.state, &self.content.questions, &self.cfg, &mut self.rng);
        self.commit("pull", patch)
    }

    /// Preview the question the next pull would draw. Works on a copy of
    /// the RNG, so neither state nor later draws change.
    pub fn draw_question(&self) -> Option<Question> {
        let read = self.trait_read();
        let ctx = DrawContext {
            level: self.state.difficulty.level,
            excluded: &self.state.answered_ids,
            bias: &read.routing_bias,
            tier_seen: &self.state.tier_seen,
        };
        let mut rng = self.rng.clone();
        question::draw(&self.content.questions, ctx, &self.cfg, &mut rng).map(|d| d.question)
    }

    pub fn weave(&mut self) -> StatePatch {
        let patch = round::weave(&self.state);
        self.commit("weave", patch)
    }

    pub fn evaluate_answer(&mut self, choice_index: usize) -> Result<Evaluation, EngineError> {
        if self.state.phase != Phase::Question {
            return Err(EngineError::missing(
                "evaluate",
                format!("no question awaiting an answer in {}", self.state.phase.as_str()),
            ));
        }
        let eval = question::evaluate(&self.state, choice_index, &self.content.loadings, &self.cfg)
            .map_err(|e| {
                logging::warn(
                    Domain::Question,
                    "evaluate_rejected",
                    obj(&[("reason", v_str(e.reason_code())), ("msg", v_str(&e.to_string()))]),
                );
                e
            })?;

        logging::info(
            Domain::Question,
            "answer_evaluated",
            obj(&[
                ("slot", v_str(eval.slot.as_str())),
                ("outcome", v_str(eval.outcome.as_str())),
                ("points", v_int(eval.score_delta)),
                ("thread_delta", v_int(eval.thread_delta)),
            ]),
        );
        logging::debug(
            Domain::Trait,
            "trait_delta",
            obj(&[
                ("x", logging::v_num(eval.trait_delta.x)),
                ("y", logging::v_num(eval.trait_delta.y)),
                ("z", logging::v_num(eval.trait_delta.z)),
            ]),
        );

        self.commit("evaluate", eval.patch.clone());
        Ok(eval)
    }

    pub fn acknowledge_reveal(&mut self) -> StatePatch {
        let patch = round::after_reveal(&self.state, &self.cfg);
        self.commit("acknowledge_reveal", patch)
    }

    pub fn tie_off(&mut self) -> StatePatch {
        let patch = round::tie_off(&self.state, &self.cfg);
        self.commit("tie_off", patch)
    }

    pub fn sever(&mut self) -> StatePatch {
        let patch = round::sever(&self.state, &self.cfg);
        self.commit("sever", patch)
    }

    /// Resolve staged Fate effects against the current round's tally.
    pub fn resolve_current_round(&mut self) -> FateResolution {
        let tally = self.state.round.round_answer_tally;
        let won = self.state.round.round_won;
        self.resolve_fate_round(&tally, won)
    }

    /// Fold the buffer against an explicit tally. The buffer is empty
    /// afterwards and the result is held for `finalize_round`.
    pub fn resolve_fate_round(&mut self, tally: &Tally, won: bool) -> FateResolution {
        let res = fate::resolve_round(&mut self.buffer, tally, won, &self.cfg);
        self.resolved = Some(res);
        res
    }

    /// Close the round, resolving Fate first if nobody did yet.
    pub fn finalize_round(&mut self) -> StatePatch {
        if self.state.phase != Phase::FateResolution {
            return self.commit("finalize_round", round::finalize_round(&self.state, &FateResolution::default()));
        }
        let res = match self.resolved.take() {
            Some(res) => res,
            None => self.resolve_current_round(),
        };
        self.resolved = None;
        let patch = round::finalize_round(&self.state, &res);
        self.commit("finalize_round", patch)
    }

    // =========================================================================
    // Fate
    // =========================================================================

    /// Pick an open card for the current audacity, if any.
    pub fn draw_fate_card(&mut self) -> Option<FateCard> {
        fate::draw_fate_card(
            &self.content.fate_deck,
            &self.state.completed_fate_ids,
            self.state.audacity,
            &mut self.rng,
        )
        .cloned()
    }

    pub fn arm_fate(&mut self, card: &FateCard) -> Result<StatePatch, EngineError> {
        let patch = fate::arm_fate(&self.state, card).map_err(|e| {
            logging::warn(
                Domain::Fate,
                "arm_rejected",
                obj(&[
                    ("card", v_str(&card.id)),
                    ("reason", v_str(e.reason_code())),
                    ("msg", v_str(&e.to_string())),
                ]),
            );
            e
        })?;
        logging::info(
            Domain::Fate,
            "fate_armed",
            obj(&[("card", v_str(&card.id)), ("choices", v_int(card.choices.len() as i64))]),
        );
        Ok(self.commit("arm_fate", patch))
    }

    /// Draw and arm in one step. An exhausted deck yields an empty patch.
    pub fn tempt_fate(&mut self) -> Result<StatePatch, EngineError> {
        match self.draw_fate_card() {
            Some(card) => self.arm_fate(&card),
            None => {
                logging::info(
                    Domain::Fate,
                    "deck_exhausted",
                    obj(&[("completed", v_int(self.state.completed_fate_ids.len() as i64))]),
                );
                Ok(StatePatch::default())
            }
        }
    }

    pub fn apply_fate_choice(&mut self, choice_index: usize) -> Result<StatePatch, EngineError> {
        let patch = fate::apply_choice(&self.state, &mut self.buffer, choice_index)?;
        Ok(self.commit("apply_fate_choice", patch))
    }
}
