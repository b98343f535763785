//! Session and round state, plus the patch type every engine operation
//! returns. The state hashes deterministically for replay validation.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::GameConfig;
use crate::content::{FateCard, FateChoice, Question, QuestionId};

use super::fate::FateResolution;
use super::question::OutcomeClass;
use super::traits::TraitVector;

// =============================================================================
// Answer slots and tallies
// =============================================================================

/// Displayed answer position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Slot {
    A,
    B,
    C,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::A, Slot::B, Slot::C];

    pub fn from_index(idx: usize) -> Option<Slot> {
        Self::ALL.get(idx).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Slot::A => "A",
            Slot::B => "B",
            Slot::C => "C",
        }
    }

    /// Accepts `"C"`, `"c"` and button-style targets like `"answer-c"`.
    pub fn parse(raw: &str) -> Option<Slot> {
        let letter = raw.rsplit('-').next().unwrap_or(raw).trim();
        match letter.to_ascii_uppercase().as_str() {
            "A" => Some(Slot::A),
            "B" => Some(Slot::B),
            "C" => Some(Slot::C),
            _ => None,
        }
    }
}

impl TryFrom<String> for Slot {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Slot::parse(&value).ok_or_else(|| format!("not an answer slot: {}", value))
    }
}

impl From<Slot> for String {
    fn from(slot: Slot) -> Self {
        slot.as_str().to_string()
    }
}

/// Per-slot answer counts for the current round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tally {
    #[serde(rename = "A")]
    pub a: u32,
    #[serde(rename = "B")]
    pub b: u32,
    #[serde(rename = "C")]
    pub c: u32,
}

impl Tally {
    pub fn new(a: u32, b: u32, c: u32) -> Self {
        Self { a, b, c }
    }

    pub fn get(&self, slot: Slot) -> u32 {
        match slot {
            Slot::A => self.a,
            Slot::B => self.b,
            Slot::C => self.c,
        }
    }

    pub fn increment(&mut self, slot: Slot) {
        match slot {
            Slot::A => self.a += 1,
            Slot::B => self.b += 1,
            Slot::C => self.c += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.a + self.b + self.c
    }

    /// Every slot holding the maximum count; ties all qualify.
    pub fn leaders(&self) -> Vec<Slot> {
        let max = self.a.max(self.b).max(self.c);
        Slot::ALL.into_iter().filter(|s| self.get(*s) == max).collect()
    }
}

/// Session-wide count of classified answers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassTally {
    pub typical: u32,
    pub revelatory: u32,
    pub wrong: u32,
}

impl ClassTally {
    pub fn record(&mut self, outcome: OutcomeClass) {
        match outcome {
            OutcomeClass::Typical => self.typical += 1,
            OutcomeClass::Revelatory => self.revelatory += 1,
            OutcomeClass::Wrong => self.wrong += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.typical + self.revelatory + self.wrong
    }
}

// =============================================================================
// Phases and round bookkeeping
// =============================================================================

/// Logical phase hint; the caller maps phases to screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Between rounds
    Lobby,
    /// Round running, thread available for Pull/Weave/Tie Off
    Active,
    /// Question drawn, waiting for an answer
    Question,
    /// Answer evaluated, waiting for acknowledgement
    Reveal,
    /// Fate card armed, waiting for a choice
    Fate,
    /// Round ended, staged effects pending resolution
    FateResolution,
    GameComplete,
    GameOver,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Lobby => "lobby",
            Phase::Active => "active",
            Phase::Question => "question",
            Phase::Reveal => "reveal",
            Phase::Fate => "fate",
            Phase::FateResolution => "fate_resolution",
            Phase::GameComplete => "game_complete",
            Phase::GameOver => "game_over",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::GameComplete | Phase::GameOver)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundEnd {
    TieOff,
    Sever,
}

/// HUD record of a Fate effect bound to the current round.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectTag {
    pub kind: String,
    pub card_title: String,
    #[serde(default)]
    pub note: String,
}

/// Two consecutive non-wrong answers raise the level by one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyState {
    pub level: u8,
    pub streak_since_last_level: u32,
}

impl Default for DifficultyState {
    fn default() -> Self {
        Self {
            level: 1,
            streak_since_last_level: 0,
        }
    }
}

/// What the reveal screen shows after an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reveal {
    pub question_id: QuestionId,
    pub slot: Slot,
    pub label: String,
    pub outcome: OutcomeClass,
    pub explanation: String,
    pub points: i64,
    pub doubled: bool,
}

/// Round-local state, reset by StartRound and FinalizeRound.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundState {
    pub thread: u32,
    pub round_score: i64,
    pub not_wrong_count: u32,
    pub weave_primed: bool,
    pub round_answer_tally: Tally,
    pub active_round_effects: Vec<EffectTag>,
    pub round_won: bool,
    pub ended_by: Option<RoundEnd>,
}

impl RoundState {
    pub fn fresh(thread: u32, keep_effects: Vec<EffectTag>) -> Self {
        Self {
            thread,
            active_round_effects: keep_effects,
            ..Default::default()
        }
    }

    pub fn is_won(&self) -> bool {
        self.not_wrong_count >= 3
    }
}

// =============================================================================
// Game state
// =============================================================================

/// Complete session state. Owned by one `GameSession` and mutated only by
/// applying `StatePatch`es produced by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub phase: Phase,
    /// Phase to return to once an armed Fate card is resolved
    pub resume_phase: Option<Phase>,

    pub lives: u32,
    pub score: i64,
    pub rounds_won: u32,
    pub rounds_to_win: u32,
    pub round_number: u32,
    pub audacity: u32,

    /// Round score banked by the last Tie Off, paid at finalize
    pub pending_bank: i64,
    /// Carry-over starting thread; None means base thread
    pub next_round_thread: Option<u32>,
    /// Staged ROUND_START thread bonus for the next round
    pub pending_thread_bonus: i64,

    pub round: RoundState,
    pub difficulty: DifficultyState,
    pub traits: TraitVector,
    pub class_tally: ClassTally,

    pub answered_ids: BTreeSet<QuestionId>,
    pub tier_seen: BTreeMap<u8, u32>,
    pub completed_fate_ids: BTreeSet<String>,
    pub active_power_ups: Vec<String>,

    pub current_question: Option<Question>,
    pub active_fate_card: Option<FateCard>,
    pub fate_choices: [Option<FateChoice>; 3],
    pub last_reveal: Option<Reveal>,
    pub last_resolution: Option<FateResolution>,
}

impl GameState {
    pub fn new(cfg: &GameConfig) -> Self {
        Self {
            phase: Phase::Lobby,
            resume_phase: None,
            lives: cfg.starting_lives(),
            score: 0,
            rounds_won: 0,
            rounds_to_win: cfg.rounds_to_win,
            round_number: 1,
            audacity: 0,
            pending_bank: 0,
            next_round_thread: None,
            pending_thread_bonus: 0,
            round: RoundState::default(),
            difficulty: DifficultyState::default(),
            traits: TraitVector::default(),
            class_tally: ClassTally::default(),
            answered_ids: BTreeSet::new(),
            tier_seen: BTreeMap::new(),
            completed_fate_ids: BTreeSet::new(),
            active_power_ups: Vec::new(),
            current_question: None,
            active_fate_card: None,
            fate_choices: [None, None, None],
            last_reveal: None,
            last_resolution: None,
        }
    }

    /// Compute deterministic state hash for replay validation
    pub fn hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut h = DefaultHasher::new();

        self.phase.hash(&mut h);
        self.lives.hash(&mut h);
        self.score.hash(&mut h);
        self.rounds_won.hash(&mut h);
        self.round_number.hash(&mut h);
        self.audacity.hash(&mut h);
        self.pending_bank.hash(&mut h);
        self.next_round_thread.hash(&mut h);
        self.pending_thread_bonus.hash(&mut h);

        self.round.thread.hash(&mut h);
        self.round.round_score.hash(&mut h);
        self.round.not_wrong_count.hash(&mut h);
        self.round.weave_primed.hash(&mut h);
        self.round.round_answer_tally.hash(&mut h);
        self.round.active_round_effects.hash(&mut h);

        self.difficulty.hash(&mut h);
        self.class_tally.hash(&mut h);
        // Quantized to avoid float comparison issues
        for v in [self.traits.x, self.traits.y, self.traits.z] {
            ((v * 1e6).round() as i64).hash(&mut h);
        }

        self.answered_ids.hash(&mut h);
        self.completed_fate_ids.hash(&mut h);
        self.current_question.as_ref().map(|q| q.id).hash(&mut h);
        self.active_fate_card.as_ref().map(|c| c.id.as_str()).hash(&mut h);

        h.finish()
    }
}

// =============================================================================
// State patch
// =============================================================================

/// Plain-data description of the fields an operation changed.
///
/// `Option<Option<T>>` fields distinguish "untouched" (`None`) from
/// "cleared" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_phase: Option<Option<Phase>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lives: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rounds_won: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audacity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_bank: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_round_thread: Option<Option<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_thread_bonus: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<RoundState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<DifficultyState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traits: Option<TraitVector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_tally: Option<ClassTally>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answered_ids: Option<BTreeSet<QuestionId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_seen: Option<BTreeMap<u8, u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_fate_ids: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_power_ups: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_question: Option<Option<Question>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_fate_card: Option<Option<FateCard>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fate_choices: Option<[Option<FateChoice>; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reveal: Option<Option<Reveal>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_resolution: Option<Option<FateResolution>>,
}

impl StatePatch {
    pub fn is_empty(&self) -> bool {
        *self == StatePatch::default()
    }

    /// Write every touched field into `state`.
    pub fn apply(&self, state: &mut GameState) {
        let p = self.clone();
        if let Some(v) = p.phase {
            state.phase = v;
        }
        if let Some(v) = p.resume_phase {
            state.resume_phase = v;
        }
        if let Some(v) = p.lives {
            state.lives = v;
        }
        if let Some(v) = p.score {
            state.score = v;
        }
        if let Some(v) = p.rounds_won {
            state.rounds_won = v;
        }
        if let Some(v) = p.round_number {
            state.round_number = v;
        }
        if let Some(v) = p.audacity {
            state.audacity = v;
        }
        if let Some(v) = p.pending_bank {
            state.pending_bank = v;
        }
        if let Some(v) = p.next_round_thread {
            state.next_round_thread = v;
        }
        if let Some(v) = p.pending_thread_bonus {
            state.pending_thread_bonus = v;
        }
        if let Some(v) = p.round {
            state.round = v;
        }
        if let Some(v) = p.difficulty {
            state.difficulty = v;
        }
        if let Some(v) = p.traits {
            state.traits = v;
        }
        if let Some(v) = p.class_tally {
            state.class_tally = v;
        }
        if let Some(v) = p.answered_ids {
            state.answered_ids = v;
        }
        if let Some(v) = p.tier_seen {
            state.tier_seen = v;
        }
        if let Some(v) = p.completed_fate_ids {
            state.completed_fate_ids = v;
        }
        if let Some(v) = p.active_power_ups {
            state.active_power_ups = v;
        }
        if let Some(v) = p.current_question {
            state.current_question = v;
        }
        if let Some(v) = p.active_fate_card {
            state.active_fate_card = v;
        }
        if let Some(v) = p.fate_choices {
            state.fate_choices = v;
        }
        if let Some(v) = p.last_reveal {
            state.last_reveal = v;
        }
        if let Some(v) = p.last_resolution {
            state.last_resolution = v;
        }
    }
}
