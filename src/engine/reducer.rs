//! Action dispatch: (Session, Action) -> (Patch, Phase hint, Hash)
//!
//! The caller maps buttons to `Action`s and phases to screens; everything
//! in between goes through `reduce`.
//!
//! | Action              | Valid in          | Next phase                     |
//! |---------------------|-------------------|--------------------------------|
//! | `StartRound`        | lobby             | active                         |
//! | `Pull`              | active, thread>0  | question (active if pool dry)  |
//! | `Weave`             | active, thread>0  | active                         |
//! | `Answer(i)`         | question          | reveal                         |
//! | `ContinueAfterReveal` | reveal          | active, or fate_resolution     |
//! | `TemptFate`         | lobby, active     | fate                           |
//! | `ChooseFate(i)`     | fate              | phase the card was armed from  |
//! | `TieOff`            | active            | fate_resolution                |
//! | `Sever`             | active, thread=0  | fate_resolution                |
//! | `ResolveFate`       | fate_resolution   | fate_resolution                |
//! | `Accept`            | fate_resolution   | lobby, game_complete, game_over|

use serde::{Deserialize, Serialize};

use super::session::GameSession;
use super::state::{Phase, StatePatch};
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "index", rename_all = "snake_case")]
pub enum Action {
    StartRound,
    Pull,
    Weave,
    Answer(usize),
    ContinueAfterReveal,
    TemptFate,
    ChooseFate(usize),
    TieOff,
    Sever,
    ResolveFate,
    Accept,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::StartRound => "start_round",
            Action::Pull => "pull",
            Action::Weave => "weave",
            Action::Answer(_) => "answer",
            Action::ContinueAfterReveal => "continue_after_reveal",
            Action::TemptFate => "tempt_fate",
            Action::ChooseFate(_) => "choose_fate",
            Action::TieOff => "tie_off",
            Action::Sever => "sever",
            Action::ResolveFate => "resolve_fate",
            Action::Accept => "accept",
        }
    }
}

/// Result of processing an action
#[derive(Debug)]
pub struct ReducerOutput {
    pub patch: StatePatch,
    pub phase: Phase,
    pub error: Option<EngineError>,
    pub state_hash: u64,
}

pub fn reduce(session: &mut GameSession, action: Action) -> ReducerOutput {
    // Terminal phases accept nothing
    if session.phase().is_terminal() {
        return ReducerOutput {
            patch: StatePatch::default(),
            phase: session.phase(),
            error: None,
            state_hash: session.state().hash(),
        };
    }

    let result: Result<StatePatch, EngineError> = match action {
        Action::StartRound => Ok(session.start_round()),
        Action::Pull => Ok(session.pull()),
        Action::Weave => Ok(session.weave()),
        Action::Answer(i) => session.evaluate_answer(i).map(|e| e.patch),
        Action::ContinueAfterReveal => Ok(session.acknowledge_reveal()),
        Action::TemptFate => session.tempt_fate(),
        Action::ChooseFate(i) => session.apply_fate_choice(i),
        Action::TieOff => Ok(session.tie_off()),
        Action::Sever => Ok(session.sever()),
        Action::ResolveFate => {
            if session.phase() == Phase::FateResolution {
                let res = session.resolve_current_round();
                Ok(StatePatch {
                    last_resolution: Some(Some(res)),
                    ..Default::default()
                })
            } else {
                Ok(StatePatch::default())
            }
        }
        Action::Accept => Ok(session.finalize_round()),
    };

    let (patch, error) = match result {
        Ok(patch) => (patch, None),
        Err(e) => (StatePatch::default(), Some(e)),
    };

    ReducerOutput {
        patch,
        phase: session.phase(),
        error,
        state_hash: session.state().hash(),
    }
}
