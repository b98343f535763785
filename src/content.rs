//! Content model and loaders: questions, Fate cards, trait loadings.
//!
//! Content is data, not logic. Malformed entries are dropped with a warning
//! so a bad deck never takes the session down.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::config::GameConfig;
use crate::engine::fate::EffectSpec;
use crate::engine::question::OutcomeClass;
use crate::engine::traits::TraitLoadings;
use crate::logging::{self, obj, v_int, v_str, Domain};

pub type QuestionId = u32;

const BUNDLED_QUESTIONS: &str = include_str!("../data/questions.json");
const BUNDLED_FATE_DECK: &str = include_str!("../data/fate_deck.json");
const BUNDLED_LOADINGS: &str = include_str!("../data/trait_loadings.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub label: String,
    #[serde(alias = "answerClass")]
    pub outcome: OutcomeClass,
    #[serde(default)]
    pub explanation: String,
}

impl Answer {
    pub fn new(label: &str, outcome: OutcomeClass) -> Self {
        Self {
            label: label.to_string(),
            outcome,
            explanation: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub tier: u8,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    /// Content groups, matched against the trait routing bias
    #[serde(default)]
    pub tags: Vec<String>,
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FateChoice {
    pub label: String,
    /// None is an "ignore" option
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<EffectSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FateCard {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub text: String,
    /// Minimum session audacity before the card can be drawn
    #[serde(default)]
    pub audacity_min: u32,
    #[serde(alias = "options")]
    pub choices: Vec<FateChoice>,
}

#[derive(Debug, Clone, Default)]
pub struct ContentPack {
    pub questions: Vec<Question>,
    pub fate_deck: Vec<FateCard>,
    pub loadings: TraitLoadings,
    /// sha256 over the three source documents
    pub fingerprint: String,
}

impl ContentPack {
    pub fn from_json(questions: &str, fate_deck: &str, loadings: &str) -> Result<Self> {
        let raw_questions: Vec<Question> = serde_json::from_str(questions).context("parse questions")?;
        let raw_cards: Vec<FateCard> = serde_json::from_str(fate_deck).context("parse fate deck")?;
        let loadings: TraitLoadings = serde_json::from_str(loadings).context("parse trait loadings")?;

        let mut hasher = Sha256::new();
        for doc in [questions, fate_deck] {
            hasher.update(doc.as_bytes());
        }
        hasher.update(serde_json::to_string(&loadings)?.as_bytes());

        let pack = Self {
            questions: raw_questions.into_iter().filter(question_is_playable).collect(),
            fate_deck: raw_cards.into_iter().filter(card_is_playable).collect(),
            loadings,
            fingerprint: hex::encode(hasher.finalize()),
        };

        logging::info(
            Domain::Session,
            "content_loaded",
            obj(&[
                ("questions", v_int(pack.questions.len() as i64)),
                ("fate_cards", v_int(pack.fate_deck.len() as i64)),
                ("loadings", v_int(pack.loadings.len() as i64)),
                ("sha256", v_str(&pack.fingerprint)),
            ]),
        );
        Ok(pack)
    }

    /// Decks compiled into the binary.
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_QUESTIONS, BUNDLED_FATE_DECK, BUNDLED_LOADINGS)
    }

    /// Reads `questions.json`, `fate_deck.json` and `trait_loadings.json`.
    /// A missing loadings file means unit weights everywhere.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let read = |name: &str| {
            let path = dir.join(name);
            std::fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
        };
        let questions = read("questions.json")?;
        let fate_deck = read("fate_deck.json")?;
        let loadings = if dir.join("trait_loadings.json").exists() {
            read("trait_loadings.json")?
        } else {
            "{}".to_string()
        };
        Self::from_json(&questions, &fate_deck, &loadings)
    }

    pub fn from_config(cfg: &GameConfig) -> Result<Self> {
        match &cfg.content_dir {
            Some(dir) => Self::load_dir(dir),
            None => Self::bundled(),
        }
    }

    pub fn fate_card(&self, id: &str) -> Option<&FateCard> {
        self.fate_deck.iter().find(|c| c.id == id)
    }
}

fn question_is_playable(q: &Question) -> bool {
    let ok = q.answers.len() == 3;
    if !ok {
        logging::warn(
            Domain::Session,
            "question_dropped",
            obj(&[
                ("id", v_int(q.id as i64)),
                ("answers", v_int(q.answers.len() as i64)),
            ]),
        );
    }
    ok
}

fn card_is_playable(c: &FateCard) -> bool {
    let ok = (1..=3).contains(&c.choices.len());
    if !ok {
        logging::warn(
            Domain::Session,
            "fate_card_dropped",
            obj(&[("id", v_str(&c.id)), ("choices", v_int(c.choices.len() as i64))]),
        );
    }
    ok
}
