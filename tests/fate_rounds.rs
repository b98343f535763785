use nous::config::GameConfig;
use nous::content::ContentPack;
use nous::engine::question::OutcomeClass;
use nous::engine::session::GameSession;
use nous::engine::state::{Phase, Tally};

const QUESTIONS: &str = r#"[
    {"id": 7, "tier": 1, "answers": [
        {"label": "one", "outcome": "TYPICAL"},
        {"label": "two", "outcome": "REVELATORY"},
        {"label": "three", "outcome": "WRONG"}
    ]}
]"#;

fn session(cards: &str) -> GameSession {
    let content = ContentPack::from_json(QUESTIONS, cards, "{}").unwrap();
    GameSession::with_seed(GameConfig::default(), content, 5)
}

fn answer_typical(s: &mut GameSession) -> usize {
    s.pull();
    let idx = s
        .state()
        .current_question
        .as_ref()
        .unwrap()
        .answers
        .iter()
        .position(|a| a.outcome == OutcomeClass::Typical)
        .unwrap();
    s.evaluate_answer(idx).unwrap();
    s.acknowledge_reveal();
    idx
}

#[test]
fn round_start_bonus_applies_once() {
    let mut s = session(
        r#"[{"id": "RS", "title": "Spool", "choices": [
            {"label": "Take", "effect": {"type": "ROUND_START", "threadDelta": 1}}
        ]}]"#,
    );
    s.tempt_fate().unwrap();
    assert_eq!(s.phase(), Phase::Fate);
    s.apply_fate_choice(0).unwrap();
    assert_eq!(s.phase(), Phase::Lobby);

    s.start_round();
    assert_eq!(s.state().round.thread, 5);
    assert!(s.state().round.active_round_effects.is_empty());
    s.tie_off();
    s.finalize_round();

    s.start_round();
    // leftover 5 + base 4, capped
    assert_eq!(s.state().round.thread, GameConfig::default().thread_cap(1));
}

#[test]
fn wager_pays_per_matching_answer() {
    let mut s = session(
        r#"[{"id": "W", "title": "Wager", "choices": [
            {"label": "Bet on A", "effect": {"type": "APPLY_WAGER", "target": "A", "reward": {"type": "SCORE", "value": 1}}}
        ]}]"#,
    );
    s.start_round();
    s.tempt_fate().unwrap();
    s.apply_fate_choice(0).unwrap();
    assert_eq!(s.phase(), Phase::Active);
    assert_eq!(s.state().round.active_round_effects.len(), 1);
    assert!(s.tempt_fate().unwrap().is_empty());

    let mut on_a = 0;
    for _ in 0..2 {
        if answer_typical(&mut s) == 0 {
            on_a += 1;
        }
    }
    s.tie_off();
    let res = s.resolve_current_round();
    assert_eq!(res.round_score_delta, on_a);
    assert!(s.buffer().is_empty());

    s.finalize_round();
    assert_eq!(s.state().score, 4 + on_a);
}

#[test]
fn explicit_tally_resolution_matches_table_rule() {
    let mut s = session(
        r#"[{"id": "T", "title": "Gambit", "choices": [
            {"label": "Avoid C", "effect": {"type": "TALLY_TABLE", "target": "answer-c",
                "table": {"0": {"type": "DOUBLE_ROUND_SCORE"}}}}
        ]}]"#,
    );
    s.tempt_fate().unwrap();
    s.apply_fate_choice(0).unwrap();
    let res = s.resolve_fate_round(&Tally::new(2, 1, 0), false);
    assert_eq!(res.round_score_multiplier, 2);
    assert!(s.buffer().is_empty());

    let again = s.resolve_fate_round(&Tally::new(2, 1, 0), false);
    assert_eq!(again.round_score_multiplier, 1);
}

#[test]
fn completed_cards_never_return() {
    let mut s = session(
        r#"[{"id": "ONE", "title": "Only", "choices": [{"label": "Ignore"}]}]"#,
    );
    s.tempt_fate().unwrap();
    s.apply_fate_choice(0).unwrap();
    assert!(s.state().completed_fate_ids.contains("ONE"));
    assert!(s.draw_fate_card().is_none());
    assert!(s.tempt_fate().unwrap().is_empty());
}

#[test]
fn bundled_deck_plays_through_a_round() {
    let content = ContentPack::bundled().unwrap();
    let mut s = GameSession::with_seed(GameConfig::default(), content, 13);
    s.start_round();
    s.tempt_fate().unwrap();
    s.apply_fate_choice(0).unwrap();
    s.tie_off();
    s.finalize_round();
    assert!(s.buffer().is_empty());
    assert_eq!(s.phase(), Phase::Lobby);
}
