//! Headless playthrough: one seeded session, one JSON line per action on
//! stdout, a summary at the end.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;

use nous::autoplay::{choose_action, PolicyConfig, MAX_STEPS};
use nous::config::GameConfig;
use nous::content::ContentPack;
use nous::engine::reducer::reduce;
use nous::engine::session::GameSession;
use nous::logging::{self, obj, v_str, Domain};

fn main() -> Result<()> {
    let cfg = GameConfig::from_env();
    let content = ContentPack::from_config(&cfg).context("load content")?;
    let seed = cfg.seed;

    logging::info(
        Domain::Session,
        "startup",
        obj(&[
            ("run_id", v_str(logging::run_id())),
            ("seed", v_str(&seed.to_string())),
            ("content", v_str(&content.fingerprint)),
        ]),
    );

    let policy = PolicyConfig::default();
    let mut session = GameSession::new(cfg, content);
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));

    for step in 0..MAX_STEPS {
        let Some(action) = choose_action(session.state(), &policy, &mut rng) else {
            break;
        };
        let out = reduce(&mut session, action);
        let line = json!({
            "step": step,
            "action": action,
            "phase": out.phase,
            "patch": out.patch,
            "error": out.error.as_ref().map(|e| e.to_string()),
            "hash": format!("{:016x}", out.state_hash),
        });
        println!("{}", serde_json::to_string(&line)?);
    }

    let state = session.state();
    let read = session.trait_read();
    let summary = json!({
        "outcome": state.phase,
        "score": state.score,
        "rounds_won": state.rounds_won,
        "lives": state.lives,
        "traits": state.traits,
        "read": read,
        "hash": format!("{:016x}", state.hash()),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
