//! Monte-Carlo batch: play many seeded sessions and report score, win rate
//! and archetype spread.
//!
//! Env: `SIM_TRIALS` (default 500), `SIM_OUT` (optional JSON-lines dump of
//! every summary), plus every `NOUS_*` game knob.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use nous::autoplay::{play_session, PlaySummary, PolicyConfig};
use nous::config::GameConfig;
use nous::content::ContentPack;
use nous::engine::state::Phase;

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}

fn percentile(sorted: &[i64], p: f64) -> i64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((sorted.len() - 1) as f64 * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn main() -> Result<()> {
    let cfg = GameConfig::from_env();
    let content = ContentPack::from_config(&cfg).context("load content")?;
    let trials: u64 = std::env::var("SIM_TRIALS").ok().and_then(|v| v.parse().ok()).unwrap_or(500);
    let out_path = std::env::var("SIM_OUT").ok().map(PathBuf::from);
    let policy = PolicyConfig::default();

    let mut writer = match &out_path {
        Some(p) => Some(BufWriter::new(File::create(p).with_context(|| format!("create {}", p.display()))?)),
        None => None,
    };

    let mut summaries: Vec<PlaySummary> = Vec::with_capacity(trials as usize);
    let mut digest = Sha256::new();
    for i in 0..trials {
        let seed = cfg.seed.wrapping_add(i);
        let summary = play_session(&cfg, &content, &policy, seed);
        digest.update(summary.state_hash.as_bytes());
        if let Some(w) = writer.as_mut() {
            writeln!(w, "{}", serde_json::to_string(&summary)?)?;
        }
        summaries.push(summary);
    }
    if let Some(mut w) = writer {
        w.flush()?;
    }

    let completed = summaries.iter().filter(|s| s.outcome == Phase::GameComplete).count();
    let over = summaries.iter().filter(|s| s.outcome == Phase::GameOver).count();
    let stalled = summaries.len() - completed - over;
    let mut scores: Vec<i64> = summaries.iter().map(|s| s.score).collect();
    scores.sort_unstable();
    let score_f: Vec<f64> = scores.iter().map(|s| *s as f64).collect();
    let rounds: Vec<f64> = summaries.iter().map(|s| s.rounds_played as f64).collect();
    let confidence: Vec<f64> = summaries.iter().map(|s| s.confidence).collect();

    let mut archetypes: BTreeMap<String, usize> = BTreeMap::new();
    for s in &summaries {
        *archetypes.entry(s.archetype.clone()).or_insert(0) += 1;
    }

    println!("=== Nous simulation: {} sessions from seed {} ===", trials, cfg.seed);
    println!("content      {}", &content.fingerprint[..16.min(content.fingerprint.len())]);
    println!(
        "outcomes     complete {:>5}  over {:>5}  stalled {:>3}",
        completed, over, stalled
    );
    if !summaries.is_empty() {
        println!("win rate     {:.1}%", completed as f64 / summaries.len() as f64 * 100.0);
    }
    println!(
        "score        mean {:>7.2}  p10 {:>4}  p50 {:>4}  p90 {:>4}",
        mean(&score_f),
        percentile(&scores, 0.1),
        percentile(&scores, 0.5),
        percentile(&scores, 0.9)
    );
    println!("rounds       mean {:>7.2}", mean(&rounds));
    println!("confidence   mean {:>7.3}", mean(&confidence));
    println!("archetypes");
    for (name, count) in &archetypes {
        println!("  {:<32} {:>5}", name, count);
    }
    println!("batch sha256 {}", hex::encode(digest.finalize()));
    Ok(())
}
