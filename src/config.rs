use std::path::PathBuf;

/// Numeric policy for one game session.
///
/// Every knob has an env override so playtests can retune the economy
/// without a rebuild.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub seed: u64,
    pub participants: u32,
    pub rounds_to_win: u32,

    // === Thread economy ===
    /// Starting thread when there is no carry-over
    pub base_thread: u32,
    /// Floor for the carried-over starting thread after a Tie Off
    pub min_carry_thread: u32,
    /// Ceiling for the carried-over starting thread (before audacity)
    pub thread_cap_base: u32,

    // === Difficulty ramp ===
    pub max_difficulty: u8,
    /// Consecutive non-wrong answers needed to raise the level
    pub streak_to_level: u32,

    // === Draw weighting ===
    /// Weight multiplier per matching routing tag
    pub bias_factor: f64,
    /// Bonus for tiers seen less often
    pub novelty_weight: f64,
    /// Upper bound of the uniform jitter added to each weight
    pub jitter: f64,

    /// Default ROUND_MODIFIER reward when the card does not name one
    pub modifier_bonus: i64,

    /// Directory holding questions.json / fate_deck.json / trait_loadings.json
    pub content_dir: Option<PathBuf>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            participants: 1,
            rounds_to_win: 3,
            base_thread: 4,
            min_carry_thread: 3,
            thread_cap_base: 7,
            max_difficulty: 7,
            streak_to_level: 2,
            bias_factor: 1.6,
            novelty_weight: 0.25,
            jitter: 0.15,
            modifier_bonus: 3,
            content_dir: None,
        }
    }
}

impl GameConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            seed: std::env::var("NOUS_SEED").ok().and_then(|v| v.parse().ok()).unwrap_or(d.seed),
            participants: std::env::var("NOUS_PARTICIPANTS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.participants),
            rounds_to_win: std::env::var("NOUS_ROUNDS_TO_WIN").ok().and_then(|v| v.parse().ok()).unwrap_or(d.rounds_to_win),
            base_thread: std::env::var("NOUS_BASE_THREAD").ok().and_then(|v| v.parse().ok()).unwrap_or(d.base_thread),
            min_carry_thread: std::env::var("NOUS_MIN_THREAD").ok().and_then(|v| v.parse().ok()).unwrap_or(d.min_carry_thread),
            thread_cap_base: std::env::var("NOUS_THREAD_CAP").ok().and_then(|v| v.parse().ok()).unwrap_or(d.thread_cap_base),
            max_difficulty: std::env::var("NOUS_MAX_DIFFICULTY").ok().and_then(|v| v.parse().ok()).unwrap_or(d.max_difficulty),
            streak_to_level: std::env::var("NOUS_STREAK_TO_LEVEL").ok().and_then(|v| v.parse().ok()).unwrap_or(d.streak_to_level),
            bias_factor: std::env::var("NOUS_BIAS_FACTOR").ok().and_then(|v| v.parse().ok()).unwrap_or(d.bias_factor),
            novelty_weight: std::env::var("NOUS_NOVELTY_WEIGHT").ok().and_then(|v| v.parse().ok()).unwrap_or(d.novelty_weight),
            jitter: std::env::var("NOUS_JITTER").ok().and_then(|v| v.parse().ok()).unwrap_or(d.jitter),
            modifier_bonus: std::env::var("NOUS_MODIFIER_BONUS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.modifier_bonus),
            content_dir: std::env::var("NOUS_CONTENT_DIR").ok().map(PathBuf::from),
        }
    }

    pub fn starting_lives(&self) -> u32 {
        self.participants + 1
    }

    /// Tie Off carry-over ceiling; audacity loosens it by one per two points.
    pub fn thread_cap(&self, audacity: u32) -> u32 {
        (self.thread_cap_base + audacity / 2).max(self.min_carry_thread)
    }
}
