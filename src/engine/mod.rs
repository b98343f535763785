//! Rules core: round economy, deferred Fate effects, trait inference.
//!
//! Architecture:
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │    Caller    │────►│   Reducer    │────►│   Session    │
//! │  (buttons)   │     │  (Action)    │     │  (owns RNG)  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//!                                                  │
//!                 ┌───────────────┬────────────────┼──────────────┐
//!                 ▼               ▼                ▼              ▼
//!          ┌────────────┐  ┌────────────┐  ┌────────────┐  ┌────────────┐
//!          │   round    │  │  question  │  │    fate    │  │   traits   │
//!          │  (thread)  │  │ (evaluate) │  │  (buffer)  │  │   (read)   │
//!          └────────────┘  └────────────┘  └────────────┘  └────────────┘
//!                 │               │                │
//!                 └───────────────┴── StatePatch ──┘
//! ```
//!
//! Operations read `&GameState` and return a `StatePatch`; only the session
//! applies patches, so a failed operation leaves state untouched. The
//! session hashes state after every action for replay checks.

pub mod fate;
pub mod question;
pub mod reducer;
pub mod round;
pub mod session;
pub mod state;
pub mod traits;
