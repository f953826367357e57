//! Color-naming quiz engine for Colorrush.
//!
//! One [`QuizEngine`] holds a single player's run through a sequence of
//! challenges. Each challenge pairs a color *term* (the word the player
//! must name) with a *display* color (the ink the word is drawn in). The
//! two are drawn independently, so they often disagree, which is the point
//! of the game.
//!
//! The engine knows nothing about scores, rooms or networking. Progress
//! only moves when a correct answer is submitted, so everything here is a
//! deterministic function of the generated sequence and the answers given.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)  ← owns one engine per player, applies scoring
//!     ↕
//! Quiz Layer (this crate)  ← challenge sequence, cursor, wrong count
//! ```

mod color;
mod engine;
mod error;

pub use color::Color;
pub use engine::{AnswerOutcome, Challenge, QuizEngine, QuizStatus};
pub use error::QuizError;
