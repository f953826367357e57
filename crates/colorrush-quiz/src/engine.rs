//! The per-player quiz state machine.

use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{Color, QuizError};

/// A single question: name the `term`, ignoring the `display` ink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub term: Color,
    pub display: Color,
}

impl Challenge {
    /// Draws a challenge with independently random term and display color.
    pub fn random(rng: &mut impl Rng) -> Self {
        Self {
            term: Color::random(rng),
            display: Color::random(rng),
        }
    }

    /// Draws `len` challenges.
    pub fn sequence(len: usize, rng: &mut impl Rng) -> Vec<Self> {
        (0..len).map(|_| Self::random(rng)).collect()
    }
}

/// Result of a successful [`QuizEngine::submit_answer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub finished: bool,
}

/// Point-in-time view of an engine, sent to the player as `game_state`.
///
/// Once finished, `quiz` and `display_color` are omitted and
/// `percentage` is 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_color: Option<Color>,
    pub progress: usize,
    pub total_quiz: usize,
    pub wrong_count: u32,
    pub is_finished: bool,
    pub percentage: f64,
    /// Seconds from engine creation to the final correct answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_used: Option<f64>,
}

/// One player's run through an ordered challenge sequence.
///
/// ```text
///   cursor 0 ──(correct)──→ 1 ──(correct)──→ … ──(correct)──→ N  [finished]
///      ↺ wrong                ↺ wrong
/// ```
///
/// The cursor never moves backwards and only advances on a correct
/// answer. `finished` flips to `true` exactly when the cursor reaches the
/// end. The wrong-answer counter only grows until [`restart`](Self::restart).
#[derive(Debug, Clone)]
pub struct QuizEngine {
    challenges: Vec<Challenge>,
    cursor: usize,
    wrong_count: u32,
    finished: bool,
    started_at: Instant,
    finished_at: Option<Instant>,
}

impl QuizEngine {
    /// Creates an engine with `len` freshly randomized challenges.
    pub fn new(len: usize) -> Self {
        Self::with_rng(len, &mut rand::rng())
    }

    /// Like [`new`](Self::new) but draws from the given generator.
    pub fn with_rng(len: usize, rng: &mut impl Rng) -> Self {
        Self::from_challenges(Challenge::sequence(len, rng))
    }

    /// Creates an engine over a pre-built sequence.
    ///
    /// Used when every player in a round should face the same questions,
    /// and in tests that need to know the answers up front. An empty
    /// sequence produces an engine that is already finished.
    pub fn from_challenges(challenges: Vec<Challenge>) -> Self {
        let now = Instant::now();
        let finished = challenges.is_empty();
        Self {
            challenges,
            cursor: 0,
            wrong_count: 0,
            finished,
            started_at: now,
            finished_at: finished.then_some(now),
        }
    }

    /// Discards all progress and draws a new sequence of `len` challenges.
    pub fn restart(&mut self, len: usize) {
        *self = Self::new(len);
    }

    /// Returns the challenge at the cursor.
    ///
    /// # Errors
    /// [`QuizError::NotStarted`] when the cursor is past the end, which
    /// is the case for every finished engine. Use [`status`](Self::status)
    /// for a snapshot that is valid in every state.
    pub fn current_challenge(&self) -> Result<Challenge, QuizError> {
        self.challenges
            .get(self.cursor)
            .copied()
            .ok_or(QuizError::NotStarted)
    }

    /// Checks `candidate` against the current challenge term.
    ///
    /// A match advances the cursor (finishing the quiz on the last one);
    /// a mismatch bumps the wrong-answer counter and leaves the cursor in
    /// place.
    ///
    /// # Errors
    /// - [`QuizError::AlreadyFinished`] if the quiz is over. Nothing is
    ///   mutated, even if `candidate` is also invalid.
    /// - [`QuizError::InvalidColor`] if `candidate` is not a palette name.
    ///   Invalid answers do not count as wrong.
    pub fn submit_answer(
        &mut self,
        candidate: &str,
    ) -> Result<AnswerOutcome, QuizError> {
        if self.finished {
            return Err(QuizError::AlreadyFinished);
        }
        let answer: Color = candidate.parse()?;
        let challenge = self.current_challenge()?;

        let correct = answer == challenge.term;
        if correct {
            self.cursor += 1;
            if self.cursor == self.challenges.len() {
                self.finished = true;
                self.finished_at = Some(Instant::now());
            }
        } else {
            self.wrong_count += 1;
        }

        Ok(AnswerOutcome {
            correct,
            finished: self.finished,
        })
    }

    /// Builds the snapshot sent to the player.
    pub fn status(&self) -> QuizStatus {
        let total = self.challenges.len();
        if self.finished {
            return QuizStatus {
                quiz: None,
                display_color: None,
                progress: total,
                total_quiz: total,
                wrong_count: self.wrong_count,
                is_finished: true,
                percentage: 100.0,
                time_used: Some(self.elapsed().as_secs_f64()),
            };
        }

        let current = self.challenges.get(self.cursor);
        QuizStatus {
            quiz: current.map(|c| c.term),
            display_color: current.map(|c| c.display),
            progress: self.cursor,
            total_quiz: total,
            wrong_count: self.wrong_count,
            is_finished: false,
            percentage: self.cursor as f64 * 100.0 / total as f64,
            time_used: None,
        }
    }

    /// Number of correctly answered challenges.
    pub fn progress(&self) -> usize {
        self.cursor
    }

    /// Length of the challenge sequence.
    pub fn total(&self) -> usize {
        self.challenges.len()
    }

    pub fn wrong_count(&self) -> u32 {
        self.wrong_count
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Time spent so far, frozen at the finishing answer once finished.
    pub fn elapsed(&self) -> Duration {
        match self.finished_at {
            Some(end) => end.duration_since(self.started_at),
            None => self.started_at.elapsed(),
        }
    }
}
