//! The fixed color palette.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::distr::{Distribution, StandardUniform};
use serde::{Deserialize, Serialize};

use crate::QuizError;

/// One of the six colors a challenge can use.
///
/// Serialized as the lowercase English name (`"red"`, `"purple"`, ...),
/// which is also what clients submit as answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Green,
    Blue,
    Yellow,
    Orange,
    Purple,
}

impl Color {
    /// Every color in the palette, in a fixed order.
    pub const PALETTE: [Color; 6] = [
        Color::Red,
        Color::Green,
        Color::Blue,
        Color::Yellow,
        Color::Orange,
        Color::Purple,
    ];

    /// Returns the lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Yellow => "yellow",
            Self::Orange => "orange",
            Self::Purple => "purple",
        }
    }

    /// Picks a palette color uniformly at random.
    pub fn random(rng: &mut impl Rng) -> Self {
        rng.random()
    }
}

/// Lets `rng.random::<Color>()` draw uniformly from the palette.
impl Distribution<Color> for StandardUniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Color {
        Color::PALETTE[rng.random_range(0..Color::PALETTE.len())]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Color {
    type Err = QuizError;

    /// Parses an exact lowercase palette name. Anything else, including
    /// different casing or surrounding whitespace, is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::PALETTE
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| QuizError::InvalidColor(s.to_string()))
    }
}
