//! Coordinate move notation: `"<file><rank>-<file><rank>"`, e.g. `"e2-e4"`.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::board::Square;
use crate::error::ParseError;

static MOVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-h][1-8])-([a-h][1-8])$").expect("static move regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: Square,
    pub to: Square,
}

impl Move {
    pub fn new(from: Square, to: Square) -> Self {
        Self { from, to }
    }
}

impl FromStr for Move {
    type Err = ParseError;

    /// Surrounding whitespace is ignored; anything else must match exactly.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = MOVE_RE
            .captures(s.trim())
            .ok_or_else(|| ParseError::Move(s.to_string()))?;
        Ok(Move {
            from: caps[1].parse()?,
            to: caps[2].parse()?,
        })
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}
