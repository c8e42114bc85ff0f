//! Dice rolling tool.
//!
//! Notation: `[count]d<sides>[kh<n>|kl<n>][+<m>|-<m>]`, e.g. `2d6`, `d20`,
//! `4d6kh3`, `1d20+5`. A missing count means one die.

use std::fmt;
use std::sync::LazyLock;

use async_trait::async_trait;
use rand::Rng;
use regex::Regex;
use serde_json::{json, Map, Value};
use thiserror::Error;

use super::{required_str, Tool, ToolError};

pub const MAX_DICE: u64 = 100;
pub const MAX_SIDES: u64 = 1000;
pub const MAX_ROLLS: i64 = 20;
pub const MAX_MODIFIER: u64 = 1_000_000;

static NOTATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d*)d(\d+)(?:(kh|kl)(\d+))?(?:([+-])\s*(\d+))?$").unwrap()
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiceError {
    #[error("invalid dice notation '{0}', expected something like 2d6, d20 or 4d6kh3+1")]
    Malformed(String),

    #[error("dice count must be a positive integer, got {0}")]
    InvalidCount(u64),

    #[error("dice sides must be a positive integer, got {0}")]
    InvalidSides(u64),

    #[error("at most {max} dice can be rolled at once, got {0}", max = MAX_DICE)]
    TooManyDice(u64),

    #[error("dice can have at most {max} sides, got {0}", max = MAX_SIDES)]
    TooManySides(u64),

    #[error("cannot keep {keep} of {count} dice")]
    InvalidKeep { keep: u64, count: u64 },

    #[error("modifier can be at most {max}, got {0}", max = MAX_MODIFIER)]
    ModifierTooLarge(u64),

    #[error("num_rolls must be between 1 and {max}, got {0}", max = MAX_ROLLS)]
    InvalidRollCount(i64),
}

/// Which dice count towards the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keep {
    Highest(u32),
    Lowest(u32),
}

/// A validated dice expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiceSpec {
    pub count: u32,
    pub sides: u32,
    pub keep: Option<Keep>,
    pub modifier: i64,
}

impl fmt::Display for DiceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)?;
        match self.keep {
            Some(Keep::Highest(n)) => write!(f, "kh{}", n)?,
            Some(Keep::Lowest(n)) => write!(f, "kl{}", n)?,
            None => {}
        }
        match self.modifier {
            0 => Ok(()),
            m if m > 0 => write!(f, "+{}", m),
            m => write!(f, "{}", m),
        }
    }
}

/// Parse and validate a dice notation string.
pub fn parse_notation(notation: &str) -> Result<DiceSpec, DiceError> {
    let trimmed = notation.trim();
    let caps = NOTATION_RE
        .captures(trimmed)
        .ok_or_else(|| DiceError::Malformed(trimmed.to_string()))?;

    let number = |idx: usize| -> Result<Option<u64>, DiceError> {
        match caps.get(idx).map(|m| m.as_str()).filter(|s| !s.is_empty()) {
            Some(digits) => digits
                .parse::<u64>()
                .map(Some)
                .map_err(|_| DiceError::Malformed(trimmed.to_string())),
            None => Ok(None),
        }
    };

    let count = number(1)?.unwrap_or(1);
    let sides = number(2)?.unwrap_or(0);

    if count == 0 {
        return Err(DiceError::InvalidCount(count));
    }
    if count > MAX_DICE {
        return Err(DiceError::TooManyDice(count));
    }
    if sides == 0 {
        return Err(DiceError::InvalidSides(sides));
    }
    if sides > MAX_SIDES {
        return Err(DiceError::TooManySides(sides));
    }

    let keep = match (caps.get(3), number(4)?) {
        (Some(kind), Some(n)) => {
            if n == 0 || n > count {
                return Err(DiceError::InvalidKeep { keep: n, count });
            }
            if kind.as_str().eq_ignore_ascii_case("kh") {
                Some(Keep::Highest(n as u32))
            } else {
                Some(Keep::Lowest(n as u32))
            }
        }
        _ => None,
    };

    let modifier = match number(6)? {
        Some(m) if m > MAX_MODIFIER => return Err(DiceError::ModifierTooLarge(m)),
        Some(m) => {
            let m = m as i64;
            if caps.get(5).map(|s| s.as_str()) == Some("-") {
                -m
            } else {
                m
            }
        }
        None => 0,
    };

    Ok(DiceSpec {
        count: count as u32,
        sides: sides as u32,
        keep,
        modifier,
    })
}

/// The outcome of rolling a [`DiceSpec`] once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiceRoll {
    /// Every die, in the order rolled.
    pub results: Vec<u32>,
    /// Indices into `results` excluded by a keep rule.
    pub dropped: Vec<usize>,
    pub modifier: i64,
    pub total: i64,
}

/// Roll `spec` once.
pub fn roll<R: Rng>(spec: &DiceSpec, rng: &mut R) -> DiceRoll {
    let results: Vec<u32> = (0..spec.count)
        .map(|_| rng.gen_range(1..=spec.sides))
        .collect();

    let mut dropped = match spec.keep {
        Some(keep) => {
            let mut order: Vec<usize> = (0..results.len()).collect();
            let kept = match keep {
                Keep::Highest(n) => {
                    order.sort_by_key(|&i| std::cmp::Reverse(results[i]));
                    n
                }
                Keep::Lowest(n) => {
                    order.sort_by_key(|&i| results[i]);
                    n
                }
            };
            order.split_off(kept as usize)
        }
        None => Vec::new(),
    };
    dropped.sort_unstable();

    let kept_sum: i64 = results
        .iter()
        .enumerate()
        .filter(|(i, _)| !dropped.contains(i))
        .map(|(_, &v)| i64::from(v))
        .sum();

    DiceRoll {
        total: kept_sum + spec.modifier,
        results,
        dropped,
        modifier: spec.modifier,
    }
}

fn format_roll(roll: &DiceRoll) -> String {
    let values = roll
        .results
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let mut line = format!("[{}]", values);
    if !roll.dropped.is_empty() {
        let dropped = roll
            .dropped
            .iter()
            .map(|&i| roll.results[i].to_string())
            .collect::<Vec<_>>()
            .join(", ");
        line.push_str(&format!(" (dropped {})", dropped));
    }
    match roll.modifier {
        0 => {}
        m if m > 0 => line.push_str(&format!(" + {}", m)),
        m => line.push_str(&format!(" - {}", -m)),
    }
    line.push_str(&format!(" = {}", roll.total));
    line
}

/// Render one or more rolls of `spec` as a human-readable summary.
pub fn summarize(spec: &DiceSpec, rolls: &[DiceRoll]) -> String {
    match rolls {
        [single] => format!("Rolled {}: {}", spec, format_roll(single)),
        _ => {
            let mut out = format!("Rolled {} x {}:", spec, rolls.len());
            for (i, roll) in rolls.iter().enumerate() {
                out.push_str(&format!("\nRoll {}: {}", i + 1, format_roll(roll)));
            }
            let grand: i64 = rolls.iter().map(|r| r.total).sum();
            out.push_str(&format!("\nGrand total: {}", grand));
            out
        }
    }
}

fn roll_many(spec: &DiceSpec, num_rolls: usize) -> Vec<DiceRoll> {
    let mut rng = rand::thread_rng();
    (0..num_rolls).map(|_| roll(spec, &mut rng)).collect()
}

/// Roll dice from standard notation.
pub struct RollDice;

impl RollDice {
    fn num_rolls(args: &Map<String, Value>) -> Result<i64, ToolError> {
        let raw = match args.get("num_rolls") {
            None | Some(Value::Null) => return Ok(1),
            Some(v) => v,
        };
        let parsed = match raw {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| {
            ToolError::invalid("roll_dice", format!("num_rolls must be an integer, got {}", raw))
        })
    }
}

#[async_trait]
impl Tool for RollDice {
    fn name(&self) -> &str {
        "roll_dice"
    }

    fn description(&self) -> &str {
        "Roll dice using standard notation (e.g. '2d6', '1d20', '4d6kh3', '1d20+5'). Returns each die result and the total."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "notation": {
                    "type": "string",
                    "description": "Dice notation such as '2d6' or '1d20+3'"
                },
                "num_rolls": {
                    "type": "integer",
                    "description": "How many times to roll the dice (default: 1)"
                }
            },
            "required": ["notation"]
        })
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let notation = required_str(self.name(), args, "notation")?;
        let num_rolls = Self::num_rolls(args)?;

        let spec = parse_notation(notation).map_err(|e| ToolError::failed("rolling dice", e))?;
        if !(1..=MAX_ROLLS).contains(&num_rolls) {
            return Err(ToolError::failed(
                "rolling dice",
                DiceError::InvalidRollCount(num_rolls),
            ));
        }

        let rolls = roll_many(&spec, num_rolls as usize);
        Ok(summarize(&spec, &rolls))
    }
}
