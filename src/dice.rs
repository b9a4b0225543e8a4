//! Dice and dice formulas like `2d6+3`
//!
//! Every roll takes the random number generator as an argument so callers decide where the
//! randomness comes from: the thread generator in the bot, a seeded one in tests.

use rand::Rng;
use std::{fmt, ops::Mul, str::FromStr};
use thiserror::Error;

pub const MAX_DICE: u32 = 100;
pub const MAX_SIDES: i64 = 1000;

pub const D6: Dice = Dice::new(1, 6);
pub const D20: Dice = Dice::new(1, 20);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("Empty dice formula")]
    Empty,
    #[error("Invalid dice formula `{0}`, expected something like 2d6+3")]
    InvalidFormat(String),
    #[error("Dice count must be between 1 and 100, got {0}")]
    InvalidDiceCount(u64),
    #[error("Die size must be between 2 and 1000, got {0}")]
    InvalidDieSize(i64),
}

/// `amount` dice, each rolling uniformly in `lower..=upper`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dice {
    pub lower: i64,
    pub upper: i64,
    pub amount: u32,
}

impl Dice {
    pub const fn new(lower: i64, upper: i64) -> Self {
        Self {
            lower,
            upper,
            amount: 1,
        }
    }

    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> DiceResult {
        DiceResult::from(
            (0..self.amount)
                .map(|_| rng.gen_range(self.lower..=self.upper))
                .collect::<Vec<_>>(),
        )
    }
}

/// `D6 * 3` is three six-sided dice.
impl Mul<u32> for Dice {
    type Output = Dice;

    fn mul(self, rhs: u32) -> Dice {
        Dice {
            amount: self.amount * rhs,
            ..self
        }
    }
}

/// Individual die results, in roll order, and their sum
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiceResult {
    pub results: Vec<i64>,
    pub total: i64,
}

impl From<Vec<i64>> for DiceResult {
    fn from(results: Vec<i64>) -> Self {
        let total = results.iter().sum();
        Self { results, total }
    }
}

/// A parsed formula: `XdY`, `dY`, `XdY+Z` or `XdY-Z`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceFormula {
    pub count: u32,
    pub sides: i64,
    pub modifier: i64,
}

/// Outcome of rolling a [`DiceFormula`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaRoll {
    pub formula: DiceFormula,
    pub dice: DiceResult,
    pub total: i64,
}

impl DiceFormula {
    pub fn parse(input: &str) -> Result<Self, DiceError> {
        let input = input.trim().to_lowercase();
        if input.is_empty() {
            return Err(DiceError::Empty);
        }
        let invalid = || DiceError::InvalidFormat(input.clone());

        let (count, rest) = input.split_once('d').ok_or_else(invalid)?;

        let count: u64 = if count.is_empty() {
            1
        } else {
            count.parse().map_err(|_| invalid())?
        };

        let (sides, modifier) = match rest.find(['+', '-']) {
            Some(pos) => {
                let (sides, modifier) = rest.split_at(pos);
                let (sign, digits) = modifier.split_at(1);
                if !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                let magnitude: i32 = digits.parse().map_err(|_| invalid())?;
                (sides, if sign == "-" { -magnitude } else { magnitude })
            }
            None => (rest, 0),
        };
        let sides: i64 = sides.parse().map_err(|_| invalid())?;

        if !(1..=u64::from(MAX_DICE)).contains(&count) {
            return Err(DiceError::InvalidDiceCount(count));
        }
        if !(2..=MAX_SIDES).contains(&sides) {
            return Err(DiceError::InvalidDieSize(sides));
        }

        Ok(Self {
            count: count as u32,
            sides,
            modifier: i64::from(modifier),
        })
    }

    pub fn dice(&self) -> Dice {
        Dice::new(1, self.sides) * self.count
    }

    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> FormulaRoll {
        let dice = self.dice().roll(rng);
        FormulaRoll {
            formula: *self,
            total: dice.total + self.modifier,
            dice,
        }
    }
}

impl FromStr for DiceFormula {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, DiceError> {
        Self::parse(s)
    }
}

impl fmt::Display for DiceFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)?;
        match self.modifier {
            0 => Ok(()),
            m if m > 0 => write!(f, "+{}", m),
            m => write!(f, "{}", m),
        }
    }
}
