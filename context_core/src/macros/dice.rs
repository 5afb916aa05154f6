//! Dice notation for `{{roll}}`: `[count]d<sides>[+-*/modifier]`.

use std::str::FromStr;

use once_cell::sync::Lazy;
use rand::Rng;
use regex::{Captures, Regex};
use thiserror::Error;

/// Upper bound on dice rolled by one formula.
const MAX_DICE: u32 = 1000;

static NOTATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^([1-9]\d*)?d([1-9]\d*)([+\-*/]\d+)?$").expect("dice pattern is valid")
});

static ROLL_MACRO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\{\{roll[ :]([^}]+)\}\}").expect("roll macro pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Add(i64),
    Subtract(i64),
    Multiply(i64),
    Divide(i64),
}

/// A parsed dice formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceFormula {
    pub count: u32,
    pub sides: u32,
    pub modifier: Option<Modifier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid dice formula: {0}")]
pub struct InvalidFormula(pub String);

impl FromStr for DiceFormula {
    type Err = InvalidFormula;

    /// A bare number `N` is shorthand for `1dN`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let notation = if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
            format!("1d{trimmed}")
        } else {
            trimmed.to_string()
        };

        let invalid = || InvalidFormula(s.to_string());
        let caps = NOTATION.captures(&notation).ok_or_else(invalid)?;

        let count = match caps.get(1) {
            Some(m) => m.as_str().parse::<u32>().map_err(|_| invalid())?,
            None => 1,
        };
        let sides = caps[2].parse::<u32>().map_err(|_| invalid())?;
        if count > MAX_DICE {
            return Err(invalid());
        }

        let modifier = match caps.get(3) {
            Some(m) => {
                let (op, amount) = m.as_str().split_at(1);
                let amount = amount.parse::<i64>().map_err(|_| invalid())?;
                Some(match op {
                    "+" => Modifier::Add(amount),
                    "-" => Modifier::Subtract(amount),
                    "*" => Modifier::Multiply(amount),
                    _ if amount == 0 => return Err(invalid()),
                    _ => Modifier::Divide(amount),
                })
            }
            None => None,
        };

        Ok(Self {
            count,
            sides,
            modifier,
        })
    }
}

impl DiceFormula {
    pub fn min_total(&self) -> i64 {
        self.apply_modifier(i64::from(self.count))
    }

    pub fn max_total(&self) -> i64 {
        self.apply_modifier(i64::from(self.count) * i64::from(self.sides))
    }

    pub fn roll_with_rng<R: Rng>(&self, rng: &mut R) -> i64 {
        let sum: i64 = (0..self.count)
            .map(|_| i64::from(rng.gen_range(1..=self.sides)))
            .sum();
        self.apply_modifier(sum)
    }

    pub fn roll(&self) -> i64 {
        self.roll_with_rng(&mut rand::thread_rng())
    }

    fn apply_modifier(&self, total: i64) -> i64 {
        match self.modifier {
            None => total,
            Some(Modifier::Add(n)) => total.saturating_add(n),
            Some(Modifier::Subtract(n)) => total.saturating_sub(n),
            Some(Modifier::Multiply(n)) => total.saturating_mul(n),
            Some(Modifier::Divide(n)) => total.div_euclid(n),
        }
    }
}

/// Replace every `{{roll:formula}}` / `{{roll formula}}` with a rolled total.
pub fn replace_rolls(content: &str, invalid_placeholder: &str) -> String {
    ROLL_MACRO
        .replace_all(content, |caps: &Captures| match caps[1].parse::<DiceFormula>() {
            Ok(formula) => formula.roll().to_string(),
            Err(_) => invalid_placeholder.to_string(),
        })
        .into_owned()
}
