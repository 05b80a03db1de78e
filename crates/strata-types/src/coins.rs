//! Multi-denomination coin vectors.
//!
//! Both vectors are sparse and sorted by denom: a zero entry is never stored, so
//! an empty vector is the zero vector.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::decimal::Dec;
use crate::{Result, TypesError};

/// Check a denomination against `[a-z][a-z0-9/]{2,127}`.
pub fn validate_denom(denom: &str) -> Result<()> {
    let mut chars = denom.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '/');
    if !first_ok || !rest_ok || denom.len() < 3 || denom.len() > 128 {
        return Err(TypesError::InvalidDenom(denom.to_string()));
    }
    Ok(())
}

/// Integer amounts per denomination.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coins(BTreeMap<String, u64>);

impl Coins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(denom: impl Into<String>, amount: u64) -> Self {
        let mut coins = Self::new();
        if amount > 0 {
            coins.0.insert(denom.into(), amount);
        }
        coins
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn amount_of(&self, denom: &str) -> u64 {
        self.0.get(denom).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(d, a)| (d.as_str(), *a))
    }

    /// Validate every denomination in the vector.
    pub fn validate(&self) -> Result<()> {
        self.0.keys().try_for_each(|d| validate_denom(d))
    }

    /// Per-denom sum. `None` on `u64` overflow.
    pub fn checked_add(&self, other: &Coins) -> Option<Coins> {
        let mut out = self.0.clone();
        for (denom, amount) in &other.0 {
            let entry = out.entry(denom.clone()).or_insert(0);
            *entry = entry.checked_add(*amount)?;
        }
        Some(Coins(out))
    }

    /// Per-denom difference. `None` if any denom would go negative.
    pub fn checked_sub(&self, other: &Coins) -> Option<Coins> {
        let mut out = self.0.clone();
        for (denom, amount) in &other.0 {
            let have = out.get(denom).copied().unwrap_or(0);
            let left = have.checked_sub(*amount)?;
            if left == 0 {
                out.remove(denom);
            } else {
                out.insert(denom.clone(), left);
            }
        }
        Some(Coins(out))
    }

    /// True if every amount in `other` is covered by `self`.
    pub fn is_all_gte(&self, other: &Coins) -> bool {
        other.iter().all(|(d, a)| self.amount_of(d) >= a)
    }
}

impl FromIterator<(String, u64)> for Coins {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut coins = Coins::new();
        for (denom, amount) in iter {
            if amount > 0 {
                *coins.0.entry(denom).or_insert(0) += amount;
            }
        }
        coins
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(d, a)| format!("{a}{d}")).collect();
        write!(f, "{}", parts.join(","))
    }
}

/// Decimal amounts per denomination.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecCoins(BTreeMap<String, Dec>);

impl DecCoins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(denom: impl Into<String>, amount: Dec) -> Self {
        let mut coins = Self::new();
        if !amount.is_zero() {
            coins.0.insert(denom.into(), amount);
        }
        coins
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_any_negative(&self) -> bool {
        self.0.values().any(Dec::is_negative)
    }

    pub fn amount_of(&self, denom: &str) -> Dec {
        self.0.get(denom).cloned().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Dec)> {
        self.0.iter().map(|(d, a)| (d.as_str(), a))
    }

    /// Per-denom sum.
    pub fn add(&self, other: &DecCoins) -> DecCoins {
        let mut out = self.0.clone();
        for (denom, amount) in &other.0 {
            let sum = out.get(denom).cloned().unwrap_or_default() + amount.clone();
            if sum.is_zero() {
                out.remove(denom);
            } else {
                out.insert(denom.clone(), sum);
            }
        }
        DecCoins(out)
    }

    /// Per-denom difference, returning the result and whether any denom went negative.
    pub fn safe_sub(&self, other: &DecCoins) -> (DecCoins, bool) {
        let diff = self.add(&other.negated());
        let negative = diff.is_any_negative();
        (diff, negative)
    }

    /// Per-denom difference. `None` if any denom would go negative.
    pub fn checked_sub(&self, other: &DecCoins) -> Option<DecCoins> {
        match self.safe_sub(other) {
            (diff, false) => Some(diff),
            (_, true) => None,
        }
    }

    /// Multiply every amount, rounding half-to-even.
    pub fn mul_dec(&self, factor: &Dec) -> DecCoins {
        self.map_amounts(|a| Some(a.mul(factor))).unwrap_or_default()
    }

    /// Multiply every amount, truncating.
    pub fn mul_dec_truncate(&self, factor: &Dec) -> DecCoins {
        self.map_amounts(|a| Some(a.mul_truncate(factor))).unwrap_or_default()
    }

    /// Divide every amount, truncating. `None` if `divisor` is zero.
    pub fn quo_dec_truncate(&self, divisor: &Dec) -> Option<DecCoins> {
        self.map_amounts(|a| a.quo_truncate(divisor))
    }

    /// Per-denom minimum over denoms present in both vectors.
    pub fn intersect(&self, other: &DecCoins) -> DecCoins {
        let out = self
            .0
            .iter()
            .filter_map(|(denom, amount)| {
                let theirs = other.0.get(denom)?;
                let min = amount.min(theirs).clone();
                (!min.is_zero()).then(|| (denom.clone(), min))
            })
            .collect();
        DecCoins(out)
    }

    /// Split into integer coins and the fractional change left behind.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::Overflow`] if an integer part does not fit in `u64`.
    pub fn truncate_decimal(&self) -> Result<(Coins, DecCoins)> {
        let mut truncated = Coins::new();
        let mut change = DecCoins::new();
        for (denom, amount) in &self.0 {
            let whole = if amount.is_negative() {
                0
            } else {
                amount
                    .truncate_u64()
                    .ok_or_else(|| TypesError::Overflow(format!("{amount}{denom}")))?
            };
            if whole > 0 {
                truncated.0.insert(denom.clone(), whole);
            }
            let rest = amount - &Dec::from(whole);
            if !rest.is_zero() {
                change.0.insert(denom.clone(), rest);
            }
        }
        Ok((truncated, change))
    }

    fn negated(&self) -> DecCoins {
        DecCoins(self.0.iter().map(|(d, a)| (d.clone(), -a.clone())).collect())
    }

    fn map_amounts(&self, f: impl Fn(&Dec) -> Option<Dec>) -> Option<DecCoins> {
        let mut out = BTreeMap::new();
        for (denom, amount) in &self.0 {
            let value = f(amount)?;
            if !value.is_zero() {
                out.insert(denom.clone(), value);
            }
        }
        Some(DecCoins(out))
    }
}

impl From<&Coins> for DecCoins {
    fn from(coins: &Coins) -> Self {
        DecCoins(coins.iter().map(|(d, a)| (d.to_string(), Dec::from(a))).collect())
    }
}

impl FromIterator<(String, Dec)> for DecCoins {
    fn from_iter<I: IntoIterator<Item = (String, Dec)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(DecCoins::new(), |acc, (denom, amount)| acc.add(&DecCoins::single(denom, amount)))
    }
}

impl fmt::Display for DecCoins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(d, a)| format!("{a}{d}")).collect();
        write!(f, "{}", parts.join(","))
    }
}
