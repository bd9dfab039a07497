//! Resource vectors and quantity parsing.
//!
//! A [`ResourceList`] holds one non-negative integer per named resource
//! dimension. It is used both for pod demand and node capacity. Values are
//! stored in canonical integer units: `cpu` in millicores, every other
//! dimension (memory, GPUs, ...) in base units.
//!
//! Quantities in configuration use Kubernetes notation and are converted
//! with [`parse_quantity`]. Fractional results are rounded up, so a parsed
//! quantity never understates a demand.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Name of the CPU dimension (stored in millicores).
pub const CPU: &str = "cpu";

/// Name of the memory dimension (stored in bytes).
pub const MEMORY: &str = "memory";

/// Maximum number of fractional digits accepted in a quantity.
const MAX_FRACTION_DIGITS: u32 = 9;

/// Errors that can occur when parsing a resource quantity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuantityError {
    /// The quantity string was empty.
    #[error("empty quantity for resource {dimension}")]
    Empty {
        /// The resource dimension being parsed.
        dimension: String,
    },

    /// The quantity string is not valid Kubernetes quantity notation.
    #[error("invalid quantity {raw:?} for resource {dimension}")]
    Invalid {
        /// The resource dimension being parsed.
        dimension: String,
        /// The offending input.
        raw: String,
    },

    /// The quantity does not fit in the canonical integer range.
    #[error("quantity {raw:?} for resource {dimension} is out of range")]
    Overflow {
        /// The resource dimension being parsed.
        dimension: String,
        /// The offending input.
        raw: String,
    },
}

/// A resource vector: one integer amount per named dimension.
///
/// Dimensions that are absent are treated as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceList(BTreeMap<String, u64>);

impl ResourceList {
    /// Create an empty resource list.
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert of a single dimension.
    #[must_use]
    pub fn with(mut self, dimension: impl Into<String>, amount: u64) -> Self {
        self.0.insert(dimension.into(), amount);
        self
    }

    /// Set the amount for a dimension, replacing any previous value.
    pub fn insert(&mut self, dimension: impl Into<String>, amount: u64) {
        self.0.insert(dimension.into(), amount);
    }

    /// Amount for a dimension; zero when the dimension is absent.
    pub fn get(&self, dimension: &str) -> u64 {
        self.0.get(dimension).copied().unwrap_or(0)
    }

    /// Iterate over `(dimension, amount)` pairs in dimension order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(dim, amount)| (dim.as_str(), *amount))
    }

    /// Whether no dimension is present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether every dimension of `demand` is covered by `self`.
    pub fn covers(&self, demand: &Self) -> bool {
        demand.iter().all(|(dim, amount)| self.get(dim) >= amount)
    }

    /// Dimension-wise sum. Returns `None` if any dimension overflows.
    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        let mut sum = self.clone();
        for (dim, amount) in other.iter() {
            let total = sum.get(dim).checked_add(amount)?;
            sum.insert(dim, total);
        }
        Some(sum)
    }

    /// Dimension-wise difference, clamped at zero.
    ///
    /// The result carries every dimension of `self`.
    #[must_use]
    pub fn saturating_sub(&self, other: &Self) -> Self {
        Self(
            self.0
                .iter()
                .map(|(dim, amount)| (dim.clone(), amount.saturating_sub(other.get(dim))))
                .collect(),
        )
    }
}

impl FromIterator<(String, u64)> for ResourceList {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl core::fmt::Display for ResourceList {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("{")?;
        for (i, (dim, amount)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{dim}: {amount}")?;
        }
        f.write_str("}")
    }
}

/// Parse a map of `dimension -> quantity string` into a [`ResourceList`].
///
/// # Errors
///
/// Returns the first [`QuantityError`] encountered.
pub fn parse_resource_list(raw: &BTreeMap<String, String>) -> Result<ResourceList, QuantityError> {
    raw.iter()
        .map(|(dim, quantity)| parse_quantity(dim, quantity).map(|amount| (dim.clone(), amount)))
        .collect()
}

/// Parse a Kubernetes-style quantity for the given dimension.
///
/// Accepts an unsigned decimal mantissa followed by an optional suffix:
/// `m` (milli), decimal `k`/`K`, `M`, `G`, `T`, `P`, or binary `Ki`, `Mi`,
/// `Gi`, `Ti`, `Pi`. For [`CPU`] the result is in millicores (`"2"` is
/// `2000`, `"250m"` is `250`); other dimensions are in base units.
///
/// # Errors
///
/// Returns [`QuantityError`] if the input is empty, malformed, or overflows.
pub fn parse_quantity(dimension: &str, raw: &str) -> Result<u64, QuantityError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(QuantityError::Empty {
            dimension: dimension.to_owned(),
        });
    }

    let invalid = || QuantityError::Invalid {
        dimension: dimension.to_owned(),
        raw: raw.to_owned(),
    };
    let overflow = || QuantityError::Overflow {
        dimension: dimension.to_owned(),
        raw: raw.to_owned(),
    };

    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (mantissa, suffix) = text.split_at(split);

    let (numerator, scale) = parse_mantissa(mantissa).ok_or_else(invalid)?;
    let (mul, div) = suffix_multiplier(suffix).ok_or_else(invalid)?;
    let unit: u128 = if dimension == CPU { 1000 } else { 1 };

    let top = numerator
        .checked_mul(mul)
        .and_then(|v| v.checked_mul(unit))
        .ok_or_else(overflow)?;
    let bottom = scale.checked_mul(div).ok_or_else(overflow)?;
    let value = top.div_ceil(bottom);

    u64::try_from(value).map_err(|_err| overflow())
}

/// Split a decimal mantissa into `(numerator, denominator)`.
fn parse_mantissa(mantissa: &str) -> Option<(u128, u128)> {
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if frac_part.contains('.') {
        return None;
    }

    let frac_digits = u32::try_from(frac_part.len()).ok()?;
    if frac_digits > MAX_FRACTION_DIGITS {
        return None;
    }
    let scale = 10_u128.checked_pow(frac_digits)?;

    let int_value: u128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().ok()?
    };
    let frac_value: u128 = if frac_part.is_empty() {
        0
    } else {
        frac_part.parse().ok()?
    };

    let numerator = int_value.checked_mul(scale)?.checked_add(frac_value)?;
    Some((numerator, scale))
}

/// Multiplier for a quantity suffix, as `(multiply, divide)`.
const fn suffix_multiplier(suffix: &str) -> Option<(u128, u128)> {
    let factor = match suffix.as_bytes() {
        b"" => (1, 1),
        b"m" => (1, 1000),
        b"k" | b"K" => (1_000, 1),
        b"M" => (1_000_000, 1),
        b"G" => (1_000_000_000, 1),
        b"T" => (1_000_000_000_000, 1),
        b"P" => (1_000_000_000_000_000, 1),
        b"Ki" => (1 << 10, 1),
        b"Mi" => (1 << 20, 1),
        b"Gi" => (1 << 30, 1),
        b"Ti" => (1 << 40, 1),
        b"Pi" => (1 << 50, 1),
        _ => return None,
    };
    Some(factor)
}
