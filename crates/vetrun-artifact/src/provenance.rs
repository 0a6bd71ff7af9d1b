//! Provenance-tagged scalars
//!
//! A [`ProvenanceValue`] is a number that remembers which statistical
//! computation produced it. It behaves like its numeric payload in arithmetic
//! and comparisons, while the tag travels with the value through clones,
//! table cells and containers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

/// Display floor for tagged values rendered with [`RenderMode::SmallerThan`]
pub const P_VALUE_MIN: f64 = 1e-6;

/// Placeholder text for [`RenderMode::Masked`]
pub const MASKED_PLACEHOLDER: &str = "[masked]";

/// How a provenance-tagged value is stringified.
///
/// Selected per rendering call; there is no global mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Full numeric value
    #[default]
    Raw,
    /// `<floor` below [`P_VALUE_MIN`], three significant digits otherwise
    SmallerThan,
    /// Opaque placeholder
    Masked,
}

/// Immutable number tagged with the operation that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceValue {
    value: f64,
    created_by: String,
    label: Option<String>,
}

impl ProvenanceValue {
    /// Tag `value` as produced by `created_by`
    #[inline]
    #[must_use]
    pub fn new(value: f64, created_by: impl Into<String>, label: Option<String>) -> Self {
        Self {
            value,
            created_by: created_by.into(),
            label,
        }
    }

    /// Numeric payload
    #[inline]
    #[must_use]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Name of the intercepted function that produced the value
    #[inline]
    #[must_use]
    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    /// Originating label, e.g. the result field `pvalue`
    #[inline]
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Whether the payload has no fractional part
    #[must_use]
    pub fn is_integer(&self) -> bool {
        self.value.is_finite() && self.value.fract() == 0.0
    }

    /// Stringify according to `mode`
    #[must_use]
    pub fn render(&self, mode: RenderMode) -> String {
        match mode {
            RenderMode::Raw => format_float(self.value),
            RenderMode::SmallerThan => {
                if self.value < P_VALUE_MIN {
                    format!("<{}", format_significant(P_VALUE_MIN, 1))
                } else {
                    format_significant(self.value, 3)
                }
            }
            RenderMode::Masked => MASKED_PLACEHOLDER.to_string(),
        }
    }
}

impl fmt::Display for ProvenanceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(RenderMode::Raw))
    }
}

impl From<&ProvenanceValue> for f64 {
    fn from(value: &ProvenanceValue) -> Self {
        value.value
    }
}

impl PartialEq<f64> for ProvenanceValue {
    fn eq(&self, other: &f64) -> bool {
        self.value == *other
    }
}

impl PartialOrd<f64> for ProvenanceValue {
    fn partial_cmp(&self, other: &f64) -> Option<std::cmp::Ordering> {
        self.value.partial_cmp(other)
    }
}

macro_rules! transparent_op {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait<f64> for &ProvenanceValue {
            type Output = f64;
            fn $method(self, rhs: f64) -> f64 {
                self.value $op rhs
            }
        }

        impl $trait<f64> for ProvenanceValue {
            type Output = f64;
            fn $method(self, rhs: f64) -> f64 {
                self.value $op rhs
            }
        }

        impl $trait<&ProvenanceValue> for f64 {
            type Output = f64;
            fn $method(self, rhs: &ProvenanceValue) -> f64 {
                self $op rhs.value
            }
        }
    };
}

transparent_op!(Add, add, +);
transparent_op!(Sub, sub, -);
transparent_op!(Mul, mul, *);
transparent_op!(Div, div, /);

/// Result of a computation that went through the interception boundary
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// No active context intercepted the call
    Plain(f64),
    /// Tagged with its producing operation
    Tagged(ProvenanceValue),
}

impl Scalar {
    /// Numeric payload regardless of tagging
    #[inline]
    #[must_use]
    pub fn value(&self) -> f64 {
        match self {
            Self::Plain(v) => *v,
            Self::Tagged(p) => p.value(),
        }
    }

    /// Provenance, if tagged
    #[inline]
    #[must_use]
    pub fn provenance(&self) -> Option<&ProvenanceValue> {
        match self {
            Self::Plain(_) => None,
            Self::Tagged(p) => Some(p),
        }
    }
}

/// Shortest round-trippable rendering of a float
#[must_use]
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    format!("{value:?}")
}

/// Render `value` with `digits` significant digits, `%g` style
#[must_use]
pub fn format_significant(value: f64, digits: usize) -> String {
    if value == 0.0 || !value.is_finite() {
        return format_float(value);
    }
    let digits = digits.max(1);
    #[allow(clippy::cast_possible_truncation)]
    let exponent = value.abs().log10().floor() as i32;
    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    let max_exponent = digits as i32;
    if exponent < -4 || exponent >= max_exponent {
        let scientific = format!("{:.*e}", digits - 1, value);
        match scientific.split_once('e') {
            Some((mantissa, exp)) => {
                let exp: i32 = exp.parse().unwrap_or(0);
                let sign = if exp < 0 { '-' } else { '+' };
                format!("{}e{sign}{:02}", trim_zeros(mantissa), exp.abs())
            }
            None => scientific,
        }
    } else {
        #[allow(clippy::cast_sign_loss)]
        let decimals = (max_exponent - 1 - exponent).max(0) as usize;
        trim_zeros(&format!("{value:.decimals$}"))
    }
}

fn trim_zeros(text: &str) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn behaves_like_its_payload() {
        let p = ProvenanceValue::new(0.25, "ttest_ind", Some("pvalue".into()));
        assert_eq!(&p + 1.0, 1.25);
        assert_eq!(2.0 * &p, 0.5);
        assert!(p < 0.5);
        assert!(p == 0.25);
        assert_eq!(f64::from(&p), 0.25);
    }

    #[test]
    fn clone_keeps_tag() {
        let p = ProvenanceValue::new(0.01, "f_oneway", None);
        let cells = vec![p.clone(), p];
        assert!(cells.iter().all(|c| c.created_by() == "f_oneway"));
    }

    #[test]
    fn render_modes() {
        let tiny = ProvenanceValue::new(1e-9, "pearsonr", None);
        assert_eq!(tiny.render(RenderMode::SmallerThan), "<1e-06");
        assert_eq!(tiny.render(RenderMode::Masked), MASKED_PLACEHOLDER);
        assert_eq!(tiny.render(RenderMode::Raw), "1e-9");

        let p = ProvenanceValue::new(0.012_345, "pearsonr", None);
        assert_eq!(p.render(RenderMode::SmallerThan), "0.0123");
    }

    #[test]
    fn significant_digits() {
        assert_eq!(format_significant(3.141_592_653, 4), "3.142");
        assert_eq!(format_significant(1_234_567.0, 3), "1.23e+06");
        assert_eq!(format_significant(0.000_012_34, 2), "1.2e-05");
        assert_eq!(format_significant(9.9999, 3), "10");
        assert_eq!(format_significant(2.5, 5), "2.5");
    }
}
