//! Exact musical time
//!
//! A `Timing` addresses a point as (bar, beat, div) and stores it as the
//! unreduced fraction `(beat + div * bar) / div`, so the grid resolution a
//! value was created with survives serialization.

use crate::error::{EditorError, Result};
use num_rational::Rational64;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Exact rational number used for all musical positions
pub type Fraction = Rational64;

/// Highest bar a document may address (one day at 60 bpm in 4/4)
pub const MAX_BAR: i64 = 60 * 24;

/// Finest grid resolution accepted from persisted data
pub const MAX_DIV: i64 = 120;

const EPSILON_DENOM: i64 = 1_000_000;

/// A position in bar space, or the INVALID sentinel
#[derive(Clone, Copy)]
pub struct Timing(Option<Fraction>);

impl Timing {
    /// Unset position
    pub const INVALID: Timing = Timing(None);

    pub const ZERO: Timing = Timing(Some(Fraction::new_raw(0, 1)));

    /// Logical end of a track lane
    pub const INFINITY: Timing = Timing(Some(Fraction::new_raw(1_000_000_000, 1)));

    /// Create a timing at `bar` + `beat`/`div`. A non-positive div yields INVALID.
    pub fn new(bar: i64, beat: i64, div: i64) -> Self {
        if div <= 0 {
            log::warn!("Timing div must be positive, got {} {} {}", bar, beat, div);
            return Timing::INVALID;
        }
        Timing(Some(Fraction::new_raw(beat + div * bar, div)))
    }

    /// Create a timing from a raw numerator over `div`
    pub fn from_beats(beats: i64, div: i64) -> Self {
        Timing::new(0, beats, div)
    }

    pub fn from_fraction(fraction: Fraction) -> Self {
        Timing(Some(fraction))
    }

    pub fn as_fraction(&self) -> Option<Fraction> {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        self.0.is_some()
    }

    pub fn numer(&self) -> i64 {
        self.0.map(|f| *f.numer()).unwrap_or(0)
    }

    pub fn div(&self) -> i64 {
        self.0.map(|f| *f.denom()).unwrap_or(1)
    }

    pub fn bar(&self) -> i64 {
        self.numer().div_euclid(self.div())
    }

    pub fn beat(&self) -> i64 {
        self.numer().rem_euclid(self.div())
    }

    /// Approximate value in bars. Only for display and external conversion.
    pub fn value(&self) -> f64 {
        match self.0 {
            Some(f) => *f.numer() as f64 / *f.denom() as f64,
            None => f64::NAN,
        }
    }

    /// First grid point of resolution `div` at or after this position
    pub fn lower_bound(&self, div: i64) -> Timing {
        match self.0 {
            Some(f) if div > 0 => {
                let scaled = f * Fraction::from_integer(div) - epsilon();
                Timing::from_beats(scaled.ceil().to_integer(), div)
            }
            _ => Timing::INVALID,
        }
    }

    /// First grid point of resolution `div` strictly after this position
    pub fn upper_bound(&self, div: i64) -> Timing {
        match self.0 {
            Some(f) if div > 0 => {
                let scaled = f * Fraction::from_integer(div) + epsilon();
                Timing::from_beats(scaled.floor().to_integer() + 1, div)
            }
            _ => Timing::INVALID,
        }
    }

    /// Step `step` grid units forward on this timing's own grid
    pub fn next_by(&self, step: i64) -> Timing {
        match self.0 {
            Some(f) => Timing::from_beats(*f.numer() + step, *f.denom()),
            None => Timing::INVALID,
        }
    }

    pub fn next(&self) -> Timing {
        self.next_by(1)
    }

    pub fn prev(&self) -> Timing {
        self.next_by(-1)
    }

    /// Offset by a duration; the result keeps the finer of the two grids
    pub fn add(&self, other: Timing) -> Timing {
        match (self.0, other.0) {
            (Some(a), Some(b)) => Timing::on_common_grid(a + b, a, b),
            _ => Timing::INVALID,
        }
    }

    pub fn sub(&self, other: Timing) -> Timing {
        match (self.0, other.0) {
            (Some(a), Some(b)) => Timing::on_common_grid(a - b, a, b),
            _ => Timing::INVALID,
        }
    }

    fn on_common_grid(value: Fraction, a: Fraction, b: Fraction) -> Timing {
        let div = lcm(*a.denom(), *b.denom());
        let beats = value * Fraction::from_integer(div);
        Timing::from_beats(beats.to_integer(), div)
    }

    pub fn min(self, other: Timing) -> Timing {
        if other < self {
            other
        } else {
            self
        }
    }

    pub fn max(self, other: Timing) -> Timing {
        if other > self {
            other
        } else {
            self
        }
    }

    /// Serialized form `<bar>:<beat>/<div>`
    pub fn serialize(&self) -> String {
        self.to_string()
    }

    /// Strict parse of `<bar>:<beat>/<div>`; missing beat/div default to 0 and 1
    pub fn deserialize(data: &str) -> Result<Timing> {
        let (bar_str, beat_div) = match data.split_once(':') {
            Some((bar, rest)) => (bar, Some(rest)),
            None => (data, None),
        };
        let (beat_str, div_str) = match beat_div {
            Some(rest) => match rest.split_once('/') {
                Some((beat, div)) => (Some(beat), Some(div)),
                None => (Some(rest), None),
            },
            None => (None, None),
        };

        let bar: i64 = bar_str
            .trim()
            .parse()
            .map_err(|_| EditorError::value(format!("Invalid bar: {}", bar_str)))?;
        if !(0..=MAX_BAR).contains(&bar) {
            return Err(EditorError::value(format!("Invalid bar: {}", bar_str)));
        }

        let div: i64 = match div_str {
            Some(s) => s
                .trim()
                .parse()
                .map_err(|_| EditorError::value(format!("Invalid div: {}", s)))?,
            None => 1,
        };
        if div <= 0 || div > MAX_DIV {
            return Err(EditorError::value(format!("Invalid div: {}", div)));
        }

        let beat: i64 = match beat_str {
            Some(s) => s
                .trim()
                .parse()
                .map_err(|_| EditorError::value(format!("Invalid beat: {}", s)))?,
            None => 0,
        };
        if beat < 0 || beat > div * MAX_BAR {
            return Err(EditorError::value(format!("Invalid beat: {}", beat)));
        }

        Ok(Timing::new(bar, beat, div))
    }
}

fn epsilon() -> Fraction {
    Fraction::new_raw(1, EPSILON_DENOM)
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a.abs()
}

fn lcm(a: i64, b: i64) -> i64 {
    let g = gcd(a, b);
    if g == 0 {
        return 1;
    }
    (a / g) * b
}

impl Default for Timing {
    fn default() -> Self {
        Timing::INVALID
    }
}

impl Ord for Timing {
    /// INVALID sorts before every valid position; valid positions compare by
    /// cross-multiplication, never through floats.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0, other.0) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => {
                let lhs = *a.numer() as i128 * *b.denom() as i128;
                let rhs = *b.numer() as i128 * *a.denom() as i128;
                lhs.cmp(&rhs)
            }
        }
    }
}

impl PartialOrd for Timing {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Timing {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Timing {}

impl Hash for Timing {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Equal values must hash equally regardless of grid
        self.0.map(|f| f.reduced()).hash(state);
    }
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}:{}/{}", self.bar(), self.beat(), self.div())
        } else {
            write!(f, "invalid")
        }
    }
}

impl fmt::Debug for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timing({})", self)
    }
}

impl FromStr for Timing {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self> {
        Timing::deserialize(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_beat_div() {
        let t = Timing::new(2, 3, 4);
        assert_eq!(t.bar(), 2);
        assert_eq!(t.beat(), 3);
        assert_eq!(t.div(), 4);
        assert_eq!(t.numer(), 11);
    }

    #[test]
    fn test_compare_across_grids() {
        assert_eq!(Timing::new(0, 2, 4), Timing::new(0, 1, 2));
        assert!(Timing::new(0, 1, 3) < Timing::new(0, 1, 2));
        assert!(Timing::INVALID < Timing::ZERO);
        assert!(Timing::new(MAX_BAR, 0, 1) < Timing::INFINITY);
    }

    #[test]
    fn test_serialize_keeps_grid() {
        assert_eq!(Timing::new(0, 2, 4).serialize(), "0:2/4");
        assert_eq!(Timing::new(3, 0, 8).serialize(), "3:0/8");
    }

    #[test]
    fn test_roundtrip_over_grid() {
        for div in [1, 3, 4, 7, 120] {
            for bar in [0, 1, 17, MAX_BAR - 1] {
                for beat in [0, div / 2, div - 1] {
                    let t = Timing::new(bar, beat, div);
                    let back = Timing::deserialize(&t.serialize()).unwrap();
                    assert_eq!(back, t);
                    assert_eq!(back.div(), t.div());
                }
            }
        }
    }

    #[test]
    fn test_deserialize_rejects_out_of_bounds() {
        assert!(Timing::deserialize("-1:0/4").is_err());
        assert!(Timing::deserialize("1441:0/4").is_err());
        assert!(Timing::deserialize("0:0/0").is_err());
        assert!(Timing::deserialize("0:0/121").is_err());
        assert!(Timing::deserialize("0:-1/4").is_err());
        assert!(Timing::deserialize("abc").is_err());
        assert!(matches!(
            Timing::deserialize("0:x/4"),
            Err(EditorError::Value(_))
        ));
    }

    #[test]
    fn test_deserialize_defaults() {
        assert_eq!(Timing::deserialize("3").unwrap(), Timing::new(3, 0, 1));
        assert_eq!(Timing::deserialize("1:2").unwrap(), Timing::new(1, 2, 1));
    }

    #[test]
    fn test_lower_and_upper_bound() {
        let t = Timing::new(0, 1, 3);
        assert_eq!(t.lower_bound(4), Timing::new(0, 2, 4));
        assert_eq!(t.upper_bound(4), Timing::new(0, 2, 4));

        let on_grid = Timing::new(0, 2, 4);
        assert_eq!(on_grid.lower_bound(4), on_grid);
        assert_eq!(on_grid.upper_bound(4), Timing::new(0, 3, 4));

        // Within epsilon of a grid point snaps onto it
        let near = Timing::from_fraction(Fraction::new(1_000_000 * 2 + 1, 4 * 1_000_000));
        assert_eq!(near.lower_bound(4), Timing::new(0, 2, 4));
    }

    #[test]
    fn test_next_prev() {
        let t = Timing::new(0, 3, 4);
        assert_eq!(t.next(), Timing::new(1, 0, 4));
        assert_eq!(t.prev(), Timing::new(0, 2, 4));
        assert!(!Timing::INVALID.next().is_valid());
    }

    #[test]
    fn test_add_sub() {
        let a = Timing::new(0, 1, 4);
        let b = Timing::new(0, 1, 3);
        assert_eq!(a.add(b), Timing::from_fraction(Fraction::new(7, 12)));
        assert_eq!(a.add(b).div(), 12);
        assert_eq!(a.add(b).sub(b), a);
    }
}
