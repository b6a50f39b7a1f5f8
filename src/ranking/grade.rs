use serde::{Deserialize, Serialize};
use std::fmt;

/// Letter bucket for the composite score (EV% × confidence/100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ValueGrade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "B+")]
    BPlus,
    B,
    #[serde(rename = "C+")]
    CPlus,
    C,
    D,
}

impl ValueGrade {
    /// Lower bounds are inclusive: exactly 15.0 is A+.
    pub fn from_composite(score: f64) -> ValueGrade {
        if score >= 15.0 {
            ValueGrade::APlus
        } else if score >= 12.0 {
            ValueGrade::A
        } else if score >= 9.0 {
            ValueGrade::BPlus
        } else if score >= 6.0 {
            ValueGrade::B
        } else if score >= 3.0 {
            ValueGrade::CPlus
        } else if score >= 1.0 {
            ValueGrade::C
        } else {
            // NaN lands here too
            ValueGrade::D
        }
    }

    /// Only the A and B families make the ranked list.
    pub fn is_surfaced(&self) -> bool {
        matches!(self, ValueGrade::APlus | ValueGrade::A | ValueGrade::BPlus | ValueGrade::B)
    }

    pub fn is_top(&self) -> bool {
        matches!(self, ValueGrade::APlus | ValueGrade::A)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueGrade::APlus => "A+",
            ValueGrade::A => "A",
            ValueGrade::BPlus => "B+",
            ValueGrade::B => "B",
            ValueGrade::CPlus => "C+",
            ValueGrade::C => "C",
            ValueGrade::D => "D",
        }
    }
}

impl fmt::Display for ValueGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_are_inclusive() {
        assert_eq!(ValueGrade::from_composite(15.0), ValueGrade::APlus);
        assert_eq!(ValueGrade::from_composite(14.999), ValueGrade::A);
        assert_eq!(ValueGrade::from_composite(12.0), ValueGrade::A);
        assert_eq!(ValueGrade::from_composite(9.0), ValueGrade::BPlus);
        assert_eq!(ValueGrade::from_composite(6.0), ValueGrade::B);
        assert_eq!(ValueGrade::from_composite(5.999), ValueGrade::CPlus);
        assert_eq!(ValueGrade::from_composite(3.0), ValueGrade::CPlus);
        assert_eq!(ValueGrade::from_composite(1.0), ValueGrade::C);
        assert_eq!(ValueGrade::from_composite(0.99), ValueGrade::D);
        assert_eq!(ValueGrade::from_composite(-20.0), ValueGrade::D);
        assert_eq!(ValueGrade::from_composite(f64::NAN), ValueGrade::D);
    }

    #[test]
    fn only_a_and_b_families_surface() {
        let surfaced: Vec<_> = [
            ValueGrade::APlus,
            ValueGrade::A,
            ValueGrade::BPlus,
            ValueGrade::B,
            ValueGrade::CPlus,
            ValueGrade::C,
            ValueGrade::D,
        ]
        .into_iter()
        .filter(ValueGrade::is_surfaced)
        .collect();
        assert_eq!(surfaced.len(), 4);
        assert!(ValueGrade::A.is_top());
        assert!(!ValueGrade::BPlus.is_top());
    }

    #[test]
    fn serializes_as_letters() {
        assert_eq!(serde_json::to_string(&ValueGrade::APlus).unwrap(), "\"A+\"");
        assert_eq!(serde_json::to_string(&ValueGrade::B).unwrap(), "\"B\"");
        assert_eq!(ValueGrade::CPlus.to_string(), "C+");
    }
}
