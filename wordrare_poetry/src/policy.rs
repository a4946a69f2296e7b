// Steering policies: how permissive line repair is allowed to be.
//
// A policy gates the optional repair strategies (accepting slant rhyme,
// pivoting a line to a different rhyme class, breaking form) and bounds the
// number of repair rounds per line. Three canonical presets cover the usual
// cases; `SteeringPolicy::custom` builds anything else.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SteeringPolicy {
    pub name: String,
    pub allow_slant: bool,
    pub allow_pivot: bool,
    pub allow_breaks: bool,
    pub max_repairs: usize,
}

impl SteeringPolicy {
    pub fn custom(
        name: &str,
        allow_slant: bool,
        allow_pivot: bool,
        allow_breaks: bool,
        max_repairs: usize,
    ) -> Self {
        SteeringPolicy {
            name: name.to_string(),
            allow_slant,
            allow_pivot,
            allow_breaks,
            max_repairs,
        }
    }

    /// Perfect rhyme only, generous repair budget.
    pub fn strict_sonnet() -> Self {
        Self::custom("strict_sonnet", false, false, false, 10)
    }

    pub fn loose_tercet() -> Self {
        Self::custom("loose_tercet", true, true, false, 5)
    }

    /// Everything allowed, few repair rounds.
    pub fn free_verse() -> Self {
        Self::custom("free_verse", true, true, true, 3)
    }
}

impl Default for SteeringPolicy {
    fn default() -> Self {
        Self::loose_tercet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let strict = SteeringPolicy::strict_sonnet();
        assert!(!strict.allow_slant && !strict.allow_pivot && !strict.allow_breaks);
        assert_eq!(strict.max_repairs, 10);

        let loose = SteeringPolicy::loose_tercet();
        assert!(loose.allow_slant && loose.allow_pivot && !loose.allow_breaks);
        assert_eq!(loose.max_repairs, 5);

        let free = SteeringPolicy::free_verse();
        assert!(free.allow_breaks);
        assert_eq!(free.max_repairs, 3);
    }

    #[test]
    fn test_default_is_loose() {
        assert_eq!(SteeringPolicy::default(), SteeringPolicy::loose_tercet());
    }
}
