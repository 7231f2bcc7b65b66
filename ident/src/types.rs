use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::IdentError;

/// Species supported by the identification engine. Each species owns an
/// independent pair of view indexes; there are no cross-species queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Species {
    Dog,
    Cat,
}

impl Species {
    pub const ALL: [Species; 2] = [Species::Dog, Species::Cat];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dog => "dog",
            Self::Cat => "cat",
        }
    }

    /// Slot position in the fixed species/view array.
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Dog => 0,
            Self::Cat => 1,
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Species {
    type Err = IdentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dog" => Ok(Self::Dog),
            "cat" => Ok(Self::Cat),
            _ => Err(IdentError::InvalidSpecies(s.to_string())),
        }
    }
}

/// View is one of the two embedding spaces derived from the same subject:
/// the whole-body crop or the face-region crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Body,
    Face,
}

impl View {
    pub const ALL: [View; 2] = [View::Body, View::Face];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Body => "body",
            Self::Face => "face",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Body => 0,
            Self::Face => 1,
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a fused ranking: a registered subject and its blended
/// body/face similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankedMatch {
    pub id: i64,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_species_parse() {
        assert_eq!("dog".parse::<Species>().unwrap(), Species::Dog);
        assert_eq!("Cat".parse::<Species>().unwrap(), Species::Cat);
        assert_eq!("DOG".parse::<Species>().unwrap(), Species::Dog);

        let err = "bird".parse::<Species>().unwrap_err();
        assert!(matches!(err, IdentError::InvalidSpecies(s) if s == "bird"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Species::Dog.to_string(), "dog");
        assert_eq!(Species::Cat.to_string(), "cat");
        assert_eq!(View::Body.to_string(), "body");
        assert_eq!(View::Face.to_string(), "face");
    }

    #[test]
    fn test_slot_indexes_distinct() {
        assert_ne!(Species::Dog.index(), Species::Cat.index());
        assert_ne!(View::Body.index(), View::Face.index());
    }

    #[test]
    fn test_ranked_match_wire_shape() {
        // Serialized as-is into search responses; field names are part of
        // the JSON API.
        let m = RankedMatch { id: 7, score: 0.5 };
        assert_eq!(
            serde_json::to_value(m).unwrap(),
            serde_json::json!({"id": 7, "score": 0.5})
        );
    }
}
