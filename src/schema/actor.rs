use serde::{Deserialize, Serialize};

/// Newtype wrapper for actor IDs.
///
/// The engine never owns actor objects — every operation receives an
/// opaque identity and queries the host's collaborators for anything
/// actor-specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub u64);

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pronoun set for an actor, used when rendering `{subject}`,
/// `{object}` and `{possessive}` placeholders in scene text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pronouns {
    /// she/her/her
    SheHer,
    /// he/him/his
    HeHim,
    /// they/them/their
    TheyThem,
    /// it/it/its
    ItIts,
}

impl Default for Pronouns {
    fn default() -> Self {
        Self::TheyThem
    }
}

impl Pronouns {
    /// Nominative/subject form: "she", "he", "they", "it".
    pub fn subject(&self) -> &'static str {
        match self {
            Self::SheHer => "she",
            Self::HeHim => "he",
            Self::TheyThem => "they",
            Self::ItIts => "it",
        }
    }

    /// Accusative/object form: "her", "him", "them", "it".
    pub fn object(&self) -> &'static str {
        match self {
            Self::SheHer => "her",
            Self::HeHim => "him",
            Self::TheyThem => "them",
            Self::ItIts => "it",
        }
    }

    /// Possessive determiner: "her", "his", "their", "its".
    pub fn possessive(&self) -> &'static str {
        match self {
            Self::SheHer => "her",
            Self::HeHim => "his",
            Self::TheyThem => "their",
            Self::ItIts => "its",
        }
    }
}

/// A dynamic scalar value: scene flags, actor attributes, extension
/// descriptor parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    /// Truthiness in the scene-flag sense: false, zero, and the empty
    /// string are falsy; everything else is truthy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pronoun_forms() {
        assert_eq!(Pronouns::SheHer.subject(), "she");
        assert_eq!(Pronouns::HeHim.object(), "him");
        assert_eq!(Pronouns::TheyThem.possessive(), "their");
        assert_eq!(Pronouns::default(), Pronouns::TheyThem);
    }

    #[test]
    fn value_truthiness() {
        assert!(Value::Bool(true).truthy());
        assert!(!Value::Bool(false).truthy());
        assert!(Value::Int(3).truthy());
        assert!(!Value::Int(0).truthy());
        assert!(Value::Float(0.5).truthy());
        assert!(!Value::Float(0.0).truthy());
        assert!(Value::String("yes".to_string()).truthy());
        assert!(!Value::String(String::new()).truthy());
    }

    #[test]
    fn value_display() {
        assert_eq!(Value::Int(10).to_string(), "10");
        assert_eq!(Value::String("gold".to_string()).to_string(), "gold");
        assert_eq!(Value::Bool(true).to_string(), "true");
    }
}
