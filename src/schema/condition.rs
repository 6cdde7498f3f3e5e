/// Condition descriptors — declarative boolean predicates over actor
/// and session state, attached to choices to gate visibility.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::actor::Value;

/// A single condition descriptor. The set of kinds is closed; content
/// needing a host-specific check goes through [`Condition::Ext`] and a
/// handler registered on the evaluator.
///
/// In RON content these read as `has_item(item: "rusty key")`,
/// `currency_gte(amount: 50)`, `all([...])` and so on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Actor's inventory contains an item with this key.
    HasItem { item: String },
    /// Exact complement of `has_item`.
    LacksItem { item: String },
    /// Actor's currency balance is at least `amount`.
    CurrencyGte { amount: i64 },
    /// Actor's currency balance is below `amount`.
    CurrencyLt { amount: i64 },
    /// Actor carries the named status effect.
    HasEffect { effect: String },
    /// Exact complement of `has_effect`.
    LacksEffect { effect: String },
    /// Actor carries the (tag, category) pair.
    HasTag {
        tag: String,
        #[serde(default)]
        category: Option<String>,
    },
    /// Exact complement of `has_tag`.
    LacksTag {
        tag: String,
        #[serde(default)]
        category: Option<String>,
    },
    /// The named node has been reached earlier in this session.
    VisitedNode { node: String },
    /// The scene-local flag holds a truthy value. Missing flags are
    /// false.
    SceneFlag { flag: String },
    /// True with probability `chance`, rolled fresh on every
    /// evaluation. Re-rendering a choice list may change visibility;
    /// that is accepted, not a defect.
    Random { chance: f64 },
    /// Constant true.
    Always,
    /// Constant false.
    Never,
    /// All sub-conditions hold. Empty list is true.
    All(Vec<Condition>),
    /// At least one sub-condition holds. Empty list is false.
    Any(Vec<Condition>),
    /// The sub-condition does not hold.
    Not(Box<Condition>),
    /// Host-defined condition, dispatched through the evaluator's
    /// handler table. Unregistered kinds fail loudly at evaluation.
    Ext {
        kind: String,
        #[serde(default)]
        params: HashMap<String, Value>,
    },
}

impl Condition {
    /// Walks the condition tree, visiting every leaf and composite.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Condition)) {
        visit(self);
        match self {
            Condition::All(inner) | Condition::Any(inner) => {
                for c in inner {
                    c.walk(visit);
                }
            }
            Condition::Not(inner) => inner.walk(visit),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_condition_from_ron() {
        let cond: Condition = ron::from_str(r#"has_item(item: "rope")"#).unwrap();
        assert_eq!(
            cond,
            Condition::HasItem {
                item: "rope".to_string()
            }
        );
    }

    #[test]
    fn parse_composite_condition_from_ron() {
        let cond: Condition = ron::from_str(
            r#"all([currency_gte(amount: 10), not(has_effect(effect: "cursed"))])"#,
        )
        .unwrap();
        match cond {
            Condition::All(inner) => {
                assert_eq!(inner.len(), 2);
                assert!(matches!(inner[1], Condition::Not(_)));
            }
            other => panic!("expected all(..), got {:?}", other),
        }
    }

    #[test]
    fn parse_ext_condition_from_ron() {
        let cond: Condition =
            ron::from_str(r#"ext(kind: "moon_phase", params: {"phase": "full"})"#).unwrap();
        match cond {
            Condition::Ext { kind, params } => {
                assert_eq!(kind, "moon_phase");
                assert_eq!(
                    params.get("phase"),
                    Some(&Value::String("full".to_string()))
                );
            }
            other => panic!("expected ext(..), got {:?}", other),
        }
    }

    #[test]
    fn parse_unknown_kind_fails() {
        // Content typos must fail at load time, not be silently accepted.
        assert!(ron::from_str::<Condition>(r#"has_itm(item: "rope")"#).is_err());
    }

    #[test]
    fn walk_visits_nested() {
        let cond = Condition::Any(vec![
            Condition::Always,
            Condition::Not(Box::new(Condition::Random { chance: 0.25 })),
        ]);
        let mut count = 0;
        cond.walk(&mut |_| count += 1);
        assert_eq!(count, 4);
    }
}
