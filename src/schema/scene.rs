/// Scene definitions — the declarative branching graph of nodes,
/// choices and effects, plus registration-time validation and RON
/// loading.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use super::condition::Condition;
use super::effect::Effect;

/// Name of the entry node every scene must contain.
pub const START_NODE: &str = "start";

#[derive(Debug, Error)]
pub enum SceneLoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// A structural problem found at registration time. Dangling
/// references are caught here, never at runtime.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("scene '{scene}' has no 'start' node")]
    MissingStart { scene: String },
    #[error("scene '{scene}' node '{node}' goto references unknown node '{target}'")]
    DanglingGoto {
        scene: String,
        node: String,
        target: String,
    },
    #[error(
        "scene '{scene}' node '{node}' choice {index} goto references unknown node '{target}'"
    )]
    DanglingChoiceGoto {
        scene: String,
        node: String,
        index: usize,
        target: String,
    },
    #[error("scene '{scene}' node '{node}' has both choices and a goto")]
    ChoicesAndGoto { scene: String, node: String },
    #[error("scene '{scene}' node '{node}' has an empty text pool")]
    EmptyTextPool { scene: String, node: String },
    #[error("scene '{scene}' node '{node}' has an empty goto pool")]
    EmptyGotoPool { scene: String, node: String },
    #[error("scene '{scene}' node '{node}' has a negative delay")]
    NegativeDelay { scene: String, node: String },
    #[error("scene '{scene}' node '{node}' has a random chance outside 0.0..=1.0")]
    ChanceOutOfRange { scene: String, node: String },
}

/// Node text: a single string, or a pool from which one candidate is
/// drawn uniformly at random when the node is entered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextSpec {
    One(String),
    Pool(Vec<String>),
}

impl TextSpec {
    /// Draw the text for one node entry.
    pub fn pick<'a>(&'a self, rng: &mut StdRng) -> &'a str {
        match self {
            TextSpec::One(s) => s,
            TextSpec::Pool(candidates) => candidates
                .choose(rng)
                .map(String::as_str)
                .unwrap_or_default(),
        }
    }
}

/// Auto-advance target: a single node name, or a pool from which one
/// target is drawn uniformly at random.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GotoSpec {
    One(String),
    Pool(Vec<String>),
}

impl GotoSpec {
    /// Draw the target for one advance.
    pub fn pick<'a>(&'a self, rng: &mut StdRng) -> &'a str {
        match self {
            GotoSpec::One(s) => s,
            GotoSpec::Pool(candidates) => candidates
                .choose(rng)
                .map(String::as_str)
                .unwrap_or_default(),
        }
    }

    fn targets(&self) -> Vec<&str> {
        match self {
            GotoSpec::One(s) => vec![s.as_str()],
            GotoSpec::Pool(candidates) => candidates.iter().map(String::as_str).collect(),
        }
    }
}

fn default_hidden() -> bool {
    true
}

/// One option presented to the actor on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Display string.
    pub text: String,
    /// Target node entered when this choice is taken.
    pub goto: String,
    /// Gate; absent means always visible and selectable.
    #[serde(default)]
    pub condition: Option<Condition>,
    /// Applied in order when the choice is taken.
    #[serde(default)]
    pub effects: Vec<Effect>,
    /// When the condition fails: `true` omits the choice from the
    /// rendered list entirely, `false` renders it non-selectable.
    #[serde(default = "default_hidden")]
    pub hidden: bool,
    /// Override text shown when `hidden` is false and the condition
    /// fails.
    #[serde(default)]
    pub disabled_text: Option<String>,
}

/// One beat of narrative within a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    pub text: TextSpec,
    #[serde(default)]
    pub choices: Vec<Choice>,
    /// Applied in order, once, when the node is entered — always
    /// before the choice list is computed.
    #[serde(default)]
    pub effects: Vec<Effect>,
    /// Auto-advance target; mutually exclusive with non-empty
    /// `choices`.
    #[serde(default)]
    pub goto: Option<GotoSpec>,
    /// Seconds before auto-advancing via `goto`. Zero advances
    /// immediately.
    #[serde(default)]
    pub delay: f64,
    #[serde(default)]
    pub is_ending: bool,
}

impl SceneNode {
    /// A node is terminal if it is flagged as an ending, or offers
    /// neither choices nor an auto-advance.
    pub fn is_terminal(&self) -> bool {
        self.is_ending || (self.choices.is_empty() && self.goto.is_none())
    }
}

/// An immutable, named branching narrative graph. Registered once,
/// shared read-only by every session playing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDefinition {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub tags: FxHashSet<String>,
    pub nodes: HashMap<String, SceneNode>,
}

impl SceneDefinition {
    /// Load a scene definition from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<SceneDefinition, SceneLoadError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a scene definition from a RON string.
    pub fn parse_ron(input: &str) -> Result<SceneDefinition, SceneLoadError> {
        let options = ron::Options::default()
            .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME);
        Ok(options.from_str(input)?)
    }

    /// Returns true if this scene carries the given tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// First structural problem, if any. Registration refuses
    /// definitions that fail this.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.problems().into_iter().next() {
            Some(problem) => Err(problem),
            None => Ok(()),
        }
    }

    /// Every structural problem in the definition, for lint tooling.
    pub fn problems(&self) -> Vec<ValidationError> {
        let mut problems = Vec::new();
        let scene = self.id.clone();

        if !self.nodes.contains_key(START_NODE) {
            problems.push(ValidationError::MissingStart {
                scene: scene.clone(),
            });
        }

        let mut names: Vec<&String> = self.nodes.keys().collect();
        names.sort();

        for name in names {
            let node = &self.nodes[name];

            if let TextSpec::Pool(candidates) = &node.text {
                if candidates.is_empty() {
                    problems.push(ValidationError::EmptyTextPool {
                        scene: scene.clone(),
                        node: name.clone(),
                    });
                }
            }

            if node.delay < 0.0 {
                problems.push(ValidationError::NegativeDelay {
                    scene: scene.clone(),
                    node: name.clone(),
                });
            }

            if node.goto.is_some() && !node.choices.is_empty() {
                problems.push(ValidationError::ChoicesAndGoto {
                    scene: scene.clone(),
                    node: name.clone(),
                });
            }

            if let Some(goto) = &node.goto {
                let targets = goto.targets();
                if targets.is_empty() {
                    problems.push(ValidationError::EmptyGotoPool {
                        scene: scene.clone(),
                        node: name.clone(),
                    });
                }
                for target in targets {
                    if !self.nodes.contains_key(target) {
                        problems.push(ValidationError::DanglingGoto {
                            scene: scene.clone(),
                            node: name.clone(),
                            target: target.to_string(),
                        });
                    }
                }
            }

            for (index, choice) in node.choices.iter().enumerate() {
                if !self.nodes.contains_key(&choice.goto) {
                    problems.push(ValidationError::DanglingChoiceGoto {
                        scene: scene.clone(),
                        node: name.clone(),
                        index,
                        target: choice.goto.clone(),
                    });
                }
                if let Some(condition) = &choice.condition {
                    condition.walk(&mut |c| {
                        if let Condition::Random { chance } = c {
                            if !(0.0..=1.0).contains(chance) {
                                problems.push(ValidationError::ChanceOutOfRange {
                                    scene: scene.clone(),
                                    node: name.clone(),
                                });
                            }
                        }
                    });
                }
            }
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(text: &str) -> SceneNode {
        SceneNode {
            text: TextSpec::One(text.to_string()),
            choices: Vec::new(),
            effects: Vec::new(),
            goto: None,
            delay: 0.0,
            is_ending: false,
        }
    }

    fn definition(nodes: Vec<(&str, SceneNode)>) -> SceneDefinition {
        SceneDefinition {
            id: "test_scene".to_string(),
            title: None,
            tags: FxHashSet::default(),
            nodes: nodes
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    #[test]
    fn valid_minimal_scene() {
        let def = definition(vec![("start", node("The end, already."))]);
        assert!(def.validate().is_ok());
    }

    #[test]
    fn missing_start_rejected() {
        let def = definition(vec![("middle", node("No way in."))]);
        assert!(matches!(
            def.validate(),
            Err(ValidationError::MissingStart { .. })
        ));
    }

    #[test]
    fn dangling_goto_rejected() {
        let mut start = node("Onward.");
        start.goto = Some(GotoSpec::One("nowhere".to_string()));
        let def = definition(vec![("start", start)]);
        assert!(matches!(
            def.validate(),
            Err(ValidationError::DanglingGoto { ref target, .. }) if target == "nowhere"
        ));
    }

    #[test]
    fn dangling_choice_goto_rejected() {
        let mut start = node("Pick one.");
        start.choices.push(Choice {
            text: "Leap".to_string(),
            goto: "missing".to_string(),
            condition: None,
            effects: Vec::new(),
            hidden: true,
            disabled_text: None,
        });
        let def = definition(vec![("start", start)]);
        assert!(matches!(
            def.validate(),
            Err(ValidationError::DanglingChoiceGoto { index: 0, .. })
        ));
    }

    #[test]
    fn choices_and_goto_mutually_exclusive() {
        let mut start = node("Conflicted.");
        start.goto = Some(GotoSpec::One("end".to_string()));
        start.choices.push(Choice {
            text: "Pick me".to_string(),
            goto: "end".to_string(),
            condition: None,
            effects: Vec::new(),
            hidden: true,
            disabled_text: None,
        });
        let def = definition(vec![("start", start), ("end", node("Done."))]);
        assert!(matches!(
            def.validate(),
            Err(ValidationError::ChoicesAndGoto { .. })
        ));
    }

    #[test]
    fn empty_text_pool_rejected() {
        let mut start = node("");
        start.text = TextSpec::Pool(Vec::new());
        let def = definition(vec![("start", start)]);
        assert!(matches!(
            def.validate(),
            Err(ValidationError::EmptyTextPool { .. })
        ));
    }

    #[test]
    fn chance_out_of_range_rejected() {
        let mut start = node("Gamble.");
        start.choices.push(Choice {
            text: "Risk it".to_string(),
            goto: "end".to_string(),
            condition: Some(Condition::Random { chance: 1.5 }),
            effects: Vec::new(),
            hidden: true,
            disabled_text: None,
        });
        let def = definition(vec![("start", start), ("end", node("Done."))]);
        assert!(matches!(
            def.validate(),
            Err(ValidationError::ChanceOutOfRange { .. })
        ));
    }

    #[test]
    fn terminal_classification() {
        let ending = SceneNode {
            is_ending: true,
            ..node("Fin.")
        };
        assert!(ending.is_terminal());
        assert!(node("No exits.").is_terminal());

        let mut auto = node("Moving on.");
        auto.goto = Some(GotoSpec::One("start".to_string()));
        assert!(!auto.is_terminal());
    }

    #[test]
    fn parse_scene_from_ron() {
        let def = SceneDefinition::parse_ron(
            r#"(
                id: "goblin_ambush",
                title: Some("Goblin Ambush"),
                tags: ["combat", "goblin"],
                nodes: {
                    "start": (
                        text: "A goblin leaps out of the bushes!",
                        choices: [
                            (text: "Fight", goto: "end_fight"),
                            (text: "Flee", goto: "end_flee", hidden: false),
                        ],
                    ),
                    "end_fight": (
                        text: "You stand your ground.",
                        effects: [give_currency(amount: 10)],
                        is_ending: true,
                    ),
                    "end_flee": (
                        text: ["You bolt.", "You run without looking back."],
                        is_ending: true,
                    ),
                },
            )"#,
        )
        .unwrap();

        assert_eq!(def.id, "goblin_ambush");
        assert!(def.has_tag("goblin"));
        assert_eq!(def.nodes.len(), 3);
        assert!(def.validate().is_ok());

        let start = &def.nodes["start"];
        assert_eq!(start.choices.len(), 2);
        assert!(start.choices[0].hidden);
        assert!(!start.choices[1].hidden);
        assert!(matches!(&def.nodes["end_flee"].text, TextSpec::Pool(p) if p.len() == 2));
    }

    #[test]
    fn text_pool_pick_is_member() {
        use rand::SeedableRng;
        let pool = TextSpec::Pool(vec!["a".to_string(), "b".to_string()]);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let picked = pool.pick(&mut rng);
            assert!(picked == "a" || picked == "b");
        }
    }
}
