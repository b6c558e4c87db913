//! Game catalog: built-in game specs plus normalization of raw per-game
//! content into the canonical [`GameSpec`] shape.
//!
//! Raw game content is duck-typed per game (`isCorrect`,
//! `isCompassionate`, `isRespectful`, `choices` vs `options`, `text` vs
//! `label`); everything collapses to `ChoiceOption.correct` here so the
//! session only ever sees one shape.

use std::collections::BTreeSet;
use std::fmt;

use contracts::{
    Audience, BadgeRule, ChoiceOption, CountdownRule, GameSpec, Pillar, Question, RetryPolicy,
    RewardGrant, SCHEMA_VERSION_V1,
};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, PartialEq, Eq)]
pub enum CatalogError {
    EmptyGame(String),
    NoOptions { game_id: String, ordinal: u32 },
    NoCorrectOption { game_id: String, ordinal: u32 },
    DuplicateOptionId { game_id: String, ordinal: u32, option_id: String },
    Malformed(String),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyGame(game_id) => write!(f, "game {game_id} has no questions"),
            Self::NoOptions { game_id, ordinal } => {
                write!(f, "game {game_id} question {ordinal} has no options")
            }
            Self::NoCorrectOption { game_id, ordinal } => {
                write!(f, "game {game_id} question {ordinal} has no correct option")
            }
            Self::DuplicateOptionId {
                game_id,
                ordinal,
                option_id,
            } => write!(
                f,
                "game {game_id} question {ordinal} repeats option id {option_id}"
            ),
            Self::Malformed(detail) => write!(f, "malformed game content: {detail}"),
        }
    }
}

impl std::error::Error for CatalogError {}

/// Every question needs at least one correct option and distinct option
/// ids; the session relies on both.
pub fn validate_spec(spec: &GameSpec) -> Result<(), CatalogError> {
    if spec.questions.is_empty() {
        return Err(CatalogError::EmptyGame(spec.game_id.clone()));
    }
    for question in &spec.questions {
        if question.options.is_empty() {
            return Err(CatalogError::NoOptions {
                game_id: spec.game_id.clone(),
                ordinal: question.ordinal,
            });
        }
        if !question.has_correct_option() {
            return Err(CatalogError::NoCorrectOption {
                game_id: spec.game_id.clone(),
                ordinal: question.ordinal,
            });
        }
        let mut seen = BTreeSet::new();
        for option in &question.options {
            if !seen.insert(option.id.as_str()) {
                return Err(CatalogError::DuplicateOptionId {
                    game_id: spec.game_id.clone(),
                    ordinal: question.ordinal,
                    option_id: option.id.clone(),
                });
            }
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RawOption {
    #[serde(default)]
    id: Option<String>,
    #[serde(alias = "text")]
    label: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, alias = "isCorrect")]
    correct: Option<bool>,
    #[serde(default, rename = "isCompassionate")]
    compassionate: Option<bool>,
    #[serde(default, rename = "isRespectful")]
    respectful: Option<bool>,
}

impl RawOption {
    fn normalized(self, index: usize) -> ChoiceOption {
        let correct = self
            .correct
            .or(self.compassionate)
            .or(self.respectful)
            .unwrap_or(false);
        ChoiceOption {
            id: self.id.unwrap_or_else(|| format!("option_{}", index + 1)),
            label: self.label,
            description: self.description,
            correct,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    #[serde(alias = "question", alias = "title")]
    prompt: String,
    #[serde(alias = "choices")]
    options: Vec<RawOption>,
}

#[derive(Debug, Deserialize)]
struct RawGame {
    #[serde(alias = "gameId")]
    game_id: String,
    title: String,
    pillar: Pillar,
    audience: Audience,
    questions: Vec<RawQuestion>,
    #[serde(default)]
    points_per_question: Option<u32>,
    #[serde(default)]
    badge_min_correct: Option<u32>,
    #[serde(default)]
    countdown_seconds: Option<u64>,
    #[serde(default)]
    feedback_delay_ms: Option<u64>,
    #[serde(default)]
    retry: Option<RetryPolicy>,
    #[serde(default)]
    coins: Option<u32>,
    #[serde(default)]
    xp: Option<u32>,
    #[serde(default)]
    next_game: Option<String>,
    #[serde(default)]
    total_levels: Option<u32>,
    #[serde(default)]
    current_level: Option<u32>,
}

/// Parses raw game content (the per-game JSON shape of authored data
/// files) into a validated [`GameSpec`].
pub fn parse_game_value(value: Value) -> Result<GameSpec, CatalogError> {
    let raw: RawGame =
        serde_json::from_value(value).map_err(|err| CatalogError::Malformed(err.to_string()))?;

    let coins = raw.coins.unwrap_or(5);
    let spec = GameSpec {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        game_id: raw.game_id,
        title: raw.title,
        pillar: raw.pillar,
        audience: raw.audience,
        questions: raw
            .questions
            .into_iter()
            .enumerate()
            .map(|(index, question)| Question {
                ordinal: index as u32 + 1,
                prompt: question.prompt,
                options: question
                    .options
                    .into_iter()
                    .enumerate()
                    .map(|(option_index, option)| option.normalized(option_index))
                    .collect(),
            })
            .collect(),
        points_per_question: raw.points_per_question.unwrap_or(1),
        badge: raw.badge_min_correct.map(|min_correct| BadgeRule { min_correct }),
        countdown: raw.countdown_seconds.map(|seconds_per_question| CountdownRule {
            seconds_per_question,
        }),
        feedback_delay_ms: raw.feedback_delay_ms.unwrap_or(1500),
        retry: raw.retry.unwrap_or_default(),
        reward: RewardGrant {
            coins_per_level: coins,
            total_coins: coins,
            total_xp: raw.xp.unwrap_or(10),
        },
        next_game: raw.next_game,
        total_levels: raw.total_levels.unwrap_or(20),
        current_level: raw.current_level.unwrap_or(1),
    };
    validate_spec(&spec)?;
    Ok(spec)
}

pub fn game_by_id(game_id: &str) -> Option<GameSpec> {
    builtin_games().into_iter().find(|game| game.game_id == game_id)
}

fn option(id: &str, label: &str, description: &str, correct: bool) -> ChoiceOption {
    ChoiceOption {
        id: id.to_string(),
        label: label.to_string(),
        description: if description.is_empty() {
            None
        } else {
            Some(description.to_string())
        },
        correct,
    }
}

fn question(ordinal: u32, prompt: &str, options: Vec<ChoiceOption>) -> Question {
    Question {
        ordinal,
        prompt: prompt.to_string(),
        options,
    }
}

/// Built-in catalog covering the recurring game variants: a badge-threshold
/// quiz, a multi-option badge quiz with a gated retry, a countdown reflex
/// game, and a binary compassion game.
pub fn builtin_games() -> Vec<GameSpec> {
    vec![
        smart_saver(),
        social_helper_kid(),
        reflex_smart_growth(),
        compassion_kid(),
    ]
}

fn smart_saver() -> GameSpec {
    GameSpec {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        game_id: "finance-teens-10".to_string(),
        title: "Badge: Smart Saver".to_string(),
        pillar: Pillar::Finance,
        audience: Audience::Teens,
        questions: vec![
            question(
                1,
                "Your bike needs urgent repairs costing 500. You have 300 saved. What do you do?",
                vec![
                    option(
                        "save",
                        "Use savings + earn more",
                        "Use the 300 savings and do extra work to earn the remaining 200",
                        true,
                    ),
                    option(
                        "spend",
                        "Borrow from friends",
                        "Ask friends to lend you the full amount",
                        false,
                    ),
                ],
            ),
            question(
                2,
                "A friend offers 50% return on a 1000 investment in one month. What's your choice?",
                vec![
                    option(
                        "save",
                        "Decline risky offer",
                        "Avoid high-risk investments with unrealistic returns",
                        true,
                    ),
                    option(
                        "spend",
                        "Invest the money",
                        "Take the chance for quick profit",
                        false,
                    ),
                ],
            ),
            question(
                3,
                "You see a 2000 gadget you want, but you're saving for college fees. Do you buy it?",
                vec![
                    option(
                        "save",
                        "Stick to college goal",
                        "Continue saving for the more important college fees",
                        true,
                    ),
                    option(
                        "spend",
                        "Buy the gadget",
                        "Buy the gadget because you want it now",
                        false,
                    ),
                ],
            ),
            question(
                4,
                "You receive a 1000 bonus. Should you save it all or spend some?",
                vec![
                    option(
                        "save",
                        "Save 80%, spend 20%",
                        "Save 800 and use 200 for a small reward",
                        true,
                    ),
                    option(
                        "spend",
                        "Spend 50% on fun",
                        "Spend 500 on entertainment and save 500",
                        false,
                    ),
                ],
            ),
            question(
                5,
                "Friends are planning an expensive trip you can't afford. What do you do?",
                vec![
                    option(
                        "save",
                        "Plan affordable alternative",
                        "Suggest a less expensive activity you can all enjoy",
                        true,
                    ),
                    option(
                        "spend",
                        "Borrow to join",
                        "Use credit to join the trip and pay later",
                        false,
                    ),
                ],
            ),
        ],
        points_per_question: 1,
        badge: Some(BadgeRule { min_correct: 4 }),
        countdown: None,
        feedback_delay_ms: 1000,
        retry: RetryPolicy::Always,
        reward: RewardGrant {
            coins_per_level: 5,
            total_coins: 5,
            total_xp: 10,
        },
        next_game: Some("finance-teens-11".to_string()),
        total_levels: 20,
        current_level: 10,
    }
}

fn social_helper_kid() -> GameSpec {
    GameSpec {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        game_id: "ehe-kids-3".to_string(),
        title: "Badge: Social Helper Kid".to_string(),
        pillar: Pillar::Entrepreneurship,
        audience: Audience::Kids,
        questions: vec![
            question(
                1,
                "A classmate forgot their lunch. What is the helpful thing to do?",
                vec![
                    option("share", "Share your lunch", "", true),
                    option("ignore", "Pretend not to notice", "", false),
                    option("laugh", "Make fun of them", "", false),
                    option("tell", "Tell everyone about it", "", false),
                ],
            ),
            question(
                2,
                "Your neighbour is carrying heavy bags. What do you do?",
                vec![
                    option("help", "Offer to carry one", "", true),
                    option("watch", "Watch from the window", "", false),
                    option("walk", "Walk past quickly", "", false),
                    option("wait", "Wait for someone else to help", "", false),
                ],
            ),
            question(
                3,
                "The school yard is full of litter after an event. What is the helper's choice?",
                vec![
                    option("cleanup", "Organize a cleanup with friends", "", true),
                    option("complain", "Complain to the teacher", "", false),
                    option("avoid", "Play somewhere else", "", false),
                    option("blame", "Blame the older kids", "", false),
                ],
            ),
            question(
                4,
                "A new student doesn't know anyone. How can you help?",
                vec![
                    option("invite", "Invite them to join your game", "", true),
                    option("stare", "Stare at them", "", false),
                    option("whisper", "Whisper about them", "", false),
                    option("ignore", "Leave them alone", "", false),
                ],
            ),
            question(
                5,
                "Your little brother can't tie his shoes. What do you do?",
                vec![
                    option("teach", "Show him patiently how", "", true),
                    option("rush", "Tie them fast and leave", "", false),
                    option("tease", "Tease him about it", "", false),
                    option("skip", "Tell him to wear sandals", "", false),
                ],
            ),
        ],
        points_per_question: 1,
        badge: Some(BadgeRule { min_correct: 4 }),
        countdown: None,
        feedback_delay_ms: 1500,
        retry: RetryPolicy::BelowBadgeThreshold,
        reward: RewardGrant {
            coins_per_level: 5,
            total_coins: 5,
            total_xp: 10,
        },
        next_game: Some("ehe-kids-4".to_string()),
        total_levels: 20,
        current_level: 3,
    }
}

fn reflex_smart_growth() -> GameSpec {
    GameSpec {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        game_id: "finance-teens-16".to_string(),
        title: "Reflex: Smart Growth".to_string(),
        pillar: Pillar::Finance,
        audience: Audience::Teens,
        questions: vec![
            question(
                1,
                "Choose the smart financial choice:",
                vec![
                    option("invest", "Long-term invest", "", true),
                    option("spend", "Instant spend", "", false),
                    option("cash", "Save in cash", "", false),
                ],
            ),
            question(
                2,
                "Choose the smart financial choice:",
                vec![
                    option("splurge", "Spend everything", "", false),
                    option("plan", "Plan for future", "", true),
                    option("ignore", "Ignore savings", "", false),
                ],
            ),
            question(
                3,
                "Choose the smart financial choice:",
                vec![
                    option("budget", "Track a budget", "", true),
                    option("guess", "Guess your balance", "", false),
                    option("borrow", "Borrow for wants", "", false),
                ],
            ),
            question(
                4,
                "Choose the smart financial choice:",
                vec![
                    option("emergency", "Build emergency fund", "", true),
                    option("lottery", "Buy lottery tickets", "", false),
                    option("loan", "Take a quick loan", "", false),
                ],
            ),
            question(
                5,
                "Choose the smart financial choice:",
                vec![
                    option("compare", "Compare before buying", "", true),
                    option("impulse", "Buy on impulse", "", false),
                    option("trend", "Follow the trend", "", false),
                ],
            ),
        ],
        points_per_question: 1,
        badge: None,
        countdown: Some(CountdownRule {
            seconds_per_question: 5,
        }),
        feedback_delay_ms: 800,
        retry: RetryPolicy::Always,
        reward: RewardGrant {
            coins_per_level: 5,
            total_coins: 5,
            total_xp: 10,
        },
        next_game: Some("finance-teens-17".to_string()),
        total_levels: 20,
        current_level: 16,
    }
}

fn compassion_kid() -> GameSpec {
    GameSpec {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        game_id: "crgc-kids-2".to_string(),
        title: "Compassion Kid".to_string(),
        pillar: Pillar::CivicResponsibility,
        audience: Audience::Kids,
        questions: vec![
            question(
                1,
                "A friend falls off their bike and scrapes a knee. What do you do?",
                vec![
                    option("comfort", "Help them up and get a bandage", "", true),
                    option("film", "Record it to show others", "", false),
                ],
            ),
            question(
                2,
                "A stray cat looks hungry outside your house. What do you do?",
                vec![
                    option("feed", "Ask a grown-up to help feed it", "", true),
                    option("chase", "Chase it away", "", false),
                ],
            ),
            question(
                3,
                "Someone in class is crying quietly. What do you do?",
                vec![
                    option("ask", "Ask gently if they are okay", "", true),
                    option("point", "Point it out loudly", "", false),
                ],
            ),
            question(
                4,
                "Your friend lost the game you both played. What do you do?",
                vec![
                    option("cheer", "Say they played really well", "", true),
                    option("boast", "Brag about winning", "", false),
                ],
            ),
            question(
                5,
                "An elderly person drops their shopping. What do you do?",
                vec![
                    option("pickup", "Help pick everything up", "", true),
                    option("pass", "Keep walking", "", false),
                ],
            ),
        ],
        points_per_question: 1,
        badge: Some(BadgeRule { min_correct: 4 }),
        countdown: None,
        feedback_delay_ms: 1200,
        retry: RetryPolicy::Always,
        reward: RewardGrant {
            coins_per_level: 5,
            total_coins: 5,
            total_xp: 10,
        },
        next_game: None,
        total_levels: 20,
        current_level: 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtin_games_all_validate() {
        let games = builtin_games();
        assert!(!games.is_empty());
        for game in &games {
            validate_spec(game).expect("builtin game must be valid");
        }
    }

    #[test]
    fn lookup_by_id_finds_known_game() {
        let game = game_by_id("finance-teens-10").expect("known game");
        assert_eq!(game.questions.len(), 5);
        assert_eq!(game.badge, Some(BadgeRule { min_correct: 4 }));
    }

    #[test]
    fn parse_normalizes_is_correct_shape() {
        let spec = parse_game_value(json!({
            "game_id": "finance-kids-1",
            "title": "Quiz on Spending",
            "pillar": "finance",
            "audience": "kids",
            "questions": [
                {
                    "question": "You get pocket money. What first?",
                    "choices": [
                        { "id": "save", "text": "Save some", "isCorrect": true },
                        { "id": "spend", "text": "Spend it all", "isCorrect": false }
                    ]
                }
            ]
        }))
        .expect("parse");
        assert!(spec.questions[0].options[0].correct);
        assert!(!spec.questions[0].options[1].correct);
    }

    #[test]
    fn parse_normalizes_is_compassionate_shape() {
        let spec = parse_game_value(json!({
            "game_id": "crgc-kids-9",
            "title": "Kind Choices",
            "pillar": "civic_responsibility",
            "audience": "kids",
            "questions": [
                {
                    "question": "A friend is sad. What do you do?",
                    "options": [
                        { "text": "Sit with them", "isCompassionate": true },
                        { "text": "Walk away", "isCompassionate": false }
                    ]
                }
            ]
        }))
        .expect("parse");
        let options = &spec.questions[0].options;
        assert!(options[0].correct);
        assert_eq!(options[0].id, "option_1");
        assert!(!options[1].correct);
    }

    #[test]
    fn parse_rejects_question_without_correct_option() {
        let result = parse_game_value(json!({
            "game_id": "broken-1",
            "title": "Broken",
            "pillar": "health",
            "audience": "teens",
            "questions": [
                {
                    "question": "No right answer here",
                    "options": [
                        { "text": "A", "isCorrect": false },
                        { "text": "B", "isCorrect": false }
                    ]
                }
            ]
        }));
        assert_eq!(
            result,
            Err(CatalogError::NoCorrectOption {
                game_id: "broken-1".to_string(),
                ordinal: 1
            })
        );
    }

    #[test]
    fn duplicate_option_ids_are_rejected() {
        let mut spec = smart_saver();
        spec.questions[0].options[1].id = "save".to_string();
        assert!(matches!(
            validate_spec(&spec),
            Err(CatalogError::DuplicateOptionId { .. })
        ));
    }
}
