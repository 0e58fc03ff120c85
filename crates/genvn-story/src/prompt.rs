//! Deterministic system-prompt construction.
//!
//! Pure function of its inputs: same scene, lore, and intent always produce
//! the identical prompt string. The prompt pins the model to a strict output
//! grammar: exactly one of a character utterance, a narration line, or a
//! bounded block of player choices per turn, never a mix.

use std::fmt::Write;

use crate::types::{CharacterState, StoryRequest, TurnIntent};

/// Bounds on a player-choice block.
pub const MIN_CHOICES: usize = 2;
pub const MAX_CHOICES: usize = 4;

const DIALOGUE_FORM: &str =
    "A single character line, formatted as NAME (emotion): \"utterance\"; \
the parenthesised emotion tag is optional.";

const NARRATION_FORM: &str = "A single narration line, formatted as NARRATION: text.";

fn choices_form() -> String {
    format!(
        "A choice block: the word CHOICES: on its own line, then between \
{MIN_CHOICES} and {MAX_CHOICES} numbered lines, one player option each."
    )
}

/// Build the system prompt for one generation turn.
#[must_use]
pub fn build_system_prompt(request: &StoryRequest, lore: &[String]) -> String {
    let mut prompt = String::from(
        "You narrate an interactive visual novel, one turn at a time. Stay \
in-world; never address the player as an AI.\n",
    );

    let _ = write!(prompt, "\n## Scene\nScene id: {}\n", request.scene_id);
    for line in &request.context {
        let _ = writeln!(prompt, "{line}");
    }

    prompt.push_str("\n## Characters on screen\n");
    if request.active_characters.is_empty() {
        prompt.push_str("(none; narration only)\n");
    } else {
        for character in &request.active_characters {
            let _ = writeln!(prompt, "{}", describe_character(character));
        }
    }

    if !lore.is_empty() {
        prompt.push_str("\n## Established lore\n");
        for fragment in lore {
            let _ = writeln!(prompt, "- {fragment}");
        }
    }

    prompt.push_str("\n## Output format\n");
    prompt.push_str(&grammar_section(request.intent));
    prompt
}

fn describe_character(character: &CharacterState) -> String {
    match &character.emotion {
        Some(emotion) => format!("- {} ({emotion})", character.name),
        None => format!("- {} (neutral)", character.name),
    }
}

fn grammar_section(intent: Option<TurnIntent>) -> String {
    match intent {
        None => format!(
            "Respond with exactly ONE of the following forms and nothing \
else:\n1. {DIALOGUE_FORM}\n2. {NARRATION_FORM}\n3. {}\nNever mix forms in \
one turn. No commentary outside the chosen form.\n",
            choices_form()
        ),
        Some(TurnIntent::Dialogue) => format!(
            "Respond with exactly one form and nothing else: {DIALOGUE_FORM}\n"
        ),
        Some(TurnIntent::Narration) => format!(
            "Respond with exactly one form and nothing else: {NARRATION_FORM}\n"
        ),
        Some(TurnIntent::Choices) => format!(
            "Respond with exactly one form and nothing else: {}\nDo not add \
dialogue or narration around the block.\n",
            choices_form()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> StoryRequest {
        StoryRequest {
            scene_id: "ch2_harbor".into(),
            context: vec!["Night. Rain on the pier.".into()],
            active_characters: vec![CharacterState {
                name: "Mara".into(),
                emotion: Some("anxious".into()),
                vars: std::collections::HashMap::new(),
            }],
            history: vec![],
            user_choice: "Wait under the awning".into(),
            intent: None,
        }
    }

    #[test]
    fn prompt_is_deterministic() {
        let req = request();
        let lore = vec!["Mara fears open water.".to_string()];
        assert_eq!(
            build_system_prompt(&req, &lore),
            build_system_prompt(&req, &lore)
        );
    }

    #[test]
    fn prompt_embeds_scene_characters_and_lore() {
        let prompt = build_system_prompt(&request(), &["Mara fears open water.".into()]);
        assert!(prompt.contains("Scene id: ch2_harbor"));
        assert!(prompt.contains("Night. Rain on the pier."));
        assert!(prompt.contains("- Mara (anxious)"));
        assert!(prompt.contains("- Mara fears open water."));
    }

    #[test]
    fn open_grammar_offers_exactly_three_forms_once() {
        let prompt = build_system_prompt(&request(), &[]);
        assert!(prompt.contains("exactly ONE"));
        assert!(prompt.contains("1. "));
        assert!(prompt.contains("3. "));
        assert!(!prompt.contains("4. "));
        assert!(prompt.contains("Never mix forms"));
    }

    #[test]
    fn choice_mode_bounds_are_two_to_four() {
        let mut req = request();
        req.intent = Some(TurnIntent::Choices);
        let prompt = build_system_prompt(&req, &[]);
        assert!(prompt.contains(&format!("between {MIN_CHOICES} and {MAX_CHOICES} numbered lines")));
        assert_eq!(MIN_CHOICES, 2);
        assert_eq!(MAX_CHOICES, 4);
    }

    #[test]
    fn choice_mode_excludes_other_forms() {
        let mut req = request();
        req.intent = Some(TurnIntent::Choices);
        let prompt = build_system_prompt(&req, &[]);
        assert!(!prompt.contains("NARRATION:"));
        assert!(!prompt.contains("utterance"));
        assert!(prompt.contains("Do not add dialogue or narration"));
    }

    #[test]
    fn narration_mode_is_single_form() {
        let mut req = request();
        req.intent = Some(TurnIntent::Narration);
        let prompt = build_system_prompt(&req, &[]);
        assert!(prompt.contains("NARRATION: text"));
        assert!(!prompt.contains("CHOICES:"));
    }

    #[test]
    fn empty_cast_noted_as_narration_only() {
        let mut req = request();
        req.active_characters.clear();
        let prompt = build_system_prompt(&req, &[]);
        assert!(prompt.contains("(none; narration only)"));
    }

    #[test]
    fn lore_section_omitted_when_empty() {
        let prompt = build_system_prompt(&request(), &[]);
        assert!(!prompt.contains("## Established lore"));
    }

    #[test]
    fn character_without_emotion_defaults_neutral() {
        let character = CharacterState::named("Juno");
        assert_eq!(describe_character(&character), "- Juno (neutral)");
    }
}
