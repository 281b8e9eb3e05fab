//! "What if..." continuation screen content

use serde_json::Value;

pub const NOT_PROVIDED: &str = "NOT_PROVIDED";

pub const STREAM_FAILED: &str = "Désolé, quelque chose ne va pas. Réessayez plus tard.";
pub const ALTERNATIVES_FAILED: &str =
    "Désolé, je ne peux pas fournir d'autres alternatives pour le moment.";
pub const PROPOSE_OWN: &str = "Propose ta propre suite. Qu'imagines-tu comme tournant inattendu dans l'histoire ? Partage-le ci-dessous.";
pub const CONTINUE_ORIGINAL: &str =
    "Très bien, continuons l'histoire telle qu'elle a été imaginée par l'auteur...";

/// Question/answer pair carried from the riddle gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhatIfContext {
    pub question: String,
    pub answer: String,
}

impl WhatIfContext {
    /// Blank fields fall back to the "not provided" sentinel.
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        let or_sentinel = |s: String| {
            if s.trim().is_empty() {
                NOT_PROVIDED.to_string()
            } else {
                s
            }
        };
        Self {
            question: or_sentinel(question.into()),
            answer: or_sentinel(answer.into()),
        }
    }
}

impl Default for WhatIfContext {
    fn default() -> Self {
        Self {
            question: NOT_PROVIDED.to_string(),
            answer: NOT_PROVIDED.to_string(),
        }
    }
}

pub fn intro_message(context: &WhatIfContext) -> String {
    format!(
        "✨ **Bienvenue** dans l’espace *“Et si …”* de l’**IA SIGNATURE** associée au récit *“La conversation muette”* 🎭\n\n\
         Tu viens de répondre à la question :\n\
         ❓ **{}**\n\n\
         Ta réponse juste était :\n\
         ✅ **{}**\n\n\
         💡 Et si cet instant révélait des chemins insoupçonnés pour le récit ? ✨\n\
         ➡️ *Que veux-tu explorer maintenant ?*",
        context.question, context.answer
    )
}

/// Content of the turn appended for an alternatives response.
///
/// The payload is not validated: a JSON string is shown as its text, any
/// other value as its JSON serialization.
pub fn alternatives_content(payload: Value) -> String {
    match payload {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_context_uses_sentinel() {
        let context = WhatIfContext::default();
        assert_eq!(context.question, NOT_PROVIDED);
        assert_eq!(context.answer, NOT_PROVIDED);

        let blank = WhatIfContext::new("", "  ");
        assert_eq!(blank, context);
    }

    #[test]
    fn test_intro_mentions_question_and_answer() {
        let context = WhatIfContext::new("Quel symbole renaît du feu ?", "le phénix");
        let intro = intro_message(&context);
        assert!(intro.contains("❓ **Quel symbole renaît du feu ?**"));
        assert!(intro.contains("✅ **le phénix**"));
    }

    #[test]
    fn test_alternatives_string_is_unwrapped() {
        assert_eq!(alternatives_content(json!("Et si Tristan...")), "Et si Tristan...");
    }

    #[test]
    fn test_alternatives_other_json_is_verbatim() {
        let payload = json!({"alternatives": ["a", "b"]});
        assert_eq!(alternatives_content(payload), r#"{"alternatives":["a","b"]}"#);
    }
}
