//! Prompt assembly: turns conversational state into one prompt string.
//!
//! Layout, one segment per line group:
//!
//! ```text
//! <system instruction>
//! [Context snippet]:            (only when a snippet was retrieved)
//! <snippet>
//! [User prompt]: <utterance>    (once per past turn)
//! <stored reply>
//! [User prompt]: <latest utterance>
//! [Assistant response]:
//! ```
//!
//! # Determinism
//!
//! Assembly is pure: identical inputs always produce byte-identical output.
//! No I/O, randomness, or time-dependent logic is involved.

use recurchat_core::turn::History;

/// Header line introducing the retrieved snippet.
pub const CONTEXT_HEADER: &str = "[Context snippet]:";

/// Prefix of every user line.
pub const USER_TAG: &str = "[User prompt]:";

/// Empty cue line the model continues from.
pub const ASSISTANT_CUE: &str = "[Assistant response]:";

/// Builds prompts for the generation backend.
///
/// Stateless apart from the optional history window; create one and reuse it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptAssembler {
    history_limit: Option<usize>,
}

impl PromptAssembler {
    /// An assembler that includes every past turn.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only include the most recent `max_turns` turns in the prompt.
    ///
    /// The history itself is not changed; older turns are simply not sent.
    pub fn with_history_limit(mut self, max_turns: Option<usize>) -> Self {
        self.history_limit = max_turns;
        self
    }

    /// Assemble the prompt for one generation call.
    pub fn assemble(
        &self,
        system_instruction: &str,
        snippet: &str,
        history: &History,
        latest_utterance: &str,
    ) -> String {
        let turns = match self.history_limit {
            Some(limit) => history.last_n(limit),
            None => history.turns(),
        };

        let mut parts: Vec<String> = Vec::with_capacity(turns.len() * 2 + 4);
        parts.push(system_instruction.to_string());

        if !snippet.is_empty() {
            parts.push(format!("{CONTEXT_HEADER}\n{snippet}"));
        }

        for turn in turns {
            parts.push(user_line(&turn.utterance));
            parts.push(turn.reply.clone());
        }

        parts.push(user_line(latest_utterance));
        parts.push(ASSISTANT_CUE.to_string());

        parts.join("\n")
    }
}

fn user_line(utterance: &str) -> String {
    format!("{USER_TAG} {utterance}")
}

/// Rough token estimate for diagnostics: 1 token ≈ 4 characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use recurchat_core::persona::DEFAULT_SYSTEM_PROMPT;
    use recurchat_core::turn::Turn;

    fn one_turn_history() -> History {
        History::from(vec![Turn::new("hi", "hello [StopSignal]")])
    }

    #[test]
    fn single_history_pair_without_context() {
        let prompt = PromptAssembler::new().assemble(
            DEFAULT_SYSTEM_PROMPT,
            "",
            &one_turn_history(),
            "how are you",
        );

        assert_eq!(prompt.matches(DEFAULT_SYSTEM_PROMPT).count(), 1);
        assert!(!prompt.contains(CONTEXT_HEADER));
        assert_eq!(prompt.matches(USER_TAG).count(), 2);
        assert_eq!(prompt.matches("hello [StopSignal]").count(), 1);
        assert!(prompt.ends_with("[User prompt]: how are you\n[Assistant response]:"));
    }

    #[test]
    fn exact_layout_with_context() {
        let prompt = PromptAssembler::new().assemble(
            "SYS",
            "line a\nline b",
            &one_turn_history(),
            "next",
        );

        assert_eq!(
            prompt,
            "SYS\n\
             [Context snippet]:\nline a\nline b\n\
             [User prompt]: hi\n\
             hello [StopSignal]\n\
             [User prompt]: next\n\
             [Assistant response]:"
        );
    }

    #[test]
    fn empty_history_has_only_latest_user_line() {
        let prompt = PromptAssembler::new().assemble("SYS", "", &History::new(), "first");
        assert_eq!(prompt, "SYS\n[User prompt]: first\n[Assistant response]:");
    }

    #[test]
    fn assembly_is_deterministic() {
        let assembler = PromptAssembler::new();
        let history = one_turn_history();
        let first = assembler.assemble("SYS", "ctx", &history, "again");
        for _ in 0..10 {
            assert_eq!(assembler.assemble("SYS", "ctx", &history, "again"), first);
        }
    }

    #[test]
    fn history_limit_keeps_most_recent_turns() {
        let history = History::from(vec![
            Turn::new("one", "r1 [StopSignal]"),
            Turn::new("two", "r2 [StopSignal]"),
            Turn::new("three", "r3 [StopSignal]"),
        ]);
        let prompt = PromptAssembler::new()
            .with_history_limit(Some(2))
            .assemble("SYS", "", &history, "four");

        assert!(!prompt.contains("[User prompt]: one"));
        assert!(prompt.contains("[User prompt]: two\nr2 [StopSignal]"));
        assert!(prompt.contains("[User prompt]: three\nr3 [StopSignal]"));
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn unlimited_history_keeps_everything() {
        let history = History::from(vec![Turn::new("one", "r1"), Turn::new("two", "r2")]);
        let prompt = PromptAssembler::new()
            .with_history_limit(None)
            .assemble("SYS", "", &history, "three");
        assert!(prompt.contains("[User prompt]: one\nr1"));
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("test"), 1);
        assert_eq!(estimate_tokens("hello"), 2);
    }
}
