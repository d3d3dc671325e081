use std::cell::Cell;

use listguard_core::canonical::CanonicalFields;
use listguard_core::error::Result;
use listguard_core::listing::{sanitize, unescape};
use listguard_core::quorum::{QUORUM_SIZE, SUPERMAJORITY};
use listguard_core::{CancelToken, Classifier, Label, QuorumEngine};
use proptest::prelude::*;

/// Replays a fixed list of answers, one per call.
struct Replay {
    answers: Vec<String>,
    next: Cell<usize>,
}

impl Classifier for Replay {
    fn classify(&self, _title: &str, _description: &str) -> Result<String> {
        let i = self.next.get();
        self.next.set(i + 1);
        Ok(self.answers[i % self.answers.len()].clone())
    }
}

fn arb_answer() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("true".to_string()),
        Just("FALSE".to_string()),
        Just("I think this is true".to_string()),
        Just("no idea".to_string()),
        Just(String::new()),
        "[a-z ]{0,80}",
    ]
}

const SCHEMA: &[&str] = &["title", "target"];

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    #[test]
    fn quorum_always_makes_ten_calls(answers in prop::collection::vec(arb_answer(), 10)) {
        let classifier = Replay { answers, next: Cell::new(0) };
        let engine = QuorumEngine::new(&classifier, CancelToken::new());
        let tally = engine.tally("title", "description").expect("tally");

        prop_assert_eq!(classifier.next.get(), QUORUM_SIZE as usize);
        prop_assert_eq!(tally.total(), QUORUM_SIZE);

        let expected = if tally.true_count >= SUPERMAJORITY {
            Label::Upvote
        } else if tally.false_count >= SUPERMAJORITY {
            Label::Downvote
        } else {
            Label::Ignore
        };
        prop_assert_eq!(tally.label(), expected);
    }

    #[test]
    fn canonical_strings_are_ascii_and_parse_back(title in "\\PC{1,40}", target in "[0-9a-f]{64}") {
        let json = CanonicalFields::new(SCHEMA)
            .set("title", title.as_str())
            .set("target", target.as_str())
            .to_json()
            .expect("canonical json");

        prop_assert!(json.is_ascii());
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        prop_assert_eq!(parsed["title"].as_str(), Some(title.as_str()));
        prop_assert!(json.starts_with("{\"title\":"), "json does not start with title field: {}", json);
    }

    #[test]
    fn sanitized_text_has_no_bare_pipes(text in "[a-z|\\\\ \\n]{0,40}") {
        let stored = sanitize(&text);
        prop_assert!(!stored.contains('\n'));
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        prop_assert_eq!(unescape(&stored), collapsed);
    }
}
