//! Classification quorum.
//!
//! A single classifier answer is noisy. Each listing is classified
//! [`QUORUM_SIZE`] times in sequence and the answers are tallied; a label is
//! only assigned when one side reaches [`SUPERMAJORITY`]. Anything weaker
//! resolves to [`Label::Ignore`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::{GuardError, Result};
use crate::protocol::MarketAction;

/// Classifier calls per listing.
pub const QUORUM_SIZE: u32 = 10;
/// Votes one side needs before a label is assigned.
pub const SUPERMAJORITY: u32 = 6;
/// Answers longer than this many words are treated as rambling.
pub const MAX_ANSWER_WORDS: usize = 10;

/// The external classifier, called once per quorum slot.
///
/// Implementations return the raw answer text; normalisation happens in
/// [`Verdict::from_answer`].
pub trait Classifier {
    /// # Errors
    ///
    /// Any error is counted as an `ignore` answer by the quorum.
    fn classify(&self, title: &str, description: &str) -> Result<String>;
}

impl<C: Classifier + ?Sized> Classifier for &C {
    fn classify(&self, title: &str, description: &str) -> Result<String> {
        (**self).classify(title, description)
    }
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn classify(&self, title: &str, description: &str) -> Result<String> {
        (**self).classify(title, description)
    }
}

/// One normalised classifier answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    True,
    False,
    Ignore,
}

impl Verdict {
    /// Normalise a raw answer.
    ///
    /// Only the last non-blank line counts. A line of more than
    /// [`MAX_ANSWER_WORDS`] words is `Ignore`; otherwise a case-insensitive
    /// `true` wins over `false`, and anything else is `Ignore`.
    #[must_use]
    pub fn from_answer(answer: &str) -> Self {
        let Some(line) = answer.lines().rev().find(|l| !l.trim().is_empty()) else {
            return Self::Ignore;
        };
        if line.split_whitespace().count() > MAX_ANSWER_WORDS {
            return Self::Ignore;
        }
        let lower = line.to_lowercase();
        if lower.contains("true") {
            Self::True
        } else if lower.contains("false") {
            Self::False
        } else {
            Self::Ignore
        }
    }
}

/// Per-listing answer counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub true_count: u32,
    pub false_count: u32,
    pub ignore_count: u32,
}

impl Tally {
    #[must_use]
    pub const fn new(true_count: u32, false_count: u32, ignore_count: u32) -> Self {
        Self {
            true_count,
            false_count,
            ignore_count,
        }
    }

    /// The tally recorded for a listing that was never sent to the classifier.
    #[must_use]
    pub const fn all_ignored() -> Self {
        Self::new(0, 0, QUORUM_SIZE)
    }

    pub const fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::True => self.true_count += 1,
            Verdict::False => self.false_count += 1,
            Verdict::Ignore => self.ignore_count += 1,
        }
    }

    #[must_use]
    pub const fn total(&self) -> u32 {
        self.true_count + self.false_count + self.ignore_count
    }

    /// Apply the supermajority rule. `true` is checked first.
    #[must_use]
    pub const fn label(&self) -> Label {
        if self.true_count >= SUPERMAJORITY {
            Label::Upvote
        } else if self.false_count >= SUPERMAJORITY {
            Label::Downvote
        } else {
            Label::Ignore
        }
    }
}

/// Rendered as `true|false|ignore`, the form used in the decision log.
impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}",
            self.true_count, self.false_count, self.ignore_count
        )
    }
}

/// Outcome of classifying a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Upvote,
    Downvote,
    Ignore,
}

impl Label {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upvote => "upvote",
            Self::Downvote => "downvote",
            Self::Ignore => "ignore",
        }
    }

    /// The marketplace action this label asks for, if any.
    #[must_use]
    pub const fn action(self) -> Option<MarketAction> {
        match self {
            Self::Upvote => Some(MarketAction::Keep),
            Self::Downvote => Some(MarketAction::Remove),
            Self::Ignore => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "upvote" => Ok(Self::Upvote),
            "downvote" => Ok(Self::Downvote),
            "ignore" => Ok(Self::Ignore),
            other => Err(GuardError::Protocol(format!(
                "unknown label `{other}`; expected upvote, downvote or ignore"
            ))),
        }
    }
}

/// Runs the quorum for one listing at a time.
pub struct QuorumEngine<C> {
    classifier: C,
    cancel: CancelToken,
}

impl<C: Classifier> QuorumEngine<C> {
    pub const fn new(classifier: C, cancel: CancelToken) -> Self {
        Self { classifier, cancel }
    }

    /// Call the classifier [`QUORUM_SIZE`] times and count the answers.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Cancelled`] if the cancel token is set before
    /// any call. No tally is returned for an interrupted quorum.
    pub fn tally(&self, title: &str, description: &str) -> Result<Tally> {
        let mut tally = Tally::default();
        for call in 1..=QUORUM_SIZE {
            self.cancel.check()?;
            let verdict = match self.classifier.classify(title, description) {
                Ok(answer) => Verdict::from_answer(&answer),
                Err(err) => {
                    warn!(call, error = %err, "classifier call failed; counting as ignore");
                    Verdict::Ignore
                }
            };
            debug!(call, ?verdict, "classifier answer");
            tally.record(verdict);
        }
        Ok(tally)
    }

    /// Tally and label a listing.
    ///
    /// # Errors
    ///
    /// Same as [`tally`](Self::tally).
    pub fn classify(&self, title: &str, description: &str) -> Result<(Label, Tally)> {
        let tally = self.tally(title, description)?;
        Ok((tally.label(), tally))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Fixed(&'static str);

    impl Classifier for Fixed {
        fn classify(&self, _title: &str, _description: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    impl Classifier for Failing {
        fn classify(&self, _title: &str, _description: &str) -> Result<String> {
            Err(GuardError::external("ollama", "exit status 1"))
        }
    }

    struct Counting {
        calls: Cell<u32>,
        cancel_after: u32,
        cancel: CancelToken,
    }

    impl Classifier for Counting {
        fn classify(&self, _title: &str, _description: &str) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            if self.calls.get() == self.cancel_after {
                self.cancel.cancel();
            }
            Ok("true".into())
        }
    }

    #[test]
    fn verdict_uses_last_non_blank_line() {
        assert_eq!(Verdict::from_answer("false\n\ntrue\n  \n"), Verdict::True);
        assert_eq!(Verdict::from_answer("thinking...\nFALSE"), Verdict::False);
        assert_eq!(Verdict::from_answer("ignore"), Verdict::Ignore);
        assert_eq!(Verdict::from_answer("   \n"), Verdict::Ignore);
        assert_eq!(Verdict::from_answer(""), Verdict::Ignore);
    }

    #[test]
    fn verdict_rejects_long_answers() {
        let rambling = "I think this is true because the listing looks like a normal item";
        assert_eq!(Verdict::from_answer(rambling), Verdict::Ignore);
        assert_eq!(Verdict::from_answer("The answer is: True."), Verdict::True);
    }

    #[test]
    fn verdict_prefers_true_when_both_appear() {
        assert_eq!(Verdict::from_answer("true or false"), Verdict::True);
    }

    #[test]
    fn label_thresholds() {
        assert_eq!(Tally::new(6, 4, 0).label(), Label::Upvote);
        assert_eq!(Tally::new(5, 5, 0).label(), Label::Ignore);
        assert_eq!(Tally::new(0, 6, 4).label(), Label::Downvote);
        assert_eq!(Tally::new(5, 0, 5).label(), Label::Ignore);
        assert_eq!(Tally::all_ignored().label(), Label::Ignore);
    }

    #[test]
    fn tally_renders_pipe_separated() {
        assert_eq!(Tally::new(7, 2, 1).to_string(), "7|2|1");
    }

    #[test]
    fn label_maps_to_market_action() {
        assert_eq!(Label::Upvote.action(), Some(MarketAction::Keep));
        assert_eq!(Label::Downvote.action(), Some(MarketAction::Remove));
        assert_eq!(Label::Ignore.action(), None);
        assert_eq!("downvote".parse::<Label>().expect("label"), Label::Downvote);
        assert!("maybe".parse::<Label>().is_err());
    }

    #[test]
    fn engine_calls_exactly_quorum_size_times() {
        let cancel = CancelToken::new();
        let counting = Counting {
            calls: Cell::new(0),
            cancel_after: u32::MAX,
            cancel: cancel.clone(),
        };
        let engine = QuorumEngine::new(&counting, cancel);
        let (label, tally) = engine.classify("Widget", "Blue").expect("tally");
        assert_eq!(counting.calls.get(), QUORUM_SIZE);
        assert_eq!(tally, Tally::new(10, 0, 0));
        assert_eq!(label, Label::Upvote);
    }

    #[test]
    fn classifier_errors_count_as_ignore() {
        let engine = QuorumEngine::new(Failing, CancelToken::new());
        let tally = engine.tally("Widget", "Blue").expect("tally");
        assert_eq!(tally, Tally::new(0, 0, 10));
    }

    #[test]
    fn fixed_false_answers_downvote() {
        let engine = QuorumEngine::new(Fixed("false"), CancelToken::new());
        let (label, _) = engine.classify("Widget", "Blue").expect("tally");
        assert_eq!(label, Label::Downvote);
    }

    #[test]
    fn cancellation_aborts_before_next_call() {
        let cancel = CancelToken::new();
        let counting = Counting {
            calls: Cell::new(0),
            cancel_after: 4,
            cancel: cancel.clone(),
        };
        let engine = QuorumEngine::new(&counting, cancel);
        let err = engine.tally("Widget", "Blue").expect_err("interrupted");
        assert!(matches!(err, GuardError::Cancelled));
        assert_eq!(counting.calls.get(), 4);
    }

    #[test]
    fn pre_cancelled_token_makes_no_calls() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let counting = Counting {
            calls: Cell::new(0),
            cancel_after: u32::MAX,
            cancel: cancel.clone(),
        };
        let engine = QuorumEngine::new(&counting, cancel);
        assert!(engine.tally("t", "d").is_err());
        assert_eq!(counting.calls.get(), 0);
    }
}
