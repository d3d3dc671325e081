//! End-to-end moderation runs against scripted collaborators.

mod common;

use std::fs;

use common::{FakeNode, MARKET, ScriptedClassifier, abc_hash, temp_store};
use listguard_core::proposal::build_proposal;
use listguard_core::scan::scan_listings;
use listguard_core::vote::{scramble, signing_payload};
use listguard_core::{
    Broadcaster, CancelToken, DecisionSource, GuardError, Label, Listing, ListingHash,
    MarketAction, Moderator, QueueStore, Step, Tally,
};
use serde_json::json;

fn seven_two_one() -> ScriptedClassifier {
    ScriptedClassifier::new(vec![
        "true", "true", "false", "true", "true", "maybe", "TRUE", "false", "true", "true",
    ])
}

fn widget() -> Listing {
    Listing::new(
        ListingHash::parse(&abc_hash()).expect("hash"),
        "Widget",
        "A blue widget",
    )
}

#[test]
fn listing_flows_from_queue_to_votes() {
    let (_dir, store) = temp_store();
    store.enqueue(&widget()).expect("enqueue");

    // classify: 7 true / 2 false / 1 ignore
    let classifier = seven_two_one();
    let cancel = CancelToken::new();
    let moderator = Moderator::new(&store, &classifier, cancel.clone());
    let report = moderator.process_queue().expect("process");
    assert_eq!(classifier.calls(), 10);
    assert_eq!((report.processed, report.upvoted), (1, 1));

    let decisions = store.decisions().expect("decisions");
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].label, Label::Upvote);
    assert_eq!(decisions[0].tally, Tally::new(7, 2, 1));
    assert!(store.peek_front().expect("peek").is_none());

    let votes = store.vote_queue().expect("votes");
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0].action, MarketAction::Keep);

    // broadcast: no proposal yet, two funded addresses, the second cannot sign
    let mut node = FakeNode::with_funds(&["pAlice", "pBob"]);
    node.fail_sign.insert("pBob".into());
    let report = Broadcaster::new(&node, &store, cancel)
        .run(MARKET)
        .expect("broadcast");
    assert_eq!(report.voters, 2);
    assert_eq!(report.proposals_created, 1);
    assert_eq!(report.votes_sent, 1);
    assert_eq!(report.votes_failed, 1);
    assert_eq!(report.completed, 1);
    assert!(store.vote_queue().expect("votes").is_empty());

    let expected = build_proposal(
        &ListingHash::parse(&abc_hash()).expect("hash"),
        MARKET,
        MarketAction::Keep,
        "pAlice",
    )
    .expect("proposal");
    let keep_hash = expected.option_hash(MarketAction::Keep).expect("keep option");

    let sent = node.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!((sent[0].from.as_str(), sent[0].to.as_str()), (MARKET, MARKET));
    assert_eq!(sent[0].message["action"]["type"], "MPA_PROPOSAL_ADD");
    assert_eq!(sent[0].message["action"]["hash"], expected.hash.as_str());
    assert_eq!(sent[0].message["action"]["target"], abc_hash().as_str());

    assert_eq!((sent[1].from.as_str(), sent[1].to.as_str()), ("pAlice", MARKET));
    let vote = &sent[1].message["action"];
    assert_eq!(vote["type"], "MPA_VOTE");
    assert_eq!(vote["proposalHash"], expected.hash.as_str());
    assert_eq!(vote["proposalOptionHash"], keep_hash);
    assert_eq!(vote["signature"], "sig-pAlice");

    let signed = node.signed.borrow();
    let payload = signing_payload(&expected.hash, keep_hash, "pAlice").expect("payload");
    assert_eq!(signed[0], ("pAlice".to_string(), scramble(&payload)));

    let actions = fs::read_to_string(&store.paths().actions).expect("action log");
    let kinds: Vec<_> = actions
        .lines()
        .map(|l| l.split("] ").nth(1).unwrap_or_default())
        .collect();
    assert_eq!(
        kinds,
        vec![
            format!("Proposal | Widget | {}", abc_hash()),
            format!("Upvote | Widget | {}", abc_hash()),
        ]
    );
}

#[test]
fn interrupt_mid_quorum_logs_nothing() {
    let (_dir, store) = temp_store();
    store.enqueue(&widget()).expect("enqueue");

    let cancel = CancelToken::new();
    let classifier = seven_two_one().cancelling_after(4, cancel.clone());
    let moderator = Moderator::new(&store, &classifier, cancel);
    let report = moderator.process_queue().expect("process");

    assert!(report.interrupted);
    assert_eq!(report.processed, 0);
    assert_eq!(classifier.calls(), 4);
    assert!(store.decisions().expect("decisions").is_empty());
    assert!(store.vote_queue().expect("votes").is_empty());
    let head = store.peek_front().expect("peek").expect("still queued");
    assert_eq!(head.listing.hash.as_str(), abc_hash());
}

#[test]
fn process_next_reports_cancellation() {
    let (_dir, store) = temp_store();
    store.enqueue(&widget()).expect("enqueue");
    let cancel = CancelToken::new();
    cancel.cancel();
    let classifier = seven_two_one();
    let moderator = Moderator::new(&store, &classifier, cancel);
    assert!(matches!(
        moderator.process_next(),
        Err(GuardError::Cancelled)
    ));
    assert_eq!(classifier.calls(), 0);
}

#[test]
fn empty_title_is_ignored_without_classification() {
    let (_dir, store) = temp_store();
    store
        .enqueue(&Listing::new(
            ListingHash::parse(&abc_hash()).expect("hash"),
            "   ",
            "no title",
        ))
        .expect("enqueue");

    let classifier = seven_two_one();
    let moderator = Moderator::new(&store, &classifier, CancelToken::new());
    let Step::Decided(decision) = moderator.process_next().expect("step") else {
        panic!("expected a decision");
    };
    assert_eq!(classifier.calls(), 0);
    assert_eq!(decision.label, Label::Ignore);
    assert_eq!(decision.source, DecisionSource::EmptyTitle);
    assert_eq!(decision.tally.to_string(), "0|0|10");
    assert!(store.vote_queue().expect("votes").is_empty());
    assert_eq!(moderator.process_next().expect("step"), Step::Empty);
}

#[test]
fn classifier_sees_unescaped_text() {
    let (_dir, store) = temp_store();
    store
        .enqueue(&Listing::new(
            ListingHash::parse(&abc_hash()).expect("hash"),
            "Red | Blue",
            "two\nlines",
        ))
        .expect("enqueue");
    let classifier = ScriptedClassifier::new(vec!["false"]);
    let moderator = Moderator::new(&store, &classifier, CancelToken::new());
    let report = moderator.process_queue().expect("process");
    assert_eq!(report.downvoted, 1);
    assert_eq!(
        classifier.seen.borrow()[0],
        ("Red | Blue".to_string(), "two lines".to_string())
    );
    assert_eq!(
        store.vote_queue().expect("votes")[0].action,
        MarketAction::Remove
    );
}

#[test]
fn malformed_head_is_skipped() {
    let (_dir, store) = temp_store();
    fs::write(&store.paths().queue, "this is not a queue line\n").expect("seed");
    store.enqueue(&widget()).expect("enqueue");

    let classifier = ScriptedClassifier::new(vec!["<error>"]);
    let moderator = Moderator::new(&store, &classifier, CancelToken::new());
    let report = moderator.process_queue().expect("process");
    assert_eq!(report.skipped, 1);
    assert_eq!(report.ignored, 1, "failed classifier calls count as ignore");
    assert_eq!(store.decisions().expect("decisions")[0].tally, Tally::new(0, 0, 10));
}

fn proposal_inbox(target: &str, entries: &[(i64, &str)]) -> String {
    let messages: Vec<_> = entries
        .iter()
        .map(|(received, hash)| {
            let text = json!({
                "version": "3.3.1",
                "action": {
                    "type": "MPA_PROPOSAL_ADD",
                    "submitter": "pSomeoneElse",
                    "title": target,
                    "description": "This ListingItem should be removed.",
                    "options": [
                        {"optionId": 0, "description": "KEEP", "hash": format!("{hash}-keep")},
                        {"optionId": 1, "description": "REMOVE", "hash": format!("{hash}-remove")}
                    ],
                    "category": "ITEM_VOTE",
                    "target": target,
                    "hash": hash
                }
            });
            json!({"msgid": "m", "received": received, "text": text.to_string()})
        })
        .collect();
    json!({ "messages": messages }).to_string()
}

fn queue_vote(store: &impl QueueStore, hash: &str, action: &str) {
    let listing = Listing::new(ListingHash::parse(hash).expect("hash"), "Widget", "d");
    let tally = if action == "KEEP" {
        Tally::new(10, 0, 0)
    } else {
        Tally::new(0, 10, 0)
    };
    let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).expect("date");
    let decision = listguard_core::Decision::new(&listing, date, tally, DecisionSource::Quorum);
    store.log_decision(&decision).expect("log");
}

#[test]
fn existing_proposal_is_reused_by_every_voter() {
    let (_dir, store) = temp_store();
    queue_vote(&store, &abc_hash(), "REMOVE");

    let mut node = FakeNode::with_funds(&["pAlice", "pBob", "pAlice"]);
    node.proposal_inbox = proposal_inbox(&abc_hash(), &[(900, "late"), (100, "early")]);
    let report = Broadcaster::new(&node, &store, CancelToken::new())
        .run(MARKET)
        .expect("broadcast");

    assert_eq!(report.voters, 2, "duplicate UTXO addresses vote once");
    assert_eq!(report.proposals_found, 1);
    assert_eq!(report.proposals_created, 0);
    assert_eq!(report.votes_sent, 2);
    let sent = node.sent();
    assert!(sent.iter().all(|s| s.message["action"]["type"] == "MPA_VOTE"));
    assert!(
        sent.iter()
            .all(|s| s.message["action"]["proposalOptionHash"] == "early-remove")
    );
    let actions = fs::read_to_string(&store.paths().actions).expect("log");
    assert_eq!(actions.lines().count(), 1, "one vote line per listing");
    assert!(actions.contains("Downvote | Widget"));
}

#[test]
fn no_funded_address_aborts_the_run() {
    let (_dir, store) = temp_store();
    queue_vote(&store, &abc_hash(), "KEEP");
    let node = FakeNode::with_funds(&[]);
    let err = Broadcaster::new(&node, &store, CancelToken::new())
        .run(MARKET)
        .expect_err("no voters");
    assert!(matches!(err, GuardError::NoFundedAddress));
    assert!(err.is_run_fatal());
    assert_eq!(store.vote_queue().expect("votes").len(), 1);
}

#[test]
fn empty_vote_queue_never_touches_the_node() {
    let (_dir, store) = temp_store();
    let node = FakeNode::with_funds(&["pAlice"]);
    let report = Broadcaster::new(&node, &store, CancelToken::new())
        .run(MARKET)
        .expect("broadcast");
    assert_eq!(report.queued, 0);
    assert!(node.methods().is_empty());
}

#[test]
fn failed_proposal_leaves_entry_queued() {
    let (_dir, store) = temp_store();
    queue_vote(&store, &abc_hash(), "KEEP");
    let second = "d".repeat(64);
    queue_vote(&store, &second, "REMOVE");

    let mut node = FakeNode::with_funds(&["pAlice"]);
    node.fail_send_from.insert(MARKET.into());
    let report = Broadcaster::new(&node, &store, CancelToken::new())
        .run(MARKET)
        .expect("broadcast");

    assert_eq!(report.skipped, 2);
    assert_eq!(report.completed, 0);
    assert_eq!(report.votes_sent, 0);
    assert_eq!(store.vote_queue().expect("votes").len(), 2);
}

#[test]
fn inbox_failure_skips_the_entry() {
    let (_dir, store) = temp_store();
    queue_vote(&store, &abc_hash(), "KEEP");
    let mut node = FakeNode::with_funds(&["pAlice"]);
    node.fail_inbox = true;
    let report = Broadcaster::new(&node, &store, CancelToken::new())
        .run(MARKET)
        .expect("broadcast");
    assert_eq!(report.skipped, 1);
    assert!(node.sent().is_empty());
}

#[test]
fn all_votes_failing_still_completes_the_entry() {
    let (_dir, store) = temp_store();
    queue_vote(&store, &abc_hash(), "KEEP");
    let mut node = FakeNode::with_funds(&["pAlice", "pBob"]);
    node.fail_send_from.insert("pAlice".into());
    node.fail_send_from.insert("pBob".into());
    let report = Broadcaster::new(&node, &store, CancelToken::new())
        .run(MARKET)
        .expect("broadcast");
    assert_eq!(report.proposals_created, 1);
    assert_eq!(report.votes_failed, 2);
    assert_eq!(report.completed, 1);
    assert!(store.vote_queue().expect("votes").is_empty());
}

#[test]
fn cancelled_broadcast_stops_between_entries() {
    let (_dir, store) = temp_store();
    queue_vote(&store, &abc_hash(), "KEEP");
    let node = FakeNode::with_funds(&["pAlice"]);
    let cancel = CancelToken::new();
    cancel.cancel();
    let report = Broadcaster::new(&node, &store, cancel)
        .run(MARKET)
        .expect("broadcast");
    assert!(report.interrupted);
    assert_eq!(store.vote_queue().expect("votes").len(), 1);
}

#[test]
fn scan_queues_new_listings_only() {
    let (_dir, store) = temp_store();
    let valid = "e".repeat(64);
    let listing_msg = |hash: &str, title: &str| {
        json!({
            "version": "3.3.1",
            "action": {
                "type": "MPA_LISTING_ADD_03",
                "hash": hash,
                "item": {"information": {
                    "title": title,
                    "shortDescription": "Short |  text",
                    "longDescription": "Long\ntext"
                }}
            }
        })
        .to_string()
    };
    let messages = vec![
        json!({"msgid": "1", "text": listing_msg(&valid, "  Lamp\n")}),
        json!({"msgid": "2", "text": listing_msg(&valid, "Lamp again")}),
        json!({"msgid": "3", "text": listing_msg("xyz", "Bad hash")}),
        json!({"msgid": "4", "text": listing_msg(&"f".repeat(64), "")}),
        json!({"msgid": "5", "text": json!({"version": "3.3.1", "action": {"type": "MPA_VOTE"}}).to_string()}),
        json!({"msgid": "6", "text": "plain text"}),
    ];
    let mut node = FakeNode::with_funds(&[]);
    node.inbox = json!({ "messages": messages }).to_string();

    let report = scan_listings(&node, &store).expect("scan");
    assert_eq!(report.messages, 6);
    assert_eq!(report.enqueued, 1);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.invalid, 2);
    assert_eq!(report.other, 2);
    assert_eq!(node.methods()[0], "smsgscanbuckets");

    let head = store.peek_front().expect("peek").expect("entry");
    assert_eq!(head.listing.title, "Lamp");
    assert_eq!(head.listing.description, r"Short \| text Long text");
}
