// Property-based tests for the deduplicator.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::BTreeSet;

use proptest::prelude::*;
use presence_merge::config::{BlacklistConfig, DedupRules};
use presence_merge::dedup::{dedup, DedupOutput};
use presence_merge::ingest::Batch;
use presence_merge::{LinkField, Reasons, ScrapedRecord};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Weak-key value from a three-letter alphabet, often absent, so records
/// collide and chain often.
fn arb_key(prefix: &'static str) -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        2 => Just(None),
        3 => "[abc]".prop_map(move |k| Some(format!("{prefix}.com/{k}"))),
    ]
}

fn arb_reasons() -> impl Strategy<Value = Vec<&'static str>> {
    prop::sample::subsequence(vec!["h", "f", "b"], 0..=3)
}

/// Record without its tracking tag; `build` adds it.
#[derive(Debug, Clone)]
struct Draft {
    id: String,
    name: String,
    reasons: Vec<&'static str>,
    ws: Option<String>,
    li: Option<String>,
    fb: Option<String>,
    tw: Option<String>,
    description: Option<String>,
}

fn arb_draft() -> impl Strategy<Value = Draft> {
    (
        "id[0-5]",
        "[ABC]",
        arb_reasons(),
        arb_key("ws"),
        arb_key("li"),
        arb_key("fb"),
        arb_key("tw"),
        prop::option::of("[xyz]{1,3}"),
    )
        .prop_map(|(id, name, reasons, ws, li, fb, tw, description)| Draft {
            id,
            name,
            reasons,
            ws,
            li,
            fb,
            tw,
            description,
        })
}

/// Tag `t{i}` marks which output record absorbed input `i`.
fn tag(i: usize) -> String {
    format!("t{i}")
}

fn build(drafts: &[Draft]) -> Vec<ScrapedRecord> {
    drafts
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let mut reasons = Reasons::new(d.reasons.iter().copied());
            reasons.insert(tag(i));
            let mut r = ScrapedRecord::new(d.id.clone(), d.name.clone(), reasons);
            r.ws.clone_from(&d.ws);
            r.li.clone_from(&d.li);
            r.fb.clone_from(&d.fb);
            r.tw.clone_from(&d.tw);
            r.description.clone_from(&d.description);
            r
        })
        .collect()
}

/// Split the stream into two batches at `split`.
fn batches(records: Vec<ScrapedRecord>, split: usize) -> Vec<Batch> {
    let split = split.min(records.len());
    let (first, second) = records.split_at(split);
    vec![
        Batch {
            source: "batch_0001.json".into(),
            records: first.to_vec(),
        },
        Batch {
            source: "batch_0002.json".into(),
            records: second.to_vec(),
        },
    ]
}

fn run(batches: &[Batch]) -> DedupOutput {
    let blacklist = BlacklistConfig::default();
    dedup(
        batches,
        &DedupRules {
            blacklist: &blacklist,
            known_duplicates: &[],
        },
    )
}

fn arb_stream() -> impl Strategy<Value = (Vec<Draft>, usize)> {
    (prop::collection::vec(arb_draft(), 0..14), 0usize..14)
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn feeding_output_back_collapses_nothing((drafts, split) in arb_stream()) {
        let once = run(&batches(build(&drafts), split));

        let twice = run(&[Batch {
            source: "merged".into(),
            records: once.records.clone(),
        }]);
        prop_assert_eq!(&twice.records, &once.records);
        prop_assert!(twice.warnings.is_empty());
    }

    #[test]
    fn output_records_share_no_weak_key_or_id((drafts, split) in arb_stream()) {
        let out = run(&batches(build(&drafts), split));

        for (i, a) in out.records.iter().enumerate() {
            for b in &out.records[i + 1..] {
                prop_assert_ne!(&a.id, &b.id);
                prop_assert_eq!(a.shared_weak_key(b), None::<LinkField>);
            }
        }
    }

    #[test]
    fn merged_reasons_are_the_union_of_their_group((drafts, split) in arb_stream()) {
        let inputs = build(&drafts);
        let out = run(&batches(inputs.clone(), split));

        // every input lands in exactly one output record
        for i in 0..inputs.len() {
            let holders = out.records.iter().filter(|r| r.reasons.contains(&tag(i))).count();
            prop_assert_eq!(holders, 1);
        }

        for record in &out.records {
            let expected: BTreeSet<&str> = inputs
                .iter()
                .enumerate()
                .filter(|(i, _)| record.reasons.contains(&tag(*i)))
                .flat_map(|(_, input)| input.reasons.iter())
                .collect();
            let actual: BTreeSet<&str> = record.reasons.iter().collect();
            prop_assert_eq!(actual, expected);
        }
    }

    #[test]
    fn first_seen_non_empty_value_wins((drafts, split) in arb_stream()) {
        let inputs = build(&drafts);
        let out = run(&batches(inputs.clone(), split));

        for record in &out.records {
            let group: Vec<_> = inputs
                .iter()
                .enumerate()
                .filter(|(i, _)| record.reasons.contains(&tag(*i)))
                .map(|(_, input)| input)
                .collect();
            // the output keeps the earliest member's id and name
            prop_assert_eq!(&record.id, &group[0].id);
            prop_assert_eq!(&record.name, &group[0].name);
            // a value only ever comes from some member of the group
            if let Some(desc) = &record.description {
                prop_assert!(group.iter().any(|g| g.description.as_ref() == Some(desc)));
            } else {
                prop_assert!(group.iter().all(|g| g.description.is_none()));
            }
        }
    }
}
