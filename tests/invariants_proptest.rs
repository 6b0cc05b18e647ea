//! Property-based tests for the quantified invariants: trie lookup
//! consistency, posting-iterator skip monotonicity, the statistics codec
//! round trip, and statistics-cache apply/revert symmetry.

use proptest::prelude::*;
use proxidex::posting::leaf::LeafIterator;
use proxidex::posting::PostingIterator;
use proxidex::stats::cache::{DfIncrement, StatisticsCache};
use proxidex::stats::message::{StatisticsBuilder, StatisticsViewer};
use proxidex::trie::CompactTrie;
use proxidex::types::{DocumentNumber, Position, Posting};
use std::collections::HashMap;

fn arb_key() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..0xFEu8, 1..12)
}

proptest! {
    #[test]
    fn trie_lookup_matches_last_insert_for_every_key(
        inserts in prop::collection::vec((arb_key(), 1u32..10_000), 1..40)
    ) {
        let mut trie = CompactTrie::new();
        let mut expected: HashMap<Vec<u8>, u32> = HashMap::new();
        for (key, id) in &inserts {
            trie.insert(key, *id).unwrap();
            expected.insert(key.clone(), *id);
        }
        for (key, id) in &expected {
            prop_assert_eq!(trie.lookup(key).unwrap(), Some(*id));
        }
        prop_assert_eq!(trie.lookup(b"never-inserted-sentinel-key").unwrap(), None);
    }

    #[test]
    fn trie_forward_iteration_is_sorted_and_matches_lookup(
        inserts in prop::collection::vec((arb_key(), 1u32..10_000), 1..30)
    ) {
        let mut trie = CompactTrie::new();
        for (key, id) in &inserts {
            trie.insert(key, *id).unwrap();
        }
        let entries: Vec<(Vec<u8>, u32)> = trie.iter().collect::<Result<_, _>>().unwrap();
        for window in entries.windows(2) {
            prop_assert!(window[0].0 < window[1].0);
        }
        for (key, id) in &entries {
            prop_assert_eq!(trie.lookup(key).unwrap(), Some(*id));
        }
    }

    #[test]
    fn leaf_iterator_skip_doc_is_monotonic_and_skips_no_postings(
        mut docnos in prop::collection::vec(1u64..500, 1..40)
    ) {
        docnos.sort_unstable();
        docnos.dedup();
        let postings: Vec<Posting> = docnos
            .iter()
            .map(|&d| Posting::new(DocumentNumber::new(d).unwrap(), Position::new(1).unwrap(), 1).unwrap())
            .collect();
        let mut iter = LeafIterator::new("f".to_string(), postings, docnos.len() as u64);

        let mut last_result = 0u64;
        for &target in &docnos {
            let result = iter.skip_doc(target).unwrap();
            prop_assert!(result == 0 || result >= target);
            if result > 0 {
                prop_assert!(!docnos.iter().any(|&d| d >= target && d < result));
            }
            last_result = result;
        }
        let _ = last_result;
    }

    #[test]
    fn statistics_codec_round_trips_arbitrary_sequences(
        mut entries in prop::collection::vec(
            ("[a-z]{1,6}", "[a-z]{1,8}", -1000i32..1000i32), 0..20
        )
    ) {
        entries.sort();
        entries.dedup_by(|a, b| a.0 == b.0 && a.1 == b.1);
        entries.retain(|(_, _, delta)| *delta != 0);

        let mut builder = StatisticsBuilder::new(1 << 20);
        for (ty, value, delta) in &entries {
            builder.add_df_change(ty, value, *delta).unwrap();
        }
        builder.add_nof_documents_inserted_change(5).unwrap();
        let chunks = builder.commit();
        prop_assert!(chunks.len() <= 1);

        if let Some(chunk) = chunks.first() {
            let mut viewer = StatisticsViewer::new(chunk).unwrap();
            prop_assert_eq!(viewer.nof_documents_inserted_change(), 5);
            let mut decoded = Vec::new();
            while let Some(entry) = viewer.next_entry().unwrap() {
                decoded.push((entry.term_type, entry.term_value, entry.delta));
            }
            let expected: Vec<(String, String, i32)> =
                entries.iter().map(|(t, v, d)| (t.clone(), v.clone(), *d)).collect();
            prop_assert_eq!(decoded, expected);
        } else {
            prop_assert!(entries.is_empty());
        }
    }

    #[test]
    fn statistics_cache_apply_then_revert_is_identity(
        batch in prop::collection::vec((0u32..4, 0u32..20, -50i64..50i64), 1..15)
    ) {
        let cache = StatisticsCache::new();
        let before: Vec<i64> = batch.iter().map(|&(t, term, _)| cache.get(t, term)).collect();

        let increments: Vec<DfIncrement> = batch
            .iter()
            .map(|&(type_id, term_id, delta)| DfIncrement { type_id, term_id, delta })
            .collect();

        if cache.apply_batch(&increments).is_ok() {
            let reverted: Vec<DfIncrement> = increments
                .iter()
                .rev()
                .map(|inc| DfIncrement { delta: -inc.delta, ..*inc })
                .collect();
            if cache.apply_batch(&reverted).is_ok() {
                let after: Vec<i64> = batch.iter().map(|&(t, term, _)| cache.get(t, term)).collect();
                prop_assert_eq!(before, after);
            }
        }
    }
}
