//! Vector search ordering, bounds, filtering and error wrapping.

mod common;

use std::error::Error;
use std::sync::Arc;

use common::{FixedEmbedder, StaticStore, chunk};
use faq_rag::{ErrorKind, InMemoryChunkStore, RagError, StoredChunk, VectorSearcher};
use proptest::prelude::*;

fn arb_embedding() -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, 3)
}

fn arb_category() -> impl Strategy<Value = Option<String>> {
    prop_oneof![Just(None), Just(Some("manual".to_string())), Just(Some("faq".to_string()))]
}

async fn in_memory_searcher(chunks: Vec<StoredChunk>) -> VectorSearcher {
    let store = InMemoryChunkStore::new();
    for c in chunks {
        store.insert(c).await.unwrap();
    }
    VectorSearcher::new(FixedEmbedder::ok(), Arc::new(store), 10).unwrap()
}

fn stored(chunk_id: i64, category: Option<&str>, embedding: Vec<f32>) -> StoredChunk {
    StoredChunk {
        chunk_id,
        document_id: chunk_id,
        source_name: format!("doc{chunk_id}.pdf"),
        category: category.map(str::to_string),
        text: format!("passage {chunk_id}"),
        embedding,
    }
}

/// *For any* stored chunk set and `top_k`, search returns at most `top_k`
/// results in non-decreasing distance order, and only chunks matching the
/// filter.
mod prop_search_ordering {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ascending_bounded_and_filtered(
            entries in proptest::collection::vec((arb_embedding(), arb_category()), 0..25),
            top_k in 1usize..15,
            filter in arb_category(),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (results, eligible) = rt.block_on(async {
                let chunks: Vec<StoredChunk> = entries
                    .iter()
                    .enumerate()
                    .map(|(i, (embedding, category))| {
                        stored(i as i64, category.as_deref(), embedding.clone())
                    })
                    .collect();
                let eligible = chunks
                    .iter()
                    .filter(|c| filter.is_none() || c.category == filter)
                    .count();
                let searcher = in_memory_searcher(chunks).await;
                let results =
                    searcher.search("what is a vector?", top_k, filter.as_deref()).await.unwrap();
                (results, eligible)
            });

            prop_assert_eq!(results.len(), top_k.min(eligible));
            for pair in results.windows(2) {
                prop_assert!(pair[0].distance <= pair[1].distance);
            }
            if let Some(f) = &filter {
                for hit in &results {
                    let category = entries[hit.chunk_id as usize].1.as_deref();
                    prop_assert_eq!(category, Some(f.as_str()));
                }
            }
        }
    }
}

#[tokio::test]
async fn unsorted_store_output_is_reordered_and_truncated() {
    let store = StaticStore::new(vec![
        chunk(1, "a", "a", 0.9),
        chunk(2, "b", "b", 0.1),
        chunk(3, "c", "c", 0.5),
    ]);
    let searcher = VectorSearcher::new(FixedEmbedder::ok(), store, 10).unwrap();

    let hits = searcher.search("question", 3, None).await.unwrap();
    let ids: Vec<i64> = hits.iter().map(|h| h.chunk_id).collect();
    assert_eq!(ids, vec![2, 3, 1]);
}

#[tokio::test]
async fn blank_query_and_zero_top_k_are_invalid() {
    let searcher = VectorSearcher::new(FixedEmbedder::ok(), StaticStore::new(vec![]), 10).unwrap();

    let err = searcher.search("   ", 5, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = searcher.search("question", 0, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn zero_default_top_k_is_a_config_error() {
    let result = VectorSearcher::new(FixedEmbedder::ok(), StaticStore::new(vec![]), 0);
    assert!(matches!(result, Err(RagError::ConfigError(_))));
}

#[tokio::test]
async fn embedding_failure_is_wrapped_with_its_cause() {
    let searcher =
        VectorSearcher::new(FixedEmbedder::failing_on("boom"), StaticStore::new(vec![]), 10)
            .unwrap();

    let err = searcher.search("boom question", 5, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Retrieval);
    assert!(matches!(err, RagError::VectorSearchError { .. }));
    assert!(err.to_string().contains("boom question"));
    let cause = err.source().unwrap().to_string();
    assert!(cause.contains("service unavailable"), "{cause}");
}

#[tokio::test]
async fn store_failure_is_wrapped_with_its_cause() {
    let searcher = VectorSearcher::new(FixedEmbedder::ok(), StaticStore::failing(), 10).unwrap();

    let err = searcher.search("question", 5, Some("manual")).await.unwrap_err();
    assert!(matches!(err, RagError::VectorSearchError { .. }));
    assert!(err.source().unwrap().to_string().contains("connection refused"));
}

#[tokio::test]
async fn non_finite_distances_are_rejected() {
    let store = StaticStore::new(vec![chunk(1, "a", "a", f64::NAN)]);
    let searcher = VectorSearcher::new(FixedEmbedder::ok(), store, 10).unwrap();

    let err = searcher.search("question", 5, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Retrieval);
}

#[tokio::test]
async fn search_default_uses_the_constructed_top_k() {
    let store = StaticStore::new(common::ten_chunks());
    let searcher = VectorSearcher::new(FixedEmbedder::ok(), store.clone(), 4).unwrap();

    let hits = searcher.search_default("question", Some("faq")).await.unwrap();
    assert_eq!(hits.len(), 4);
    assert_eq!(searcher.default_top_k(), 4);
    assert_eq!(store.seen_filters(), vec![Some("faq".to_string())]);
}

#[tokio::test]
async fn filter_excludes_other_categories_in_memory() {
    let searcher = in_memory_searcher(vec![
        stored(1, Some("manual"), vec![1.0, 0.0, 0.0]),
        stored(2, Some("faq"), vec![0.9, 0.1, 0.0]),
        stored(3, None, vec![0.0, 1.0, 0.0]),
    ])
    .await;

    let hits = searcher.search("question", 10, Some("faq")).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk_id, 2);

    let hits = searcher.search("question", 10, None).await.unwrap();
    assert_eq!(hits.iter().map(|h| h.chunk_id).collect::<Vec<_>>(), vec![1, 2, 3]);
}
