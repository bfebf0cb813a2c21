// tests/cache_properties.rs
// Codec round trip over arbitrary text, and the cache bound and lockstep
// structures over arbitrary put sequences.

use faceit_predictor::cache::{CacheConfig, PredictionCache, PutOutcome};
use faceit_predictor::codec::CompressionCodec;
use faceit_predictor::models::Prediction;
use faceit_predictor::storage::StorageAdapter;
use proptest::prelude::*;
use std::collections::HashSet;

#[derive(Debug, Clone)]
enum Put {
    Ok(u8),
    Error(u8),
}

fn arb_put() -> impl Strategy<Value = Put> {
    prop_oneof![
        4 => (0u8..20).prop_map(Put::Ok),
        1 => (0u8..20).prop_map(Put::Error),
    ]
}

struct Observed {
    len: usize,
    consistent: bool,
    unique_order: bool,
    newest: Option<String>,
    outcome: PutOutcome,
}

fn run_puts(max_items: usize, puts: &[Put]) -> Vec<Observed> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    rt.block_on(async {
        let cache = PredictionCache::open(StorageAdapter::in_memory(), CacheConfig::with_max_items(max_items)).await;
        let mut observed = Vec::with_capacity(puts.len());
        for put in puts {
            let outcome = match put {
                Put::Ok(id) => {
                    cache
                        .put(&format!("m{}", id), &Prediction::with_maps([("de_mirage", (0.4, 0.6))]))
                        .await
                }
                Put::Error(id) => cache.put(&format!("m{}", id), &Prediction::from_error("no data")).await,
            };
            let snapshot = cache.snapshot().await;
            let distinct: HashSet<&String> = snapshot.order.iter().collect();
            observed.push(Observed {
                len: snapshot.len(),
                consistent: snapshot.is_consistent(),
                unique_order: distinct.len() == snapshot.order.len(),
                newest: snapshot.order.first().cloned(),
                outcome,
            });
        }
        observed
    })
}

proptest! {
    #[test]
    fn compress_then_decompress_is_identity(text in any::<String>(), level in 0u32..=9) {
        let codec = CompressionCodec::new(level);
        let blob = codec.compress(&text).unwrap();
        prop_assert_eq!(codec.decompress(&blob).unwrap(), text);
    }

    #[test]
    fn compressed_blob_is_printable_ascii(text in "\\PC{0,400}") {
        let blob = CompressionCodec::default().compress(&text).unwrap();
        prop_assert!(blob.bytes().all(|b| b.is_ascii_graphic()));
    }

    #[test]
    fn any_put_sequence_stays_bounded_and_consistent(
        max_items in 1usize..8,
        puts in prop::collection::vec(arb_put(), 0..60),
    ) {
        let observed = run_puts(max_items, &puts);

        for (put, seen) in puts.iter().zip(&observed) {
            prop_assert!(seen.len <= max_items, "size {} over bound {}", seen.len, max_items);
            prop_assert!(seen.consistent, "entries and order diverged after {:?}", put);
            prop_assert!(seen.unique_order, "duplicate id in order after {:?}", put);

            match put {
                Put::Ok(id) => {
                    prop_assert!(matches!(seen.outcome, PutOutcome::Stored { .. }), "expected Stored outcome");
                    prop_assert_eq!(seen.newest.clone(), Some(format!("m{}", id)));
                }
                Put::Error(_) => prop_assert_eq!(&seen.outcome, &PutOutcome::SkippedError),
            }
        }
    }
}
