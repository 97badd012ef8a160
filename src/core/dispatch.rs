//! GY-011: Parallel dispatch of independent bakes.
//!
//! One interpreter per input, each on a tokio blocking worker, bounded by a
//! semaphore. Every bake gets its own slot store.

use super::chef::{BakeOptions, Chef};
use super::dish::Dish;
use super::state::SlotStore;
use super::types::{BakeFailure, BakeResult, OpConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error};

/// Bake every input through `recipe`, returning results in input order.
///
/// `workers` bounds concurrency; 0 uses the chef's configured worker count.
pub async fn bake_all(
    chef: Arc<Chef>,
    inputs: Vec<Dish>,
    recipe: Arc<Vec<OpConfig>>,
    options: BakeOptions,
    workers: usize,
) -> Vec<BakeResult> {
    let workers = if workers == 0 {
        chef.config().dispatch.effective_workers()
    } else {
        workers
    };
    debug!("dispatching {} bakes on {} workers", inputs.len(), workers);

    let semaphore = Arc::new(Semaphore::new(workers));
    let mut handles = Vec::with_capacity(inputs.len());
    for input in inputs {
        let permit = semaphore.clone().acquire_owned().await.ok();
        let chef = chef.clone();
        let recipe = recipe.clone();
        let options = BakeOptions {
            store: Some(SlotStore::new()),
            ..options.clone()
        };
        handles.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            chef.bake(input, &recipe, &options)
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for (i, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(result) => results.push(result),
            Err(e) => {
                error!("bake {} did not complete: {}", i, e);
                results.push(BakeResult {
                    result: Dish::default().into_value(),
                    result_type: Dish::default().type_tag(),
                    raw: Dish::default(),
                    progress: 0,
                    duration: Duration::ZERO,
                    error: Some(BakeFailure {
                        display_str: format!("bake did not complete: {}", e),
                    }),
                });
            }
        }
    }
    results
}

/// Blocking wrapper around [`bake_all`] for synchronous callers.
pub fn bake_all_blocking(
    chef: Arc<Chef>,
    inputs: Vec<Dish>,
    recipe: Vec<OpConfig>,
    options: BakeOptions,
    workers: usize,
) -> Result<Vec<BakeResult>, String> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("cannot start runtime: {}", e))?;
    Ok(runtime.block_on(bake_all(chef, inputs, Arc::new(recipe), options, workers)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EngineConfig;
    use crate::core::dish::DishValue;
    use crate::core::testkit::{self, op};
    use crate::core::types::TypeTag;

    fn chef() -> Arc<Chef> {
        Arc::new(Chef::new(testkit::registry(), EngineConfig::default()))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_gy011_results_in_input_order() {
        let inputs: Vec<Dish> = (0..16).map(|i| Dish::from_string(format!("in{}", i))).collect();
        let results = bake_all(
            chef(),
            inputs,
            Arc::new(vec![op("To Upper case", vec![])]),
            BakeOptions::returning(TypeTag::String),
            3,
        )
        .await;
        assert_eq!(results.len(), 16);
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.result, DishValue::String(format!("IN{}", i)));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_gy011_store_isolated_between_bakes() {
        // Restore before Store: a shared slot map would leak the other input.
        let recipe = vec![
            op("Store/Restore", vec!["Restore".into(), "k".into()]),
            op("Store/Restore", vec!["Store".into(), "k".into()]),
        ];
        let results = bake_all(
            chef(),
            vec![Dish::from_string("first"), Dish::from_string("second")],
            Arc::new(recipe),
            BakeOptions::returning(TypeTag::String),
            1,
        )
        .await;
        assert_eq!(results[0].result, DishValue::String("first".into()));
        assert_eq!(results[1].result, DishValue::String("second".into()));
    }

    #[test]
    fn test_gy011_blocking_wrapper() {
        let results = bake_all_blocking(
            chef(),
            vec![Dish::from_string("abc")],
            vec![op("Reverse", vec![])],
            BakeOptions::returning(TypeTag::String),
            0,
        )
        .unwrap();
        assert_eq!(results[0].result, DishValue::String("cba".into()));
    }

    #[tokio::test]
    async fn test_gy011_errors_reported_per_input() {
        let results = bake_all(
            chef(),
            vec![Dish::from_string("a"), Dish::from_string("b")],
            Arc::new(vec![op("Crash", vec![])]),
            BakeOptions::default(),
            2,
        )
        .await;
        assert!(results.iter().all(|r| r.error.is_some()));
    }
}
