//! GY-009: Chef, the top-level bake entry point.
//!
//! The chef hydrates a recipe, runs it, presents the output and packages
//! everything into a [`BakeResult`]. No error escapes a bake: failures are
//! reported in the result's `error` field.

use super::config::EngineConfig;
use super::dish::Dish;
use super::executor::{self, Recipe};
use super::operation::OperationRegistry;
use super::state::{BakeContext, Limits, ProgressReporter, SlotStore};
use super::types::{BakeFailure, BakeResult, OpConfig, TypeTag};
use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Per-bake options.
#[derive(Debug, Clone, Default)]
pub struct BakeOptions {
    /// Fetch the result as this type; `None` uses the configured return type
    pub return_type: Option<TypeTag>,
    /// Execute exactly one step starting at `progress`
    pub step: bool,
    /// Index to start (or resume) from
    pub progress: usize,
    /// Share Store/Restore slots with other bakes of one session. Stepped and
    /// resumed bakes without one use the chef's session store.
    pub store: Option<SlotStore>,
}

impl BakeOptions {
    pub fn returning(tag: TypeTag) -> Self {
        Self {
            return_type: Some(tag),
            ..Self::default()
        }
    }
}

/// Direction to map selection offsets through a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightDirection {
    /// Input offsets to output offsets
    Forward,
    /// Output offsets back to input offsets
    Reverse,
}

/// Runs recipes against a registry with engine configuration applied.
#[derive(Clone)]
pub struct Chef {
    registry: OperationRegistry,
    config: EngineConfig,
    reporter: Option<Arc<dyn ProgressReporter>>,
    session: SlotStore,
}

impl Chef {
    pub fn new(registry: OperationRegistry, config: EngineConfig) -> Self {
        Self {
            registry,
            config,
            reporter: None,
            session: SlotStore::new(),
        }
    }

    /// A chef over the built-in operations with default configuration.
    pub fn with_builtins() -> Self {
        Self::new(OperationRegistry::with_builtins(), EngineConfig::default())
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn status(&self, message: &str) {
        if let Some(reporter) = &self.reporter {
            reporter.status(message);
        }
    }

    /// Slots shared by the stepped bakes of one session.
    pub fn session_store(&self) -> &SlotStore {
        &self.session
    }

    fn context(&self, store: Option<&SlotStore>) -> BakeContext {
        let mut ctx = BakeContext::new(self.registry.clone())
            .with_limits(Limits::from_config(&self.config));
        if let Some(store) = store {
            ctx = ctx.with_store(store.clone());
        }
        if let Some(reporter) = &self.reporter {
            ctx = ctx.with_reporter(reporter.clone());
        }
        ctx
    }

    /// Bake `input` through `recipe`.
    pub fn bake(&self, input: Dish, recipe: &[OpConfig], options: &BakeOptions) -> BakeResult {
        let start = Instant::now();
        let return_type = options
            .return_type
            .unwrap_or(self.config.execution.return_type);

        let mut recipe = match Recipe::from_config(recipe, &self.registry) {
            Ok(r) => r,
            Err(e) => {
                warn!("recipe rejected: {}", e);
                let raw = input.clone();
                return BakeResult {
                    result_type: input.type_tag(),
                    result: input.into_value(),
                    raw,
                    progress: 0,
                    duration: start.elapsed(),
                    error: Some(BakeFailure {
                        display_str: e.to_string(),
                    }),
                };
            }
        };

        let from = options.progress.min(recipe.len());
        if options.step {
            recipe.set_breakpoint(from, false);
            recipe.set_breakpoint(from + 1, true);
        }

        let total = recipe.len();
        self.status("Baking...");
        // A step or a resume continues the logical bake its predecessor began
        let store = match &options.store {
            Some(store) => Some(store),
            None if options.step || from > 0 => Some(&self.session),
            None => None,
        };
        let mut state = recipe.into_state(input, self.context(store));
        state.progress = from;

        let mut error = None;
        let progress = match executor::execute(&mut state) {
            Ok(p) => p,
            Err(e) => {
                warn!("bake failed at step {}: {}", e.progress, e.display_str);
                let p = e.progress;
                error = Some(BakeFailure {
                    display_str: e.display_str,
                });
                p
            }
        };

        let raw = state.dish.clone();
        if error.is_none() {
            if let Err(e) = executor::present(&mut state) {
                warn!("presentation failed: {}", e);
            }
        }

        let wanted = if state.dish.type_tag() == TypeTag::Html {
            TypeTag::Html
        } else {
            return_type
        };
        let result = match state.dish.get(wanted) {
            Ok(v) => v,
            Err(e) => {
                warn!("cannot return output as {}: {}", wanted, e);
                if error.is_none() {
                    error = Some(BakeFailure {
                        display_str: e.to_string(),
                    });
                }
                state.dish.value().clone()
            }
        };

        let duration = start.elapsed();
        self.status(if error.is_some() { "Bake failed" } else { "Ready" });
        info!(
            "bake finished at {}/{} in {:?}{}",
            progress,
            total,
            duration,
            if error.is_some() { " with error" } else { "" }
        );
        BakeResult {
            result_type: result.type_tag(),
            result,
            raw,
            progress,
            duration,
            error,
        }
    }

    /// Run `recipe` on empty input, ignoring every failure. Used to warm up
    /// operations before real input arrives.
    pub fn silent_bake(&self, recipe: &[OpConfig]) -> Duration {
        let start = Instant::now();
        match Recipe::from_config(recipe, &self.registry) {
            Ok(r) => {
                let mut state = r.into_state(Dish::default(), self.context(None));
                if let Err(e) = executor::execute(&mut state) {
                    debug!("silent bake swallowed: {}", e);
                }
            }
            Err(e) => debug!("silent bake swallowed: {}", e),
        }
        start.elapsed()
    }

    /// Map selection ranges through every operation of `recipe`.
    ///
    /// Returns `None` when the recipe cannot be hydrated or any enabled
    /// operation does not support highlighting.
    pub fn calculate_highlights(
        &self,
        recipe: &[OpConfig],
        direction: HighlightDirection,
        pos: &[Range<usize>],
    ) -> Option<Vec<Range<usize>>> {
        let recipe = Recipe::from_config(recipe, &self.registry).ok()?;
        let list = recipe.highlight_list()?;
        let mut pos = pos.to_vec();
        match direction {
            HighlightDirection::Forward => {
                for op in &list {
                    pos = op.op().highlight(&pos, &op.args)?;
                }
            }
            HighlightDirection::Reverse => {
                for op in list.iter().rev() {
                    pos = op.op().highlight_reverse(&pos, &op.args)?;
                }
            }
        }
        Some(pos)
    }
}
