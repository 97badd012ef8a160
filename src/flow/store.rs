//! GY-023: Store/Restore. Named string slots shared within one bake.
//!
//! The slots are cleared once per bake, when the Store/Restore operation with
//! the lowest index in the current op list first runs.

use crate::core::dish::Dish;
use crate::core::error::OpError;
use crate::core::operation::{ArgKind, ArgSpec, Literal, OpMeta, Operation};
use crate::core::state::RecipeState;
use crate::core::types::TypeTag;
use tracing::debug;

pub const STORE_RESTORE_NAME: &str = "Store/Restore";

const MODES: &[&str] = &["Store", "Restore", "Clear"];

static STORE_RESTORE: OpMeta = OpMeta {
    name: STORE_RESTORE_NAME,
    module: "Default",
    description: "Store the current data in a named slot, restore it later, or clear slots. An empty name with Clear removes every slot.",
    input_type: TypeTag::String,
    output_type: TypeTag::String,
    presentation_type: None,
    args: &[
        ArgSpec {
            name: "Mode",
            kind: ArgKind::Option(MODES),
            default: Literal::Str("Store"),
        },
        ArgSpec {
            name: "Name",
            kind: ArgKind::String,
            default: Literal::Str(""),
        },
    ],
    flow_control: true,
};

pub struct StoreRestore;

impl Operation for StoreRestore {
    fn meta(&self) -> &'static OpMeta {
        &STORE_RESTORE
    }

    fn run_flow(&self, state: &mut RecipeState) -> Result<(), OpError> {
        let first = state
            .op_list
            .iter()
            .position(|op| op.name() == STORE_RESTORE_NAME);
        if first == Some(state.progress) && state.ctx.store.reset_once(state.ctx.bake_id) {
            debug!("Cleared named slots for bake {}", state.ctx.bake_id);
        }

        let mode = state.arg_str(0);
        let name = state.arg_str(1);
        let store = &state.ctx.store;
        match mode.as_str() {
            "Store" => {
                if name.is_empty() {
                    return Ok(());
                }
                let value = state.dish.get_string()?;
                store.insert(&name, value);
            }
            "Restore" => {
                if let Some(value) = store.get(&name) {
                    state.dish = Dish::from_string(value);
                }
            }
            "Clear" => {
                if name.is_empty() {
                    store.clear();
                } else {
                    store.remove(&name);
                }
            }
            other => return Err(OpError::operation(format!("Unknown mode: {}", other))),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testkit::{self, op};
    use crate::core::types::OpConfig;

    fn store_op(mode: &str, name: &str) -> OpConfig {
        op(STORE_RESTORE_NAME, vec![mode.into(), name.into()])
    }

    #[test]
    fn test_gy023_store_then_restore() {
        let out = testkit::run_to_string(
            "original",
            &[
                store_op("Store", "saved"),
                op("To Upper case", vec![]),
                op("Reverse", vec![]),
                store_op("Restore", "saved"),
            ],
        );
        assert_eq!(out, "original");
    }

    #[test]
    fn test_gy023_restore_missing_slot_leaves_dish() {
        let out = testkit::run_to_string(
            "abc",
            &[store_op("Restore", "nothing"), op("To Upper case", vec![])],
        );
        assert_eq!(out, "ABC");
    }

    #[test]
    fn test_gy023_store_with_empty_name_is_noop() {
        let (state, result) = testkit::run("abc", &[store_op("Store", "")]);
        result.unwrap();
        assert!(state.ctx.store.is_empty());
    }

    #[test]
    fn test_gy023_clear_one_and_all() {
        let (state, result) = testkit::run(
            "abc",
            &[
                store_op("Store", "a"),
                store_op("Store", "b"),
                store_op("Clear", "a"),
            ],
        );
        result.unwrap();
        assert_eq!(state.ctx.store.names(), vec!["b".to_string()]);

        let (state, result) = testkit::run(
            "abc",
            &[store_op("Store", "a"), store_op("Store", "b"), store_op("Clear", "")],
        );
        result.unwrap();
        assert!(state.ctx.store.is_empty());
    }

    #[test]
    fn test_gy023_first_op_resets_stale_slots() {
        let mut state = testkit::state("new", &[store_op("Restore", "k")]);
        state.ctx.store.insert("k", "stale".into());
        crate::core::executor::execute(&mut state).unwrap();
        assert_eq!(state.dish.get_string().unwrap(), "new");
    }

    #[test]
    fn test_gy023_reset_only_once_per_bake() {
        // The jump revisits the first Store/Restore. Without a second reset the
        // lowercase value stored on the first pass is restored.
        let (mut state, result) = testkit::run(
            "abc",
            &[
                op("Label", vec!["top".into()]),
                store_op("Restore", "k"),
                store_op("Store", "k"),
                op("To Upper case", vec![]),
                op("Jump", vec!["top".into(), 1.0.into()]),
            ],
        );
        result.unwrap();
        assert_eq!(state.dish.get_string().unwrap(), "ABC");
        assert_eq!(state.ctx.store.get("k").as_deref(), Some("abc"));
    }

    #[test]
    fn test_gy023_fork_branches_share_slots() {
        let (state, result) = testkit::run(
            "x,y",
            &[
                op("Fork", vec![",".into(), ",".into(), false.into()]),
                store_op("Store", "last"),
                op("Merge", vec![]),
            ],
        );
        result.unwrap();
        assert_eq!(state.ctx.store.get("last").as_deref(), Some("y"));
    }
}
