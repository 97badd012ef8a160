//! Flow-control operations. They rewrite the interpreter state instead of
//! only transforming the dish.

pub mod fork;
pub mod label;
pub mod misc;
pub mod register;
pub mod store;

use crate::core::operation::{OperationInstance, OperationRegistryBuilder};

pub use fork::{Fork, Merge, Subsection};
pub use label::{ConditionalJump, Jump, Label};
pub use misc::{Comment, Return};
pub use register::Register;
pub use store::StoreRestore;

/// Register every flow-control operation.
pub fn register_flow_control(builder: &mut OperationRegistryBuilder) {
    builder
        .register(Label)
        .register(Jump)
        .register(ConditionalJump)
        .register(Fork)
        .register(Merge)
        .register(Subsection)
        .register(Register)
        .register(StoreRestore)
        .register(Return)
        .register(Comment);
}

/// Index of the first Label named `name`, by linear scan.
pub fn label_index(op_list: &[OperationInstance], name: &str) -> Option<usize> {
    op_list
        .iter()
        .position(|op| {
            op.name() == label::LABEL_NAME && op.arg(0).is_some_and(|a| a.as_str() == name)
        })
}

/// Index of the Merge closing the Fork or Subsection at `open`, or the op-list
/// length if it is never closed.
///
/// Nested Fork/Subsection operations open a level and enabled Merges close
/// one. A Merge whose first argument is set closes every level at once.
pub fn find_matching_merge(op_list: &[OperationInstance], open: usize) -> usize {
    let mut depth = 1usize;
    for (i, op) in op_list.iter().enumerate().skip(open + 1) {
        match op.name() {
            fork::MERGE_NAME if !op.disabled => {
                depth -= 1;
                if depth == 0 || op.arg(0).is_some_and(|a| a.as_bool()) {
                    return i;
                }
            }
            fork::FORK_NAME | fork::SUBSECTION_NAME => depth += 1,
            _ => {}
        }
    }
    op_list.len()
}
