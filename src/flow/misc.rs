//! GY-024: Return and Comment.

use crate::core::error::OpError;
use crate::core::operation::{ArgKind, ArgSpec, Literal, OpMeta, Operation};
use crate::core::state::RecipeState;
use crate::core::types::TypeTag;

static RETURN: OpMeta = OpMeta {
    name: "Return",
    module: "Default",
    description: "End the recipe here. Later operations are not run.",
    input_type: TypeTag::String,
    output_type: TypeTag::String,
    presentation_type: None,
    args: &[],
    flow_control: true,
};

static COMMENT: OpMeta = OpMeta {
    name: "Comment",
    module: "Default",
    description: "Annotate a recipe. Has no effect on the data.",
    input_type: TypeTag::String,
    output_type: TypeTag::String,
    presentation_type: None,
    args: &[ArgSpec {
        name: "Comment",
        kind: ArgKind::String,
        default: Literal::Str(""),
    }],
    flow_control: true,
};

pub struct Return;

impl Operation for Return {
    fn meta(&self) -> &'static OpMeta {
        &RETURN
    }

    fn run_flow(&self, state: &mut RecipeState) -> Result<(), OpError> {
        state.progress = state.op_list.len();
        Ok(())
    }
}

pub struct Comment;

impl Operation for Comment {
    fn meta(&self) -> &'static OpMeta {
        &COMMENT
    }

    fn run_flow(&self, _state: &mut RecipeState) -> Result<(), OpError> {
        Ok(())
    }
}
