//! Trigger nodes.
//!
//! Matching already happened in the dispatcher; executing a trigger node
//! only moves the run along its default edge.

use crate::context::{ActionResult, ExecutionContext};
use crate::error::HandlerError;
use crate::handler::ActionHandler;
use crate::node::Node;
use async_trait::async_trait;

pub struct TriggerPassThrough;

#[async_trait]
impl ActionHandler for TriggerPassThrough {
    async fn execute(
        &self,
        _node: &Node,
        _ctx: &ExecutionContext,
    ) -> Result<ActionResult, HandlerError> {
        Ok(ActionResult::proceed())
    }
}
