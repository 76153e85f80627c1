//! Tool-Call Dispatcher
//!
//! Maps named tool invocations from the conversational agent onto lesson
//! actions, applies them through the state machine, and acknowledges every
//! call — including ones the lesson does not recognize. Unknown names are
//! acked without effect on purpose: the agent may legitimately call tools
//! this lesson never declared, and failing loudly would break the
//! conversational flow.

use crate::lesson::{LessonAction, LessonSession, transition};
use crate::transport::AgentTransport;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// One named function-call request from the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Accepted and ignored; kept for wire fidelity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<serde_json::Value>,
}

/// The acknowledgement returned for one [`ToolCall`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub id: String,
    pub name: String,
    pub result: String,
}

/// Configuration-driven table from tool name to lesson action.
///
/// Built per lesson definition from its tool bindings rather than hardcoded
/// per variant. A name mapped to `None` is declared but informational (for
/// example `program_opened`): the agent gets its acknowledgement and the
/// session is left alone.
#[derive(Debug, Clone, Default)]
pub struct ActionMap {
    bindings: HashMap<String, Option<LessonAction>>,
}

impl ActionMap {
    pub fn new(bindings: impl IntoIterator<Item = (String, Option<LessonAction>)>) -> Self {
        Self {
            bindings: bindings.into_iter().collect(),
        }
    }

    /// The action bound to `name`, if any. Exact, case-sensitive match.
    pub fn action_for(&self, name: &str) -> Option<LessonAction> {
        self.bindings.get(name).copied().flatten()
    }

    /// Whether `name` was declared at all, informational bindings included.
    pub fn is_declared(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }
}

/// Dispatches tool-call batches against a lesson session.
///
/// The dispatcher itself holds no session; the caller owns the single
/// mutable [`LessonSession`] and threads it through each batch, which keeps
/// the map→transition→acknowledge sequence for one batch atomic within one
/// event-loop turn.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    map: ActionMap,
}

impl ToolDispatcher {
    pub fn new(map: ActionMap) -> Self {
        Self { map }
    }

    /// Handles every call in the batch independently and in order.
    ///
    /// Returns the updated session and exactly one acknowledgement per
    /// request, call identifiers preserved one-to-one.
    pub fn dispatch(
        &self,
        mut session: LessonSession,
        calls: &[ToolCall],
    ) -> (LessonSession, Vec<ToolResponse>) {
        let mut responses = Vec::with_capacity(calls.len());
        for call in calls {
            match self.map.action_for(&call.name) {
                Some(action) => {
                    info!(tool = %call.name, ?action, "executing tool call");
                    session = transition(session, action);
                }
                None if self.map.is_declared(&call.name) => {
                    debug!(tool = %call.name, "informational tool call, no state change");
                }
                None => {
                    warn!(tool = %call.name, "unknown tool acknowledged without effect");
                }
            }
            responses.push(ToolResponse {
                id: call.id.clone(),
                name: call.name.clone(),
                result: format!("{} OK.", call.name),
            });
        }
        (session, responses)
    }

    /// Dispatches the batch and delivers the full acknowledgement batch via
    /// the transport, exactly once. A failed delivery is surfaced to the
    /// caller; the interaction is not recoverable locally.
    pub async fn dispatch_and_ack<T: AgentTransport + ?Sized>(
        &self,
        session: LessonSession,
        calls: &[ToolCall],
        transport: &T,
    ) -> Result<LessonSession> {
        let (session, responses) = self.dispatch(session, calls);
        transport.send_tool_response(responses).await?;
        Ok(session)
    }
}
