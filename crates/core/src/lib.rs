//! Docent core: lesson progression and tool-call dispatch.
//!
//! The domain logic of the guided-lesson system, free of any I/O:
//!
//! - `lesson`: the pure state machine tracking a learner's progress.
//! - `dispatch`: maps the agent's named tool calls onto lesson actions and
//!   builds acknowledgement batches.
//! - `script`: authored lesson content, consumed as opaque configuration.
//! - `transport`: the contract the realtime service implements to reach the
//!   conversational agent.

pub mod dispatch;
pub mod lesson;
pub mod script;
pub mod transport;
