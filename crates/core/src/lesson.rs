//! Lesson Progression State Machine
//!
//! This module owns the ordered list of instructions for a guided lesson and
//! the single entry point, [`transition`], through which that state may
//! change. Transitions are pure and synchronous: the conversational agent
//! (via the tool-call dispatcher) and the UI both drive the lesson through
//! the same function, and nothing else mutates a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Progress status shared by individual instructions and the session itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Idle,
    InProgress,
    WaitingResponse,
    Completed,
}

/// The evidence channel used to confirm that a step was completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationModality {
    Text,
    Audio,
    Image,
}

/// One unit of the curriculum: what the learner must do and how the agent
/// checks it. The task texts are opaque to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instruction {
    pub task: String,
    pub verification_task: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_modality: Option<VerificationModality>,
    pub status: StepStatus,
    /// Set only on the transition into `Completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Instruction {
    pub fn new(
        task: impl Into<String>,
        verification_task: impl Into<String>,
        verification_modality: Option<VerificationModality>,
    ) -> Self {
        Self {
            task: task.into(),
            verification_task: verification_task.into(),
            verification_modality,
            status: StepStatus::Idle,
            completed_at: None,
        }
    }

    fn reset(&mut self) {
        self.status = StepStatus::Idle;
        self.completed_at = None;
    }

    fn complete(&mut self, now: DateTime<Utc>) {
        self.status = StepStatus::Completed;
        self.completed_at = Some(now);
    }
}

/// Discrete actions accepted by [`transition`]. Serialized snake_case so
/// lesson scripts can bind tool names to actions in plain JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonAction {
    StartLesson,
    ResetLesson,
    CompleteLesson,
    MoveToNext,
    MoveToPrevious,
    WaitForResponse,
}

/// The full progress state of one lesson for one client.
///
/// `instructions` is fixed after creation: never reordered, never resized,
/// only mutated element-wise by [`transition`]. `current_index` is only
/// meaningful while `status != Idle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonSession {
    pub instructions: Vec<Instruction>,
    pub status: StepStatus,
    pub current_index: usize,
}

impl LessonSession {
    /// Creates an idle session over the given curriculum.
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            instructions,
            status: StepStatus::Idle,
            current_index: 0,
        }
    }

    /// The instruction the learner is currently on, if the lesson is live.
    pub fn current(&self) -> Option<&Instruction> {
        if self.status == StepStatus::Idle {
            return None;
        }
        self.instructions.get(self.current_index)
    }

    fn is_live(&self) -> bool {
        matches!(
            self.status,
            StepStatus::InProgress | StepStatus::WaitingResponse
        )
    }

    fn reset_all(&mut self) {
        for instruction in &mut self.instructions {
            instruction.reset();
        }
        self.status = StepStatus::Idle;
        self.current_index = 0;
    }

    /// Number of instructions currently InProgress or WaitingResponse.
    /// At most one at all times; checked by `debug_assert!` after every
    /// transition.
    fn active_count(&self) -> usize {
        self.instructions
            .iter()
            .filter(|i| {
                matches!(
                    i.status,
                    StepStatus::InProgress | StepStatus::WaitingResponse
                )
            })
            .count()
    }
}

/// Applies `action` to `session`, stamping completions with the wall clock.
pub fn transition(session: LessonSession, action: LessonAction) -> LessonSession {
    transition_at(session, action, Utc::now())
}

/// Applies `action` to `session` with an explicit completion timestamp.
///
/// Consumes and returns the session value. Combinations of state and action
/// not listed in the state machine leave the session unchanged; this
/// function never panics on unexpected input.
pub fn transition_at(
    mut session: LessonSession,
    action: LessonAction,
    now: DateTime<Utc>,
) -> LessonSession {
    debug!(?action, status = ?session.status, index = session.current_index, "lesson transition");

    match action {
        LessonAction::StartLesson => {
            // A start mid-lesson is a restart: everything except the first
            // instruction goes back to Idle.
            if !session.instructions.is_empty() {
                session.reset_all();
                session.instructions[0].status = StepStatus::InProgress;
                session.status = StepStatus::InProgress;
            }
        }
        LessonAction::ResetLesson => {
            session.reset_all();
        }
        LessonAction::CompleteLesson => {
            // Agent-initiated shortcut: every instruction is marked done.
            // Steps already completed keep their original timestamps.
            for instruction in &mut session.instructions {
                if instruction.status != StepStatus::Completed {
                    instruction.complete(now);
                }
            }
            session.status = StepStatus::Completed;
        }
        LessonAction::MoveToNext if session.is_live() => {
            if let Some(current) = session.instructions.get_mut(session.current_index) {
                current.complete(now);
            }
            if session.current_index + 1 < session.instructions.len() {
                session.current_index += 1;
                session.instructions[session.current_index].status = StepStatus::InProgress;
                session.status = StepStatus::InProgress;
            } else {
                // Last instruction: the whole lesson is done. The index is
                // left pointing at the final instruction.
                session.status = StepStatus::Completed;
            }
        }
        LessonAction::MoveToPrevious if session.is_live() => {
            if session.current_index <= 1 {
                // "Previous" of the first real step restarts the lesson
                // outright rather than stepping to index zero.
                session.reset_all();
            } else {
                session.instructions[session.current_index].reset();
                session.current_index -= 1;
                session.instructions[session.current_index].status = StepStatus::InProgress;
                session.status = StepStatus::InProgress;
            }
        }
        LessonAction::WaitForResponse if session.status == StepStatus::InProgress => {
            if let Some(current) = session.instructions.get_mut(session.current_index) {
                current.status = StepStatus::WaitingResponse;
                session.status = StepStatus::WaitingResponse;
            }
        }
        // Anything else is not a legal move from the current state.
        _ => {}
    }

    debug_assert!(
        session.active_count() <= 1,
        "more than one instruction is active after {:?}",
        action
    );
    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session_with(steps: usize) -> LessonSession {
        let instructions = (0..steps)
            .map(|i| {
                Instruction::new(
                    format!("Do thing {}", i),
                    format!("Check thing {}", i),
                    Some(VerificationModality::Image),
                )
            })
            .collect();
        LessonSession::new(instructions)
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn apply(session: LessonSession, action: LessonAction) -> LessonSession {
        transition_at(session, action, fixed_now())
    }

    #[test]
    fn start_marks_first_instruction_in_progress() {
        let session = apply(session_with(3), LessonAction::StartLesson);

        assert_eq!(session.status, StepStatus::InProgress);
        assert_eq!(session.current_index, 0);
        assert_eq!(session.instructions[0].status, StepStatus::InProgress);
        assert_eq!(session.instructions[1].status, StepStatus::Idle);
        assert_eq!(session.instructions[2].status, StepStatus::Idle);
    }

    #[test]
    fn start_on_empty_curriculum_is_a_noop() {
        let session = apply(session_with(0), LessonAction::StartLesson);
        assert_eq!(session.status, StepStatus::Idle);
        assert_eq!(session.current_index, 0);
    }

    #[test]
    fn start_mid_lesson_restarts_from_the_top() {
        let mut session = apply(session_with(3), LessonAction::StartLesson);
        session = apply(session, LessonAction::MoveToNext);
        assert_eq!(session.current_index, 1);

        session = apply(session, LessonAction::StartLesson);
        assert_eq!(session.current_index, 0);
        assert_eq!(session.instructions[0].status, StepStatus::InProgress);
        assert_eq!(session.instructions[1].status, StepStatus::Idle);
        assert!(session.instructions[0].completed_at.is_none());
    }

    #[test]
    fn move_to_next_completes_current_and_advances() {
        let mut session = apply(session_with(3), LessonAction::StartLesson);
        session = apply(session, LessonAction::MoveToNext);

        assert_eq!(session.status, StepStatus::InProgress);
        assert_eq!(session.current_index, 1);
        assert_eq!(session.instructions[0].status, StepStatus::Completed);
        assert_eq!(session.instructions[0].completed_at, Some(fixed_now()));
        assert_eq!(session.instructions[1].status, StepStatus::InProgress);
    }

    #[test]
    fn move_to_next_from_last_step_completes_the_lesson() {
        let mut session = apply(session_with(2), LessonAction::StartLesson);
        session = apply(session, LessonAction::MoveToNext);
        session = apply(session, LessonAction::MoveToNext);

        assert_eq!(session.status, StepStatus::Completed);
        assert_eq!(session.current_index, 1);
        assert!(
            session
                .instructions
                .iter()
                .all(|i| i.status == StepStatus::Completed)
        );
    }

    #[test]
    fn full_walkthrough_of_seven_steps() {
        let mut session = apply(session_with(7), LessonAction::StartLesson);
        assert_eq!(session.current_index, 0);
        assert_eq!(session.instructions[0].status, StepStatus::InProgress);

        for _ in 0..6 {
            session = apply(session, LessonAction::MoveToNext);
        }
        assert_eq!(session.current_index, 6);
        assert_eq!(session.status, StepStatus::InProgress);
        assert_eq!(session.instructions[5].status, StepStatus::Completed);
        assert_eq!(session.instructions[6].status, StepStatus::InProgress);

        session = apply(session, LessonAction::MoveToNext);
        assert_eq!(session.status, StepStatus::Completed);
        assert_eq!(session.current_index, 6);
        assert_eq!(session.instructions[6].status, StepStatus::Completed);
    }

    #[test]
    fn move_to_previous_steps_back() {
        let mut session = apply(session_with(4), LessonAction::StartLesson);
        session = apply(session, LessonAction::MoveToNext);
        session = apply(session, LessonAction::MoveToNext);
        assert_eq!(session.current_index, 2);

        session = apply(session, LessonAction::MoveToPrevious);
        assert_eq!(session.current_index, 1);
        assert_eq!(session.instructions[1].status, StepStatus::InProgress);
        assert_eq!(session.instructions[2].status, StepStatus::Idle);
        assert!(session.instructions[2].completed_at.is_none());
    }

    #[test]
    fn move_to_previous_from_first_step_matches_reset() {
        let started = apply(session_with(3), LessonAction::StartLesson);

        let via_previous = apply(started.clone(), LessonAction::MoveToPrevious);
        let via_reset = apply(started, LessonAction::ResetLesson);

        assert_eq!(via_previous.status, via_reset.status);
        assert_eq!(via_previous.current_index, via_reset.current_index);
        for (a, b) in via_previous
            .instructions
            .iter()
            .zip(via_reset.instructions.iter())
        {
            assert_eq!(a.status, b.status);
            assert_eq!(a.completed_at, b.completed_at);
        }
    }

    #[test]
    fn move_to_previous_from_second_step_also_resets() {
        let mut session = apply(session_with(3), LessonAction::StartLesson);
        session = apply(session, LessonAction::MoveToNext);
        assert_eq!(session.current_index, 1);

        session = apply(session, LessonAction::MoveToPrevious);
        assert_eq!(session.status, StepStatus::Idle);
        assert_eq!(session.current_index, 0);
        assert!(
            session
                .instructions
                .iter()
                .all(|i| i.status == StepStatus::Idle)
        );
    }

    #[test]
    fn reset_is_idempotent() {
        let mut session = apply(session_with(3), LessonAction::StartLesson);
        session = apply(session, LessonAction::MoveToNext);

        session = apply(session, LessonAction::ResetLesson);
        let again = apply(session.clone(), LessonAction::ResetLesson);

        for s in [&session, &again] {
            assert_eq!(s.status, StepStatus::Idle);
            assert_eq!(s.current_index, 0);
            assert!(
                s.instructions
                    .iter()
                    .all(|i| i.status == StepStatus::Idle && i.completed_at.is_none())
            );
        }
    }

    #[test]
    fn complete_lesson_marks_everything_done() {
        let mut session = apply(session_with(3), LessonAction::StartLesson);
        session = apply(session, LessonAction::MoveToNext);
        let earlier = session.instructions[0].completed_at;
        assert!(earlier.is_some());

        let later = fixed_now() + chrono::Duration::minutes(5);
        session = transition_at(session, LessonAction::CompleteLesson, later);

        assert_eq!(session.status, StepStatus::Completed);
        assert_eq!(session.current_index, 1);
        assert!(
            session
                .instructions
                .iter()
                .all(|i| i.status == StepStatus::Completed)
        );
        // The genuinely completed step keeps its timestamp; skipped steps
        // get the bulk completion time.
        assert_eq!(session.instructions[0].completed_at, earlier);
        assert_eq!(session.instructions[1].completed_at, Some(later));
        assert_eq!(session.instructions[2].completed_at, Some(later));
    }

    #[test]
    fn wait_for_response_suspends_the_current_step() {
        let mut session = apply(session_with(2), LessonAction::StartLesson);
        session = apply(session, LessonAction::WaitForResponse);

        assert_eq!(session.status, StepStatus::WaitingResponse);
        assert_eq!(
            session.instructions[0].status,
            StepStatus::WaitingResponse
        );

        // MoveToNext is still accepted while waiting for verification.
        session = apply(session, LessonAction::MoveToNext);
        assert_eq!(session.instructions[0].status, StepStatus::Completed);
        assert_eq!(session.instructions[1].status, StepStatus::InProgress);
    }

    #[test]
    fn navigation_actions_are_noops_outside_a_live_lesson() {
        let idle = session_with(3);
        for action in [
            LessonAction::MoveToNext,
            LessonAction::MoveToPrevious,
            LessonAction::WaitForResponse,
        ] {
            let after = apply(idle.clone(), action);
            assert_eq!(after.status, StepStatus::Idle);
            assert_eq!(after.current_index, 0);
        }

        let mut completed = apply(session_with(1), LessonAction::StartLesson);
        completed = apply(completed, LessonAction::MoveToNext);
        assert_eq!(completed.status, StepStatus::Completed);
        let after = apply(completed.clone(), LessonAction::MoveToNext);
        assert_eq!(after.status, StepStatus::Completed);
        assert_eq!(after.current_index, completed.current_index);
    }

    #[test]
    fn at_most_one_instruction_is_ever_active() {
        // Walk a long, deliberately messy action sequence and check the
        // invariant after every step.
        let actions = [
            LessonAction::StartLesson,
            LessonAction::MoveToNext,
            LessonAction::WaitForResponse,
            LessonAction::MoveToNext,
            LessonAction::MoveToPrevious,
            LessonAction::MoveToPrevious,
            LessonAction::StartLesson,
            LessonAction::MoveToNext,
            LessonAction::MoveToNext,
            LessonAction::MoveToNext,
            LessonAction::CompleteLesson,
            LessonAction::ResetLesson,
            LessonAction::WaitForResponse,
        ];

        let mut session = session_with(5);
        for action in actions {
            session = apply(session, action);
            assert!(
                session.active_count() <= 1,
                "invariant broken after {:?}",
                action
            );
        }
    }

    #[test]
    fn current_accessor_tracks_the_live_step() {
        let mut session = session_with(2);
        assert!(session.current().is_none());

        session = apply(session, LessonAction::StartLesson);
        assert_eq!(session.current().unwrap().task, "Do thing 0");

        session = apply(session, LessonAction::MoveToNext);
        assert_eq!(session.current().unwrap().task, "Do thing 1");
    }
}
