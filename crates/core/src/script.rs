//! Lesson authoring layer.
//!
//! Lesson content — step wording, system instruction, tool declarations —
//! is opaque configuration supplied as JSON files, never generated by the
//! core. A [`LessonScript`] carries everything one lesson variant needs:
//! the curriculum, the prompt for the agent, and the bindings from tool
//! names to lesson actions.

use crate::dispatch::ActionMap;
use crate::lesson::{Instruction, LessonAction, LessonSession, VerificationModality};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// One authored step of the curriculum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepScript {
    pub task: String,
    pub verification_task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_modality: Option<VerificationModality>,
}

/// Declares one tool to the agent and binds it to a lesson action.
///
/// `action: null` declares an informational tool: the agent may call it and
/// will be acknowledged, but the session is not touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolBinding {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub action: Option<LessonAction>,
}

/// A complete lesson definition as authored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonScript {
    pub slug: String,
    pub title: String,
    /// System instruction handed to the agent at session setup.
    pub system_instruction: String,
    /// The utterance pushed to the agent when the learner presses start.
    pub opening_line: String,
    pub steps: Vec<StepScript>,
    pub tools: Vec<ToolBinding>,
}

impl LessonScript {
    /// Builds the initial, all-idle session for this lesson.
    pub fn session(&self) -> LessonSession {
        let instructions = self
            .steps
            .iter()
            .map(|step| {
                Instruction::new(
                    step.task.clone(),
                    step.verification_task.clone(),
                    step.verification_modality,
                )
            })
            .collect();
        LessonSession::new(instructions)
    }

    /// Builds the tool-name → action table for this lesson.
    pub fn action_map(&self) -> ActionMap {
        ActionMap::new(
            self.tools
                .iter()
                .map(|binding| (binding.name.clone(), binding.action)),
        )
    }
}

/// All lesson scripts found at startup, keyed by slug.
#[derive(Debug, Clone, Default)]
pub struct LessonCatalog {
    scripts: HashMap<String, Arc<LessonScript>>,
}

impl LessonCatalog {
    /// Loads every `*.json` file under `dir` as a lesson script.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut scripts = HashMap::new();
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Could not read lessons directory {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Could not read lesson script {}", path.display()))?;
            let script: LessonScript = serde_json::from_str(&content)
                .with_context(|| format!("Invalid lesson script {}", path.display()))?;
            if script.steps.is_empty() {
                bail!("Lesson script {} declares no steps", path.display());
            }
            info!(slug = %script.slug, steps = script.steps.len(), "loaded lesson script");
            if scripts
                .insert(script.slug.clone(), Arc::new(script))
                .is_some()
            {
                bail!("Duplicate lesson slug in {}", path.display());
            }
        }
        Ok(Self { scripts })
    }

    pub fn get(&self, slug: &str) -> Option<Arc<LessonScript>> {
        self.scripts.get(slug).cloned()
    }

    /// All scripts, ordered by slug for stable listings.
    pub fn list(&self) -> Vec<Arc<LessonScript>> {
        let mut scripts: Vec<_> = self.scripts.values().cloned().collect();
        scripts.sort_by(|a, b| a.slug.cmp(&b.slug));
        scripts
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}
