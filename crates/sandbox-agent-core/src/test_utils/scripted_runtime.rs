//! ScriptedRuntime: replays canned steps or delegates to a closure.

use std::{collections::VecDeque, sync::Mutex};

use async_trait::async_trait;

use crate::{
    tool::ToolDeclaration,
    traits::{AgentRuntime, RuntimeError, RuntimeStep, Transcript},
};

type StepFn = dyn Fn(&Transcript) -> Result<RuntimeStep, RuntimeError> + Send + Sync;

enum Script {
    Queue(Mutex<VecDeque<Result<RuntimeStep, RuntimeError>>>),
    Func(Box<StepFn>),
}

/// An [`AgentRuntime`] driven by a fixed script.
pub struct ScriptedRuntime {
    script: Script,
}

impl ScriptedRuntime {
    /// Return `steps` in order; a protocol error once exhausted.
    #[must_use]
    pub fn new(steps: impl IntoIterator<Item = RuntimeStep>) -> Self {
        Self::with_results(steps.into_iter().map(Ok))
    }

    /// Like [`ScriptedRuntime::new`] but allows scripted failures.
    #[must_use]
    pub fn with_results(steps: impl IntoIterator<Item = Result<RuntimeStep, RuntimeError>>) -> Self {
        Self {
            script: Script::Queue(Mutex::new(steps.into_iter().collect())),
        }
    }

    /// Decide each step by inspecting the transcript.
    #[must_use]
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Transcript) -> Result<RuntimeStep, RuntimeError> + Send + Sync + 'static,
    {
        Self {
            script: Script::Func(Box::new(f)),
        }
    }
}

#[async_trait]
impl AgentRuntime for ScriptedRuntime {
    async fn next_step(
        &self,
        transcript: &Transcript,
        _tools: &[ToolDeclaration],
    ) -> Result<RuntimeStep, RuntimeError> {
        match &self.script {
            Script::Queue(queue) => queue
                .lock()
                .map_err(|_| RuntimeError::Request("script lock poisoned".into()))?
                .pop_front()
                .unwrap_or_else(|| Err(RuntimeError::Protocol("script exhausted".into()))),
            Script::Func(f) => f(transcript),
        }
    }
}
