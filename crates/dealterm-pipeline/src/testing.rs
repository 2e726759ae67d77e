//! Test support: a scripted in-memory vision model.
//!
//! Stands in for the external model service in unit and integration tests.
//! Responses are served either in sequence or by matching a substring of the
//! request instruction; the latter keeps multi-batch tests deterministic
//! even though batches race.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use dealterm_llm::{FinishReason, ModelError, Usage, VisionModel, VisionRequest, VisionResponse};

/// What the model saw for one call, recorded for assertions.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub image_count: usize,
    pub instruction: String,
}

enum Script {
    /// Pop responses front-to-back.
    Sequence(VecDeque<Result<String, ModelError>>),
    /// First rule whose pattern appears in the instruction fires, once.
    Rules(Vec<(String, Option<Result<String, ModelError>>)>),
}

pub struct ScriptedModel {
    script: Mutex<Script>,
    seen: Mutex<Vec<SeenRequest>>,
}

impl ScriptedModel {
    pub fn sequence(responses: Vec<Result<String, ModelError>>) -> Self {
        Self {
            script: Mutex::new(Script::Sequence(responses.into())),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_rules(rules: Vec<(&str, Result<String, ModelError>)>) -> Self {
        Self {
            script: Mutex::new(Script::Rules(
                rules
                    .into_iter()
                    .map(|(pattern, response)| (pattern.to_string(), Some(response)))
                    .collect(),
            )),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Requests observed so far, in call order.
    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().expect("seen lock").clone()
    }
}

#[async_trait]
impl VisionModel for ScriptedModel {
    async fn complete(&self, request: VisionRequest) -> Result<VisionResponse, ModelError> {
        self.seen.lock().expect("seen lock").push(SeenRequest {
            image_count: request.images.len(),
            instruction: request.instruction.clone(),
        });

        let outcome = match &mut *self.script.lock().expect("script lock") {
            Script::Sequence(queue) => queue
                .pop_front()
                .unwrap_or_else(|| Err(ModelError::Api("script exhausted".to_string()))),
            Script::Rules(rules) => rules
                .iter_mut()
                .find(|(pattern, response)| {
                    response.is_some() && request.instruction.contains(pattern.as_str())
                })
                .and_then(|(_, response)| response.take())
                .unwrap_or_else(|| Err(ModelError::Api("no matching rule".to_string()))),
        };

        outcome.map(|content| VisionResponse {
            content,
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
            model: "scripted".to_string(),
        })
    }

    fn model_name(&self) -> String {
        "scripted".to_string()
    }
}
