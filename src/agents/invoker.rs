use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::agents::{Role, RoleInvoker, RoleSpec};
use crate::llm::{LLMAdapter, LLMMessage, LLMRequest};
use crate::types::AppResult;

/// Calls a chat-completion backend once per role invocation.
///
/// Every call is a fresh single-turn exchange: role instructions go out as the system
/// instruction, the context as the only user message.
pub struct LlmRoleInvoker {
    llm: Box<dyn LLMAdapter>,
    model: String,
    temperature: f32,
}

impl LlmRoleInvoker {
    pub fn new(llm: Box<dyn LLMAdapter>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            llm,
            model: model.into(),
            temperature,
        }
    }

    fn build_request(&self, spec: &RoleSpec, context: &str) -> LLMRequest {
        LLMRequest {
            model: self.model.clone(),
            messages: vec![LLMMessage::user(context)],
            max_tokens: Some(spec.max_tokens),
            temperature: Some(self.temperature),
            system_instruction: Some(spec.instructions.to_string()),
        }
    }
}

/// `length` from OpenAI-compatible backends, `max_tokens` from Anthropic
fn hit_token_limit(finish_reason: &str) -> bool {
    matches!(finish_reason, "length" | "max_tokens")
}

#[async_trait]
impl RoleInvoker for LlmRoleInvoker {
    async fn invoke(&self, role: Role, context: &str) -> AppResult<String> {
        let spec = RoleSpec::for_role(role);
        let request = self.build_request(&spec, context);

        info!(role = %role, model = %self.model, "Invoking role");
        let response = self.llm.create_chat_completion(&request).await?;

        if hit_token_limit(&response.finish_reason) {
            warn!(role = %role, max_tokens = spec.max_tokens, "Role output truncated at token limit");
        }
        debug!(
            role = %role,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            "Role completed"
        );

        Ok(response.content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LLMResponse;
    use crate::types::AppError;
    use std::sync::{Arc, Mutex};

    struct RecordingAdapter {
        requests: Mutex<Vec<LLMRequest>>,
        reply: String,
    }

    #[async_trait]
    impl LLMAdapter for RecordingAdapter {
        async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(LLMResponse {
                content: self.reply.clone(),
                finish_reason: "stop".to_string(),
                usage: Default::default(),
            })
        }
    }

    #[async_trait]
    impl LLMAdapter for Arc<RecordingAdapter> {
        async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
            self.as_ref().create_chat_completion(request).await
        }
    }

    struct FailingAdapter;

    #[async_trait]
    impl LLMAdapter for FailingAdapter {
        async fn create_chat_completion(&self, _request: &LLMRequest) -> AppResult<LLMResponse> {
            Err(AppError::LLMApi("rate limited".to_string()))
        }
    }

    #[tokio::test]
    async fn test_invoke_sends_role_instructions_and_context() {
        let adapter = Arc::new(RecordingAdapter {
            requests: Mutex::new(Vec::new()),
            reply: "  Overall Score: 7\n".to_string(),
        });
        let invoker = LlmRoleInvoker::new(Box::new(adapter.clone()), "gpt-4o-mini", 0.8);
        let out = invoker.invoke(Role::Critic, "Hypothesis:\nX").await.unwrap();
        assert_eq!(out, "Overall Score: 7");

        let requests = adapter.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.model, "gpt-4o-mini");
        assert_eq!(req.max_tokens, Some(RoleSpec::for_role(Role::Critic).max_tokens));
        assert_eq!(req.temperature, Some(0.8));
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].role, "user");
        assert_eq!(req.messages[0].content, "Hypothesis:\nX");
        assert!(req.system_instruction.as_deref().unwrap().starts_with("CriticAgent"));
    }

    #[test]
    fn test_token_limit_detected_for_every_backend() {
        assert!(hit_token_limit("length"));
        assert!(hit_token_limit("max_tokens"));
        assert!(!hit_token_limit("stop"));
        assert!(!hit_token_limit("end_turn"));
    }

    #[tokio::test]
    async fn test_invoke_propagates_backend_errors() {
        let invoker = LlmRoleInvoker::new(Box::new(FailingAdapter), "gpt-4o-mini", 0.8);
        let err = invoker.invoke(Role::Planner, "plan").await.unwrap_err();
        assert!(matches!(err, AppError::LLMApi(_)));
    }
}
