//! The two-round tool-calling exchange with the model.

use crate::error::RelayError;
use crate::invoker::{RequestMode, ToolInvoker};
use chat_client::{
    ChatClient, ChatError, ChatParams, FunctionDefinitionApi, Message, ToolDefinition,
};
use futures::Stream;
use openapi_tools::{FunctionRegistry, HeaderPairs, SchemaConverter};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Everything one exchange needs from the inbound request.
#[derive(Debug, Clone)]
pub struct ToolChatRequest {
    pub model: String,
    pub params: ChatParams,
    pub messages: Vec<Message>,
    pub tool_schemas: Vec<String>,
    pub custom_headers: HeaderPairs,
    pub mode: RequestMode,
}

/// Round 1 with tools, optional tool execution, then a streamed round 2.
pub struct ToolChat {
    chat: ChatClient,
    invoker: ToolInvoker,
    converter: Arc<dyn SchemaConverter>,
}

impl ToolChat {
    pub fn new(chat: ChatClient, invoker: ToolInvoker, converter: Arc<dyn SchemaConverter>) -> Self {
        Self {
            chat,
            invoker,
            converter,
        }
    }

    /// Run the exchange and return the final answer's token stream.
    ///
    /// Any failure before round 2 starts streaming aborts the whole exchange.
    #[instrument(skip_all, fields(model = %request.model, schemas = request.tool_schemas.len()))]
    pub async fn run(
        &self,
        request: ToolChatRequest,
    ) -> Result<impl Stream<Item = Result<String, ChatError>> + Send + 'static, RelayError> {
        let registry = FunctionRegistry::build(
            self.converter.as_ref(),
            &request.tool_schemas,
            &request.custom_headers,
        )?;
        let tools = tool_definitions(&registry);
        debug!(
            functions = tools.len(),
            resolvable = ?registry.function_names(),
            "Function registry built"
        );

        let mut messages = request.messages;
        let first = self
            .chat
            .chat_with_tools(&request.model, &messages, &request.params, Some(tools.as_slice()))
            .await?;

        // The assistant turn is kept even when it requests nothing.
        messages.push(first.to_message());

        let calls = first.tool_calls();
        if !calls.is_empty() {
            info!(count = calls.len(), "Model requested tool calls");
            let results = self
                .invoker
                .invoke_all(&registry, calls, request.mode)
                .await?;
            messages.extend(results);
        }

        let tokens = self
            .chat
            .chat_stream(&request.model, &messages, &request.params)
            .await?;
        Ok(tokens)
    }
}

/// Model-facing tool list, one entry per registered signature.
pub fn tool_definitions(registry: &FunctionRegistry) -> Vec<ToolDefinition> {
    registry
        .signatures()
        .iter()
        .map(|signature| ToolDefinition {
            tool_type: "function".into(),
            function: FunctionDefinitionApi {
                name: signature.name.clone(),
                description: signature.description.clone(),
                parameters: signature.parameters.clone(),
            },
        })
        .collect()
}
