//! The tool-call dispatcher: looks up a tool by name, awaits its handler
//! uniformly whether synchronous or not, and builds the result frame the
//! aggregator folds back into context (spec §4.8).

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;

use crate::context::{Message, ToolCall, ToolDefinition};
use crate::frame::types::{OnUpdateCallback, ToolCallResult, ToolResultProperties};
use crate::frame::Frame;

/// Runs one tool call to completion and builds its result payload
/// (spec §4.8). Never panics or propagates an error: `ToolNotFound` and
/// handler failures both become a result frame (spec §7).
pub async fn dispatch(tools: &[ToolDefinition], call: &ToolCall) -> ToolCallResult {
    let request = Message::assistant_tool_calls(vec![call.clone()]);

    let Some(tool) = tools.iter().find(|t| t.name == call.function_name) else {
        return ToolCallResult {
            request,
            result: Value::String("Tool not found".to_string()),
            properties: ToolResultProperties {
                run_llm: true,
                on_update: None,
            },
        };
    };

    let args: Value =
        serde_json::from_str(&call.arguments).unwrap_or_else(|_| Value::String(call.arguments.clone()));

    let handler_result = tool.handler.call(args.clone()).await;
    let handler_failed = handler_result.is_err();
    let result = match handler_result {
        Ok(value) => value,
        Err(err) => Value::String(err.to_string()),
    };

    let on_update = tool.transition_cb.clone().map(|cb| {
        let captured_args = args.clone();
        OnUpdateCallback(Arc::new(move |_result: &Value| cb(&captured_args)))
    });

    ToolCallResult {
        request,
        result,
        properties: ToolResultProperties {
            // A handler error always leaves run-llm true so the model can
            // recover, even when the tool declared a transition-cb.
            run_llm: handler_failed || tool.transition_cb.is_none(),
            on_update,
        },
    }
}

/// The dedicated worker attached to the aggregator's `init` (spec §4.8):
/// consumes calls from `write_rx`, dispatches each against the current tool
/// catalogue, and pushes the result frame onto `read_tx` for the aggregator
/// to pick back up as an ordinary input.
pub async fn run_dispatcher_worker(
    tools: Arc<Mutex<Vec<ToolDefinition>>>,
    mut write_rx: mpsc::Receiver<ToolCall>,
    read_tx: mpsc::Sender<Frame>,
) {
    while let Some(call) = write_rx.recv().await {
        let snapshot = tools
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        let result = dispatch(&snapshot, &call).await;
        if read_tx.send(Frame::llm_tool_call_result(result)).await.is_err() {
            break;
        }
    }
}
