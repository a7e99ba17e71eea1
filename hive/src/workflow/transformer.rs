//! Node input/output transformers.
//!
//! A transformer sees a [`NodeContext`] and yields a [`TransformerAction`]:
//! continue with (possibly rewritten) content, skip the node, halt the
//! workflow, or jump to another node. Callable transformers return the
//! action directly; shell transformers speak the stdin/stdout protocol
//! described on [`Transformer::Shell`].

use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;

/// Recorded outcome of one executed (or skipped) node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
    /// The lead agent that produced the content, or `"skipped:<node>"` /
    /// `"halted:<node>"` for synthesized results.
    pub agent: String,
    pub content: String,
    pub duration_ms: u64,
}

/// Whether a transformer runs before or after node execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransformerEvent {
    Input,
    Output,
}

impl TransformerEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformerEvent::Input => "input",
            TransformerEvent::Output => "output",
        }
    }
}

/// What a transformer sees.
#[derive(Clone, Debug)]
pub struct NodeContext {
    pub event: TransformerEvent,
    pub node_name: String,
    /// The prompt the workflow was executed with.
    pub original_prompt: String,
    /// Input content (previous result for single-dependency nodes) or the
    /// node's output, depending on `event`.
    pub content: String,
    /// Results of every node recorded so far.
    pub all_results: BTreeMap<String, NodeResult>,
    pub dependencies: Vec<String>,
}

impl NodeContext {
    /// The JSON document shell transformers receive on stdin.
    pub fn to_document(&self) -> Value {
        json!({
            "event": self.event.as_str(),
            "node": self.node_name,
            "original_prompt": self.original_prompt,
            "content": self.content,
            "all_results": self.all_results,
            "dependencies": self.dependencies,
        })
    }
}

/// Control outcome of a transformer. No hidden nonlocal exits: halt and goto
/// are ordinary variants the executor matches on.
#[derive(Clone, Debug, PartialEq)]
pub enum TransformerAction {
    /// Proceed with this content.
    Continue(String),
    /// Do not execute the node; synthesize a zero-duration result with this
    /// content. Input transformers only.
    Skip(String),
    /// Stop the workflow; this content is the final result.
    Halt(String),
    /// Jump to `target` (must be in the execution order) with `content` as
    /// its input.
    Goto { target: String, content: String },
}

/// Default budget for one shell transformer.
pub const SHELL_TRANSFORMER_TIMEOUT: Duration = Duration::from_secs(60);

type CallableTransformer = Arc<dyn Fn(&NodeContext) -> TransformerAction + Send + Sync>;

/// A node transformer: in-process callable or shell command.
///
/// # Shell protocol
///
/// The command receives the [`NodeContext`] document on stdin. Exit code 0
/// means success: stdout is the replacement content, or — when stdout parses
/// as a JSON object carrying exactly one of `skip_execution`,
/// `halt_workflow`, `goto_node` plus `content` — a control outcome. Exit
/// code 1 passes the content through unchanged (stdout ignored). Exit code 2
/// halts the workflow with stderr as the message. A timeout halts with
/// `"timeout"`.
#[derive(Clone)]
pub enum Transformer {
    Callable(CallableTransformer),
    Shell { command: String, timeout: Duration },
}

impl Transformer {
    pub fn callable(
        f: impl Fn(&NodeContext) -> TransformerAction + Send + Sync + 'static,
    ) -> Self {
        Transformer::Callable(Arc::new(f))
    }

    pub fn shell(command: impl Into<String>) -> Self {
        Transformer::Shell {
            command: command.into(),
            timeout: SHELL_TRANSFORMER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, new_timeout: Duration) -> Self {
        if let Transformer::Shell { timeout, .. } = &mut self {
            *timeout = new_timeout;
        }
        self
    }

    /// Applies the transformer to `ctx`.
    pub async fn apply(&self, ctx: &NodeContext) -> TransformerAction {
        match self {
            Transformer::Callable(f) => f(ctx),
            Transformer::Shell { command, timeout } => {
                run_shell_transformer(command, *timeout, ctx).await
            }
        }
    }
}

/// Parses a control dictionary out of transformer output. Returns `None`
/// when the output is plain content.
fn parse_control(output: &str) -> Option<TransformerAction> {
    let value: Value = serde_json::from_str(output.trim()).ok()?;
    let obj = value.as_object()?;
    let content = obj
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    if obj.get("halt_workflow").and_then(|v| v.as_bool()) == Some(true) {
        return Some(TransformerAction::Halt(content));
    }
    if obj.get("skip_execution").and_then(|v| v.as_bool()) == Some(true) {
        return Some(TransformerAction::Skip(content));
    }
    if let Some(target) = obj.get("goto_node").and_then(|v| v.as_str()) {
        return Some(TransformerAction::Goto {
            target: target.to_string(),
            content,
        });
    }
    None
}

async fn run_shell_transformer(
    command: &str,
    timeout: Duration,
    ctx: &NodeContext,
) -> TransformerAction {
    let spawned = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(err) => {
            return TransformerAction::Halt(format!("transformer failed to spawn: {err}"));
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        let document = ctx.to_document().to_string();
        let _ = stdin.write_all(document.as_bytes()).await;
        drop(stdin);
    }

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => return TransformerAction::Halt(format!("transformer failed: {err}")),
        Err(_) => return TransformerAction::Halt("timeout".to_string()),
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    match output.status.code() {
        Some(0) => {
            let text = stdout.trim_end_matches('\n').to_string();
            parse_control(&text).unwrap_or(TransformerAction::Continue(text))
        }
        Some(1) => TransformerAction::Continue(ctx.content.clone()),
        Some(2) => TransformerAction::Halt(stderr.trim_end_matches('\n').to_string()),
        code => TransformerAction::Halt(format!("transformer exited with {code:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(content: &str) -> NodeContext {
        NodeContext {
            event: TransformerEvent::Input,
            node_name: "guard".to_string(),
            original_prompt: "original".to_string(),
            content: content.to_string(),
            all_results: BTreeMap::new(),
            dependencies: vec![],
        }
    }

    #[tokio::test]
    async fn shell_exit_zero_stdout_is_replacement_content() {
        let t = Transformer::shell("printf 'rewritten'");
        let action = t.apply(&ctx("input")).await;
        assert_eq!(action, TransformerAction::Continue("rewritten".into()));
    }

    #[tokio::test]
    async fn shell_exit_one_passes_content_through() {
        let t = Transformer::shell("printf 'ignored'; exit 1");
        let action = t.apply(&ctx("unchanged")).await;
        assert_eq!(action, TransformerAction::Continue("unchanged".into()));
    }

    #[tokio::test]
    async fn shell_exit_two_halts_with_stderr() {
        let t = Transformer::shell("printf 'bad input' >&2; exit 2");
        let action = t.apply(&ctx("x")).await;
        assert_eq!(action, TransformerAction::Halt("bad input".into()));
    }

    #[tokio::test]
    async fn shell_timeout_halts_with_timeout_message() {
        let t = Transformer::shell("sleep 5").with_timeout(Duration::from_millis(50));
        let action = t.apply(&ctx("x")).await;
        assert_eq!(action, TransformerAction::Halt("timeout".into()));
    }

    #[tokio::test]
    async fn shell_control_dictionary_is_recognized() {
        let t = Transformer::shell(
            r#"printf '{"halt_workflow": true, "content": "TOO LONG"}'"#,
        );
        let action = t.apply(&ctx("x")).await;
        assert_eq!(action, TransformerAction::Halt("TOO LONG".into()));

        let t = Transformer::shell(
            r#"printf '{"goto_node": "plan", "content": "again"}'"#,
        );
        let action = t.apply(&ctx("x")).await;
        assert_eq!(
            action,
            TransformerAction::Goto {
                target: "plan".into(),
                content: "again".into()
            }
        );
    }

    #[tokio::test]
    async fn shell_reads_context_document_on_stdin() {
        // Extract the node field from the stdin document.
        let t = Transformer::shell(r#"sed 's/.*"node":"\([a-z_]*\)".*/\1/'"#);
        let action = t.apply(&ctx("x")).await;
        assert_eq!(action, TransformerAction::Continue("guard".into()));
    }

    #[test]
    fn plain_json_without_control_keys_is_content() {
        assert_eq!(parse_control(r#"{"summary": "fine"}"#), None);
        assert_eq!(parse_control("not json"), None);
    }
}
