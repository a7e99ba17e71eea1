//! Shell hook protocol.
//!
//! The command runs under `sh -c` with a scrubbed environment: only `PATH`
//! plus `SWARM_PROJECT_DIR`, `SWARM_AGENT_NAME`, and `SWARM_SWARM_NAME` are
//! passed. The event document is written to stdin as JSON.
//!
//! Exit codes:
//! - `0` — continue; for `user_prompt` and `session_start`, stdout replaces
//!   the content.
//! - `2` — halt with stderr as the message; for `user_prompt` the prompt is
//!   erased instead (empty replacement).
//! - anything else, spawn failure, or timeout — log and continue.

use std::process::Stdio;
use std::time::Duration;

use serde_json::Value;
use tokio::io::AsyncWriteExt;

use super::{HookAction, HookEnvironment, HookEvent};

/// Default budget for one shell hook.
pub const SHELL_HOOK_DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs one shell hook and maps its exit status to a [`HookAction`].
pub async fn run_shell_hook(
    command: &str,
    timeout: Duration,
    event: HookEvent,
    document: &Value,
    environment: &HookEnvironment,
) -> HookAction {
    let spawned = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .env_clear()
        .env("PATH", std::env::var("PATH").unwrap_or_default())
        .env("SWARM_PROJECT_DIR", &environment.project_dir)
        .env("SWARM_AGENT_NAME", &environment.agent_name)
        .env("SWARM_SWARM_NAME", &environment.swarm_name)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(err) => {
            tracing::warn!(%command, error = %err, "shell hook failed to spawn; continuing");
            return HookAction::Continue;
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        let payload = document.to_string();
        if let Err(err) = stdin.write_all(payload.as_bytes()).await {
            tracing::warn!(%command, error = %err, "shell hook stdin write failed");
        }
        drop(stdin);
    }

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => {
            tracing::warn!(%command, error = %err, "shell hook wait failed; continuing");
            return HookAction::Continue;
        }
        Err(_) => {
            tracing::warn!(%command, timeout_secs = timeout.as_secs(), "shell hook timed out; continuing");
            return HookAction::Continue;
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    match output.status.code() {
        Some(0) => {
            if event.stdout_replaces() {
                HookAction::Replace(stdout.trim_end_matches('\n').to_string())
            } else {
                HookAction::Continue
            }
        }
        Some(2) => {
            if event == HookEvent::UserPrompt {
                // Exit 2 on the prompt hook erases the prompt rather than
                // halting the whole turn.
                HookAction::Replace(String::new())
            } else {
                HookAction::Halt(stderr.trim_end_matches('\n').to_string())
            }
        }
        code => {
            tracing::warn!(%command, ?code, "shell hook exited nonzero; continuing");
            HookAction::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn environment() -> HookEnvironment {
        HookEnvironment {
            project_dir: std::env::temp_dir(),
            agent_name: "lead".into(),
            swarm_name: "team".into(),
        }
    }

    #[tokio::test]
    async fn exit_zero_stdout_replaces_prompt() {
        let action = run_shell_hook(
            "printf 'rewritten prompt'",
            SHELL_HOOK_DEFAULT_TIMEOUT,
            HookEvent::UserPrompt,
            &json!({"prompt": "original"}),
            &environment(),
        )
        .await;
        assert_eq!(action, HookAction::Replace("rewritten prompt".into()));
    }

    #[tokio::test]
    async fn exit_zero_is_plain_continue_for_tool_events() {
        let action = run_shell_hook(
            "printf 'ignored'",
            SHELL_HOOK_DEFAULT_TIMEOUT,
            HookEvent::PreToolUse,
            &json!({}),
            &environment(),
        )
        .await;
        assert_eq!(action, HookAction::Continue);
    }

    #[tokio::test]
    async fn exit_two_halts_with_stderr() {
        let action = run_shell_hook(
            "printf 'refused by policy' >&2; exit 2",
            SHELL_HOOK_DEFAULT_TIMEOUT,
            HookEvent::PreToolUse,
            &json!({}),
            &environment(),
        )
        .await;
        assert_eq!(action, HookAction::Halt("refused by policy".into()));
    }

    #[tokio::test]
    async fn exit_two_on_user_prompt_erases_the_prompt() {
        let action = run_shell_hook(
            "exit 2",
            SHELL_HOOK_DEFAULT_TIMEOUT,
            HookEvent::UserPrompt,
            &json!({"prompt": "secret"}),
            &environment(),
        )
        .await;
        assert_eq!(action, HookAction::Replace(String::new()));
    }

    #[tokio::test]
    async fn other_exit_codes_continue() {
        let action = run_shell_hook(
            "exit 7",
            SHELL_HOOK_DEFAULT_TIMEOUT,
            HookEvent::PreToolUse,
            &json!({}),
            &environment(),
        )
        .await;
        assert_eq!(action, HookAction::Continue);
    }

    #[tokio::test]
    async fn timeout_continues() {
        let action = run_shell_hook(
            "sleep 5",
            Duration::from_millis(50),
            HookEvent::PreToolUse,
            &json!({}),
            &environment(),
        )
        .await;
        assert_eq!(action, HookAction::Continue);
    }

    #[tokio::test]
    async fn hook_reads_event_document_from_stdin() {
        let action = run_shell_hook(
            // Echo the `event` field back as the replacement prompt.
            r#"sed 's/.*"event":"\([a-z_]*\)".*/\1/'"#,
            SHELL_HOOK_DEFAULT_TIMEOUT,
            HookEvent::UserPrompt,
            &json!({"prompt": "x"}),
            &environment(),
        )
        .await;
        assert_eq!(action, HookAction::Replace("user_prompt".into()));
    }

    #[tokio::test]
    async fn environment_is_scrubbed_to_swarm_vars() {
        std::env::set_var("HIVE_HOOK_LEAK_TEST", "leaky");
        let action = run_shell_hook(
            "printf '%s|%s' \"$SWARM_AGENT_NAME\" \"${HIVE_HOOK_LEAK_TEST:-clean}\"",
            SHELL_HOOK_DEFAULT_TIMEOUT,
            HookEvent::UserPrompt,
            &json!({}),
            &environment(),
        )
        .await;
        std::env::remove_var("HIVE_HOOK_LEAK_TEST");
        assert_eq!(action, HookAction::Replace("lead|clean".into()));
    }
}
