//! Swarm-level lifecycle hooks: session start, swarm start/stop, prompt
//! replacement.

mod common;

use std::sync::{Arc, Mutex};

use hive::{HookAction, HookDefinition, HookEvent, Role, ScriptedProvider, Swarm};

/// **Scenario**: a `session_start` hook rewrites the very first prompt; later
/// executions are untouched because the session has already started.
#[tokio::test]
async fn session_start_hook_replaces_first_prompt_only() {
    let provider = Arc::new(ScriptedProvider::always("reply"));

    let swarm = Swarm::builder("team")
        .agent(common::agent("solo"))
        .provider(Arc::clone(&provider) as Arc<dyn hive::Provider>)
        .hook(HookDefinition::callable(HookEvent::SessionStart, |_| {
            HookAction::Replace("sanitized prompt".into())
        }))
        .build()
        .unwrap();

    swarm.execute("raw prompt").await.unwrap();
    swarm.execute("second prompt").await.unwrap();

    let prompts: Vec<String> = provider
        .received()
        .iter()
        .map(|request| {
            request
                .messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .unwrap()
                .content
                .as_text()
        })
        .collect();
    assert_eq!(prompts, vec!["sanitized prompt", "second prompt"]);
}

/// **Scenario**: a halting `swarm_start` hook stops the execution before the
/// lead agent runs.
#[tokio::test]
async fn swarm_start_halt_stops_execution() {
    let provider = Arc::new(ScriptedProvider::always("must not run"));

    let swarm = Swarm::builder("team")
        .agent(common::agent("solo"))
        .provider(Arc::clone(&provider) as Arc<dyn hive::Provider>)
        .hook(HookDefinition::callable(HookEvent::SwarmStart, |_| {
            HookAction::Halt("maintenance window".into())
        }))
        .build()
        .unwrap();

    let err = swarm.execute("anything").await.unwrap_err();
    assert!(matches!(err, hive::ChatError::HaltedByHook(msg) if msg == "maintenance window"));
    assert_eq!(provider.call_count(), 0);
}

/// **Scenario**: a `swarm_stop` hook observes the final content.
#[tokio::test]
async fn swarm_stop_hook_sees_final_content() {
    let seen = Arc::new(Mutex::new(None::<String>));
    let sink = Arc::clone(&seen);

    let swarm = Swarm::builder("team")
        .agent(common::agent("solo"))
        .provider(Arc::new(ScriptedProvider::always("the final word")))
        .hook(HookDefinition::callable(HookEvent::SwarmStop, move |doc| {
            *sink.lock().unwrap() = doc["content"].as_str().map(str::to_string);
            HookAction::Continue
        }))
        .build()
        .unwrap();

    swarm.execute("go").await.unwrap();
    assert_eq!(seen.lock().unwrap().as_deref(), Some("the final word"));
}
