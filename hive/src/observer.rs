//! Observers: event-triggered fire-and-forget side agents.
//!
//! An observer subscribes to event types on the swarm's LogStream. When a
//! matching event arrives, its trigger decides whether to spawn the observer
//! agent with a generated prompt. Observer runs are isolated chats (no
//! delegation tools), capped per observer by a semaphore, and never affect
//! main execution: failures emit `observer_agent_error` and stop there.
//!
//! The self-consumption guard drops any event whose `agent` field equals the
//! observer's own name, so an observer never reacts to itself.

use std::sync::{Arc, Mutex as StdMutex};

use log_event::LogEvent;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::agent::AgentDefinition;
use crate::swarm::SwarmCore;

/// Trigger: inspects a matching event and returns the prompt to run the
/// observer with, or `None` to ignore the event.
pub type ObserverTrigger = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// Declarative observer configuration.
pub struct ObserverConfig {
    /// The observer's own agent definition. Delegation targets are ignored;
    /// observer chats are isolated.
    pub agent: AgentDefinition,
    /// Event `type` tags this observer reacts to (e.g. `"tool_call"`).
    pub events: Vec<String>,
    pub trigger: ObserverTrigger,
    /// Concurrent instance cap.
    pub max_concurrent: usize,
    /// When set, `Swarm::execute` awaits this observer's runs before
    /// returning.
    pub wait_for_completion: bool,
}

impl ObserverConfig {
    pub fn new(
        agent: AgentDefinition,
        events: impl IntoIterator<Item = impl Into<String>>,
        trigger: impl Fn(&Value) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            agent,
            events: events.into_iter().map(Into::into).collect(),
            trigger: Arc::new(trigger),
            max_concurrent: 1,
            wait_for_completion: false,
        }
    }

    pub fn max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    pub fn wait_for_completion(mut self) -> Self {
        self.wait_for_completion = true;
        self
    }
}

struct ObserverEntry {
    definition: Arc<AgentDefinition>,
    events: Vec<String>,
    trigger: ObserverTrigger,
    semaphore: Arc<Semaphore>,
    wait_for_completion: bool,
}

/// Manages a swarm's observers: subscription, spawning, cleanup.
#[derive(Default)]
pub struct ObserverManager {
    entries: Vec<ObserverEntry>,
    tasks: StdMutex<Vec<(bool, JoinHandle<()>)>>,
    subscription: StdMutex<Option<crate::logstream::SubscriptionHandle>>,
}

impl ObserverManager {
    pub fn new(configs: Vec<ObserverConfig>) -> Self {
        let entries = configs
            .into_iter()
            .map(|config| {
                // Observer chats are isolated: no delegation targets.
                let mut definition = config.agent;
                definition.delegates_to.clear();
                ObserverEntry {
                    definition: Arc::new(definition),
                    events: config.events,
                    trigger: config.trigger,
                    semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
                    wait_for_completion: config.wait_for_completion,
                }
            })
            .collect();
        Self {
            entries,
            tasks: StdMutex::new(Vec::new()),
            subscription: StdMutex::new(None),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Subscribes the manager to the core's stream. Called once after the
    /// swarm core is built.
    pub(crate) fn install(core: &Arc<SwarmCore>) {
        if core.observers.is_empty() {
            return;
        }
        let weak = Arc::downgrade(core);
        let stream = Arc::clone(&core.stream);
        // The subscription lives as long as the stream; the weak core link
        // makes dropped swarms inert.
        let handle = stream.subscribe(None, move |event| {
            if let Some(core) = weak.upgrade() {
                core.observers.dispatch(&core, event);
            }
        });
        *core
            .observers
            .subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Reacts to one emitted event: for every observer whose event set and
    /// self-consumption guard admit it, asks the trigger for a prompt and
    /// spawns a run.
    fn dispatch(&self, core: &Arc<SwarmCore>, event: &Value) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let event_type = event.get("type").and_then(|v| v.as_str()).unwrap_or("");
        let event_agent = event.get("agent").and_then(|v| v.as_str());

        for entry in &self.entries {
            if !entry.events.iter().any(|e| e == event_type) {
                continue;
            }
            if event_agent == Some(entry.definition.name.as_str()) {
                continue; // self-consumption guard
            }
            let Some(prompt) = (entry.trigger)(event) else {
                continue;
            };

            let definition = Arc::clone(&entry.definition);
            let semaphore = Arc::clone(&entry.semaphore);
            let core = Arc::clone(core);
            let task = runtime.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                let observer = definition.name.clone();
                let run = async {
                    let chat = core.observer_chat(&definition).await?;
                    chat.ask(&prompt).await.map_err(|e| e.to_string())?;
                    Ok::<(), String>(())
                };
                if let Err(error) = run.await {
                    tracing::warn!(observer = %observer, %error, "observer run failed");
                    core.stream.emit(&LogEvent::ObserverAgentError { observer, error });
                }
            });
            self.tasks
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push((entry.wait_for_completion, task));
        }
    }

    /// Awaits waiting observers and aborts the rest. Idempotent; called from
    /// swarm cleanup after every execution.
    pub async fn cleanup(&self) {
        let tasks: Vec<(bool, JoinHandle<()>)> =
            std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|e| e.into_inner()));
        for (wait, task) in tasks {
            if wait {
                let _ = task.await;
            } else {
                task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observer_config(name: &str) -> ObserverConfig {
        let agent = AgentDefinition::builder(name)
            .directory(std::env::temp_dir())
            .delegates_to(["someone"])
            .build()
            .unwrap();
        ObserverConfig::new(agent, ["tool_call"], |_| Some("react".into()))
    }

    #[test]
    fn observer_definitions_lose_delegation_targets() {
        let manager = ObserverManager::new(vec![observer_config("auditor")]);
        assert!(manager.entries[0].definition.delegates_to.is_empty());
    }

    #[test]
    fn defaults_cap_concurrency_at_one() {
        let config = observer_config("auditor");
        assert_eq!(config.max_concurrent, 1);
        assert!(!config.wait_for_completion);
        let config = config.max_concurrent(0);
        assert_eq!(config.max_concurrent, 1);
    }
}
