//! End-to-end workflow execution: ordering, transformers, halt and goto.

mod common;

use std::sync::{Arc, Mutex};

use hive::{
    LogCollector, NodeDefinition, Transformer, TransformerAction, Workflow,
};

/// **Scenario**: three chained nodes with echoing agents pass the prompt
/// through unchanged; later nodes see earlier results in `all_results`.
#[tokio::test]
async fn three_node_chain_echoes_prompt() {
    let seen_at_verify = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&seen_at_verify);

    let workflow = Workflow::builder("pipeline")
        .agent(common::agent("planner"))
        .agent(common::agent("builder"))
        .agent(common::agent("verifier"))
        .node(NodeDefinition::new("plan").agent_named("planner"))
        .node(
            NodeDefinition::new("build")
                .agent_named("builder")
                .depends_on(["plan"]),
        )
        .node(
            NodeDefinition::new("verify")
                .agent_named("verifier")
                .depends_on(["build"])
                .input_transformer(Transformer::callable(move |ctx| {
                    let mut keys: Vec<String> = ctx.all_results.keys().cloned().collect();
                    keys.sort();
                    *sink.lock().unwrap() = keys;
                    TransformerAction::Continue(ctx.content.clone())
                })),
        )
        .provider(common::echo_provider())
        .build()
        .unwrap();

    assert_eq!(workflow.execution_order(), &["plan", "build", "verify"]);

    let result = workflow.execute("P").await.unwrap();
    assert_eq!(result.content, "P");
    assert_eq!(result.agent, "verifier");
    assert_eq!(*seen_at_verify.lock().unwrap(), vec!["build", "plan"]);
    assert_eq!(result.all_results.len(), 3);
}

/// **Scenario**: an input transformer halts the workflow before the guard
/// node executes; later nodes never run and `node_stop` fires once for the
/// guard.
#[tokio::test]
async fn input_transformer_halts_workflow() {
    let downstream = Arc::new(hive::ScriptedProvider::always("must not run"));

    let workflow = Workflow::builder("guarded")
        .agent(common::agent("worker"))
        .node(
            NodeDefinition::new("guard")
                .agent_named("worker")
                .input_transformer(Transformer::callable(|_| {
                    TransformerAction::Halt("TOO LONG".into())
                })),
        )
        .node(
            NodeDefinition::new("rest")
                .agent_named("worker")
                .depends_on(["guard"]),
        )
        .provider(Arc::clone(&downstream) as Arc<dyn hive::Provider>)
        .build()
        .unwrap();

    let stops = LogCollector::attach_for_type(&workflow.stream(), "node_stop");
    let result = workflow.execute("anything").await.unwrap();

    assert_eq!(result.content, "TOO LONG");
    assert_eq!(result.agent, "halted:guard");
    assert!(result.all_results.is_empty());
    // The provider never ran: no node executed.
    assert_eq!(downstream.call_count(), 0);

    let stops = stops.events();
    assert_eq!(stops.len(), 1);
    assert_eq!(stops[0]["node"], "guard");
}

/// **Scenario**: skip synthesizes a zero-duration result attributed to
/// `skipped:<node>` and execution proceeds.
#[tokio::test]
async fn skip_synthesizes_result() {
    let workflow = Workflow::builder("skippy")
        .agent(common::agent("worker"))
        .node(
            NodeDefinition::new("optional")
                .agent_named("worker")
                .input_transformer(Transformer::callable(|_| {
                    TransformerAction::Skip("cached output".into())
                })),
        )
        .node(
            NodeDefinition::new("final")
                .agent_named("worker")
                .depends_on(["optional"]),
        )
        .provider(common::echo_provider())
        .build()
        .unwrap();

    let result = workflow.execute("input").await.unwrap();
    let skipped = &result.all_results["optional"];
    assert_eq!(skipped.agent, "skipped:optional");
    assert_eq!(skipped.content, "cached output");
    assert_eq!(skipped.duration_ms, 0);
    // The single-dependency successor consumed the synthesized content.
    assert_eq!(result.content, "cached output");
}

/// **Scenario**: an output transformer can send execution back to an
/// earlier node; the loop runs until the transformer lets the content
/// through.
#[tokio::test]
async fn goto_jumps_to_target_node() {
    let rounds = Arc::new(Mutex::new(0u32));
    let counter = Arc::clone(&rounds);

    let workflow = Workflow::builder("looping")
        .agent(common::agent("worker"))
        .node(NodeDefinition::new("draft").agent_named("worker"))
        .node(
            NodeDefinition::new("review")
                .agent_named("worker")
                .depends_on(["draft"])
                .output_transformer(Transformer::callable(move |ctx| {
                    let mut rounds = counter.lock().unwrap();
                    *rounds += 1;
                    if *rounds < 3 {
                        TransformerAction::Goto {
                            target: "draft".into(),
                            content: format!("round {}", *rounds),
                        }
                    } else {
                        TransformerAction::Continue(ctx.content.clone())
                    }
                })),
        )
        .provider(common::echo_provider())
        .build()
        .unwrap();

    let result = workflow.execute("start").await.unwrap();
    assert_eq!(*rounds.lock().unwrap(), 3);
    // Last round's draft echoed "round 2" through review.
    assert_eq!(result.content, "round 2");
}

/// **Scenario**: goto to a node outside the execution order is an error.
#[tokio::test]
async fn goto_unknown_target_is_error() {
    let workflow = Workflow::builder("broken")
        .agent(common::agent("worker"))
        .node(
            NodeDefinition::new("only")
                .agent_named("worker")
                .input_transformer(Transformer::callable(|_| TransformerAction::Goto {
                    target: "ghost".into(),
                    content: String::new(),
                })),
        )
        .provider(common::echo_provider())
        .build()
        .unwrap();

    let err = workflow.execute("x").await.unwrap_err();
    assert!(matches!(
        err,
        hive::WorkflowError::UnknownGotoTarget(target) if target == "ghost"
    ));
}

/// **Scenario**: an agent with `reset_context: false` keeps its conversation
/// across nodes; with the default reset, each node starts fresh.
#[tokio::test]
async fn keep_context_carries_conversation_across_nodes() {
    use hive::NodeAgentConfig;

    let provider = Arc::new(hive::ScriptedProvider::always("noted"));
    let workflow = Workflow::builder("memory")
        .agent(common::agent("keeper"))
        .node(NodeDefinition::new("first").agent(NodeAgentConfig::new("keeper").keep_context()))
        .node(
            NodeDefinition::new("second")
                .agent(NodeAgentConfig::new("keeper").keep_context())
                .depends_on(["first"]),
        )
        .provider(Arc::clone(&provider) as Arc<dyn hive::Provider>)
        .build()
        .unwrap();

    workflow.execute("remember this").await.unwrap();

    // The second node's request carried the first node's conversation.
    let requests = provider.received();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].messages.len(), 1);
    assert!(requests[1].messages.len() > 2);
    assert_eq!(requests[1].messages[0].content.as_text(), "remember this");

    // With the default reset, the second node starts from scratch.
    let fresh_provider = Arc::new(hive::ScriptedProvider::always("noted"));
    let resetting = Workflow::builder("amnesia")
        .agent(common::agent("keeper"))
        .node(NodeDefinition::new("first").agent_named("keeper"))
        .node(
            NodeDefinition::new("second")
                .agent_named("keeper")
                .depends_on(["first"]),
        )
        .provider(Arc::clone(&fresh_provider) as Arc<dyn hive::Provider>)
        .build()
        .unwrap();
    resetting.execute("remember this").await.unwrap();
    let requests = fresh_provider.received();
    assert_eq!(requests[1].messages.len(), 1);
}

/// **Scenario**: a transformer-only node (no agents) passes its transformed
/// input downstream.
#[tokio::test]
async fn transformer_only_node_produces_content() {
    let workflow = Workflow::builder("shaping")
        .agent(common::agent("worker"))
        .node(
            NodeDefinition::new("shape")
                .input_transformer(Transformer::callable(|ctx| {
                    TransformerAction::Continue(format!("shaped: {}", ctx.content))
                })),
        )
        .node(
            NodeDefinition::new("use")
                .agent_named("worker")
                .depends_on(["shape"]),
        )
        .provider(common::echo_provider())
        .build()
        .unwrap();

    let result = workflow.execute("raw").await.unwrap();
    assert_eq!(result.all_results["shape"].agent, "transformer:shape");
    assert_eq!(result.content, "shaped: raw");
}
