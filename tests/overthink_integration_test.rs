//! overthink 端到端测试

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use overthink::actions::{
    emoji_reaction, ActionRegistry, Arguments, ParamType, Parameter, Signature, EMOJI_REACTION,
};
use overthink::llm::{CollectingOutput, MockThink, Think};
use overthink::memory::Role;
use overthink::{
    describe, Action, Agent, AgentConfig, CallSpecification, Context, Message, TerminalReason,
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

fn thread_messages() -> Vec<Message> {
    vec![
        Message::user("@nombo> Yeah, i think so"),
        Message::user("@molly> What is it that you don't like about blueberries?"),
        Message::user("@molly> @assistant, please emoji react?"),
    ]
}

#[tokio::test]
async fn test_emoji_reaction_round_appends_observation() {
    let think = Arc::new(MockThink::scripted(vec![Message::function_call(
        EMOJI_REACTION,
        r#"{"emoji":"👍"}"#,
    )]));
    let output = Arc::new(CollectingOutput::new());
    let agent = Agent::with_actions(
        AgentConfig::default(),
        think,
        output.clone(),
        [emoji_reaction()],
    )
    .unwrap();

    let result = agent.overthink(thread_messages(), Context::new()).await.unwrap();
    assert_eq!(result.generated[0].role, Role::Assistant);
    assert_eq!(
        result.generated[0].function_call.as_ref().map(|c| c.name.as_str()),
        Some(EMOJI_REACTION)
    );
    assert_eq!(
        result.generated[1],
        Message::function_result(EMOJI_REACTION, "AI is feeling 👍")
    );
    assert_eq!(result.messages, thread_messages());
    assert_eq!(output.count(), 1);
}

#[tokio::test]
async fn test_emoji_reaction_with_stop_ends_at_depth_zero() {
    let think = Arc::new(MockThink::always_call(
        EMOJI_REACTION,
        "{\"emoji\":\"👍\", \"stop\":true}",
    ));
    let agent = Agent::with_actions(
        AgentConfig::default(),
        think.clone(),
        Arc::new(CollectingOutput::new()),
        [emoji_reaction()],
    )
    .unwrap();

    let result = agent.overthink(thread_messages(), Context::new()).await.unwrap();
    assert_eq!(result.depth, 0);
    assert_eq!(result.terminal, TerminalReason::NullActionResult);
    assert_eq!(result.generated.len() % 2, 1);
    assert_eq!(think.calls(), 1);
}

#[tokio::test]
async fn test_context_reaches_action_and_result() {
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_in_action = seen.clone();
    let whoami = Action::new(
        Signature::new("whoami")
            .doc("Tells which channel the request came from")
            .param(Parameter::context("ctx")),
        move |ctx: Option<Context>, _args: Arguments| {
            let seen = seen_in_action.clone();
            async move {
                let Some(ctx) = ctx else {
                    return Err(anyhow::anyhow!("context not injected"));
                };
                assert_eq!(ctx.get("channel"), Some(&json!(999)));
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(Some(json!("channel 999")))
            }
        },
    );

    let think = Arc::new(MockThink::scripted(vec![Message::function_call("whoami", "{}")]));
    let output = Arc::new(CollectingOutput::new());
    let agent = Agent::with_actions(AgentConfig::default(), think.clone(), output.clone(), [whoami])
        .unwrap();

    let result = agent
        .overthink(thread_messages(), Context::new().with("channel", 999))
        .await
        .unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(result.context.get("channel"), Some(&json!(999)));
    assert_eq!(output.outputs()[0].1.get("channel"), Some(&json!(999)));

    let offered = think.last_functions();
    assert_eq!(offered.len(), 1);
    assert!(offered[0].parameters.properties.is_empty());
    assert!(offered[0].parameters.required.is_empty());
}

#[test]
fn test_registry_round_trip_by_spec_name() {
    let action = Action::new(
        Signature::new("lookup_me")
            .param(Parameter::required("q", ParamType::String))
            .param(Parameter::optional("limit", ParamType::Integer, 10)),
        |_ctx, _args| async { Ok(None) },
    )
    .describe(describe("Finds things").param("q", " query "));

    let mut registry = ActionRegistry::new();
    let spec: CallSpecification = registry.register(action.clone()).unwrap();
    assert!(registry.lookup(&spec.name).unwrap().same_callable(&action));
    assert_eq!(spec.parameters.required, vec!["q".to_string()]);
    assert_eq!(spec.parameters.properties["q"].description, "query");
}

/// Adds two numbers.
#[derive(Deserialize, JsonSchema)]
struct AddArgs {
    a: i64,
    #[serde(default)]
    b: i64,
}

#[tokio::test]
async fn test_typed_action_and_type_mismatch_is_observed() {
    let add = Action::typed("add", |args: AddArgs| async move {
        Ok(Some(Value::from(args.a + args.b)))
    })
    .unwrap();
    let spec = add.specification().unwrap();
    assert_eq!(spec.description.as_deref(), Some("Adds two numbers."));
    assert_eq!(spec.parameters.required, vec!["a".to_string()]);
    assert_eq!(spec.parameters.properties["a"].kind, "integer");

    let think = Arc::new(MockThink::scripted(vec![
        Message::function_call("add", r#"{"a": 2, "b": 3}"#),
        Message::function_call("add", r#"{"a": "two"}"#),
    ]));
    let agent = Agent::with_actions(
        AgentConfig::default(),
        think,
        Arc::new(CollectingOutput::new()),
        [add],
    )
    .unwrap();

    let result = agent.overthink(vec![], Context::new()).await.unwrap();
    assert_eq!(result.generated[1], Message::function_result("add", "5"));
    let failure = result.generated[3].content.clone().unwrap_or_default();
    assert!(failure.starts_with("error: "), "{failure}");
    assert_eq!(result.depth, 2);
}

/// 每次 think 前让出调度器，便于多个 overthink 交错执行
struct YieldingThink {
    inner: MockThink,
}

#[async_trait]
impl Think for YieldingThink {
    async fn think(
        &self,
        prompt: &[Message],
        functions: &[CallSpecification],
    ) -> Result<Message, String> {
        tokio::task::yield_now().await;
        self.inner.think(prompt, functions).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_runs_share_agent_and_blocking_pool() {
    let slow = Action::blocking(
        Signature::new("slow").param(Parameter::context("ctx")),
        |ctx, _args| {
            std::thread::sleep(std::time::Duration::from_millis(20));
            let channel = ctx.and_then(|c| c.get("channel").cloned()).unwrap_or(Value::Null);
            Ok(Some(json!({ "channel": channel })))
        },
    );
    let think = Arc::new(YieldingThink {
        inner: MockThink::always_call("slow", "{}"),
    });
    let agent = Arc::new(
        Agent::with_actions(
            AgentConfig::default().with_max_depth(2).with_worker_threads(1),
            think,
            Arc::new(CollectingOutput::new()),
            [slow],
        )
        .unwrap(),
    );

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let agent = agent.clone();
            tokio::spawn(async move {
                agent
                    .overthink(vec![], Context::new().with("channel", i))
                    .await
            })
        })
        .collect();

    for (i, h) in handles.into_iter().enumerate() {
        let result = h.await.unwrap().unwrap();
        assert_eq!(result.depth, 2);
        assert_eq!(result.terminal, TerminalReason::MaxDepth);
        assert_eq!(result.generated.len(), 5);
        let expected = json!({ "channel": i }).to_string();
        assert_eq!(result.generated[1].content.as_deref(), Some(expected.as_str()));
    }
}
