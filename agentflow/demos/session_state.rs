//! Scoped session state, a persistent store and event compaction.

use agentflow::observability::init_tracing;
use agentflow::prelude::*;
use agentflow::testing::ScriptedDecider;
use serde_json::{json, Value};
use std::sync::Arc;

fn save_userinfo() -> WorkerRef {
    Arc::new(
        FunctionWorker::new("save_userinfo", |tool_ctx, args| {
            let name = args.get("user_name").cloned().unwrap_or(Value::Null);
            let country = args.get("country").cloned().unwrap_or(Value::Null);
            tool_ctx.set_state("user:name", name);
            tool_ctx.set_state("user:country", country);
            Ok(ToolResult::success())
        })
        .with_description("Records the user's name and country")
        .with_parameter(ParameterSpec::required("user_name", ParameterType::String))
        .with_parameter(ParameterSpec::required("country", ParameterType::String)),
    )
}

fn retrieve_userinfo() -> WorkerRef {
    Arc::new(
        FunctionWorker::new("retrieve_userinfo", |tool_ctx, _args| {
            Ok(ToolResult::success()
                .with("user_name", tool_ctx.state("user:name").unwrap_or(json!("Username not found")))
                .with("country", tool_ctx.state("user:country").unwrap_or(json!("Country not found"))))
        })
        .with_description("Retrieves the user's name and country"),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let dir = std::env::temp_dir().join("agentflow-session-demo");
    tokio::fs::create_dir_all(&dir).await?;
    let store = Arc::new(JsonFileSessionStore::open(dir.join("sessions.json")).await?);

    let decider = Arc::new(ScriptedDecider::new(vec![
        Decision::call(ToolCall::new(
            "save_userinfo",
            json!({"user_name": "Sam", "country": "Poland"}),
        )),
        Decision::reply("Nice to meet you, Sam!"),
        Decision::call(ToolCall::new("retrieve_userinfo", json!({}))),
        Decision::reply("You are Sam, from Poland."),
    ]));
    let agent = DelegatingWorker::new("text_chat_bot", decider)
        .with_instruction("A text chatbot. Save user info with save_userinfo and recall it with retrieve_userinfo.")
        .with_sub_workers(vec![save_userinfo(), retrieve_userinfo()]);

    let summarizer = DecisionSummarizer::new(Arc::new(ScriptedDecider::repeating(Decision::reply(
        "Sam from Poland introduced themself and asked to be remembered.",
    ))));
    let runner = Runner::new("agents", Arc::new(agent), store.clone())
        .with_config(EngineConfig::default().with_compaction(EventsCompactionConfig::new(3, 1)))?
        .with_summarizer(Arc::new(summarizer));

    let first = runner.session_key("default", "db-session-01");
    store.get_or_create(&first).await?;
    let hello = runner.run("default", "db-session-01", "Hi there, I am Sam from Poland!").await?;
    println!("{}", hello.text.unwrap_or_default());

    let second = runner.session_key("default", "db-session-02");
    store.get_or_create(&second).await?;
    let recall = runner.run("default", "db-session-02", "What is my name and country?").await?;
    println!("{}", recall.text.unwrap_or_default());

    let session = store.get(&second).await?.unwrap_or_else(|| Session::new(&second));
    println!("user:name in a new session: {:?}", session.get("user:name"));
    println!("events in db-session-02: {}", session.events.len());
    Ok(())
}
