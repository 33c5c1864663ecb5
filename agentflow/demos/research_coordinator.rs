//! A coordinator delegating to a research agent and a summarizer.
//!
//! Decisions are scripted; swap `ScriptedDecider` for a model-backed
//! `Decider` to run it for real.

use agentflow::observability::init_tracing;
use agentflow::prelude::*;
use agentflow::testing::ScriptedDecider;
use serde_json::json;
use std::sync::Arc;

fn google_search() -> WorkerRef {
    Arc::new(
        FunctionWorker::new("google_search", |_ctx, args| {
            let query = args.get("query").and_then(|q| q.as_str()).unwrap_or_default();
            Ok(ToolResult::success().with(
                "results",
                json!([
                    format!("{query}: error-corrected logical qubits demonstrated"),
                    format!("{query}: new superconducting processor announced"),
                    format!("{query}: post-quantum cryptography standards finalized"),
                ]),
            ))
        })
        .with_description("Searches the web")
        .with_parameter(ParameterSpec::required("query", ParameterType::String)),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let research = DelegatingWorker::new(
        "ResearchAgent",
        Arc::new(ScriptedDecider::new(vec![
            Decision::call(ToolCall::new(
                "google_search",
                json!({"query": "quantum computing"}),
            )),
            Decision::reply(
                "1. Logical qubits with error correction\n\
                 2. A new superconducting processor\n\
                 3. Post-quantum cryptography standards",
            ),
        ])),
    )
    .with_description("Searches for information on a topic")
    .with_instruction("You are a specialized research agent. Use google_search and present the findings with citations.")
    .with_sub_worker(google_search())
    .with_output_key("research_findings");

    let summarizer = DelegatingWorker::new(
        "SummarizerAgent",
        Arc::new(ScriptedDecider::new(vec![Decision::reply(
            "- Error correction is maturing\n- Hardware keeps scaling\n- Cryptography is adapting",
        )])),
    )
    .with_description("Summarizes research findings")
    .with_instruction("Read the provided research findings: {research_findings}\nCreate a concise bulleted summary.")
    .with_output_key("final_summary");

    let coordinator = DelegatingWorker::new(
        "ResearchCoordinator",
        Arc::new(ScriptedDecider::new(vec![
            Decision::call(ToolCall::request("ResearchAgent", "quantum computing")),
            Decision::call(ToolCall::request("SummarizerAgent", "summarize the findings")),
            Decision::reply("Here is what is new in quantum computing."),
        ])),
    )
    .with_instruction("Call ResearchAgent, then SummarizerAgent, then answer the user.")
    .with_sub_workers(vec![Arc::new(research), Arc::new(summarizer)]);

    let runner = Runner::new("agents", Arc::new(coordinator), Arc::new(InMemorySessionStore::new()));
    let outcome = runner
        .run_debug("What are the latest advancements in quantum computing?")
        .await?;

    println!("{}", outcome.text.clone().unwrap_or_default());
    if let Some(summary) = outcome.get("final_summary").and_then(|v| v.as_str()) {
        println!("\n{summary}");
    }
    Ok(())
}
