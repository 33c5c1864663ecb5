//! Draft a story, then critique and refine it until the critic approves.

use agentflow::observability::init_tracing;
use agentflow::prelude::*;
use agentflow::testing::ScriptedDecider;
use serde_json::json;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let writer = DelegatingWorker::new(
        "InitialWriterAgent",
        Arc::new(ScriptedDecider::new(vec![Decision::reply(
            "The lighthouse keeper found a map that glowed in the dark.",
        )])),
    )
    .with_instruction("Based on the user's prompt, write the first draft of a short story. Output only the story text.")
    .with_output_key("current_story");

    let critic = DelegatingWorker::new(
        "CriticAgent",
        Arc::new(ScriptedDecider::new(vec![
            Decision::reply("Give the map a destination and the keeper a reason to follow it."),
            Decision::reply("APPROVED"),
        ])),
    )
    .with_instruction(
        "Review the story provided below.\nStory: {current_story}\n\
         If the story is complete, respond with exactly \"APPROVED\". Otherwise give 2-3 suggestions.",
    )
    .with_output_key("critique");

    let exit_loop = FunctionWorker::new("exit_loop", |tool_ctx, _args| {
        tool_ctx.escalate();
        Ok(ToolResult::success().with("message", json!("Story approved. Exiting refinement loop.")))
    })
    .with_description("Call this function ONLY when the critique is 'APPROVED'");

    let refiner = DelegatingWorker::new(
        "RefinerAgent",
        Arc::new(ScriptedDecider::new(vec![
            Decision::reply(
                "The lighthouse keeper found a map that glowed in the dark, pointing to the \
                 island where her brother vanished. She rowed out at dawn.",
            ),
            Decision::call(ToolCall::new("exit_loop", json!({}))),
        ])),
    )
    .with_instruction(
        "Story draft: {current_story}\nCritique: {critique}\n\
         IF the critique is exactly \"APPROVED\", call exit_loop. OTHERWISE rewrite the story.",
    )
    .with_sub_worker(Arc::new(exit_loop))
    .with_output_key("current_story");

    let refinement = LoopComposer::new(
        "StoryRefinementLoop",
        vec![Arc::new(critic), Arc::new(refiner)],
        2,
    )?;
    let pipeline = SequentialComposer::new(
        "StoryPipeline",
        vec![Arc::new(writer), Arc::new(refinement)],
    )?;

    let runner = Runner::new("agents", Arc::new(pipeline), Arc::new(InMemorySessionStore::new()));
    let outcome = runner
        .run_debug("Write a short story about a lighthouse keeper who discovers a mysterious, glowing map")
        .await?;

    println!(
        "{}",
        outcome.get("current_story").and_then(|v| v.as_str()).unwrap_or_default()
    );
    Ok(())
}
