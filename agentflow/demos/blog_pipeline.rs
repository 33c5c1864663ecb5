//! Outline, write and edit a blog post in a fixed order.

use agentflow::observability::init_tracing;
use agentflow::prelude::*;
use agentflow::testing::ScriptedDecider;
use std::sync::Arc;

fn agent(name: &str, instruction: &str, reply: &str, output_key: &str) -> WorkerRef {
    Arc::new(
        DelegatingWorker::new(
            name,
            Arc::new(ScriptedDecider::new(vec![Decision::reply(reply)])),
        )
        .with_instruction(instruction)
        .with_output_key(output_key),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let pipeline = SequentialComposer::new(
        "BlogPipeline",
        vec![
            agent(
                "OutlineAgent",
                "Create a blog outline for the given topic with a headline, an introduction hook and 3-5 sections.",
                "Headline: Teams of Agents\n1. Why split work\n2. Sequential flows\n3. Parallel flows",
                "blog_outline",
            ),
            agent(
                "WriterAgent",
                "Following this outline strictly: {blog_outline}\nWrite a brief, 200 to 300-word blog post.",
                "One agent doing everything gets confused. Splitting the work helps...",
                "blog_draft",
            ),
            agent(
                "EditorAgent",
                "Edit this draft: {blog_draft}\nPolish the text by fixing grammatical errors and improving the flow.",
                "A single agent juggling every task loses focus. Splitting the work helps...",
                "final_blog",
            ),
        ],
    )?;

    let runner = Runner::new("agents", Arc::new(pipeline), Arc::new(InMemorySessionStore::new()));
    let outcome = runner
        .run_debug("Write a blog post about the benefits of multi-agent systems for software developers")
        .await?;

    for key in ["blog_outline", "blog_draft", "final_blog"] {
        println!("--- {key} ---");
        println!("{}", outcome.get(key).and_then(|v| v.as_str()).unwrap_or_default());
    }
    Ok(())
}
