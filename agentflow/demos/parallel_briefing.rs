//! Three researchers run concurrently; an aggregator combines their work.

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
    let sink = Arc::new(CollectingEventSink::new());

    let team = ParallelComposer::new(
        "ParallelResearchTeam",
        vec![
            agent(
                "TechResearcher",
                "Research only AI/ML trends. 3 key developments. Concise.",
                "Smaller models, agent frameworks, multimodal inputs",
                "tech_research",
            ),
            agent(
                "HealthResearcher",
                "Research medical breakthroughs. 3 key advances. Concise.",
                "Gene therapy approvals, AI diagnostics, wearable monitoring",
                "health_research",
            ),
            agent(
                "FinanceResearcher",
                "Research fintech trends. 3 key trends. Concise.",
                "Real-time payments, embedded finance, tokenized assets",
                "finance_research",
            ),
        ],
    )?;

    let aggregator = agent(
        "AggregatorAgent",
        "Combine these three research findings into a single executive summary:\n\
         **Technology Trends:**\n{tech_research}\n\
         **Health Breakthroughs:**\n{health_research}\n\
         **Finance Innovations:**\n{finance_research}",
        "Across technology, health and finance, automation is moving from pilots to production.",
        "executive_summary",
    );

    let system = SequentialComposer::new("ResearchSystem", vec![Arc::new(team), aggregator])?;
    let runner = Runner::new("agents", Arc::new(system), Arc::new(InMemorySessionStore::new()))
        .with_event_sink(sink.clone());

    let outcome = runner
        .run_debug("Run the daily executive briefing on Tech, Health, and Finance")
        .await?;

    println!("{}", outcome.text.unwrap_or_default());
    println!("lifecycle events: {:?}", sink.event_types());
    Ok(())
}
