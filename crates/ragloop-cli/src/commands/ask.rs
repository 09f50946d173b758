// Ask command - answer one question and exit

use std::path::PathBuf;

use anyhow::{bail, Result};
use futures::StreamExt;
use ragloop_core::{AgentConfig, AgentResponse};

use super::{build_agent, AgentKind, Ports};
use crate::output::{print_field, print_fragment, OutputFormat};
use crate::settings::ProviderSettings;

pub async fn run(
    settings: &ProviderSettings,
    config: AgentConfig,
    kind: AgentKind,
    docs: &[PathBuf],
    question: &str,
    output: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let ports = Ports::from_settings(settings)?;
    let Some(agent) = build_agent(kind, &ports, &config, docs)? else {
        bail!("The plain agent is only available in chat with review");
    };

    if !output.is_text() {
        let response = agent.invoke(question, &[]).await;
        return output.print_value(&response);
    }

    let mut streamed = agent.stream(question, &[]).await;
    while let Some(fragment) = streamed.fragments.next().await {
        print_fragment(&fragment)?;
    }
    println!();

    if !quiet {
        print_details(&streamed.response);
    }
    Ok(())
}

/// Routing and evidence details shown after an answer
pub fn print_details(response: &AgentResponse) {
    println!();
    if let Some(route) = response.route {
        print_field("Route", route.as_str());
    }
    if let Some(reason) = &response.routing_reason {
        print_field("Reason", reason);
    }
    if let Some(iterations) = response.iterations {
        print_field("Iterations", &iterations.to_string());
    }
    if let Some(evidence) = response.evidence.as_deref().filter(|e| !e.is_empty()) {
        print_field("Evidence", "");
        for line in evidence.lines() {
            println!("  {}", line);
        }
    }
}
