//! `localecho agent` — Interactive or single-message chat mode.

use std::io::Write;
use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

pub async fn run(config_path: Option<&Path>, message: Option<String>) -> anyhow::Result<()> {
    let runtime = super::runtime(config_path).await?;
    runtime.spawn_event_log();
    // Failure is logged; chat replies with the unavailable message until a model loads.
    let _ = runtime.start_models().await;
    let mut session = runtime.session().await;
    info!(session = %session.session_id(), turns = session.history().len(), "Session restored");

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let response = runtime.agent.process_input(&mut session, &msg).await;
        eprint!("\r              \r");
        println!("{response}");
        return Ok(());
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        Echo — private assistant (local)      ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Model:     {}", runtime.config.inference.model);
    println!("  Server:    {}", runtime.config.inference.base_url);
    println!("  Tools:     {}", runtime.tools.names().join(", "));
    println!("  History:   {} turns restored", session.history().len());
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        eprint!("  ...");
        let response = runtime.agent.process_input(&mut session, input).await;
        eprint!("\r     \r");
        println!();
        for line in response.lines() {
            println!("  Echo > {line}");
        }
        println!();
    }

    println!();
    println!("  Goodbye! 👋");
    println!();
    Ok(())
}
