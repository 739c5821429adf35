//! `mentora providers`

use crate::app::App;

pub fn run(app: &App) -> anyhow::Result<()> {
    let statuses = app.orchestrator.providers_snapshot();
    let priority = &app.orchestrator.config().priority;

    println!("Priority: {}\n", priority.join(" > "));
    if statuses.is_empty() {
        println!("No providers registered. Set GEMINI_API_KEY, ANTHROPIC_API_KEY, OPENAI_API_KEY or XAI_API_KEY.");
        return Ok(());
    }

    println!(
        "{:<10} {:<28} {:<10} {:>8} {:>8} {:>8}",
        "PROVIDER", "MODEL", "CIRCUIT", "FAILS", "CALLS", "OK"
    );
    for status in &statuses {
        println!(
            "{:<10} {:<28} {:<10} {:>8} {:>8} {:>8}",
            status.provider,
            status.default_model,
            status.breaker.state.to_string(),
            status.breaker.consecutive_failures,
            status.metrics.attempts,
            status.metrics.successes
        );
    }

    let missing: Vec<&String> = priority
        .iter()
        .filter(|name| !statuses.iter().any(|s| &&s.provider == name))
        .collect();
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|s| s.as_str()).collect();
        println!("\nNot available (disabled or missing API key): {}", names.join(", "));
    }
    Ok(())
}
