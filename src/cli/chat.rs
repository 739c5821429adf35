//! `mentora chat`

use super::ChatArgs;
use crate::app::App;
use mentora_core::{format_error_for_cli, AssistantReply, SessionHints, TurnInput};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub async fn run(app: &App, user: &str, args: ChatArgs) -> anyhow::Result<()> {
    let mut hints = SessionHints::default();
    if let Some(course) = args.course {
        hints = hints.with_course(course);
    }
    if let Some(notes) = args.notes {
        hints = hints.with_notes(notes);
    }

    if !args.message.is_empty() {
        let message = args.message.join(" ");
        match send(app, user, args.conversation, &message, &hints).await {
            Ok(reply) => {
                print_reply(&reply);
                println!("\n(conversation {})", reply.conversation_id);
                Ok(())
            }
            Err(message) => {
                eprintln!("{}", message);
                std::process::exit(1);
            }
        }
    } else {
        interactive(app, user, args.conversation, hints).await
    }
}

async fn interactive(
    app: &App,
    user: &str,
    mut conversation: Option<Uuid>,
    hints: SessionHints,
) -> anyhow::Result<()> {
    println!("Mentora tutor. Type a message, or /quit to leave.\n");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            _ => {}
        }

        match send(app, user, conversation, line, &hints).await {
            Ok(reply) => {
                conversation = Some(reply.conversation_id);
                print_reply(&reply);
                println!();
            }
            Err(message) => eprintln!("{}\n", message),
        }
    }

    if let Some(id) = conversation {
        println!("Conversation saved: {}", id);
    }
    Ok(())
}

/// Run one turn under the turn timeout; Ctrl-C cancels it
async fn send(
    app: &App,
    user: &str,
    conversation: Option<Uuid>,
    message: &str,
    hints: &SessionHints,
) -> Result<AssistantReply, String> {
    let mut input = TurnInput::new(user, message).with_hints(hints.clone());
    if let Some(id) = conversation {
        input = input.with_conversation(id);
    }

    let cancel = CancellationToken::new();
    let turn = tokio::time::timeout(
        app.config.turn_timeout(),
        app.orchestrator.submit_turn_with_cancel(input, &cancel),
    );

    tokio::select! {
        result = turn => match result {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => Err(format_error_for_cli(&e)),
            Err(_) => Err(mentora_core::UNAVAILABLE_MESSAGE.to_string()),
        },
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            Err("Cancelled.".to_string())
        }
    }
}

fn print_reply(reply: &AssistantReply) {
    println!("{}", reply.text());
    let message = &reply.message;
    let mut meta = format!(
        "[{} · {} · {} tokens · ${:.5} · {}ms",
        reply.provider,
        message.model.as_deref().unwrap_or("?"),
        message.usage.total_tokens,
        message.cost_usd,
        message.latency_ms
    );
    if reply.used_fallback() {
        meta.push_str(" · fallback");
    }
    meta.push(']');
    println!("{}", meta);
}
