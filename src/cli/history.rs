//! `mentora history` and `mentora archive`

use crate::app::App;
use anyhow::bail;
use mentora_core::{Conversation, ConversationStore, StoredMessage};
use mentora_llm::MessageRole;
use uuid::Uuid;

pub async fn run(
    app: &App,
    user: &str,
    conversation: Option<Uuid>,
    include_archived: bool,
) -> anyhow::Result<()> {
    match conversation {
        Some(id) => show(app, user, id).await,
        None => list(app, user, include_archived).await,
    }
}

pub async fn archive(app: &App, user: &str, id: Uuid) -> anyhow::Result<()> {
    owned_conversation(app, user, id).await?;
    app.store.archive_conversation(id).await?;
    println!("Archived {}", id);
    Ok(())
}

async fn owned_conversation(app: &App, user: &str, id: Uuid) -> anyhow::Result<Conversation> {
    match app.store.get_conversation(id).await? {
        Some(conversation) if conversation.user_id == user => Ok(conversation),
        _ => bail!("conversation {} not found", id),
    }
}

async fn list(app: &App, user: &str, include_archived: bool) -> anyhow::Result<()> {
    let conversations = app.store.list_conversations(user, include_archived).await?;
    if conversations.is_empty() {
        println!("No conversations yet. Start one with: mentora chat \"your question\"");
        return Ok(());
    }

    for conversation in conversations {
        println!(
            "{}  {}  {:<9}  {}",
            conversation.id,
            conversation.updated_at.format("%Y-%m-%d %H:%M"),
            conversation.provider.as_deref().unwrap_or("-"),
            conversation.status.as_str()
        );
    }
    Ok(())
}

async fn show(app: &App, user: &str, id: Uuid) -> anyhow::Result<()> {
    let conversation = owned_conversation(app, user, id).await?;
    let messages = app.store.list_messages(id).await?;
    let failures = app.store.list_failures(id).await?;

    println!(
        "Conversation {} ({}), started {}\n",
        conversation.id,
        conversation.status.as_str(),
        conversation.created_at.format("%Y-%m-%d %H:%M")
    );
    for message in &messages {
        print_message(message);
    }

    let total_cost: f64 = messages.iter().map(|m| m.cost_usd).sum();
    let total_tokens: u64 = messages
        .iter()
        .map(|m| u64::from(m.usage.total_tokens))
        .sum();
    println!(
        "{} messages, {} tokens, ${:.4} estimated",
        messages.len(),
        total_tokens,
        total_cost
    );

    if !failures.is_empty() {
        println!("\nUnanswered turns:");
        for failure in failures {
            println!(
                "  {}  \"{}\"",
                failure.created_at.format("%Y-%m-%d %H:%M"),
                failure.user_message
            );
            for reason in failure.reasons {
                println!("    - {}", reason);
            }
        }
    }
    Ok(())
}

fn print_message(message: &StoredMessage) {
    match message.role {
        MessageRole::User => println!("you: {}\n", message.content),
        MessageRole::Assistant => println!(
            "{}: {}\n",
            message.provider.as_deref().unwrap_or("assistant"),
            message.content
        ),
        MessageRole::System => println!("system: {}\n", message.content),
    }
}
