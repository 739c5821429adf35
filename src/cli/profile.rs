//! `mentora profile`

use super::{ProfileCommand, ProfileSetArgs};
use crate::app::App;
use anyhow::{bail, Context};
use chrono::Utc;
use mentora_core::{AgentProfile, ConversationStore, QuickAction, ResponseStyle};

pub async fn run(app: &App, user: &str, command: ProfileCommand) -> anyhow::Result<()> {
    let current = app
        .store
        .get_profile(user)
        .await?
        .unwrap_or_else(|| AgentProfile::default_for(user));

    match command {
        ProfileCommand::Show => {
            print_profile(&current);
            Ok(())
        }
        ProfileCommand::Set(args) => {
            let updated = apply(current, args)?;
            app.store.upsert_profile(&updated).await?;
            println!("Profile updated.\n");
            print_profile(&updated);
            Ok(())
        }
    }
}

fn apply(mut profile: AgentProfile, args: ProfileSetArgs) -> anyhow::Result<AgentProfile> {
    if let Some(name) = args.name {
        if name.trim().is_empty() {
            bail!("agent name cannot be empty");
        }
        profile.agent_name = name.trim().to_string();
    }
    if let Some(persona) = args.persona {
        profile.persona = persona;
    }
    if let Some(language) = args.language {
        profile.language = language.trim().to_lowercase();
    }
    if let Some(style) = args.style {
        profile.style = style
            .parse::<ResponseStyle>()
            .map_err(anyhow::Error::msg)
            .context("Invalid --style")?;
    }

    if args.clear_expertise {
        profile.expertise.clear();
    }
    for tag in args.expertise {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() {
            profile.expertise.insert(tag);
        }
    }

    if args.clear_quick_actions {
        profile.quick_actions.clear();
    }
    for raw in args.quick_actions {
        profile.quick_actions.push(parse_quick_action(&raw)?);
    }

    profile.updated_at = Utc::now();
    Ok(profile)
}

fn parse_quick_action(raw: &str) -> anyhow::Result<QuickAction> {
    match raw.split_once('=') {
        Some((label, prompt)) if !label.trim().is_empty() && !prompt.trim().is_empty() => {
            Ok(QuickAction::new(label.trim(), prompt.trim()))
        }
        _ => bail!("quick action must look like \"label=prompt\", got \"{}\"", raw),
    }
}

fn print_profile(profile: &AgentProfile) {
    println!("Agent:     {}", profile.agent_name);
    println!("Language:  {}", profile.language);
    println!("Style:     {}", profile.style);
    if profile.persona.is_empty() {
        println!("Persona:   (none)");
    } else {
        println!("Persona:   {}", profile.persona);
    }
    if profile.expertise.is_empty() {
        println!("Expertise: (none)");
    } else {
        let tags: Vec<&str> = profile.expertise.iter().map(String::as_str).collect();
        println!("Expertise: {}", tags.join(", "));
    }
    if !profile.quick_actions.is_empty() {
        println!("Quick actions:");
        for action in &profile.quick_actions {
            println!("  {} = {}", action.label, action.prompt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_args() -> ProfileSetArgs {
        ProfileSetArgs {
            name: None,
            persona: None,
            language: None,
            style: None,
            expertise: Vec::new(),
            clear_expertise: false,
            quick_actions: Vec::new(),
            clear_quick_actions: false,
        }
    }

    #[test]
    fn test_apply_updates_fields() {
        let args = ProfileSetArgs {
            name: Some("Ada".to_string()),
            style: Some("Concise".to_string()),
            language: Some("FR".to_string()),
            expertise: vec!["Chemistry".to_string(), " ".to_string()],
            quick_actions: vec!["Quiz=Give me a quiz".to_string()],
            ..empty_args()
        };
        let profile = apply(AgentProfile::default_for("u"), args).unwrap();

        assert_eq!(profile.agent_name, "Ada");
        assert_eq!(profile.style, ResponseStyle::Concise);
        assert_eq!(profile.language, "fr");
        assert_eq!(profile.expertise.len(), 1);
        assert!(profile.expertise.contains("chemistry"));
        assert_eq!(profile.quick_actions[0].label, "Quiz");
    }

    #[test]
    fn test_apply_rejects_bad_style() {
        let args = ProfileSetArgs {
            style: Some("shouty".to_string()),
            ..empty_args()
        };
        assert!(apply(AgentProfile::default_for("u"), args).is_err());
    }

    #[test]
    fn test_clear_expertise() {
        let profile = AgentProfile::default_for("u").with_expertise("math");
        let args = ProfileSetArgs {
            clear_expertise: true,
            ..empty_args()
        };
        assert!(apply(profile, args).unwrap().expertise.is_empty());
    }

    #[test]
    fn test_parse_quick_action() {
        let action = parse_quick_action("Explain = Explain this simply").unwrap();
        assert_eq!(action.label, "Explain");
        assert_eq!(action.prompt, "Explain this simply");
        assert!(parse_quick_action("no separator").is_err());
        assert!(parse_quick_action("=prompt only").is_err());
    }
}
