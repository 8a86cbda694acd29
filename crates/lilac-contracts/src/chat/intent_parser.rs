use crate::requests::{ProviderSelector, Quality};

use super::command_registry::{CommandSpec, NO_ARG_COMMANDS, PATH_COMMANDS, SETTING_COMMANDS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatIntent {
    Noop,
    Send { prompt: String },
    Attach { paths: Vec<String> },
    DiscardUpload,
    ClearContext,
    ShowContext,
    SetQuality(Quality),
    SetProvider(ProviderSelector),
    NewChat,
    Help,
    Quit,
    Invalid { command: String, reason: String },
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn invalid(command: &str, reason: impl Into<String>) -> ChatIntent {
    ChatIntent::Invalid {
        command: command.to_string(),
        reason: reason.into(),
    }
}

pub fn parse_chat_line(text: &str) -> ChatIntent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return ChatIntent::Noop;
    }

    let Some(slash_tail) = raw_trimmed.strip_prefix('/') else {
        return ChatIntent::Send {
            prompt: raw_trimmed.to_string(),
        };
    };
    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    if command_len == 0 {
        return ChatIntent::Send {
            prompt: raw_trimmed.to_string(),
        };
    }
    let command = slash_tail[..command_len].to_ascii_lowercase();
    let arg = slash_tail[command_len..].trim();

    if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
        return match action {
            "discard_upload" => ChatIntent::DiscardUpload,
            "clear_context" => ChatIntent::ClearContext,
            "show_context" => ChatIntent::ShowContext,
            "new_chat" => ChatIntent::NewChat,
            "help" => ChatIntent::Help,
            "quit" => ChatIntent::Quit,
            other => invalid(&command, format!("unhandled action '{other}'")),
        };
    }

    if find_action(&command, PATH_COMMANDS).is_some() {
        let paths = parse_path_args(arg);
        if paths.is_empty() {
            return invalid(&command, "expected at least one image path");
        }
        return ChatIntent::Attach { paths };
    }

    if let Some(action) = find_action(&command, SETTING_COMMANDS) {
        if arg.is_empty() {
            return invalid(&command, "expected a value");
        }
        return match action {
            "set_quality" => match arg.parse::<Quality>() {
                Ok(quality) => ChatIntent::SetQuality(quality),
                Err(reason) => invalid(&command, reason),
            },
            _ => match arg.parse::<ProviderSelector>() {
                Ok(provider) => ChatIntent::SetProvider(provider),
                Err(reason) => invalid(&command, reason),
            },
        };
    }

    invalid(&command, "unknown command (try /help)")
}
