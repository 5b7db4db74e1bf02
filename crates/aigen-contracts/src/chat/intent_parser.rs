use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, ATTACH_COMMAND, INDEX_COMMANDS, NO_ARG_COMMANDS, OPEN_COMMAND, PASTE_COMMAND,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub text: Option<String>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            text: None,
            command_args: BTreeMap::new(),
        }
    }
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

/// 1-based position typed by the user, as a 0-based index.
fn parse_position(arg: &str) -> Value {
    match arg.trim().parse::<u64>() {
        Ok(position) if position > 0 => Value::from(position - 1),
        _ => Value::Null,
    }
}

/// Interprets one line of composer input.
///
/// Lines starting with `/name` are commands; anything else is message text
/// to send. Message text keeps its original spacing.
pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Intent::new(action, text);
            }

            if let Some(action) = find_action(&command, INDEX_COMMANDS) {
                let mut intent = Intent::new(action, text);
                intent
                    .command_args
                    .insert("index".to_string(), parse_position(arg));
                return intent;
            }

            if command == OPEN_COMMAND.command {
                let mut intent = Intent::new(OPEN_COMMAND.action, text);
                intent
                    .command_args
                    .insert("target".to_string(), Value::String(arg.to_string()));
                intent
                    .command_args
                    .insert("index".to_string(), parse_position(arg));
                return intent;
            }

            if command == ATTACH_COMMAND.command {
                let mut intent = Intent::new(ATTACH_COMMAND.action, text);
                intent.command_args.insert(
                    "paths".to_string(),
                    Value::Array(
                        parse_path_args(arg)
                            .into_iter()
                            .map(Value::String)
                            .collect(),
                    ),
                );
                return intent;
            }

            if command == PASTE_COMMAND.command {
                let mut intent = Intent::new(PASTE_COMMAND.action, text);
                let path = parse_path_args(arg).into_iter().next();
                intent.command_args.insert(
                    "path".to_string(),
                    path.map(Value::String).unwrap_or(Value::Null),
                );
                return intent;
            }

            let mut intent = Intent::new("unknown", text);
            intent
                .command_args
                .insert("command".to_string(), Value::String(command));
            intent
                .command_args
                .insert("arg".to_string(), Value::String(arg.to_string()));
            return intent;
        }
    }

    let mut intent = Intent::new("send", text);
    intent.text = Some(text.to_string());
    intent
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::parse_intent;

    #[test]
    fn plain_text_is_a_send() {
        let intent = parse_intent("Show me a luxury home automation setup.");
        assert_eq!(intent.action, "send");
        assert_eq!(
            intent.text.as_deref(),
            Some("Show me a luxury home automation setup.")
        );
    }

    #[test]
    fn blank_line_is_noop() {
        assert_eq!(parse_intent("   ").action, "noop");
    }

    #[test]
    fn no_arg_commands() {
        assert_eq!(parse_intent("/new").action, "new_chat");
        assert_eq!(parse_intent("/threads").action, "list_threads");
        assert_eq!(parse_intent("/close").action, "close_image");
        assert_eq!(parse_intent("/shots").action, "show_shots");
        assert_eq!(parse_intent("/refresh").action, "refresh");
        assert_eq!(parse_intent("/EXIT").action, "quit");
    }

    #[test]
    fn index_commands_are_zero_based() {
        let view = parse_intent("/view 2");
        assert_eq!(view.action, "view_image");
        assert_eq!(view.command_args["index"], json!(1));

        assert_eq!(parse_intent("/detach 0").command_args["index"], Value::Null);
        assert_eq!(parse_intent("/retry x").command_args["index"], Value::Null);
    }

    #[test]
    fn open_accepts_position_or_id() {
        let by_position = parse_intent("/open 3");
        assert_eq!(by_position.action, "select_thread");
        assert_eq!(by_position.command_args["index"], json!(2));

        let by_id = parse_intent("/open sheet-4");
        assert_eq!(by_id.command_args["target"], json!("sheet-4"));
        assert_eq!(by_id.command_args["index"], Value::Null);
    }

    #[test]
    fn attach_quoted_paths() {
        let intent = parse_intent("/attach \"/tmp/a b.png\" c.jpg");
        assert_eq!(intent.action, "attach_images");
        assert_eq!(
            intent.command_args["paths"],
            json!(["/tmp/a b.png", "c.jpg"])
        );
    }

    #[test]
    fn paste_takes_one_path() {
        let intent = parse_intent("/paste \"clip board.png\"");
        assert_eq!(intent.action, "paste_image");
        assert_eq!(intent.command_args["path"], json!("clip board.png"));
        assert_eq!(parse_intent("/paste").command_args["path"], Value::Null);
    }

    #[test]
    fn unknown_command() {
        let intent = parse_intent("/magic foo bar");
        assert_eq!(intent.action, "unknown");
        assert_eq!(intent.command_args["command"], json!("magic"));
        assert_eq!(intent.command_args["arg"], json!("foo bar"));
    }

    #[test]
    fn lone_slash_is_text() {
        let intent = parse_intent("/ not a command");
        assert_eq!(intent.action, "send");
    }
}
