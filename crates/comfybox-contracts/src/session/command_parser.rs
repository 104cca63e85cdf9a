/// One line typed at the interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Noop,
    Services,
    Open { target: String },
    Cards,
    Form,
    /// `row` is zero-based; the prompt shows rows starting at 1.
    Set { row: usize, value: String },
    File { row: usize, path: String },
    Submit,
    Wait,
    Results,
    Download { index: usize },
    Health,
    Help,
    Quit,
    Invalid { message: String },
    Unknown { command: String, arg: String },
}

fn parse_row(token: &str) -> Result<usize, String> {
    match token.parse::<usize>() {
        Ok(row) if row > 0 => Ok(row - 1),
        _ => Err(format!("expected a row number starting at 1, got '{token}'")),
    }
}

fn split_first_token(arg: &str) -> (&str, &str) {
    match arg.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, tail.trim_start()),
        None => (arg, ""),
    }
}

fn parse_path_arg(arg: &str) -> String {
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect::<Vec<String>>()
            .join(" "),
        Err(_) => arg.trim().to_string(),
    }
}

fn invalid(message: impl Into<String>) -> SessionCommand {
    SessionCommand::Invalid {
        message: message.into(),
    }
}

pub fn parse_command(text: &str) -> SessionCommand {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return SessionCommand::Noop;
    }
    let Some(slash_tail) = trimmed.strip_prefix('/') else {
        return invalid("commands start with '/'; type /help");
    };
    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    let command = slash_tail[..command_len].to_ascii_lowercase();
    // Values are kept as typed apart from the separator after the row.
    let arg = slash_tail[command_len..].trim_start();

    match command.as_str() {
        "services" => SessionCommand::Services,
        "cards" => SessionCommand::Cards,
        "form" => SessionCommand::Form,
        "submit" => SessionCommand::Submit,
        "wait" => SessionCommand::Wait,
        "results" => SessionCommand::Results,
        "health" => SessionCommand::Health,
        "help" => SessionCommand::Help,
        "quit" | "exit" => SessionCommand::Quit,
        "open" => {
            let target = parse_path_arg(arg);
            if target.is_empty() {
                return invalid("/open requires a service name or index");
            }
            SessionCommand::Open { target }
        }
        "set" => {
            let (row_token, value) = split_first_token(arg);
            if row_token.is_empty() {
                return invalid("/set requires a row and a value");
            }
            match parse_row(row_token) {
                Ok(row) => SessionCommand::Set {
                    row,
                    value: value.to_string(),
                },
                Err(message) => invalid(message),
            }
        }
        "file" => {
            let (row_token, rest) = split_first_token(arg);
            let row = match parse_row(row_token) {
                Ok(row) => row,
                Err(message) => return invalid(message),
            };
            let path = parse_path_arg(rest);
            if path.is_empty() {
                return invalid("/file requires a path");
            }
            SessionCommand::File { row, path }
        }
        "download" => match parse_row(arg.trim()) {
            Ok(index) => SessionCommand::Download { index },
            Err(message) => invalid(message),
        },
        _ => SessionCommand::Unknown {
            command,
            arg: arg.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_command, SessionCommand};

    #[test]
    fn blank_lines_are_noop() {
        assert_eq!(parse_command("   "), SessionCommand::Noop);
    }

    #[test]
    fn no_arg_commands() {
        assert_eq!(parse_command("/services"), SessionCommand::Services);
        assert_eq!(parse_command("/FORM"), SessionCommand::Form);
        assert_eq!(parse_command(" /submit "), SessionCommand::Submit);
        assert_eq!(parse_command("/exit"), SessionCommand::Quit);
    }

    #[test]
    fn set_keeps_value_text_verbatim() {
        assert_eq!(
            parse_command("/set 1 a \"quoted\" cat  "),
            SessionCommand::Set {
                row: 0,
                value: "a \"quoted\" cat".to_string()
            }
        );
        assert_eq!(
            parse_command("/set 2"),
            SessionCommand::Set {
                row: 1,
                value: String::new()
            }
        );
    }

    #[test]
    fn rows_are_one_based() {
        assert!(matches!(
            parse_command("/set 0 x"),
            SessionCommand::Invalid { .. }
        ));
        assert!(matches!(
            parse_command("/set x y"),
            SessionCommand::Invalid { .. }
        ));
        assert_eq!(
            parse_command("/download 3"),
            SessionCommand::Download { index: 2 }
        );
    }

    #[test]
    fn file_accepts_quoted_paths() {
        assert_eq!(
            parse_command("/file 2 \"/tmp/a b.png\""),
            SessionCommand::File {
                row: 1,
                path: "/tmp/a b.png".to_string()
            }
        );
        assert!(matches!(
            parse_command("/file 2"),
            SessionCommand::Invalid { .. }
        ));
    }

    #[test]
    fn open_takes_name_or_index() {
        assert_eq!(
            parse_command("/open GenerateStory"),
            SessionCommand::Open {
                target: "GenerateStory".to_string()
            }
        );
        assert!(matches!(parse_command("/open"), SessionCommand::Invalid { .. }));
    }

    #[test]
    fn plain_text_is_rejected_with_hint() {
        assert!(matches!(
            parse_command("hello"),
            SessionCommand::Invalid { .. }
        ));
    }

    #[test]
    fn unknown_command_keeps_arg() {
        assert_eq!(
            parse_command("/magic foo bar"),
            SessionCommand::Unknown {
                command: "magic".to_string(),
                arg: "foo bar".to_string()
            }
        );
    }
}
