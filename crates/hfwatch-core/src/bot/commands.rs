//! Chat command parsing

/// A parsed chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/start` or `/help`
    Start,
    /// `/monitor <threshold> <address>`, arguments not yet validated
    Monitor(Vec<String>),
    /// `/check`
    Check,
    /// `/stop`
    Stop,
    /// Plain text, treated as an address to look up
    Lookup(String),
    /// Any other slash command
    Unknown(String),
}

impl Command {
    /// Parse a message text
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let Some(rest) = text.strip_prefix('/') else {
            return Self::Lookup(text.to_string());
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        // Group chats address commands as /name@botname
        let name = name.split('@').next().unwrap_or_default().to_lowercase();

        match name.as_str() {
            "start" | "help" => Self::Start,
            "monitor" => Self::Monitor(parts.map(str::to_string).collect()),
            "check" => Self::Check,
            "stop" => Self::Stop,
            _ => Self::Unknown(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("/start", Command::Start)]
    #[case("/help", Command::Start)]
    #[case("/check", Command::Check)]
    #[case("/stop@hf_watch_bot", Command::Stop)]
    #[case("/STOP", Command::Stop)]
    #[case(
        "/monitor 1.5 0xabc",
        Command::Monitor(vec!["1.5".to_string(), "0xabc".to_string()])
    )]
    #[case("/monitor", Command::Monitor(vec![]))]
    #[case("  0xabc  ", Command::Lookup("0xabc".to_string()))]
    #[case("/balance", Command::Unknown("balance".to_string()))]
    fn test_parse(#[case] text: &str, #[case] expected: Command) {
        assert_eq!(Command::parse(text), expected);
    }
}
