//! Line commands understood by the prompt loop

use agentwarden_core::{ServerOverrides, TranscriptFormat};

pub const HELP: &str = "\
Commands:
  :init <system prompt>              start a fresh session
  :find <task>                       ask the agent which servers suit a task
  :install <name>... [name.KEY=VAL]  install servers, with optional env overrides
  :transcript [markdown|json]        render the transcript
  :state                             show the live session
  :stop [--force]                    stop the live session
  :help                              show this help
  :quit                              stop and exit
Any other line is sent to the agent as a chat turn.";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Init(String),
    Find(String),
    Install {
        names: Vec<String>,
        overrides: ServerOverrides,
    },
    Transcript(TranscriptFormat),
    State,
    Stop { force: bool },
    Help,
    Quit,
    Chat(String),
    Empty,
}

pub fn parse_line(line: &str) -> Result<Command, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Empty);
    }
    let Some(rest) = line.strip_prefix(':') else {
        return Ok(Command::Chat(line.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    match name {
        "init" => Ok(Command::Init(arg.to_string())),
        "find" if arg.is_empty() => Err(":find needs a task description".to_string()),
        "find" => Ok(Command::Find(arg.to_string())),
        "install" => parse_install(arg),
        "transcript" if arg.is_empty() => Ok(Command::Transcript(TranscriptFormat::default())),
        "transcript" => arg.parse().map(Command::Transcript),
        "state" => Ok(Command::State),
        "stop" => match arg {
            "" => Ok(Command::Stop { force: false }),
            "--force" | "-f" => Ok(Command::Stop { force: true }),
            other => Err(format!("Unknown :stop option: {}", other)),
        },
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        other => Err(format!("Unknown command :{} (try :help)", other)),
    }
}

/// `name.KEY=value` tokens are overrides, everything else is a server name
fn parse_install(arg: &str) -> Result<Command, String> {
    let mut names = Vec::new();
    let mut overrides = ServerOverrides::new();

    for token in arg.split_whitespace() {
        match token.split_once('=') {
            Some((target, value)) => {
                let (server, key) = target
                    .split_once('.')
                    .filter(|(s, k)| !s.is_empty() && !k.is_empty())
                    .ok_or_else(|| format!("Override must look like name.KEY=value: {}", token))?;
                overrides
                    .entry(server.to_string())
                    .or_default()
                    .insert(key.to_string(), value.to_string());
            }
            None => names.push(token.to_string()),
        }
    }

    if names.is_empty() {
        return Err(":install needs at least one server name".to_string());
    }
    Ok(Command::Install { names, overrides })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_line_is_chat() {
        assert_eq!(
            parse_line("  list my open PRs ").unwrap(),
            Command::Chat("list my open PRs".into())
        );
        assert_eq!(parse_line("   ").unwrap(), Command::Empty);
    }

    #[test]
    fn test_init_keeps_whole_prompt() {
        assert_eq!(
            parse_line(":init You review pull requests.").unwrap(),
            Command::Init("You review pull requests.".into())
        );
        assert_eq!(parse_line(":init").unwrap(), Command::Init(String::new()));
    }

    #[test]
    fn test_install_with_overrides() {
        let command = parse_line(":install github fs github.GITHUB_HOST=ghe.local").unwrap();

        let mut overrides = ServerOverrides::new();
        overrides
            .entry("github".into())
            .or_default()
            .insert("GITHUB_HOST".into(), "ghe.local".into());
        assert_eq!(
            command,
            Command::Install {
                names: vec!["github".into(), "fs".into()],
                overrides
            }
        );
    }

    #[test]
    fn test_install_rejects_bad_input() {
        assert!(parse_line(":install").is_err());
        assert!(parse_line(":install github KEY=1").is_err());
    }

    #[test]
    fn test_transcript_formats() {
        assert_eq!(
            parse_line(":transcript").unwrap(),
            Command::Transcript(TranscriptFormat::Markdown)
        );
        assert_eq!(
            parse_line(":transcript JSON").unwrap(),
            Command::Transcript(TranscriptFormat::Json)
        );
        assert!(parse_line(":transcript yaml").is_err());
    }

    #[test]
    fn test_stop_and_quit() {
        assert_eq!(parse_line(":stop").unwrap(), Command::Stop { force: false });
        assert_eq!(parse_line(":stop --force").unwrap(), Command::Stop { force: true });
        assert_eq!(parse_line(":quit").unwrap(), Command::Quit);
        assert!(parse_line(":bogus").is_err());
    }
}
