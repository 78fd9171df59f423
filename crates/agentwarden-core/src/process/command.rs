//! Argument builder for the agent CLI

/// One non-interactive agent CLI invocation
///
/// Always requests JSON output. Continuity between invocations comes from
/// `resume`, never from keeping a process alive.
#[derive(Debug, Clone, Default)]
pub struct AgentCommand {
    prompt: String,
    append_system_prompt: Option<String>,
    max_turns: Option<u32>,
    resume: Option<String>,
    skip_permissions: bool,
}

impl AgentCommand {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Extra text appended to the agent's system prompt
    pub fn append_system_prompt(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if !text.is_empty() {
            self.append_system_prompt = Some(text);
        }
        self
    }

    pub fn max_turns(mut self, turns: Option<u32>) -> Self {
        self.max_turns = turns;
        self
    }

    /// Resume a previous session by id
    pub fn resume(mut self, session_id: Option<&str>) -> Self {
        self.resume = session_id.map(str::to_string);
        self
    }

    pub fn skip_permissions(mut self, skip: bool) -> Self {
        self.skip_permissions = skip;
        self
    }

    pub fn into_args(self) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            self.prompt,
            "--output-format".to_string(),
            "json".to_string(),
        ];

        if let Some(turns) = self.max_turns {
            args.push("--max-turns".to_string());
            args.push(turns.to_string());
        }

        if let Some(text) = self.append_system_prompt {
            args.push("--append-system-prompt".to_string());
            args.push(text);
        }

        if let Some(id) = self.resume {
            args.push("--resume".to_string());
            args.push(id);
        }

        if self.skip_permissions {
            args.push("--dangerously-skip-permissions".to_string());
        }

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_command() {
        let args = AgentCommand::new("hello").into_args();
        assert_eq!(args, vec!["-p", "hello", "--output-format", "json"]);
    }

    #[test]
    fn test_full_command() {
        let args = AgentCommand::new("hello")
            .append_system_prompt("be brief")
            .max_turns(Some(1))
            .resume(Some("sess-123"))
            .skip_permissions(true)
            .into_args();

        assert!(args.windows(2).any(|w| w == ["--max-turns", "1"]));
        assert!(args.windows(2).any(|w| w == ["--append-system-prompt", "be brief"]));
        assert!(args.windows(2).any(|w| w == ["--resume", "sess-123"]));
        assert_eq!(args.last().unwrap(), "--dangerously-skip-permissions");
    }

    #[test]
    fn test_empty_system_prompt_is_skipped() {
        let args = AgentCommand::new("hi").append_system_prompt("").into_args();
        assert!(!args.contains(&"--append-system-prompt".to_string()));
    }
}
