//! The terminal-action grammar (§4.1 "Parsing the terminal turn", §9
//! "Dynamic dispatch on action").

/// The directive extracted from a member's final assistant turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalAction {
    /// Delegate to a single role.
    Delegate {
        /// Target role name.
        role: String,
        /// Content to hand the delegatee.
        content: String,
    },
    /// Delegate to several roles at once, in the order parsed.
    ParallelDelegate(Vec<(String, String)>),
    /// Ask the external client a clarifying question.
    AskClient(String),
    /// Respond directly to the client.
    Respond(String),
    /// Terminal completion content, used as a task's result.
    Complete(String),
}

/// Parse an assistant turn's text into a [`TerminalAction`], in priority
/// order: `DELEGATE PARALLEL:`, `DELEGATE TO`, `ASK`, `COMPLETE:`, else a
/// direct response. Whitespace-tolerant; keyword matching is
/// case-sensitive.
#[must_use]
pub fn parse_terminal_action(text: &str) -> TerminalAction {
    let trimmed = text.trim();

    if let Some(rest) = trimmed.strip_prefix("DELEGATE PARALLEL:") {
        let pairs = parse_parallel_lines(rest);
        if !pairs.is_empty() {
            return TerminalAction::ParallelDelegate(pairs);
        }
    }

    if let Some(rest) = trimmed.strip_prefix("DELEGATE TO ") {
        if let Some((role, content)) = split_role_content(rest) {
            return TerminalAction::Delegate { role, content };
        }
    }

    if let Some(rest) = trimmed.strip_prefix("ASK ") {
        if let Some((target, content)) = split_role_content(rest) {
            if target.eq_ignore_ascii_case("client") {
                return TerminalAction::AskClient(content);
            }
            return TerminalAction::Delegate { role: target, content };
        }
    }

    if let Some(rest) = trimmed.strip_prefix("COMPLETE:") {
        return TerminalAction::Complete(rest.trim().to_string());
    }

    TerminalAction::Respond(trimmed.to_string())
}

fn split_role_content(rest: &str) -> Option<(String, String)> {
    let (role, content) = rest.split_once(':')?;
    Some((role.trim().to_string(), content.trim().to_string()))
}

fn parse_parallel_lines(rest: &str) -> Vec<(String, String)> {
    rest.lines()
        .filter_map(|line| {
            let line = line.trim().strip_prefix('-')?;
            split_role_content(line)
        })
        .collect()
}
