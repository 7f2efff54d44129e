//! System-prompt assembly (§4.1 "System-prompt construction").

use ugudu_spec::{Role, TokenMode, Visibility};
use ugudu_types::ToolDefinition;

/// Assemble the system prompt for one provider call.
///
/// Normal mode includes the full persona, responsibilities, a detailed
/// tool listing, and the delegation vocabulary. Low/minimal modes use
/// the condensed persona, drop responsibilities, and compress the tool
/// listing to a comma-joined name list.
#[must_use]
pub fn build_system_prompt(
    role: &Role,
    team_name: &str,
    display_name: &str,
    mode: TokenMode,
    tools: &[ToolDefinition],
) -> String {
    let mut sections = Vec::new();

    let persona = match mode {
        TokenMode::Normal => role.persona.as_str(),
        TokenMode::Low | TokenMode::Minimal => role.condensed_persona(),
    };
    sections.push(persona.to_string());

    sections.push(format!("You are {display_name}, the {} on team {team_name}.", role.title));

    if matches!(mode, TokenMode::Normal) && !role.responsibilities.is_empty() {
        let list = role.responsibilities.iter().map(|r| format!("- {r}")).collect::<Vec<_>>().join("\n");
        sections.push(format!("Responsibilities:\n{list}"));
    }

    if !tools.is_empty() {
        sections.push(tool_listing(tools, mode));
    }

    sections.push(delegation_vocabulary(role));

    sections.push(match role.visibility {
        Visibility::Client => {
            "You are client-facing. Respond to the client directly in plain text, or ask a clarifying \
             question with `ASK CLIENT: <question>`."
                .to_string()
        }
        Visibility::Internal => {
            "You are not client-facing. When a delegated task is done, finish with \
             `COMPLETE: <result>`."
                .to_string()
        }
    });

    sections.join("\n\n")
}

fn tool_listing(tools: &[ToolDefinition], mode: TokenMode) -> String {
    match mode {
        TokenMode::Normal => {
            let lines = tools.iter().map(|t| format!("- {}: {}", t.name, t.description)).collect::<Vec<_>>().join("\n");
            format!("Available tools:\n{lines}")
        }
        TokenMode::Low | TokenMode::Minimal => {
            let names = tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", ");
            format!("Available tools: {names}")
        }
    }
}

fn delegation_vocabulary(role: &Role) -> String {
    let mut text = String::from(
        "To delegate, end your reply with `DELEGATE TO <role>: <content>`. To delegate to several \
         roles at once, use `DELEGATE PARALLEL:` followed by one `- <role>: <content>` line per \
         target. To ask a colleague a question, use `ASK <role>: <content>`.",
    );
    if !role.can_delegate.is_empty() {
        text.push_str(&format!(" Roles you may delegate to: {}.", role.can_delegate.join(", ")));
    } else {
        text.push_str(" You may not delegate to any role.");
    }
    text
}
