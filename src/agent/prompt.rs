//! System prompt for the agent.

use crate::tools::ToolRegistry;

/// Build the system prompt listing the registered tools.
pub fn build_system_prompt(tools: &ToolRegistry) -> String {
    let tool_descriptions = tools
        .list_tools()
        .iter()
        .map(|t| format!("- **{}**: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are an AI assistant that helps users by calling tools in sequence to complete complex tasks.

## Available Tools

{tool_descriptions}

## Critical Rules for Tool Calling

1. When a tool returns a result, ALWAYS extract the relevant data from that result and pass it as parameters to the next tool.
2. For api_call results: If it returns {{success: true, data: [...]}}, you MUST pass that data array to filter_data as {{data: <previous_result.data>, condition: "..."}}.
3. For filter_data results: If it returns {{success: true, data: [...]}}, you MUST pass that data array to export_excel as {{data: <previous_result.data>, filename: "..."}}.
4. ALWAYS include ALL required parameters. Never omit the 'data' parameter - it is REQUIRED for filter_data and export_excel.
5. Parse JSON tool results to extract the exact data structure before passing to the next tool.

## Example Workflow

- User: "Fetch users, filter by id > 5, export to Excel"
- Step 1: Call api_call({{url: "..."}})
- Step 2: Extract data from result -> Call filter_data({{data: <result.data>, condition: "id > 5"}})
- Step 3: Extract data from result -> Call export_excel({{data: <result.data>, filename: "users.csv"}})

When the task is complete, reply with a short summary and no tool call."#,
        tool_descriptions = tool_descriptions
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Calculator;
    use std::sync::Arc;

    #[test]
    fn lists_registered_tools() {
        let mut tools = ToolRegistry::empty();
        tools.register(Arc::new(Calculator));

        let prompt = build_system_prompt(&tools);
        assert!(prompt.contains("- **calculator**: Perform mathematical calculations."));
        assert!(prompt.contains("{success: true, data: [...]}"));
    }
}
