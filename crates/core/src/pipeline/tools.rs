//! Parsing of the `Action:` / `Action Input:` / `Final Answer:` reply format
//! used by tool-enabled stages.

const FINAL_ANSWER_MARKER: &str = "Final Answer:";
const ACTION_MARKER: &str = "Action:";
const ACTION_INPUT_MARKER: &str = "Action Input:";
const OBSERVATION_MARKER: &str = "Observation:";

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum AgentReply {
    Action { tool: String, input: String },
    Final(String),
}

/// Classifies a model reply. A `Final Answer:` marker wins over any action;
/// a reply with no markers at all is a final answer taken verbatim.
pub(crate) fn parse_reply(response: &str) -> AgentReply {
    if let Some(answer) = final_answer(response) {
        return AgentReply::Final(answer);
    }

    let mut tool = None;
    let mut input = None;
    for line in response.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix(ACTION_INPUT_MARKER) {
            input.get_or_insert_with(|| normalize_input(rest));
        } else if let Some(rest) = line.strip_prefix(ACTION_MARKER) {
            tool.get_or_insert_with(|| rest.trim().to_string());
        }
    }

    match (tool, input) {
        (Some(tool), Some(input)) if !tool.is_empty() => AgentReply::Action { tool, input },
        _ => AgentReply::Final(response.to_string()),
    }
}

/// Text after the first line that opens with `Final Answer:`. The marker
/// elsewhere in a line is ordinary prose.
pub(crate) fn final_answer(response: &str) -> Option<String> {
    let mut offset = 0;
    for line in response.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with(FINAL_ANSWER_MARKER) {
            let start = offset + (line.len() - trimmed.len()) + FINAL_ANSWER_MARKER.len();
            return Some(response[start..].trim().to_string());
        }
        offset += line.len();
    }
    None
}

/// The reply up to any observation the model invented for itself.
pub(crate) fn strip_hallucinated_observation(response: &str) -> &str {
    match response.find(OBSERVATION_MARKER) {
        Some(pos) => response[..pos].trim_end(),
        None => response.trim_end(),
    }
}

fn normalize_input(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(trimmed)
    {
        if let Some(query) = map.get("query").and_then(|value| value.as_str()) {
            return query.trim().to_string();
        }
    }
    trimmed.trim_matches('"').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_final_verbatim() {
        let reply = "Title\nBody line\n";
        assert_eq!(parse_reply(reply), AgentReply::Final(reply.to_string()));
    }

    #[test]
    fn final_answer_marker_drops_the_thought() {
        let reply = "Thought: I now know the final answer\nFinal Answer: The report.\n";
        assert_eq!(
            parse_reply(reply),
            AgentReply::Final("The report.".to_string())
        );
    }

    #[test]
    fn marker_inside_prose_is_not_a_final_answer() {
        let reply = "Agents print Final Answer: when done.\nMore body.";
        assert_eq!(final_answer(reply), None);
        assert_eq!(parse_reply(reply), AgentReply::Final(reply.to_string()));
        assert_eq!(
            final_answer("Thought: done\n  Final Answer: kept\nlines"),
            Some("kept\nlines".to_string())
        );
    }

    #[test]
    fn parses_action_with_json_input() {
        let reply = "Thought: look it up\nAction: duckduckgo_search\nAction Input: {\"query\": \"serverless trends 2024\"}";
        assert_eq!(
            parse_reply(reply),
            AgentReply::Action {
                tool: "duckduckgo_search".into(),
                input: "serverless trends 2024".into(),
            }
        );
    }

    #[test]
    fn parses_action_with_quoted_input() {
        let reply = "Action: duckduckgo_search\nAction Input: \"rust async runtimes\"\nObservation: made up";
        assert_eq!(
            parse_reply(reply),
            AgentReply::Action {
                tool: "duckduckgo_search".into(),
                input: "rust async runtimes".into(),
            }
        );
        assert_eq!(
            strip_hallucinated_observation(reply),
            "Action: duckduckgo_search\nAction Input: \"rust async runtimes\""
        );
    }

    #[test]
    fn action_without_input_is_not_a_tool_call() {
        let reply = "Action: duckduckgo_search\n";
        assert_eq!(parse_reply(reply), AgentReply::Final(reply.to_string()));
    }
}
