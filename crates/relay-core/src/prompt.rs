use chrono::NaiveDate;
use relay_llm::{Message, ModelCapabilities};

/// System prompt prepended to every conversation
///
/// The note about user names is only useful when the provider forwards the
/// per-message `name` field.
pub fn system_prompt(custom: &str, capabilities: ModelCapabilities, today: NaiveDate) -> Message {
    let mut lines = vec![custom.to_string()];
    if capabilities.message_names {
        lines.push("User's names are their platform IDs and should be typed as '<@ID>'.".to_string());
    }
    lines.push(format!("Current date: {}", today.format("%B %d %Y")));
    Message::system(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_llm::ProviderType;

    #[test]
    fn test_prompt_with_names() {
        let caps = ModelCapabilities::detect(ProviderType::OpenAI, "gpt-4");
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let prompt = system_prompt("Be concise.", caps, date);

        assert_eq!(
            prompt.content().as_text(),
            Some("Be concise.\nUser's names are their platform IDs and should be typed as '<@ID>'.\nCurrent date: March 05 2024")
        );
    }

    #[test]
    fn test_prompt_without_names() {
        let caps = ModelCapabilities::detect(ProviderType::Mistral, "mistral-medium");
        let date = NaiveDate::from_ymd_opt(2024, 12, 25).unwrap();
        let prompt = system_prompt("Be concise.", caps, date);

        assert_eq!(prompt.role(), "system");
        assert_eq!(prompt.content().as_text(), Some("Be concise.\nCurrent date: December 25 2024"));
    }
}
