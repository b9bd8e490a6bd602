//! Prompt construction for test case generation

use super::GenerateRequest;

/// System prompt describing the expected JSON contract
pub const SYSTEM_PROMPT: &str = r#"You are a senior QA engineer. You write concise, executable manual test cases for user stories.

Respond with a single JSON object and nothing else, using exactly this shape:
{
  "cases": [
    {
      "id": "TC-001",
      "title": "short imperative title",
      "category": "Positive | Negative | Edge | Authorization | Non-Functional",
      "steps": ["step 1", "step 2"],
      "testData": "concrete input values, or omit",
      "expectedResult": "observable outcome after the last step"
    }
  ]
}

Rules:
- Cover every acceptance criterion with at least one Positive case.
- Add Negative and Edge cases for invalid input, limits and error handling.
- Steps are plain sentences without numbering.
- Ids are sequential: TC-001, TC-002, ..."#;

/// Build the user message for a story
pub fn build_user_prompt(request: &GenerateRequest) -> String {
    let mut prompt = String::new();

    prompt.push_str("## Story Title\n");
    prompt.push_str(request.story_title.trim());
    prompt.push_str("\n\n");

    if !request.description.trim().is_empty() {
        prompt.push_str("## Description\n");
        prompt.push_str(request.description.trim());
        prompt.push_str("\n\n");
    }

    prompt.push_str("## Acceptance Criteria\n");
    prompt.push_str(request.acceptance_criteria.trim());
    prompt.push_str("\n\n");

    if !request.additional_info.trim().is_empty() {
        prompt.push_str("## Additional Information\n");
        prompt.push_str(request.additional_info.trim());
        prompt.push_str("\n\n");
    }

    prompt.push_str("Generate the test cases as JSON.");
    prompt
}
