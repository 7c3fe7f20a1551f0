//! Prompts for the three LLM call sites.
//!
//! Every system prompt and user-prompt template lives here so that the
//! wording can change in exactly one place, and so tests can inspect the
//! prompts without spinning up a provider.

/// System prompt for the initial workbook generation.
pub const GENERATE_SYSTEM_PROMPT: &str =
    "You are an expert React developer specializing in creating educational workbooks. Always return valid JSON.";

/// System prompt for rewriting a single page.
pub const REWRITE_PAGE_SYSTEM_PROMPT: &str =
    "You are an expert React developer. Return only the updated React component code.";

/// System prompt for applying an instruction across the whole workbook.
pub const REWRITE_GLOBAL_SYSTEM_PROMPT: &str =
    "You are an expert React developer. Return a JSON structure with changes for each page.";

/// Build the generation prompt around the (already truncated) document text.
pub fn generate_prompt(content: &str) -> String {
    format!(
        r#"Create a paginated React workbook component from the following content.
Each page should be a separate component with proper styling.
Use Tailwind CSS classes for styling.
The workbook should be editable and print-ready.
Return an array of page components with their code.

Content:
{content}

Return a JSON structure with:
{{
    "pages": [
        {{
            "index": 0,
            "title": "Page Title",
            "code": "React component code here"
        }}
    ]
}}"#
    )
}

/// Build the single-page rewrite prompt.
pub fn rewrite_page_prompt(code: &str, instruction: &str) -> String {
    format!(
        r#"Rewrite the following React component code for a workbook page based on the instruction.
Keep the same structure but apply the requested changes.

Current code:
{code}

Instruction:
{instruction}

Return only the updated React component code."#
    )
}

/// Build the workbook-wide rewrite prompt.
pub fn rewrite_global_prompt(code: &str, instruction: &str) -> String {
    format!(
        r#"Apply the following instruction across all pages of the workbook.
Return a diff or updated code for each affected page.

Current workbook code:
{code}

Instruction:
{instruction}

Return a JSON structure with changes for each page."#
    )
}
