use autocomment_core::Task;

pub fn system_prompt(task: Task, language: &str) -> String {
    match task {
        Task::Comment => format!(
            "You are an expert code commenter. Your task is to add helpful comments to {language} code.\n\n\
Rules:\n\
1. Add comments above functions, classes, and complex logic blocks\n\
2. Explain the purpose and parameters of functions\n\
3. Keep comments concise but informative\n\
4. Use single-line comments for simple statements\n\
5. Use multi-line comments for complex sections\n\
6. Don't over-comment obvious code\n\
7. Preserve the original code structure exactly\n\n\
Return ONLY the commented code, with no surrounding formatting. \
Do not add markdown formatting or code blocks."
        ),
        Task::FindBugs => report_prompt(
            language,
            "find bugs",
            "List each likely bug with the line or function it is in, why it is wrong, \
and a concrete fix. Ignore style issues. If you find nothing, say so.",
        ),
        Task::Review => report_prompt(
            language,
            "review code",
            "Comment on correctness, readability, naming, error handling and structure. \
Group findings by severity and keep each one actionable.",
        ),
        Task::Explain => report_prompt(
            language,
            "explain code",
            "Describe what the code does, its main data flow, and any non-obvious logic, \
for a developer seeing it for the first time.",
        ),
        Task::Optimize => report_prompt(
            language,
            "optimize code",
            "Point out performance problems and wasteful patterns, and suggest specific \
improvements with short code snippets. Do not rewrite the whole file.",
        ),
    }
}

fn report_prompt(language: &str, role: &str, focus: &str) -> String {
    format!(
        "You are an expert {language} developer asked to {role}.\n\n\
{focus}\n\n\
Answer in Markdown."
    )
}

pub fn user_message(code: &str, language: &str) -> String {
    format!("{language} code:\n```\n{code}\n```")
}

/// Strip one Markdown code fence wrapped around the whole response.
///
/// Models often fence their output even when told not to. Anything other than
/// a single outer fence is returned unchanged.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string (```python) on the opening line.
    let Some((_, body)) = body.split_once('\n') else {
        return trimmed;
    };
    if body.contains("\n```") {
        return trimmed;
    }
    body.trim_end()
}
