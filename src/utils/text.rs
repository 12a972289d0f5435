/// Removes one enclosing markdown code fence from a model reply.
///
/// Only a reply that is entirely wrapped in ``` fences is touched; the
/// language tag on the opening line is dropped and the body keeps a single
/// trailing newline. Anything else is returned unchanged.
pub fn strip_code_fence(content: &str) -> String {
    let trimmed = content.trim();

    let Some(body) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return content.to_string();
    };

    // Opening line holds the optional language specifier
    let body = match body.find('\n') {
        Some(newline) => &body[newline + 1..],
        None => return content.to_string(),
    };

    let body = body.trim_end();
    if body.is_empty() {
        String::new()
    } else {
        format!("{}\n", body)
    }
}
