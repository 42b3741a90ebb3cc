use serde_json::Value;

use crate::error::GatewayError;

pub const MAX_PROMPT_CHARS: usize = 500;
/// Largest request body either transport accepts.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Pull the prompt out of a raw JSON body.
///
/// Accepts only `{"prompt": "<1..=500 chars>"}`; anything else is an
/// invalid prompt, including a body that is not JSON at all.
pub fn extract_prompt(body: &[u8]) -> Result<String, GatewayError> {
    if body.len() > MAX_BODY_BYTES {
        return Err(GatewayError::InvalidPrompt("body is too large"));
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|_| GatewayError::InvalidPrompt("body is not JSON"))?;

    match value.get("prompt") {
        Some(Value::String(prompt)) => validate_prompt(prompt).map(|p| p.to_string()),
        Some(Value::Null) | None => Err(GatewayError::InvalidPrompt("prompt is missing")),
        Some(_) => Err(GatewayError::InvalidPrompt("prompt is not a string")),
    }
}

pub fn validate_prompt(prompt: &str) -> Result<&str, GatewayError> {
    if prompt.is_empty() {
        return Err(GatewayError::InvalidPrompt("prompt is empty"));
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(GatewayError::InvalidPrompt("prompt is too long"));
    }
    Ok(prompt)
}

/// Wrap the user's words in the drawing-code instruction sent to the model.
pub fn build_instruction(prompt: &str) -> String {
    format!(
        "Create JavaScript code that draws a background for a certificate on an HTML5 canvas.\n\
         The code runs with exactly these variables in scope:\n\
         - ctx: the CanvasRenderingContext2D to draw on\n\
         - width: canvas width in pixels\n\
         - height: canvas height in pixels\n\
         \n\
         Requirements:\n\
         1. Produce a professional, elegant design suitable for a certificate.\n\
         2. Choose colors that keep text drawn on top easy to read.\n\
         3. Cover the entire canvas from (0, 0) to (width, height).\n\
         4. Output only the body of a function, with no function declaration around it.\n\
         5. Do not declare ctx, width or height.\n\
         6. Do not add explanations, prose or markdown, only code.\n\
         7. Use only the canvas drawing API on ctx; no DOM, network, timers or modules.\n\
         8. Keep the code under 2000 characters.\n\
         9. The code must run without errors.\n\
         \n\
         Design request: {}",
        prompt
    )
}
