// sala-core/src/application/ports/renderer.rs

use crate::error::SalaError;

/// Renders text templates (LLM prompts) against a JSON context.
pub trait TemplateEngine: Send + Sync {
    fn render(&self, template: &str, context: &serde_json::Value) -> Result<String, SalaError>;
}
