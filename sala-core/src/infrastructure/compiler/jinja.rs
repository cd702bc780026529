// sala-core/src/infrastructure/compiler/jinja.rs

// Renders prompt templates. Context values are plain JSON; nested evidence is
// pre-serialized by the caller.

use crate::application::ports::TemplateEngine;
use crate::error::SalaError;
use crate::infrastructure::error::InfrastructureError;
use minijinja::Environment;

pub struct JinjaRenderer<'a> {
    env: Environment<'a>,
}

impl<'a> JinjaRenderer<'a> {
    pub fn new() -> Self {
        let mut env = Environment::new();
        // Prompts are not HTML
        env.set_auto_escape_callback(|_| minijinja::AutoEscape::None);
        Self { env }
    }
}

impl<'a> Default for JinjaRenderer<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> TemplateEngine for JinjaRenderer<'a> {
    fn render(&self, template: &str, context: &serde_json::Value) -> Result<String, SalaError> {
        self.env
            .render_str(template, context)
            .map_err(|e| SalaError::Infrastructure(InfrastructureError::TemplateError(e)))
    }
}
