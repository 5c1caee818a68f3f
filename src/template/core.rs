use std::collections::HashMap;

/// Markup provider consulted once per render.
///
/// The tree keys lookups by a view's template name (falling back to its
/// id) and only cares whether markup exists; a `None` renders as empty
/// content rather than failing.
pub trait TemplateSource {
    fn markup_for(&self, key: &str) -> Option<String>;
}

/// Fixed key/value template store for tests, demos and static pages.
#[derive(Debug, Default, Clone)]
pub struct StaticTemplates {
    templates: HashMap<String, String>,
}

impl StaticTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, markup: impl Into<String>) {
        self.templates.insert(key.into(), markup.into());
    }

    pub fn with(mut self, key: impl Into<String>, markup: impl Into<String>) -> Self {
        self.insert(key, markup);
        self
    }
}

impl TemplateSource for StaticTemplates {
    fn markup_for(&self, key: &str) -> Option<String> {
        self.templates.get(key).cloned()
    }
}
