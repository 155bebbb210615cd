use crate::ports::LocatorDeriver;
use shared_types::Identity;

/// Derives locators by substituting `{name}` and `{owner}` into a template.
#[derive(Debug, Clone)]
pub struct TemplateLocator {
    template: String,
}

impl TemplateLocator {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

impl LocatorDeriver for TemplateLocator {
    fn url_for(&self, name: &str, owner: &Identity) -> String {
        self.template
            .replace("{name}", name)
            .replace("{owner}", &owner.to_hex())
    }
}
