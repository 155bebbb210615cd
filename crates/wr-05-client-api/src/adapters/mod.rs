//! Default collaborator adapters.

mod bundle;
mod locator;

pub use bundle::AcceptAllBundleStore;
pub use locator::TemplateLocator;
