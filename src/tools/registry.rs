use std::sync::Arc;

use crate::core::tool::RouteTool;

/// The REST routes exported as tools, in declaration order.
#[derive(Clone)]
pub struct RouteCatalog {
    routes: Arc<Vec<RouteTool>>,
}

impl RouteCatalog {
    pub fn with_routes<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = RouteTool>,
    {
        Self {
            routes: Arc::new(iter.into_iter().collect()),
        }
    }

    /// The two routes served by `api::routes`.
    pub fn default_routes() -> Self {
        Self::with_routes([
            RouteTool::get("read_root", "Returns a simple welcome message.", "/"),
            RouteTool::get("greet_user", "Greets the user by name.", "/greet/:name"),
        ])
    }

    pub fn list(&self) -> &[RouteTool] {
        &self.routes
    }

    pub fn get(&self, name: &str) -> Option<&RouteTool> {
        self.routes.iter().find(|r| r.name == name)
    }
}

impl Default for RouteCatalog {
    fn default() -> Self {
        Self::default_routes()
    }
}
