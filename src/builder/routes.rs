//! Builder for nested route tables.

use crate::builder::error::BuildError;
use crate::recognizer::{RouteDefinition, RouteMap};

/// Builder for a [`RouteMap`] with a fluent API.
#[derive(Debug, Clone, Default)]
pub struct RouteMapBuilder {
    definitions: Vec<RouteDefinition>,
}

impl RouteMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a leaf route.
    pub fn route(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.definitions.push(RouteDefinition::new(name, path));
        self
    }

    /// Add a route with children. Child paths are relative to `path`.
    pub fn nest<F>(mut self, name: impl Into<String>, path: impl Into<String>, children: F) -> Self
    where
        F: FnOnce(RouteMapBuilder) -> RouteMapBuilder,
    {
        let mut definition = RouteDefinition::new(name, path);
        definition.children = children(RouteMapBuilder::new()).definitions;
        self.definitions.push(definition);
        self
    }

    /// Add a pre-built definition.
    pub fn definition(mut self, definition: RouteDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    /// Build the route map.
    /// Returns every problem in the table if it is invalid.
    pub fn build(self) -> Result<RouteMap, BuildError> {
        RouteMap::from_definitions(&self.definitions)
    }
}
