//! Serializable route table definitions.

use serde::{Deserialize, Serialize};

/// One route and its nested children, loadable from JSON or TOML.
///
/// Child paths are relative to their parent.
///
/// # Example
///
/// ```rust
/// use waypost::recognizer::{RouteDefinition, RouteMap, Recognizer};
///
/// let json = r#"[
///     { "name": "posts", "path": "/posts", "children": [
///         { "name": "post", "path": "/:post_id" }
///     ]}
/// ]"#;
///
/// let definitions: Vec<RouteDefinition> = serde_json::from_str(json).unwrap();
/// let map = RouteMap::from_definitions(&definitions).unwrap();
/// assert!(map.has_route("post"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDefinition {
    pub name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RouteDefinition>,
}

impl RouteDefinition {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            children: Vec::new(),
        }
    }

    pub fn child(mut self, child: RouteDefinition) -> Self {
        self.children.push(child);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_default_to_empty() {
        let definition: RouteDefinition =
            serde_json::from_str(r#"{ "name": "about", "path": "/about" }"#).unwrap();
        assert_eq!(definition, RouteDefinition::new("about", "/about"));
    }

    #[test]
    fn nested_definitions_serialize() {
        let definition =
            RouteDefinition::new("posts", "/posts").child(RouteDefinition::new("post", "/:id"));
        let json = serde_json::to_value(&definition).unwrap();
        assert_eq!(json["children"][0]["path"], "/:id");
        assert!(json["children"][0].get("children").is_none());
    }
}
