use axum::http::Method;
use serde_json::{json, Map, Value};

use crate::core::error::BridgeError;

/// One REST operation described as an agent-callable tool.
#[derive(Debug, Clone)]
pub struct RouteTool {
    pub name: &'static str,
    pub description: &'static str,
    pub method: Method,
    /// Router template, path parameters written as `:param`.
    pub path: &'static str,
}

impl RouteTool {
    pub fn get(name: &'static str, description: &'static str, path: &'static str) -> Self {
        Self {
            name,
            description,
            method: Method::GET,
            path,
        }
    }

    pub fn path_params(&self) -> Vec<&'static str> {
        self.path
            .split('/')
            .filter_map(|seg| seg.strip_prefix(':'))
            .collect()
    }

    /// JSON Schema for the tool arguments: one required string per path parameter.
    pub fn input_schema(&self) -> Map<String, Value> {
        let params = self.path_params();
        let mut properties = Map::new();
        for p in &params {
            properties.insert(
                (*p).to_string(),
                json!({ "type": "string", "title": title_case(p) }),
            );
        }
        let mut schema = Map::new();
        schema.insert("type".into(), json!("object"));
        schema.insert("properties".into(), Value::Object(properties));
        schema.insert("required".into(), json!(params));
        schema
    }

    /// Substitute percent-encoded argument values into the path template.
    pub fn render_path(&self, args: &Map<String, Value>) -> Result<String, BridgeError> {
        let mut out = Vec::new();
        for seg in self.path.split('/') {
            match seg.strip_prefix(':') {
                Some(param) => {
                    let value = args
                        .get(param)
                        .and_then(|v| v.as_str())
                        .ok_or_else(|| BridgeError::MissingParam(param.to_string()))?;
                    out.push(urlencoding::encode(value).into_owned());
                }
                None => out.push(seg.to_string()),
            }
        }
        let path = out.join("/");
        Ok(if path.is_empty() { "/".to_string() } else { path })
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greet() -> RouteTool {
        RouteTool::get("greet_user", "Greets the user by name.", "/greet/:name")
    }

    #[test]
    fn extracts_path_params() {
        assert_eq!(greet().path_params(), vec!["name"]);
        assert!(RouteTool::get("read_root", "", "/").path_params().is_empty());
    }

    #[test]
    fn schema_requires_each_path_param() {
        let schema = greet().input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["name"]["type"], "string");
        assert_eq!(schema["properties"]["name"]["title"], "Name");
        assert_eq!(schema["required"], json!(["name"]));
    }

    #[test]
    fn renders_and_encodes_path() {
        let mut args = Map::new();
        args.insert("name".into(), json!("Ada Lovelace"));
        assert_eq!(greet().render_path(&args).unwrap(), "/greet/Ada%20Lovelace");
    }

    #[test]
    fn root_path_renders_without_args() {
        let root = RouteTool::get("read_root", "", "/");
        assert_eq!(root.render_path(&Map::new()).unwrap(), "/");
    }

    #[test]
    fn missing_param_is_reported_by_name() {
        let err = greet().render_path(&Map::new()).unwrap_err();
        assert_eq!(err.to_string(), "missing required field: name");
    }
}
