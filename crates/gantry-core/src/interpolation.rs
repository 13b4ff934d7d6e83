//! Placeholder interpolation for matrix-bound and environment values.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{\{\s*([^}]+?)\s*\}\}").expect("placeholder regex"))
}

/// Context for variable interpolation.
#[derive(Debug, Clone, Default)]
pub struct InterpolationContext {
    /// Run-level variables
    pub variables: HashMap<String, String>,
    /// Matrix value bound to the current instance
    pub matrix: HashMap<String, String>,
}

impl InterpolationContext {
    /// Create a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context carrying a single bound matrix value.
    pub fn with_matrix(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut ctx = Self::default();
        ctx.matrix.insert(key.into(), value.into());
        ctx
    }

    /// Interpolate placeholders in a string.
    ///
    /// Supports:
    /// - `${{ matrix.key }}` - matrix value bound to this instance
    /// - `${{ env.VAR }}` - environment variable
    /// - `${{ name }}` - direct variable lookup
    pub fn interpolate(&self, input: &str) -> String {
        placeholder_re()
            .replace_all(input, |caps: &regex::Captures| {
                let expr = caps.get(1).map_or("", |m| m.as_str()).trim();
                self.resolve_expression(expr)
            })
            .to_string()
    }

    /// Resolve a single expression.
    fn resolve_expression(&self, expr: &str) -> String {
        if let Some(key) = expr.strip_prefix("matrix.") {
            return self.matrix.get(key).cloned().unwrap_or_default();
        }

        if let Some(var_name) = expr.strip_prefix("env.") {
            return self
                .variables
                .get(var_name)
                .cloned()
                .or_else(|| std::env::var(var_name).ok())
                .unwrap_or_default();
        }

        self.variables.get(expr).cloned().unwrap_or_default()
    }
}
