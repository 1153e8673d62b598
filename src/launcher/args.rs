/// Command line handed to the dedicated server.
///
/// Built once from a static template by splitting on whitespace. There is
/// no quoting or escaping: a token can never contain a space. Arguments
/// that need spaces would require a structured list instead of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchArguments(Vec<String>);

impl LaunchArguments {
    /// Tokenizes a template. Tokens are opaque and kept in order.
    pub fn from_template(template: &str) -> Self {
        let args = template
            .trim()
            .split_whitespace()
            .map(String::from)
            .collect();
        Self(args)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for LaunchArguments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}
