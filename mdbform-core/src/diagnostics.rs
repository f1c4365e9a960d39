//! Diagnostics - Accumulated warnings and errors with attribute paths
//!
//! Validation and value conversion never stop at the first problem they can
//! report. Each step appends to a shared [`Diagnostics`] and returns `None`
//! on failure; enclosing steps check [`Diagnostics::has_error`] and bail out
//! so that the first error short-circuits the rest of the conversion while
//! everything already collected is still surfaced to the caller.

use std::fmt;

/// One step of an attribute path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    Attribute(String),
    Key(String),
    Index(usize),
}

/// Path to an attribute inside a (possibly nested) resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AttributePath {
    steps: Vec<PathStep>,
}

impl AttributePath {
    /// The empty path (the resource itself)
    pub fn root() -> Self {
        Self::default()
    }

    /// Path starting at a top-level attribute
    pub fn new(name: impl Into<String>) -> Self {
        Self::root().attribute(name)
    }

    pub fn attribute(&self, name: impl Into<String>) -> Self {
        self.push(PathStep::Attribute(name.into()))
    }

    pub fn key(&self, key: impl Into<String>) -> Self {
        self.push(PathStep::Key(key.into()))
    }

    pub fn index(&self, index: usize) -> Self {
        self.push(PathStep::Index(index))
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    /// Path of the enclosing object, or root
    pub fn parent(&self) -> Self {
        let mut steps = self.steps.clone();
        steps.pop();
        Self { steps }
    }

    /// Attribute names only, joined by dots (e.g. `cluster_config.access.web_sql`)
    pub fn dotted(&self) -> String {
        self.steps
            .iter()
            .filter_map(|s| match s {
                PathStep::Attribute(name) => Some(name.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    fn push(&self, step: PathStep) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Self { steps }
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                PathStep::Attribute(name) if i == 0 => write!(f, "{}", name)?,
                PathStep::Attribute(name) => write!(f, ".{}", name)?,
                PathStep::Key(key) => write!(f, "[\"{}\"]", key)?,
                PathStep::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    pub path: Option<AttributePath>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", label, self.summary)?;
        if let Some(path) = self.path.as_ref().filter(|p| !p.is_root()) {
            write!(f, " (at {})", path)?;
        }
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

/// Accumulator for diagnostics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, summary: impl Into<String>, detail: impl Into<String>) {
        self.push(Severity::Error, summary, detail, None);
    }

    pub fn add_attribute_error(
        &mut self,
        path: &AttributePath,
        summary: impl Into<String>,
        detail: impl Into<String>,
    ) {
        self.push(Severity::Error, summary, detail, Some(path.clone()));
    }

    pub fn add_warning(&mut self, summary: impl Into<String>, detail: impl Into<String>) {
        self.push(Severity::Warning, summary, detail, None);
    }

    pub fn add_attribute_warning(
        &mut self,
        path: &AttributePath,
        summary: impl Into<String>,
        detail: impl Into<String>,
    ) {
        self.push(Severity::Warning, summary, detail, Some(path.clone()));
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn has_error(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Warning)
    }

    /// Prefix every summary, e.g. with the resource the diagnostics belong to
    pub fn prefixed(self, prefix: &str) -> Diagnostics {
        Diagnostics {
            items: self
                .items
                .into_iter()
                .map(|mut d| {
                    d.summary = format!("{}: {}", prefix, d.summary);
                    d
                })
                .collect(),
        }
    }

    /// `Ok(())` when no error was recorded
    pub fn into_result(self) -> Result<(), Diagnostics> {
        if self.has_error() { Err(self) } else { Ok(()) }
    }

    fn push(
        &mut self,
        severity: Severity,
        summary: impl Into<String>,
        detail: impl Into<String>,
        path: Option<AttributePath>,
    ) {
        self.items.push(Diagnostic {
            severity,
            summary: summary.into(),
            detail: detail.into(),
            path,
        });
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.items.iter().map(|d| d.to_string()).collect();
        write!(f, "{}", lines.join("\n"))
    }
}

impl std::error::Error for Diagnostics {}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_display() {
        let path = AttributePath::new("config")
            .attribute("greenplum_config")
            .key("max_connections");
        assert_eq!(path.to_string(), "config.greenplum_config[\"max_connections\"]");
        assert_eq!(path.dotted(), "config.greenplum_config");

        let path = AttributePath::new("monitoring").index(2).attribute("link");
        assert_eq!(path.to_string(), "monitoring[2].link");
    }

    #[test]
    fn parent_drops_last_step() {
        let path = AttributePath::new("logging").attribute("folder_id");
        assert_eq!(path.parent(), AttributePath::new("logging"));
        assert!(AttributePath::root().parent().is_root());
    }

    #[test]
    fn warnings_do_not_count_as_errors() {
        let mut diags = Diagnostics::new();
        diags.add_warning("deprecated", "");
        assert!(!diags.has_error());
        assert!(diags.clone().into_result().is_ok());

        diags.add_attribute_error(&AttributePath::new("name"), "Invalid name", "too long");
        assert!(diags.has_error());
        assert_eq!(diags.errors().count(), 1);
        assert_eq!(diags.warnings().count(), 1);
    }

    #[test]
    fn diagnostic_display_includes_path_and_detail() {
        let mut diags = Diagnostics::new();
        diags.add_attribute_error(
            &AttributePath::new("maintenance_window").attribute("day"),
            "Missing required attribute",
            "day must be set for WEEKLY windows",
        );
        assert_eq!(
            diags.to_string(),
            "error: Missing required attribute (at maintenance_window.day): day must be set for WEEKLY windows"
        );
    }
}
