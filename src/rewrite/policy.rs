use std::collections::HashSet;

/// What the rewriter touches and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    allowed_types: HashSet<String>,
    /// Replace every method body with `ldnull; throw`
    pub stub_bodies: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Policy {
            allowed_types: HashSet::new(),
            stub_bodies: true,
        }
    }
}

impl Policy {
    /// Rewrites every type and stubs method bodies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the rewrite to the type with full name `name`. Nested types are named
    /// `Outer/Inner`. May be called repeatedly.
    #[must_use]
    pub fn with_allowed_type(mut self, name: impl Into<String>) -> Self {
        self.allowed_types.insert(name.into());
        self
    }

    /// Restricts the rewrite to the types named in `names`.
    #[must_use]
    pub fn with_allowed_types<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_types.extend(names.into_iter().map(Into::into));
        self
    }

    /// Sets [`Policy::stub_bodies`].
    #[must_use]
    pub fn with_stub_bodies(mut self, enabled: bool) -> Self {
        self.stub_bodies = enabled;
        self
    }

    /// The allow-list. Empty means every type is rewritten.
    #[must_use]
    pub fn allowed_types(&self) -> &HashSet<String> {
        &self.allowed_types
    }

    /// `true` if the type named `full_name` is subject to the rewrite.
    #[must_use]
    pub fn includes(&self, full_name: &str) -> bool {
        self.allowed_types.is_empty() || self.allowed_types.contains(full_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_allow_list_includes_everything() {
        let policy = Policy::new();
        assert!(policy.stub_bodies);
        assert!(policy.includes("Foo.Bar"));
        assert!(policy.includes("Foo.Bar/Nested"));
    }

    #[test]
    fn allow_list_is_exact() {
        let policy = Policy::new()
            .with_allowed_types(["Foo.Other", "Foo.Bar/Inner"])
            .with_stub_bodies(false);
        assert!(!policy.stub_bodies);
        assert!(policy.includes("Foo.Other"));
        assert!(policy.includes("Foo.Bar/Inner"));
        assert!(!policy.includes("Foo.Bar"));
        assert!(!policy.includes("foo.other"));
        assert_eq!(policy.allowed_types().len(), 2);
    }
}
