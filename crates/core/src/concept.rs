/// A concept as the tutor sees it for one turn.
///
/// Concepts are identified by name without regard to case; `name` keeps the
/// casing under which the concept was first stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptContext {
    /// Canonical (stored) name of the concept.
    pub name: String,
    /// Stored definition. Empty for placeholder nodes created by an edge.
    pub definition: String,
    /// Names of the concepts this one directly requires.
    pub prerequisites: Vec<String>,
}

/// Case-insensitive name comparison used everywhere concept identity matters.
pub fn same_concept(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}
