//! Access paths for diagnostics
//!
//! Provides [`TracePath`] (a breadcrumb such as `Game.players[3].inventory{0}`)
//! and [`PathTracer`], the stack the active pass pushes and pops around each
//! recursive step. Paths carry no behaviour; they only make log lines useful.

use std::fmt::{self, Display, Formatter};

/// One step of an access path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Static slot or host-supplied root
    Root(String),
    /// Record field
    Field(String),
    /// Sequence or queue position
    Index(usize),
    /// Keyed-collection entry, by iteration position
    Entry(usize),
    /// Value half of a keyed entry
    EntryValue,
    /// Referent of an expiring reference
    Target,
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root(name) => write!(f, "{name}"),
            Self::Field(name) => write!(f, ".{name}"),
            Self::Index(i) => write!(f, "[{i}]"),
            Self::Entry(i) => write!(f, "{{{i}}}"),
            Self::EntryValue => write!(f, ".<value>"),
            Self::Target => write!(f, ".<target>"),
        }
    }
}

/// Path from a root to the object being migrated
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TracePath(Vec<PathSegment>);

impl TracePath {
    /// Create path from segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }

    /// Empty path
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path consisting of one named root
    #[inline]
    #[must_use]
    pub fn named(root: impl Into<String>) -> Self {
        Self(vec![PathSegment::Root(root.into())])
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get parent path (if not empty)
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Get last segment
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    /// Append a segment, returning new path
    #[must_use]
    pub fn child(&self, segment: PathSegment) -> Self {
        let mut new = self.clone();
        new.0.push(segment);
        new
    }

    /// Check if this path is a prefix of another
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.0.len() <= other.0.len() && self.0 == other.0[..self.0.len()]
    }
}

impl Display for TracePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for segment in &self.0 {
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// Current access path of the active pass
#[derive(Debug, Clone, Default)]
pub struct PathTracer {
    current: TracePath,
}

impl PathTracer {
    /// Create tracer at the empty path
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a segment
    #[inline]
    pub fn push(&mut self, segment: PathSegment) {
        self.current.0.push(segment);
    }

    /// Leave the innermost segment
    #[inline]
    pub fn pop(&mut self) -> Option<PathSegment> {
        self.current.0.pop()
    }

    /// Path at this point
    #[inline]
    #[must_use]
    pub fn current(&self) -> &TracePath {
        &self.current
    }

    /// Jump to a remembered path (when a deferred task starts)
    #[inline]
    pub fn reset_to(&mut self, path: TracePath) {
        self.current = path;
    }

    /// Current depth
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.current.len()
    }

    /// Render the current path
    #[must_use]
    pub fn render(&self) -> String {
        self.current.to_string()
    }
}
