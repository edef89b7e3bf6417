/// Question type of an element, parsed from its `type` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ElementKind {
    Single,
    Multiple,
    Text,
    Essay,
    Project,
    /// `content` or an empty type: presentation only, never graded.
    Content,
    /// Any other string. Counted in the max score, never credited.
    Unknown,
}

impl ElementKind {
    pub(crate) fn parse(value: &str) -> Self {
        match value {
            "single" => Self::Single,
            "multiple" => Self::Multiple,
            "text" => Self::Text,
            "essay" => Self::Essay,
            "project" => Self::Project,
            "content" | "" => Self::Content,
            _ => Self::Unknown,
        }
    }

    pub(crate) fn is_graded(self) -> bool {
        !matches!(self, Self::Content)
    }
}
