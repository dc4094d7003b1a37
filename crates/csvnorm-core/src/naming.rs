/// Strategy deriving the flat column name shown in place of a foreign key.
pub trait ColumnTidier: Send + Sync {
    fn tidy(&self, column: &str) -> String;
}

/// Default tidier: drops a trailing suffix (`_id` unless configured).
///
/// The match is exact and case-sensitive, and a column that consists of
/// nothing but the suffix is kept as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixTidier {
    suffix: String,
}

pub const DEFAULT_SUFFIX: &str = "_id";

impl SuffixTidier {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }
}

impl Default for SuffixTidier {
    fn default() -> Self {
        Self::new(DEFAULT_SUFFIX)
    }
}

impl ColumnTidier for SuffixTidier {
    fn tidy(&self, column: &str) -> String {
        match column.strip_suffix(self.suffix.as_str()) {
            Some(stem) if !stem.is_empty() && !self.suffix.is_empty() => stem.to_string(),
            _ => column.to_string(),
        }
    }
}

impl<F> ColumnTidier for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn tidy(&self, column: &str) -> String {
        self(column)
    }
}
