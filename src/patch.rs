/// One field of a partial update: either left alone or replaced.
///
/// `Set(String::new())` clears a text field, which is different from not
/// mentioning it at all. Nullable columns use `FieldPatch<Option<T>>`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldPatch<T> {
    #[default]
    Unchanged,
    Set(T),
}

impl<T> FieldPatch<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    pub fn apply(self, current: T) -> T {
        match self {
            Self::Unchanged => current,
            Self::Set(v) => v,
        }
    }
}
