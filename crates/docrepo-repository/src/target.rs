/// What a delete removes: entities (by their own references) or ids in the
/// repository's collection.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteTarget<E> {
    ByEntity(Vec<E>),
    ById(Vec<String>),
}

impl<E> DeleteTarget<E> {
    pub fn entity(entity: E) -> Self {
        DeleteTarget::ByEntity(vec![entity])
    }

    pub fn entities(entities: Vec<E>) -> Self {
        DeleteTarget::ByEntity(entities)
    }

    pub fn id(id: impl Into<String>) -> Self {
        DeleteTarget::ById(vec![id.into()])
    }

    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DeleteTarget::ById(ids.into_iter().map(Into::into).collect())
    }

    pub fn len(&self) -> usize {
        match self {
            DeleteTarget::ByEntity(entities) => entities.len(),
            DeleteTarget::ById(ids) => ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
