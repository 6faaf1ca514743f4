//! Ordered field selections used for partitioning and ordering.
//!
//! Field indexes are 1-based and resolve against a row's key fields followed by
//! its value fields, so `field(1)` is the first key field of a key/value row.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Order {
    Ascending,
    Descending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ordering {
    pub index: usize,
    pub order: Order,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SortOption {
    orderings: Vec<Ordering>,
}

/// Select fields by 1-based index, each in ascending order.
pub fn field(indexes: impl IntoIterator<Item = usize>) -> SortOption {
    SortOption::default().by_fields(indexes)
}

impl SortOption {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one field with an explicit order.
    pub fn by(mut self, index: usize, order: Order) -> Self {
        self.orderings.push(Ordering { index, order });
        self
    }

    pub fn by_fields(mut self, indexes: impl IntoIterator<Item = usize>) -> Self {
        self.orderings.extend(indexes.into_iter().map(|index| Ordering {
            index,
            order: Order::Ascending,
        }));
        self
    }

    pub fn orderings(&self) -> &[Ordering] {
        &self.orderings
    }

    /// The selected field indexes, in selection order.
    pub fn indexes(&self) -> Vec<usize> {
        self.orderings.iter().map(|o| o.index).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.orderings.is_empty()
    }
}

impl From<usize> for SortOption {
    fn from(index: usize) -> Self {
        field([index])
    }
}
