use std::fmt;
use std::sync::Arc;

use super::{Collate, FnCollate, PadCollator};

/// Collates `(index, example)` pairs and hands the indices back alongside the
/// wrapped collator's output.
///
/// Clones share the wrapped collator.
pub struct IndexedCollate<C> {
    inner: Arc<C>,
}

impl<C> IndexedCollate<C> {
    pub fn new(inner: C) -> Self {
        Self { inner: Arc::new(inner) }
    }

    pub fn from_shared(inner: Arc<C>) -> Self {
        Self { inner }
    }

    /// The collator being wrapped.
    pub fn wrapped(&self) -> &C {
        &self.inner
    }

    pub fn shared(&self) -> Arc<C> {
        Arc::clone(&self.inner)
    }

    pub fn into_inner(self) -> Arc<C> {
        self.inner
    }

    /// Whether both wrappers share the same collator.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<C> Clone for IndexedCollate<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<C: fmt::Debug> fmt::Debug for IndexedCollate<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedCollate").field("inner", &self.inner).finish()
    }
}

impl<T, C: Collate<T>> Collate<(usize, T)> for IndexedCollate<C> {
    type Output = (Vec<usize>, C::Output);

    fn collate(&self, batch: Vec<(usize, T)>) -> Self::Output {
        let (indices, examples): (Vec<usize>, Vec<T>) = batch.into_iter().unzip();
        (indices, self.inner.collate(examples))
    }
}

/// Conversion into an [`IndexedCollate`]. Already indexed collators convert
/// to themselves.
pub trait IntoIndexed {
    type Inner;

    fn into_indexed(self) -> IndexedCollate<Self::Inner>;
}

impl<C> IntoIndexed for IndexedCollate<C> {
    type Inner = C;

    fn into_indexed(self) -> IndexedCollate<C> {
        self
    }
}

impl<F> IntoIndexed for FnCollate<F> {
    type Inner = Self;

    fn into_indexed(self) -> IndexedCollate<Self> {
        IndexedCollate::new(self)
    }
}

impl IntoIndexed for PadCollator {
    type Inner = Self;

    fn into_indexed(self) -> IndexedCollate<Self> {
        IndexedCollate::new(self)
    }
}

impl<C> IntoIndexed for Arc<C> {
    type Inner = C;

    fn into_indexed(self) -> IndexedCollate<C> {
        IndexedCollate::from_shared(self)
    }
}

/// Wraps `collator` so that it accepts `(index, example)` pairs.
///
/// Wrapping twice is a no-op.
pub fn indexed_collate<C: IntoIndexed>(collator: C) -> IndexedCollate<C::Inner> {
    collator.into_indexed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concat() -> FnCollate<impl Fn(Vec<&'static str>) -> String> {
        FnCollate::new(|batch: Vec<&'static str>| batch.concat())
    }

    #[test]
    fn test_indices_line_up_with_examples() {
        let collate = indexed_collate(concat());
        let (indices, output) = collate.collate(vec![(4, "a"), (1, "b"), (7, "c")]);
        assert_eq!(indices, vec![4, 1, 7]);
        assert_eq!(output, "abc");
    }

    #[test]
    fn test_wrapping_twice_returns_same_wrapper() {
        let once = indexed_collate(concat());
        let twice = indexed_collate(once.clone());
        assert!(once.ptr_eq(&twice));

        let (indices, output) = twice.collate(vec![(0, "x")]);
        assert_eq!(indices, vec![0]);
        assert_eq!(output, "x");
    }

    #[test]
    fn test_into_inner_returns_shared_collator() {
        let shared = Arc::new(concat());
        let collate = indexed_collate(Arc::clone(&shared));
        assert_eq!(Arc::strong_count(&shared), 2);

        let inner = collate.into_inner();
        assert!(Arc::ptr_eq(&inner, &shared));
        assert_eq!(inner.collate(vec!["m", "n"]), "mn");
    }

    #[test]
    fn test_wrapped_reference() {
        let collate = indexed_collate(concat());
        assert_eq!(collate.wrapped().collate(vec!["p", "q"]), "pq");

        let shared = collate.shared();
        let again = indexed_collate(shared);
        assert!(again.ptr_eq(&collate));
    }

    #[test]
    fn test_empty_batch() {
        let collate = indexed_collate(concat());
        let (indices, output) = collate.collate(Vec::new());
        assert!(indices.is_empty());
        assert!(output.is_empty());
    }
}
