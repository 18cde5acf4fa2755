//! Order-preserving map over independent evaluations.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Apply `f` to every item, returning results in input order.
#[cfg(feature = "parallel")]
pub(crate) fn par_map<T, R, F>(items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    items.par_iter().map(f).collect()
}

/// Apply `f` to every item, returning results in input order.
#[cfg(not(feature = "parallel"))]
pub(crate) fn par_map<T, R, F>(items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    items.iter().map(f).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_is_preserved() {
        let items: Vec<u32> = (0..1000).collect();
        let doubled = par_map(&items, |x| x * 2);
        assert_eq!(doubled.len(), 1000);
        assert!(doubled.iter().enumerate().all(|(i, v)| *v == 2 * i as u32));
    }
}
