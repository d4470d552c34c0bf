/// Splits `items` into maximal runs of neighbour-compatible items.
///
/// `can_batch(prev, next)` is only ever asked about adjacent items, and
/// `on_batch(start, len)` is called once per run in order. Two compatible
/// items separated by an incompatible one always land in different runs.
pub fn batch<T>(
    items: &[T],
    mut can_batch: impl FnMut(&T, &T) -> bool,
    mut on_batch: impl FnMut(usize, usize),
) {
    if items.is_empty() {
        return;
    }

    let mut start = 0;
    for i in 1..items.len() {
        if !can_batch(&items[i - 1], &items[i]) {
            on_batch(start, i - start);
            start = i;
        }
    }
    on_batch(start, items.len() - start);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runs<T>(items: &[T], f: impl FnMut(&T, &T) -> bool) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        batch(items, f, |s, l| out.push((s, l)));
        out
    }

    #[test]
    fn always_true_is_one_batch() {
        assert_eq!(runs(&[0; 7], |_, _| true), vec![(0, 7)]);
    }

    #[test]
    fn always_false_is_singletons() {
        let r = runs(&[0; 5], |_, _| false);
        assert_eq!(r, (0..5).map(|i| (i, 1)).collect::<Vec<_>>());
    }

    #[test]
    fn empty_input_calls_nothing() {
        assert!(runs::<u8>(&[], |_, _| true).is_empty());
    }

    #[test]
    fn non_adjacent_equal_items_are_not_merged() {
        let items = [1, 1, 2, 1, 1, 1];
        assert_eq!(runs(&items, |a, b| a == b), vec![(0, 2), (2, 1), (3, 3)]);
    }

    #[test]
    fn runs_cover_input_in_order() {
        let items = [3, 3, 1, 4, 4, 4, 1, 5, 9, 9];
        let r = runs(&items, |a, b| a == b);
        let mut next = 0;
        for (s, l) in &r {
            assert_eq!(*s, next);
            assert!(*l > 0);
            next += l;
        }
        assert_eq!(next, items.len());
    }

    #[test]
    fn predicate_only_sees_neighbours() {
        let items = [0, 1, 2, 3];
        let mut seen = Vec::new();
        batch(
            &items,
            |a, b| {
                seen.push((*a, *b));
                true
            },
            |_, _| {},
        );
        assert_eq!(seen, vec![(0, 1), (1, 2), (2, 3)]);
    }
}
