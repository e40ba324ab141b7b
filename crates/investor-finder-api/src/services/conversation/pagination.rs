use serde::{Deserialize, Serialize};

/// One window over an ordered list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_index: usize,
    pub page_size: usize,
    pub total: usize,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Items left after this page.
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub((self.page_index + 1) * self.page_size)
    }
}

/// Slice `[page_index * page_size, min(start + page_size, len))`. A start at or
/// past the end yields an empty page with `has_more == false`.
pub fn page<T: Clone>(items: &[T], page_index: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total = items.len();
    let start = page_index.saturating_mul(page_size);

    if start >= total {
        return Page { items: Vec::new(), page_index, page_size, total, has_more: false };
    }

    let end = (start + page_size).min(total);
    Page {
        items: items[start..end].to_vec(),
        page_index,
        page_size,
        total,
        has_more: end < total,
    }
}

/// Per-conversation cursor into the investor list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationState {
    pub current_page: usize,
    pub page_size: usize,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self { current_page: 0, page_size: 10 }
    }
}

impl PaginationState {
    pub fn new(page_size: usize) -> Self {
        Self { current_page: 0, page_size: page_size.max(1) }
    }

    /// Moves to the next page if one exists over `total` items and returns
    /// the index to show. Past the end the cursor stays put and the returned
    /// index points at the empty page after it.
    pub fn advance(&mut self, total: usize) -> usize {
        let next = self.current_page + 1;
        if next * self.page_size.max(1) < total {
            self.current_page = next;
        }
        next
    }

    /// Points the cursor at the page holding item `index`.
    pub fn show_item(&mut self, index: usize) {
        self.current_page = index / self.page_size.max(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    #[test]
    fn test_twenty_five_items_in_pages_of_ten() {
        let items = numbers(25);

        let first = page(&items, 0, 10);
        assert_eq!(first.items, numbers(10));
        assert!(first.has_more);
        assert_eq!(first.remaining(), 15);

        let third = page(&items, 2, 10);
        assert_eq!(third.items, vec![20, 21, 22, 23, 24]);
        assert!(!third.has_more);

        let beyond = page(&items, 5, 10);
        assert!(beyond.items.is_empty());
        assert!(!beyond.has_more);
        assert_eq!(beyond.total, 25);
    }

    #[test]
    fn test_pages_concatenate_to_original() {
        for len in [0usize, 1, 9, 10, 11, 30, 37] {
            for size in [1usize, 3, 10] {
                let items = numbers(len);
                let mut rebuilt = Vec::new();
                let mut p = 0;
                loop {
                    let current = page(&items, p, size);
                    assert_eq!(current.has_more, (p + 1) * size < len);
                    if current.items.is_empty() {
                        break;
                    }
                    rebuilt.extend(current.items);
                    p += 1;
                }
                assert_eq!(rebuilt, items);
            }
        }
    }

    #[test]
    fn test_zero_page_size_is_clamped() {
        let p = page(&numbers(3), 0, 0);
        assert_eq!(p.items, vec![0]);
        assert!(p.has_more);
    }

    #[test]
    fn test_cursor_advances_only_while_pages_remain() {
        let mut state = PaginationState::new(10);
        assert_eq!(state.advance(25), 1);
        assert_eq!(state.advance(25), 2);
        assert_eq!(state.current_page, 2);

        assert_eq!(state.advance(25), 3);
        assert_eq!(state.current_page, 2);
    }

    #[test]
    fn test_show_item_moves_to_containing_page() {
        let mut state = PaginationState::new(10);
        state.show_item(23);
        assert_eq!(state.current_page, 2);
        state.show_item(0);
        assert_eq!(state.current_page, 0);
    }
}
