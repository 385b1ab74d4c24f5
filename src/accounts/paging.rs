use serde::Serialize;

/// A bounded slice of a larger unordered result set plus paging metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_number: u32,
    pub page_size: u32,
    pub total_items: usize,
    pub total_pages: u32,
}

/// Slices `items` into the requested page.
///
/// `total_pages` is `ceil(total_items / page_size)`, 0 for an empty set.
/// A page number beyond the last page yields empty `items` with accurate
/// totals rather than an error, so callers can detect "beyond last page"
/// without a separate probe. Callers guarantee `page_number >= 1` and
/// `page_size >= 1`.
pub fn paginate<T>(items: Vec<T>, page_number: u32, page_size: u32) -> Page<T> {
    let total_items = items.len();
    let total_pages = (total_items as u32).div_ceil(page_size);
    let start = (page_number as usize - 1) * page_size as usize;

    let items = items
        .into_iter()
        .skip(start)
        .take(page_size as usize)
        .collect();

    Page {
        items,
        page_number,
        page_size,
        total_items,
        total_pages,
    }
}
