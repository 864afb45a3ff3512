//! Page planning for paginated listing endpoints

/// Number of records the repository returns per listing page
pub const PAGE_SIZE: u64 = 100;

/// One page of a paginated resource listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub resource_id: String,
    pub page_index: u64,
    pub offset: u64,
}

/// Number of pages needed to cover `total` records
pub fn page_count(total: u64) -> u64 {
    total.div_ceil(PAGE_SIZE)
}

/// Build the ordered page requests for a resource holding `total` records.
///
/// Pure: the same input always yields the same plan. A total of zero yields
/// an empty plan.
pub fn plan_pages(resource_id: &str, total: u64) -> Vec<PageRequest> {
    (0..page_count(total))
        .map(|page_index| PageRequest {
            resource_id: resource_id.to_string(),
            page_index,
            offset: page_index * PAGE_SIZE,
        })
        .collect()
}
