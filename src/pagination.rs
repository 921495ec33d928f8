use crate::models::PageJob;

/// Builds the per-page URLs of an attraction's review listing.
///
/// The site pages reviews with an offset parameter placed after the search
/// mode segment: `...-Reviews-Tower.html` becomes `...-Reviews-or10-Tower.html`
/// for the second page of ten.
#[derive(Debug, Clone)]
pub struct PaginationPlanner {
    search_type: String,
    reviews_per_page: usize,
}

impl PaginationPlanner {
    pub fn new(search_type: impl Into<String>, reviews_per_page: usize) -> Self {
        Self {
            search_type: search_type.into(),
            reviews_per_page: reviews_per_page.max(1),
        }
    }

    pub fn plan(&self, url: &str, attraction_id: i64, page_count: usize) -> Vec<PageJob> {
        (0..page_count)
            .map(|page_index| PageJob {
                url: self.page_url(url, page_index),
                attraction_id,
                page_index,
            })
            .collect()
    }

    pub fn page_url(&self, url: &str, page_index: usize) -> String {
        let offset = page_index * self.reviews_per_page;
        let segment = format!("-{}-", self.search_type);
        if let Some(pos) = url.find(&segment) {
            let (head, tail) = url.split_at(pos + segment.len());
            return format!("{head}or{offset}-{tail}");
        }
        let paged = format!("-{}-or{offset}", self.search_type);
        match url.strip_suffix(".html") {
            Some(stem) => format!("{stem}{paged}.html"),
            None => format!("{url}{paged}"),
        }
    }
}
