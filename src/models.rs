#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attraction {
    pub id: i64,
    /// Site-relative path, e.g. `/Attraction_Review-g186338-d187676-Reviews-Tower_of_London.html`.
    pub url: String,
    pub location: Option<Location>,
    pub num_reviews: i64,
    pub scraped: bool,
}

impl Attraction {
    pub fn new(id: i64, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            location: None,
            num_reviews: 0,
            scraped: false,
        }
    }

    pub fn apply_details(&mut self, details: &AttractionDetails) {
        self.location = details.location;
        self.num_reviews = details.num_reviews;
    }
}

/// What the detail extractor knows about an attraction page.
#[derive(Debug, Clone, PartialEq)]
pub struct AttractionDetails {
    pub location: Option<Location>,
    pub num_reviews: i64,
    pub page_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    pub id: i64,
    pub title: Option<String>,
    pub rating: f64,
    pub date: Option<String>,
    pub full_text: Option<String>,
    pub attraction_id: i64,
    pub user_profile: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    pub profile: Option<String>,
    /// The reviewer's hometown object, kept as JSON text.
    pub location: Option<String>,
    pub contributions: Option<i64>,
    pub helpful_votes: Option<i64>,
}

/// One page of reviews to retrieve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageJob {
    pub url: String,
    pub attraction_id: i64,
    pub page_index: usize,
}
