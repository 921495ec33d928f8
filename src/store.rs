//! Persistence gateway for attractions, reviews and users.
//!
//! Every write is an independent insert-or-ignore (or a plain update for
//! attraction rows), so re-running a scrape never duplicates data.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{Attraction, Review, User};

/// Which attractions a run should pick up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttractionFilter {
    All,
    Categories(Vec<String>),
}

impl AttractionFilter {
    /// Parses a comma-separated category list; empty or `all` selects everything.
    pub fn parse(selector: &str) -> Self {
        let categories: Vec<String> = selector
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        if categories.is_empty() || categories.iter().any(|c| c.eq_ignore_ascii_case("all")) {
            AttractionFilter::All
        } else {
            AttractionFilter::Categories(categories)
        }
    }

    pub fn matches(&self, category: Option<&str>) -> bool {
        match self {
            AttractionFilter::All => true,
            AttractionFilter::Categories(categories) => {
                category.is_some_and(|c| categories.iter().any(|wanted| wanted == c))
            }
        }
    }
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Next unscraped attraction matching `filter`, in descending id order,
    /// strictly below `before` when given.
    async fn next_pending(
        &self,
        filter: &AttractionFilter,
        before: Option<i64>,
    ) -> Result<Option<Attraction>, StoreError>;

    /// Writes the location and review count of an existing attraction.
    async fn upsert_attraction(&self, attraction: &Attraction) -> Result<(), StoreError>;

    /// Returns `true` when the review was new.
    async fn upsert_review(&self, review: &Review) -> Result<bool, StoreError>;

    /// Returns `true` when the user was new. Users without a profile are never
    /// written.
    async fn upsert_user(&self, user: &User) -> Result<bool, StoreError>;

    async fn set_scraped(&self, attraction_id: i64, scraped: bool) -> Result<(), StoreError>;
}

/// One write as seen by [`MemoryStore`], in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    AttractionUpserted(i64),
    ReviewUpserted { review_id: i64, attraction_id: i64 },
    UserUpserted(String),
    ScrapedSet { attraction_id: i64, scraped: bool },
}

struct StoredAttraction {
    attraction: Attraction,
    category: Option<String>,
}

/// In-memory store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    attractions: RwLock<BTreeMap<i64, StoredAttraction>>,
    reviews: RwLock<BTreeMap<i64, Review>>,
    users: RwLock<HashMap<String, User>>,
    events: RwLock<Vec<StoreEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_attraction(&self, id: i64, url: &str, category: Option<&str>) {
        self.attractions.write().unwrap().insert(
            id,
            StoredAttraction {
                attraction: Attraction::new(id, url),
                category: category.map(str::to_string),
            },
        );
    }

    pub fn attraction(&self, id: i64) -> Option<Attraction> {
        self.attractions
            .read()
            .unwrap()
            .get(&id)
            .map(|stored| stored.attraction.clone())
    }

    /// Reviews ordered by id.
    pub fn reviews(&self) -> Vec<Review> {
        self.reviews.read().unwrap().values().cloned().collect()
    }

    pub fn user(&self, profile: &str) -> Option<User> {
        self.users.read().unwrap().get(profile).cloned()
    }

    pub fn user_count(&self) -> usize {
        self.users.read().unwrap().len()
    }

    pub fn events(&self) -> Vec<StoreEvent> {
        self.events.read().unwrap().clone()
    }

    fn record(&self, event: StoreEvent) {
        self.events.write().unwrap().push(event);
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn next_pending(
        &self,
        filter: &AttractionFilter,
        before: Option<i64>,
    ) -> Result<Option<Attraction>, StoreError> {
        let attractions = self.attractions.read().unwrap();
        let below = match before {
            Some(upper) => attractions.range(..upper),
            None => attractions.range(..),
        };
        Ok(below
            .rev()
            .map(|(_, stored)| stored)
            .find(|stored| !stored.attraction.scraped && filter.matches(stored.category.as_deref()))
            .map(|stored| stored.attraction.clone()))
    }

    async fn upsert_attraction(&self, attraction: &Attraction) -> Result<(), StoreError> {
        if let Some(stored) = self.attractions.write().unwrap().get_mut(&attraction.id) {
            stored.attraction.location = attraction.location;
            stored.attraction.num_reviews = attraction.num_reviews;
        }
        self.record(StoreEvent::AttractionUpserted(attraction.id));
        Ok(())
    }

    async fn upsert_review(&self, review: &Review) -> Result<bool, StoreError> {
        let inserted = {
            let mut reviews = self.reviews.write().unwrap();
            if reviews.contains_key(&review.id) {
                false
            } else {
                reviews.insert(review.id, review.clone());
                true
            }
        };
        self.record(StoreEvent::ReviewUpserted {
            review_id: review.id,
            attraction_id: review.attraction_id,
        });
        Ok(inserted)
    }

    async fn upsert_user(&self, user: &User) -> Result<bool, StoreError> {
        let Some(profile) = &user.profile else {
            return Ok(false);
        };
        let inserted = {
            let mut users = self.users.write().unwrap();
            if users.contains_key(profile) {
                false
            } else {
                users.insert(profile.clone(), user.clone());
                true
            }
        };
        self.record(StoreEvent::UserUpserted(profile.clone()));
        Ok(inserted)
    }

    async fn set_scraped(&self, attraction_id: i64, scraped: bool) -> Result<(), StoreError> {
        if let Some(stored) = self.attractions.write().unwrap().get_mut(&attraction_id) {
            stored.attraction.scraped = scraped;
        }
        self.record(StoreEvent::ScrapedSet {
            attraction_id,
            scraped,
        });
        Ok(())
    }
}
