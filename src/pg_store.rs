use async_trait::async_trait;
use log::info;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::StoreError;
use crate::models::{Attraction, Review, User};
use crate::store::{AttractionFilter, ReviewStore};

/// PostgreSQL (PostGIS) backed store. Expects the `attractions`, `reviews` and
/// `users` tables to exist.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url)
            .await?;
        info!("Connected to database");
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ReviewStore for PgStore {
    async fn next_pending(
        &self,
        filter: &AttractionFilter,
        before: Option<i64>,
    ) -> Result<Option<Attraction>, StoreError> {
        let categories = match filter {
            AttractionFilter::All => None,
            AttractionFilter::Categories(categories) => Some(categories.clone()),
        };
        let row: Option<(i64, String)> = sqlx::query_as(
            r#"SELECT id, url FROM attractions
               WHERE scraped = false
                 AND ($1::bigint IS NULL OR id < $1)
                 AND ($2::text[] IS NULL OR attr_type = ANY($2))
               ORDER BY "id" DESC
               LIMIT 1"#,
        )
        .bind(before)
        .bind(categories)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, url)| Attraction::new(id, url)))
    }

    async fn upsert_attraction(&self, attraction: &Attraction) -> Result<(), StoreError> {
        match attraction.location {
            Some(location) => {
                sqlx::query(
                    "UPDATE attractions SET geom = ST_SetSRID(ST_MakePoint($1, $2), 4326), num_reviews = $3 WHERE id = $4",
                )
                .bind(location.lon)
                .bind(location.lat)
                .bind(attraction.num_reviews)
                .bind(attraction.id)
                .execute(&self.pool)
                .await?;
            }
            None => {
                sqlx::query("UPDATE attractions SET num_reviews = $1 WHERE id = $2")
                    .bind(attraction.num_reviews)
                    .bind(attraction.id)
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }

    async fn upsert_review(&self, review: &Review) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"INSERT INTO reviews (id, title, rating, date, "full", attr_id, user_profile)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               ON CONFLICT DO NOTHING"#,
        )
        .bind(review.id)
        .bind(&review.title)
        .bind(review.rating)
        .bind(&review.date)
        .bind(&review.full_text)
        .bind(review.attraction_id)
        .bind(&review.user_profile)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn upsert_user(&self, user: &User) -> Result<bool, StoreError> {
        let Some(profile) = &user.profile else {
            return Ok(false);
        };
        let result = sqlx::query(
            "INSERT INTO users (profile, location, contributions, helpful_votes) VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING",
        )
        .bind(profile)
        .bind(&user.location)
        .bind(user.contributions)
        .bind(user.helpful_votes)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_scraped(&self, attraction_id: i64, scraped: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE attractions SET scraped = $1 WHERE id = $2")
            .bind(scraped)
            .bind(attraction_id)
            .execute(&self.pool)
            .await?;
        info!("{attraction_id} scraped set to {scraped}");
        Ok(())
    }
}
