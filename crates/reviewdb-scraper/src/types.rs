use chrono::{DateTime, Utc};
use reviewdb_core::{AppRef, Review};
use serde::Deserialize;

/// Body of `GET /v1/catalog/{country}/apps/{id}/reviews`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewsResponse {
    pub data: Vec<ReviewResource>,
    #[serde(default)]
    pub next: Option<String>,
}

/// One entry of the `data` array.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewResource {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub attributes: ReviewAttributes,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewAttributes {
    pub date: DateTime<Utc>,
    pub rating: i64,
    pub user_name: String,
    pub review: String,
    pub title: Option<String>,
    #[serde(default)]
    pub is_edited: bool,
    pub developer_response: Option<DeveloperResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeveloperResponse {
    pub body: String,
}

/// One decoded page of reviews.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewPage {
    /// Cursor this page was requested with.
    pub cursor: String,
    pub reviews: Vec<Review>,
    /// Cursor for the following page; `None` ends pagination.
    pub next_cursor: Option<String>,
}

impl ReviewResource {
    /// Converts the wire shape into a normalized [`Review`] for `app`.
    ///
    /// # Errors
    ///
    /// Returns the reason as a string when the rating is outside `1..=5` or
    /// the reviewer name is blank.
    pub fn into_review(self, app: &AppRef) -> Result<Review, String> {
        let attrs = self.attributes;
        let rating = Review::checked_rating(attrs.rating).map_err(|e| e.to_string())?;

        let reviewer_name = attrs.user_name.trim().to_owned();
        if reviewer_name.is_empty() {
            return Err(format!(
                "review {} has an empty userName",
                self.id.as_deref().unwrap_or("<no id>")
            ));
        }

        Ok(Review {
            app_id: app.app_id.clone(),
            app_name: app.display_name(),
            country: app.country.clone(),
            rating,
            title: attrs
                .title
                .map(|t| t.trim().to_owned())
                .filter(|t| !t.is_empty()),
            body: Review::normalize_body(&attrs.review),
            reviewer_name,
            date: attrs.date,
            is_edited: attrs.is_edited,
            developer_response: attrs
                .developer_response
                .map(|r| Review::normalize_body(&r.body))
                .filter(|b| !b.is_empty()),
            review_id: self.id,
        })
    }
}
