use axum::{
    Json,
    extract::State,
};
use serde::Deserialize;

use cr_common::CareerRecord;

use crate::SharedState;
use crate::extract::ApiQuery;

#[derive(Debug, Default, Deserialize)]
pub struct CareerFilter {
    pub location: Option<String>,
}

pub async fn list_careers(
    State(state): State<SharedState>,
    ApiQuery(filter): ApiQuery<CareerFilter>,
) -> Json<Vec<CareerRecord>> {
    let location = filter
        .location
        .as_deref()
        .map(str::trim)
        .filter(|location| !location.is_empty());

    let records = state
        .catalog
        .records()
        .iter()
        .filter(|record| location.is_none_or(|location| record.in_location(location)))
        .cloned()
        .collect();

    Json(records)
}

pub async fn locations(State(state): State<SharedState>) -> Json<Vec<String>> {
    Json(state.catalog.distinct_locations())
}

pub async fn universities(State(state): State<SharedState>) -> Json<Vec<String>> {
    Json(state.catalog.distinct_universities())
}

pub async fn names(State(state): State<SharedState>) -> Json<Vec<String>> {
    Json(state.catalog.distinct_names())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_state;

    #[tokio::test]
    async fn location_filter_is_case_insensitive() {
        let state = test_state();
        let city = state.catalog.distinct_locations()[0].clone();

        let Json(records) = list_careers(
            State(state.clone()),
            ApiQuery(CareerFilter {
                location: Some(city.to_uppercase()),
            }),
        )
        .await;

        assert!(!records.is_empty());
        assert!(records.iter().all(|record| record.in_location(&city)));
    }

    #[tokio::test]
    async fn unknown_location_lists_nothing() {
        let Json(records) = list_careers(
            State(test_state()),
            ApiQuery(CareerFilter {
                location: Some("Atlantis".into()),
            }),
        )
        .await;

        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn names_are_sorted_and_distinct() {
        let Json(names) = names(State(test_state())).await;

        let mut expected = names.clone();
        expected.sort();
        expected.dedup();
        assert_eq!(names, expected);
    }
}
