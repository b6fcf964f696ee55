pub mod organic;
pub mod recycling;
pub mod refuse;

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
};
use ehbc_core::{
    collection_client::{self, CollectionType, Endpoints, LookupRequest},
    LookupError,
};
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct QueryParams {
    house_number: String,
    postcode: String,
    #[serde(rename = "type")]
    collection_type: CollectionType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressQueryParams {
    house_number: String,
    postcode: String,
}

impl From<QueryParams> for AddressQueryParams {
    fn from(value: QueryParams) -> Self {
        AddressQueryParams {
            house_number: value.house_number,
            postcode: value.postcode,
        }
    }
}

/// Map lookup failures to the status the client should see.
fn status_code(err: &LookupError) -> StatusCode {
    match err {
        LookupError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        LookupError::ResultsNotFound | LookupError::MissingElement { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn error_response(err: LookupError) -> (StatusCode, String) {
    let status_code = status_code(&err);
    if status_code == StatusCode::BAD_GATEWAY {
        warn!(error = %err, "lookup failed");
    }
    (status_code, err.to_string())
}

pub async fn handle(
    endpoints: &Endpoints,
    address_query_params: &AddressQueryParams,
    collection_type: CollectionType,
) -> Result<Response, (StatusCode, String)> {
    let request = LookupRequest::new(
        address_query_params.house_number.as_str(),
        address_query_params.postcode.as_str(),
    )
    .map_err(error_response)?;
    let date = collection_client::lookup_with(endpoints, &request, collection_type)
        .await
        .map_err(error_response)?;
    let response = ([(CONTENT_TYPE, "text/plain; charset=utf-8")], date).into_response();
    Ok(response)
}

/// Handle collection date requests.
///
/// The `house_number`, `postcode` and `type` must be given in the query string.
pub async fn handler(
    State(endpoints): State<Arc<Endpoints>>,
    Query(query_params): Query<QueryParams>,
) -> Result<Response, (StatusCode, String)> {
    let collection_type = query_params.collection_type;
    handle(
        &endpoints,
        &AddressQueryParams::from(query_params),
        collection_type,
    )
    .await
}
