use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Response,
};
use ehbc_core::collection_client::{CollectionType, Endpoints};

use crate::route::collection::{handle, AddressQueryParams};

pub async fn handler(
    State(endpoints): State<Arc<Endpoints>>,
    Query(address_query_params): Query<AddressQueryParams>,
) -> Result<Response, (StatusCode, String)> {
    handle(&endpoints, &address_query_params, CollectionType::Organic).await
}
