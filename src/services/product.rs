//! `go.coffeeshop.proto.productapi.ProductService`.

use axum::http::Method;
use serde::{Deserialize, Serialize};

use crate::routing::{MethodRegistry, RegistrationError, RouteBinding};

const SERVICE: &str = "go.coffeeshop.proto.productapi.ProductService";

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct GetItemTypesRequest {}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetItemTypesResponse {
    #[prost(message, repeated, tag = "1")]
    #[serde(default, alias = "item_types")]
    pub item_types: Vec<ItemTypeDto>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct ItemTypeDto {
    #[prost(string, tag = "1")]
    #[serde(default)]
    pub name: String,
    #[prost(int32, tag = "2")]
    #[serde(default)]
    pub r#type: i32,
    #[prost(double, tag = "3")]
    #[serde(default)]
    pub price: f64,
    #[prost(string, tag = "4")]
    #[serde(default)]
    pub image: String,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetItemsByTypeRequest {
    /// Comma-separated item type ids.
    #[prost(string, tag = "1")]
    #[serde(alias = "item_types")]
    pub item_types: String,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct GetItemsByTypeResponse {
    #[prost(message, repeated, tag = "1")]
    #[serde(default)]
    pub items: Vec<ItemDto>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct ItemDto {
    #[prost(double, tag = "1")]
    #[serde(default)]
    pub price: f64,
    #[prost(int32, tag = "2")]
    #[serde(default)]
    pub r#type: i32,
}

fn procedure(method: &str) -> String {
    format!("/{}/{}", SERVICE, method)
}

/// Bind the product routes.
pub fn register(registry: &mut MethodRegistry) -> Result<(), RegistrationError> {
    registry.register(RouteBinding::unary::<GetItemTypesRequest, GetItemTypesResponse>(
        Method::GET,
        "/v1/api/item-types",
        &procedure("GetItemTypes"),
    )?)?;
    registry.register(RouteBinding::unary::<GetItemsByTypeRequest, GetItemsByTypeResponse>(
        Method::GET,
        "/v1/api/items-by-types/{item_types}",
        &procedure("GetItemsByType"),
    )?)?;
    Ok(())
}
