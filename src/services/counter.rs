//! `go.coffeeshop.proto.counterapi.CounterService`.

use axum::http::Method;
use serde::{Deserialize, Serialize};

use crate::routing::{MethodRegistry, RegistrationError, RouteBinding};

const SERVICE: &str = "go.coffeeshop.proto.counterapi.CounterService";

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    #[prost(int32, tag = "1")]
    #[serde(default, alias = "command_type")]
    pub command_type: i32,
    #[prost(int32, tag = "2")]
    #[serde(alias = "order_source")]
    pub order_source: i32,
    #[prost(int32, tag = "3")]
    pub location: i32,
    #[prost(string, tag = "4")]
    #[serde(alias = "loyalty_member_id")]
    pub loyalty_member_id: String,
    #[prost(message, repeated, tag = "5")]
    #[serde(default, alias = "barista_items")]
    pub barista_items: Vec<CommandItem>,
    #[prost(message, repeated, tag = "6")]
    #[serde(default, alias = "kitchen_items")]
    pub kitchen_items: Vec<CommandItem>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandItem {
    #[prost(int32, tag = "1")]
    #[serde(default, alias = "item_type")]
    pub item_type: i32,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct PlaceOrderResponse {}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct GetListOrderFulfillmentRequest {}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct GetListOrderFulfillmentResponse {
    #[prost(message, repeated, tag = "1")]
    #[serde(default)]
    pub orders: Vec<OrderDto>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDto {
    #[prost(string, tag = "1")]
    #[serde(default)]
    pub id: String,
    #[prost(int32, tag = "2")]
    #[serde(default, alias = "order_source")]
    pub order_source: i32,
    #[prost(string, tag = "3")]
    #[serde(default, alias = "loyalty_member_id")]
    pub loyalty_member_id: String,
    #[prost(int32, tag = "4")]
    #[serde(default, alias = "order_status")]
    pub order_status: i32,
    #[prost(int32, tag = "5")]
    #[serde(default)]
    pub location: i32,
    #[prost(message, repeated, tag = "6")]
    #[serde(default, alias = "line_items")]
    pub line_items: Vec<LineItemDto>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemDto {
    #[prost(string, tag = "1")]
    #[serde(default)]
    pub id: String,
    #[prost(int32, tag = "2")]
    #[serde(default, alias = "item_type")]
    pub item_type: i32,
    #[prost(string, tag = "3")]
    #[serde(default)]
    pub name: String,
    #[prost(double, tag = "4")]
    #[serde(default)]
    pub price: f64,
    #[prost(int32, tag = "5")]
    #[serde(default, alias = "item_status")]
    pub item_status: i32,
    #[prost(bool, tag = "6")]
    #[serde(default, alias = "is_barista_order")]
    pub is_barista_order: bool,
}

fn procedure(method: &str) -> String {
    format!("/{}/{}", SERVICE, method)
}

/// Bind the counter routes.
pub fn register(registry: &mut MethodRegistry) -> Result<(), RegistrationError> {
    registry.register(
        RouteBinding::unary::<GetListOrderFulfillmentRequest, GetListOrderFulfillmentResponse>(
            Method::GET,
            "/v1/fulfillment-orders",
            &procedure("GetListOrderFulfillment"),
        )?,
    )?;
    registry.register(
        RouteBinding::unary::<PlaceOrderRequest, PlaceOrderResponse>(
            Method::POST,
            "/v1/api/orders",
            &procedure("PlaceOrder"),
        )?
        .with_body(),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    use crate::routing::{DecodeError, RequestInput};

    fn decode_order(body: &[u8]) -> Result<PlaceOrderRequest, DecodeError> {
        let mut registry = MethodRegistry::new();
        register(&mut registry).unwrap();
        let route = registry.resolve(&Method::POST, "/v1/api/orders").unwrap();
        let bytes = route.binding.codec.decode_request(
            route.binding.body,
            RequestInput {
                body,
                ..Default::default()
            },
        )?;
        Ok(PlaceOrderRequest::decode(bytes).unwrap())
    }

    #[test]
    fn place_order_accepts_both_field_spellings() {
        let camel = decode_order(
            br#"{"commandType": 0, "orderSource": 1, "location": 2, "loyaltyMemberId": "m-1",
                 "baristaItems": [{"itemType": 3}], "kitchenItems": []}"#,
        )
        .unwrap();
        let snake = decode_order(
            br#"{"order_source": 1, "location": 2, "loyalty_member_id": "m-1",
                 "barista_items": [{"item_type": 3}]}"#,
        )
        .unwrap();
        assert_eq!(camel, snake);
        assert_eq!(camel.barista_items[0].item_type, 3);
    }

    #[test]
    fn place_order_requires_member_and_location() {
        let err = decode_order(br#"{"orderSource": 1}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }
}
