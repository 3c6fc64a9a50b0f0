//! The `submit_order` tool.
//!
//! The model calls `submit_order` once the customer has confirmed an order.
//! [`OrderToolHandler`] validates the arguments and forwards the order to an
//! [`OrderSink`]. Every outcome, including bad arguments and sink failures,
//! becomes a [`FunctionResponseData`] the model can narrate.

use crate::config::ToolDefinition;
use crate::error::{RealtimeError, Result};
use crate::events::{FunctionResponseData, ToolCall};
use crate::orchestrator::ToolHandler;
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

/// Name of the order submission function.
pub const SUBMIT_ORDER: &str = "submit_order";

/// Declaration of `submit_order` sent in the session setup.
pub fn submit_order_tool() -> ToolDefinition {
    ToolDefinition::new(SUBMIT_ORDER)
        .with_description(
            "Submits the customer's confirmed order. Call exactly once, immediately after the \
             customer confirms the order summary.",
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "customer_name": {
                    "type": "string",
                    "description": "The customer's name."
                },
                "order_details": {
                    "type": "string",
                    "description": "The confirmed order, including drink modifications, exactly as read back to the customer."
                },
                "order_time": {
                    "type": "string",
                    "description": "Time the order was placed, e.g. 'Tuesday, 14 October 2025, 10:32'."
                }
            },
            "required": ["customer_name", "order_details", "order_time"]
        }))
}

/// A validated order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub customer_name: String,
    pub order_details: String,
    pub order_time: String,
}

#[derive(Debug, Default, Deserialize)]
struct OrderArgs {
    customer_name: Option<String>,
    order_details: Option<String>,
    order_time: Option<String>,
}

impl Order {
    /// Extract an order from call arguments.
    ///
    /// Returns `None` when any field is missing, empty, or not a string.
    pub fn from_arguments(arguments: &serde_json::Value) -> Option<Self> {
        let args: OrderArgs = serde_json::from_value(arguments.clone()).unwrap_or_default();
        let present = |field: Option<String>| field.filter(|value| !value.trim().is_empty());
        Some(Self {
            customer_name: present(args.customer_name)?,
            order_details: present(args.order_details)?,
            order_time: present(args.order_time)?,
        })
    }
}

/// Destination for confirmed orders.
#[async_trait]
pub trait OrderSink: Send + Sync {
    /// Submit one order.
    async fn submit(&self, order: &Order) -> Result<()>;
}

/// Sink that pretends to submit orders, with latency and occasional failure.
#[derive(Debug, Clone)]
pub struct SimulatedOrderSink {
    latency_ms: Range<u64>,
    success_rate: f64,
}

impl Default for SimulatedOrderSink {
    fn default() -> Self {
        Self { latency_ms: 300..1100, success_rate: 0.9 }
    }
}

impl SimulatedOrderSink {
    /// Create a sink with the default latency and success rate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the simulated latency range in milliseconds.
    pub fn with_latency_ms(mut self, latency_ms: Range<u64>) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Override the probability that a submission succeeds.
    pub fn with_success_rate(mut self, success_rate: f64) -> Self {
        self.success_rate = success_rate.clamp(0.0, 1.0);
        self
    }
}

#[async_trait]
impl OrderSink for SimulatedOrderSink {
    async fn submit(&self, order: &Order) -> Result<()> {
        let (delay, succeeded) = {
            let mut rng = rand::rng();
            let delay = if self.latency_ms.is_empty() {
                self.latency_ms.start
            } else {
                rng.random_range(self.latency_ms.clone())
            };
            (delay, rng.random_bool(self.success_rate))
        };
        tokio::time::sleep(Duration::from_millis(delay)).await;

        tracing::info!(
            customer = %order.customer_name,
            details = %order.order_details,
            time = %order.order_time,
            succeeded,
            "Simulated order submission"
        );
        if succeeded {
            Ok(())
        } else {
            Err(RealtimeError::tool("Simulated submission failure"))
        }
    }
}

/// Handles `submit_order` calls against an [`OrderSink`].
#[derive(Clone)]
pub struct OrderToolHandler {
    sink: Arc<dyn OrderSink>,
}

impl OrderToolHandler {
    pub fn new(sink: Arc<dyn OrderSink>) -> Self {
        Self { sink }
    }

    /// Handler backed by [`SimulatedOrderSink`].
    pub fn simulated() -> Self {
        Self::new(Arc::new(SimulatedOrderSink::default()))
    }
}

#[async_trait]
impl ToolHandler for OrderToolHandler {
    async fn execute(&self, call: &ToolCall) -> Result<FunctionResponseData> {
        let Some(arguments) = call.arguments.as_ref() else {
            tracing::warn!(name = %call.name, "Tool call without arguments");
            return Ok(FunctionResponseData::failure(format!(
                "No arguments provided for function {}",
                call.name
            )));
        };

        let Some(order) = Order::from_arguments(arguments) else {
            tracing::warn!(%arguments, "Incomplete submit_order arguments");
            return Ok(FunctionResponseData::failure(
                "Incomplete order data. Please make sure the name, order details, and order time are filled in.",
            ));
        };

        match self.sink.submit(&order).await {
            Ok(()) => Ok(FunctionResponseData::success("Your order has been sent to our system!")
                .with_data(serde_json::to_value(&order)?)),
            Err(e) => {
                tracing::warn!(error = %e, "Order submission failed");
                Ok(FunctionResponseData::failure(
                    "Sorry, there was a problem sending your order to our system.",
                )
                .with_data(json!({ "error": e.to_string() })))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ResponseStatus;

    fn call(arguments: serde_json::Value) -> ToolCall {
        ToolCall::new("call-1", SUBMIT_ORDER, arguments)
    }

    fn instant(success_rate: f64) -> OrderToolHandler {
        OrderToolHandler::new(Arc::new(
            SimulatedOrderSink::new().with_latency_ms(0..0).with_success_rate(success_rate),
        ))
    }

    #[test]
    fn test_declaration_requires_all_fields() {
        let tool = submit_order_tool();
        assert_eq!(tool.name, SUBMIT_ORDER);
        let required = &tool.parameters.unwrap()["required"];
        assert_eq!(required, &json!(["customer_name", "order_details", "order_time"]));
    }

    #[test]
    fn test_order_from_arguments() {
        let order = Order::from_arguments(&json!({
            "customer_name": "Dina",
            "order_details": "1 Latte, iced",
            "order_time": "Tuesday, 10:32"
        }))
        .unwrap();
        assert_eq!(order.customer_name, "Dina");

        assert!(Order::from_arguments(&json!({"customer_name": "Dina"})).is_none());
        assert!(
            Order::from_arguments(&json!({
                "customer_name": "Dina",
                "order_details": "  ",
                "order_time": "now"
            }))
            .is_none()
        );
        assert!(Order::from_arguments(&json!("not an object")).is_none());
    }

    #[tokio::test]
    async fn test_missing_field_is_failure() {
        let response = instant(1.0)
            .execute(&call(json!({"customer_name": "Dina", "order_time": "now"})))
            .await
            .unwrap();
        assert!(response.is_failure());
        assert!(response.message.unwrap().starts_with("Incomplete order data"));
    }

    #[tokio::test]
    async fn test_missing_arguments_is_failure() {
        let call = ToolCall { call_id: "c".into(), name: SUBMIT_ORDER.into(), arguments: None };
        let response = instant(1.0).execute(&call).await.unwrap();
        assert!(response.is_failure());
    }

    #[tokio::test]
    async fn test_success_echoes_order() {
        let response = instant(1.0)
            .execute(&call(json!({
                "customer_name": "Dina",
                "order_details": "1 Latte",
                "order_time": "now"
            })))
            .await
            .unwrap();
        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(
            response.data.unwrap(),
            json!({"customerName": "Dina", "orderDetails": "1 Latte", "orderTime": "now"})
        );
    }

    #[tokio::test]
    async fn test_sink_failure_is_failure_response() {
        let response = instant(0.0)
            .execute(&call(json!({
                "customer_name": "Dina",
                "order_details": "1 Latte",
                "order_time": "now"
            })))
            .await
            .unwrap();
        assert!(response.is_failure());
        assert!(response.data.unwrap()["error"].as_str().unwrap().contains("Simulated"));
    }
}
