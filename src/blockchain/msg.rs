//! Domain messages carried by transactions.

use serde_json::Value;
use std::fmt;

/// Route of the service module; its transactions are subject to the
/// server-side size limit.
pub const SERVICE_ROUTE: &str = "service";

/// A message that can be placed in a transaction.
///
/// Encoding beyond `type_url` + JSON `value` belongs to the codec layer.
pub trait Msg: Send + Sync + fmt::Debug {
    /// Module that handles this message.
    fn route(&self) -> &str;

    /// Fully-qualified type name, e.g. `/cosmos.bank.v1beta1.MsgSend`.
    fn type_url(&self) -> &str;

    /// Stateless self-check run before any network interaction.
    fn validate_basic(&self) -> Result<(), String>;

    /// JSON body of the message.
    fn value(&self) -> Value;

    /// Whether transactions containing this message are checked against the
    /// server-reported size limit.
    fn is_size_governed(&self) -> bool {
        self.route() == SERVICE_ROUTE
    }
}

/// Generic message whose body is already JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonMsg {
    route: String,
    type_url: String,
    value: Value,
}

impl JsonMsg {
    pub fn new(route: impl Into<String>, type_url: impl Into<String>, value: Value) -> Self {
        Self {
            route: route.into(),
            type_url: type_url.into(),
            value,
        }
    }
}

impl Msg for JsonMsg {
    fn route(&self) -> &str {
        &self.route
    }

    fn type_url(&self) -> &str {
        &self.type_url
    }

    fn validate_basic(&self) -> Result<(), String> {
        if self.route.is_empty() {
            return Err("route must not be empty".to_string());
        }
        if !self.type_url.starts_with('/') {
            return Err(format!("type url '{}' must start with '/'", self.type_url));
        }
        if !self.value.is_object() {
            return Err("value must be a JSON object".to_string());
        }
        Ok(())
    }

    fn value(&self) -> Value {
        self.value.clone()
    }
}
