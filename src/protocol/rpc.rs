//! JSON-RPC 2.0 envelope

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::payment::{LocalizedMessage, PaymentError};

pub const JSONRPC_VERSION: &str = "2.0";

/// Incoming request. `params` stays raw until the method is known.
///
/// A missing `method` decodes as empty so the reply can still carry the caller's id
/// (and fail as MethodNotFound).
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Value,
}

impl RpcRequest {
    pub fn parse(body: &[u8]) -> Result<Self, PaymentError> {
        serde_json::from_slice(body).map_err(|e| {
            tracing::debug!(error = %e, "Unparseable RPC body");
            PaymentError::ParseError
        })
    }
}

/// Merchant API methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    CheckPerformTransaction,
    CreateTransaction,
    PerformTransaction,
    CancelTransaction,
    CheckTransaction,
    GetStatement,
    ChangePassword,
}

impl Method {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "CheckPerformTransaction" => Some(Method::CheckPerformTransaction),
            "CreateTransaction" => Some(Method::CreateTransaction),
            "PerformTransaction" => Some(Method::PerformTransaction),
            "CancelTransaction" => Some(Method::CancelTransaction),
            "CheckTransaction" => Some(Method::CheckTransaction),
            "GetStatement" => Some(Method::GetStatement),
            "ChangePassword" => Some(Method::ChangePassword),
            _ => None,
        }
    }
}

/// Error member of the response envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: LocalizedMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<&'static str>,
}

impl From<&PaymentError> for RpcError {
    fn from(err: &PaymentError) -> Self {
        Self {
            code: err.code(),
            message: err.message(),
            data: err.data(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, err: &PaymentError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(RpcError::from(err)),
        }
    }
}
