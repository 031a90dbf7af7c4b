//! Merchant API wire protocol (JSON-RPC 2.0)

pub mod params;
pub mod results;
pub mod rpc;

pub use params::decode_params;
pub use rpc::{Method, RpcError, RpcRequest, RpcResponse};
