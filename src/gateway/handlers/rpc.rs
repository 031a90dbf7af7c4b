//! Merchant API endpoint
//!
//! Always answers HTTP 200; success and failure both travel in the JSON-RPC body.
//! Order of checks: body parse → Basic-Auth → method → params → state machine.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, header::AUTHORIZATION},
};
use serde::Serialize;
use serde_json::Value;

use super::super::state::AppState;
use crate::logging::RPC_TRACE_TARGET;
use crate::payment::PaymentError;
use crate::protocol::params::{
    CancelParams, ChangePasswordParams, CheckPerformParams, CreateParams, StatementParams,
    TransactionIdParams,
};
use crate::protocol::results::{
    CancelResult, ChangePasswordResult, CheckPerformResult, CheckResult, CreateResult,
    PerformResult, StatementResult, StatementTransaction,
};
use crate::protocol::{Method, RpcRequest, RpcResponse, decode_params};

/// POST /rpc
pub async fn handle_rpc(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<RpcResponse> {
    let request = match RpcRequest::parse(&body) {
        Ok(req) => req,
        Err(err) => return Json(RpcResponse::failure(Value::Null, &err)),
    };

    let id = request.id.clone();
    let method = request.method.clone();
    tracing::debug!(target: RPC_TRACE_TARGET, method = %method, id = %id, "RPC request");

    match dispatch(&state, &headers, request).await {
        Ok(result) => Json(RpcResponse::success(id, result)),
        Err(err) => {
            if err.is_internal() {
                // Detail stays in the log; the caller gets the fixed envelope
                tracing::error!(method = %method, error = %err, "RPC call failed");
            } else {
                tracing::info!(
                    method = %method,
                    code = err.code(),
                    kind = err.kind(),
                    "RPC call rejected"
                );
            }
            Json(RpcResponse::failure(id, &err))
        }
    }
}

async fn dispatch(
    state: &AppState,
    headers: &HeaderMap,
    request: RpcRequest,
) -> Result<Value, PaymentError> {
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    state.credentials.verify_basic(authorization)?;

    let method = Method::parse(&request.method)
        .ok_or_else(|| PaymentError::MethodNotFound(request.method.clone()))?;
    let params = request.params;
    let machine = &state.machine;

    match method {
        Method::CheckPerformTransaction => {
            let p: CheckPerformParams = decode_params(params)?;
            let account = machine.check_perform(p.amount, &p.account.id).await?;
            to_result(CheckPerformResult::from(&account))
        }
        Method::CreateTransaction => {
            let p: CreateParams = decode_params(params)?;
            let created = machine
                .create(&p.id, p.amount, &p.account.id, p.time)
                .await?;
            to_result(CreateResult::from(&created))
        }
        Method::PerformTransaction => {
            let p: TransactionIdParams = decode_params(params)?;
            let tx = machine.perform(&p.id).await?;
            to_result(PerformResult::from(&tx))
        }
        Method::CancelTransaction => {
            let p: CancelParams = decode_params(params)?;
            let tx = machine.cancel(&p.id, p.reason).await?;
            to_result(CancelResult::from(&tx))
        }
        Method::CheckTransaction => {
            let p: TransactionIdParams = decode_params(params)?;
            let tx = machine.check(&p.id).await?;
            to_result(CheckResult::from(&tx))
        }
        Method::GetStatement => {
            let p: StatementParams = decode_params(params)?;
            let lines = state.statements.build(p.from, p.to).await?;
            to_result(StatementResult {
                transactions: lines.into_iter().map(StatementTransaction::from).collect(),
            })
        }
        Method::ChangePassword => {
            let p: ChangePasswordParams = decode_params(params)?;
            state.credentials.rotate(&p.password)?;
            to_result(ChangePasswordResult { success: true })
        }
    }
}

fn to_result<T: Serialize>(result: T) -> Result<Value, PaymentError> {
    serde_json::to_value(result).map_err(|e| PaymentError::Internal(format!("serialize: {}", e)))
}
