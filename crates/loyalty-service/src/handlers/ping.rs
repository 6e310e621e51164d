//! 存活探针

use axum::extract::State;

use crate::error::Result;
use crate::state::AppState;

/// GET /ping
///
/// 存储可达时返回 `OK!`
pub async fn ping(State(state): State<AppState>) -> Result<&'static str> {
    state.ledger.ping().await?;
    Ok("OK!")
}
