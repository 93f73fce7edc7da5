use crate::transport::{TargetMessage, Transport, TransportResponse, await_reply, next_id};
use anyhow::{Result, anyhow};
use serde_json::{Value, json};
use std::sync::Arc;

/// Parses the reply wrapped in a `TargetMessage`, turning a CDP error into `Err`.
pub(crate) fn serde_msg(msg: &TargetMessage) -> Result<Value> {
    let str_msg = msg.params["message"]
        .as_str()
        .ok_or_else(|| anyhow!("Invalid message format"))?;
    let value: Value = serde_json::from_str(str_msg)?;
    if let Some(err) = value.get("error") {
        let text = err["message"].as_str().unwrap_or("unknown error");
        return Err(anyhow!("CDP error: {} ({})", text, err["code"]));
    }
    Ok(value)
}

/// Sends a message to a target and waits for the corresponding response.
pub(crate) async fn send_and_get_msg(
    transport: Arc<Transport>,
    msg_id: usize,
    session_id: &str,
    msg: String,
) -> Result<TargetMessage> {
    let reply = transport.listen_target_msg(msg_id).await?;
    transport
        .send(json!({
            "id": next_id(),
            "method": "Target.sendMessageToTarget",
            "params": { "sessionId": session_id, "message": msg }
        }))
        .await?;

    match await_reply(reply, "target message").await? {
        TransportResponse::Target(res) => Ok(res),
        other => Err(anyhow!("Unexpected response: {:?}", other)),
    }
}
