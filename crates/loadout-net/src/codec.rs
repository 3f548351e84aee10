//! JSON wire codec

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::NetError;

/// Encode a message into a text frame
pub fn encode<T: Serialize>(message: &T) -> Result<String, NetError> {
    Ok(serde_json::to_string(message)?)
}

/// Decode a text frame into a message
pub fn decode<T: DeserializeOwned>(frame: &str) -> Result<T, NetError> {
    Ok(serde_json::from_str(frame)?)
}
