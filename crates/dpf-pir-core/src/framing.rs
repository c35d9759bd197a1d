//! Text framing for request and response pairs
//!
//! Each field is standard-alphabet base64 of a binary envelope and the pair is
//! a JSON object:
//!
//! ```text
//! {"request1": "<b64>", "request2": "<b64>"}
//! {"response1": "<b64>", "response2": "<b64>"}
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::messages::{PirRequest, PirResponse};

fn b64_decode(field: &str, value: &str) -> crate::Result<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| Error::Decode(format!("{} is not valid base64: {}", field, e)))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPair {
    pub request1: String,
    pub request2: String,
}

impl RequestPair {
    pub fn encode(request1: &PirRequest, request2: &PirRequest) -> crate::Result<Self> {
        Ok(Self {
            request1: STANDARD.encode(request1.to_bytes()?),
            request2: STANDARD.encode(request2.to_bytes()?),
        })
    }

    pub fn decode(&self) -> crate::Result<(PirRequest, PirRequest)> {
        Ok((
            PirRequest::from_bytes(&b64_decode("request1", &self.request1)?)?,
            PirRequest::from_bytes(&b64_decode("request2", &self.request2)?)?,
        ))
    }

    /// Raw envelope bytes, as handed to `DpfPirServer::handle_request`
    pub fn request_bytes(&self) -> crate::Result<(Vec<u8>, Vec<u8>)> {
        Ok((
            b64_decode("request1", &self.request1)?,
            b64_decode("request2", &self.request2)?,
        ))
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePair {
    pub response1: String,
    pub response2: String,
}

impl ResponsePair {
    pub fn encode(response1: &PirResponse, response2: &PirResponse) -> crate::Result<Self> {
        Ok(Self {
            response1: STANDARD.encode(response1.to_bytes()?),
            response2: STANDARD.encode(response2.to_bytes()?),
        })
    }

    pub fn decode(&self) -> crate::Result<(PirResponse, PirResponse)> {
        Ok((
            PirResponse::from_bytes(&b64_decode("response1", &self.response1)?)?,
            PirResponse::from_bytes(&b64_decode("response2", &self.response2)?)?,
        ))
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StatusKind;

    #[test]
    fn test_response_pair_json_shape() {
        let r1 = PirResponse::new(vec![vec![1, 2, 3]]);
        let r2 = PirResponse::new(vec![vec![4, 5, 6]]);
        let pair = ResponsePair::encode(&r1, &r2).unwrap();

        let value: serde_json::Value = serde_json::from_str(&pair.to_json().unwrap()).unwrap();
        assert!(value["response1"].is_string());
        assert!(value["response2"].is_string());

        let parsed = ResponsePair::from_json(&pair.to_json().unwrap()).unwrap();
        assert_eq!(parsed.decode().unwrap(), (r1, r2));
    }

    #[test]
    fn test_bad_base64_is_invalid_argument() {
        let pair = RequestPair {
            request1: "not base64!".to_string(),
            request2: String::new(),
        };
        assert_eq!(pair.decode().unwrap_err().kind(), StatusKind::InvalidArgument);
    }

    #[test]
    fn test_missing_field_is_invalid_argument() {
        let err = ResponsePair::from_json(r#"{"response1": ""}"#).unwrap_err();
        assert_eq!(err.kind(), StatusKind::InvalidArgument);
    }
}
