use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

pub const SCHEMA_VERSION: &str = "pmig.v1";

#[derive(Debug, Clone, Serialize, Default)]
pub struct Meta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

/// What a command reports: the preview of a dry run, or the outcome of an applied one.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Body {
    Plan(Value),
    Result(Value),
}

impl Body {
    pub fn plan<T: Serialize>(plan: &T) -> Result<Self, serde_json::Error> {
        Ok(Body::Plan(serde_json::to_value(plan)?))
    }

    pub fn result<T: Serialize>(result: &T) -> Result<Self, serde_json::Error> {
        Ok(Body::Result(serde_json::to_value(result)?))
    }

    fn applied(&self) -> bool { matches!(self, Body::Result(_)) }
}

/// One stdout line per command. `apply` always mirrors the body kind.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub schema_version: &'static str,
    pub time: DateTime<Utc>,
    pub request_id: Uuid,
    pub op: &'static str,
    pub apply: bool,
    #[serde(flatten)]
    pub body: Body,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl Envelope {
    pub fn new(op: &'static str, body: Body, meta: Option<Meta>) -> Self {
        Envelope {
            schema_version: SCHEMA_VERSION,
            time: Utc::now(),
            request_id: Uuid::new_v4(),
            op,
            apply: body.applied(),
            body,
            meta,
        }
    }
}
