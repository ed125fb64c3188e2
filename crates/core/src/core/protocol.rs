//! Solver wire protocol: JSON requests out, JSON replies in.
//!
//! Requests are flat objects `{X, Y, Z, ...selector}`; the selector is either
//! `arm`/`elbow` (±1) or a `config` label. Replies are classified by
//! [`ResponseInterpreter`] into a success, a solver failure, or an error for
//! messages that are neither.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::{
    ArmConfiguration, Axis, Point3, Sign, Solution, SolverOutcome, TargetPosition, ORIGIN,
};
use crate::profile::ScaleProfile;

pub const THETA_FIELDS: [&str; 3] = ["theta1_deg", "theta2_deg", "theta3_deg"];
pub const CHAIN_FIELDS: [&str; 4] = ["coords_0_1", "coords_0_2", "coords_0_3", "coords_0_4"];
pub const REQUEST_ID_FIELD: &str = "request_id";

/// Monotonic per-view request counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverRequest {
    pub id: RequestId,
    pub position: Point3,
    pub configuration: ArmConfiguration,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("{0} has no valid value; fix the field before sending")]
    MissingAxis(Axis),
}

/// Build a request from the last valid value of each axis.
///
/// Reachability is the solver's business; the only local check is that every
/// axis has a number.
pub fn build_request(
    id: RequestId,
    target: &TargetPosition,
    configuration: &ArmConfiguration,
) -> Result<SolverRequest, RequestError> {
    let position = target.resolve().map_err(RequestError::MissingAxis)?;
    Ok(SolverRequest {
        id,
        position,
        configuration: configuration.clone(),
    })
}

#[derive(Serialize)]
struct WireRequest<'a> {
    #[serde(rename = "X")]
    x: f64,
    #[serde(rename = "Y")]
    y: f64,
    #[serde(rename = "Z")]
    z: f64,
    #[serde(flatten)]
    selector: WireSelector<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<RequestId>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireSelector<'a> {
    SixDof { arm: Sign, elbow: Sign },
    Labeled { config: &'a str },
}

/// Serialize a request. `tag_requests` adds the `request_id` field for
/// solvers that echo it back.
pub fn encode_request(
    request: &SolverRequest,
    tag_requests: bool,
) -> Result<String, serde_json::Error> {
    let selector = match &request.configuration {
        ArmConfiguration::SixDof { arm, elbow } => WireSelector::SixDof {
            arm: *arm,
            elbow: *elbow,
        },
        ArmConfiguration::Labeled { config_label } => WireSelector::Labeled {
            config: config_label,
        },
    };
    let [x, y, z] = request.position;
    serde_json::to_string(&WireRequest {
        x,
        y,
        z,
        selector,
        request_id: tag_requests.then_some(request.id),
    })
}

/// A classified reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Echoed `request_id`, if the solver sent one.
    pub request_id: Option<RequestId>,
    /// Always `Success` or `Failure`.
    pub outcome: SolverOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyError {
    #[error("reply is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("reply is not a JSON object")]
    NotAnObject,
    #[error("unrecognized reply: no `error` and missing {missing:?} (keys present: {present:?})")]
    Unrecognized {
        missing: Vec<&'static str>,
        present: Vec<String>,
    },
    #[error("reply field `{0}` is malformed")]
    MalformedField(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseInterpreter {
    expects_chain: bool,
}

impl ResponseInterpreter {
    pub fn new(expects_chain: bool) -> Self {
        Self { expects_chain }
    }

    pub fn for_profile(profile: &ScaleProfile) -> Self {
        Self::new(profile.expects_chain)
    }

    /// Classify one raw text frame.
    ///
    /// An `error` field wins over everything else. Otherwise all three angles
    /// must be present. Missing chain points become the origin; a chain point
    /// that is present but not three numbers rejects the whole reply.
    pub fn interpret(&self, raw: &str) -> Result<Reply, ReplyError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| ReplyError::InvalidJson(e.to_string()))?;
        let obj = value.as_object().ok_or(ReplyError::NotAnObject)?;

        let request_id = match obj.get(REQUEST_ID_FIELD) {
            None | Some(Value::Null) => None,
            Some(v) => Some(RequestId(
                v.as_u64()
                    .ok_or(ReplyError::MalformedField(REQUEST_ID_FIELD))?,
            )),
        };

        if let Some(message) = error_message(obj) {
            return Ok(Reply {
                request_id,
                outcome: SolverOutcome::Failure { message },
            });
        }

        let mut theta_deg = [0.0; 3];
        let mut missing = Vec::new();
        for (slot, field) in theta_deg.iter_mut().zip(THETA_FIELDS) {
            match obj.get(field) {
                None | Some(Value::Null) => missing.push(field),
                Some(v) => *slot = finite_number(v).ok_or(ReplyError::MalformedField(field))?,
            }
        }
        if !missing.is_empty() {
            return Err(ReplyError::Unrecognized {
                missing,
                present: obj.keys().cloned().collect(),
            });
        }

        let chain = if self.expects_chain {
            let mut points = Vec::with_capacity(CHAIN_FIELDS.len());
            for field in CHAIN_FIELDS {
                let point = match obj.get(field) {
                    None | Some(Value::Null) => ORIGIN,
                    Some(v) => point3(v).ok_or(ReplyError::MalformedField(field))?,
                };
                points.push(point);
            }
            Some(points)
        } else {
            None
        };

        Ok(Reply {
            request_id,
            outcome: SolverOutcome::Success(Solution { theta_deg, chain }),
        })
    }
}

/// `Some` when the reply carries a truthy `error`.
fn error_message(obj: &Map<String, Value>) -> Option<String> {
    match obj.get("error")? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn finite_number(v: &Value) -> Option<f64> {
    v.as_f64().filter(|n| n.is_finite())
}

fn point3(v: &Value) -> Option<Point3> {
    match v.as_array()?.as_slice() {
        [x, y, z] => Some([finite_number(x)?, finite_number(y)?, finite_number(z)?]),
        _ => None,
    }
}
