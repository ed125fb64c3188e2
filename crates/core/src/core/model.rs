//! The visualization state owned by a view.
//!
//! [`SceneModel`] is the only mutable state in the pipeline: the target being
//! edited, the configuration selector, the mirrored connection state, and the
//! outcome of the latest request. Everything drawn on screen is derived from it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::float_fmt::{decimals_for_step, fmt_f64_fixed, LABEL_DECIMALS};
use crate::profile::ScaleProfile;
use crate::protocol::{Reply, RequestId};

pub type Point3 = [f64; 3];

pub const ORIGIN: Point3 = [0.0, 0.0, 0.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// Unit vector scaled by `distance` along this axis.
    pub fn point_at(self, distance: f64) -> Point3 {
        let mut p = ORIGIN;
        p[self.index()] = distance;
        p
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        })
    }
}

impl FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "x" | "X" => Ok(Axis::X),
            "y" | "Y" => Ok(Axis::Y),
            "z" | "Z" => Ok(Axis::Z),
            other => Err(format!("unknown axis '{other}'")),
        }
    }
}

/// A ±1 selector. Serialized as the bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Sign {
    Positive,
    Negative,
}

impl Sign {
    pub fn value(self) -> i8 {
        match self {
            Sign::Positive => 1,
            Sign::Negative => -1,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Sign::Positive => Sign::Negative,
            Sign::Negative => Sign::Positive,
        }
    }
}

impl From<Sign> for i8 {
    fn from(sign: Sign) -> i8 {
        sign.value()
    }
}

impl TryFrom<i8> for Sign {
    type Error = String;

    fn try_from(v: i8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Sign::Positive),
            -1 => Ok(Sign::Negative),
            other => Err(format!("selector must be 1 or -1 (got {other})")),
        }
    }
}

impl FromStr for Sign {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" | "+1" | "+" => Ok(Sign::Positive),
            "-1" | "-" => Ok(Sign::Negative),
            other => Err(format!("selector must be 1 or -1 (got '{other}')")),
        }
    }
}

/// Selects one of the solver's inverse-kinematics branches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArmConfiguration {
    SixDof { arm: Sign, elbow: Sign },
    Labeled { config_label: String },
}

impl ArmConfiguration {
    pub fn describe(&self) -> String {
        match self {
            ArmConfiguration::SixDof { arm, elbow } => {
                format!("{} / {}", arm_label(*arm), elbow_label(*elbow))
            }
            ArmConfiguration::Labeled { config_label } => format!("config '{config_label}'"),
        }
    }
}

pub fn arm_label(arm: Sign) -> &'static str {
    match arm {
        Sign::Positive => "right arm",
        Sign::Negative => "left arm",
    }
}

pub fn elbow_label(elbow: Sign) -> &'static str {
    match elbow {
        Sign::Positive => "elbow up",
        Sign::Negative => "elbow down",
    }
}

/// One coordinate field as the user types it.
///
/// The raw text and the last value that parsed are kept apart: an unparsable
/// edit never turns into zero, it just leaves `value()` where it was.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisInput {
    raw: String,
    last_valid: Option<f64>,
    raw_is_valid: bool,
}

impl AxisInput {
    pub fn new(value: f64) -> Self {
        let mut input = Self::empty();
        input.set_raw(value.to_string());
        input
    }

    /// Seed the text with `value` shown at a fixed number of decimals.
    pub fn with_decimals(value: f64, decimals: usize) -> Self {
        let mut input = Self::empty();
        input.set_raw(fmt_f64_fixed(value, decimals));
        input
    }

    pub fn empty() -> Self {
        Self {
            raw: String::new(),
            last_valid: None,
            raw_is_valid: false,
        }
    }

    /// Replace the raw text. Returns the parsed value when the text is a
    /// finite number.
    pub fn set_raw(&mut self, text: impl Into<String>) -> Option<f64> {
        self.raw = text.into();
        match self.raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => {
                self.last_valid = Some(v);
                self.raw_is_valid = true;
                Some(v)
            }
            _ => {
                self.raw_is_valid = false;
                None
            }
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Last successfully parsed value.
    pub fn value(&self) -> Option<f64> {
        self.last_valid
    }

    /// True when the text currently shown is what `value()` reports.
    pub fn is_current(&self) -> bool {
        self.raw_is_valid
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetPosition {
    axes: [AxisInput; 3],
}

impl TargetPosition {
    pub fn new(p: Point3) -> Self {
        Self {
            axes: [AxisInput::new(p[0]), AxisInput::new(p[1]), AxisInput::new(p[2])],
        }
    }

    /// Like [`TargetPosition::new`], with each axis written the way a nudge
    /// of `step` would write it.
    pub fn for_step(p: Point3, step: f64) -> Self {
        let decimals = input_decimals(step);
        Self {
            axes: p.map(|v| AxisInput::with_decimals(v, decimals)),
        }
    }

    pub fn axis(&self, axis: Axis) -> &AxisInput {
        &self.axes[axis.index()]
    }

    pub fn axis_mut(&mut self, axis: Axis) -> &mut AxisInput {
        &mut self.axes[axis.index()]
    }

    pub fn value(&self, axis: Axis) -> Option<f64> {
        self.axis(axis).value()
    }

    /// All three axes, or the first axis that never held a valid value.
    pub fn resolve(&self) -> Result<Point3, Axis> {
        let mut p = ORIGIN;
        for axis in Axis::ALL {
            p[axis.index()] = self.value(axis).ok_or(axis)?;
        }
        Ok(p)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub theta_deg: [f64; 3],
    /// Joint coordinates T0_1..T0_4, when the profile's solver reports them.
    pub chain: Option<Vec<Point3>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SolverOutcome {
    /// Nothing sent yet.
    #[default]
    None,
    Pending {
        request: RequestId,
    },
    Success(Solution),
    Failure {
        message: String,
    },
}

impl SolverOutcome {
    pub fn solution(&self) -> Option<&Solution> {
        match self {
            SolverOutcome::Success(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, SolverOutcome::Pending { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    Connecting,
    Open,
    #[default]
    Closed,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
            ConnectionState::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditError {
    #[error("profile '{profile}' uses a different configuration selector")]
    WrongSchema { profile: String },
    #[error("step {0} is not offered by this profile")]
    StepNotOffered(f64),
    #[error("{0} has no valid value to nudge from")]
    NothingToNudge(Axis),
}

/// What applying a reply did to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Replaced,
    /// The reply echoed an id other than the outstanding request.
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneModel {
    target: TargetPosition,
    configuration: ArmConfiguration,
    input_step: f64,
    connection: ConnectionState,
    outcome: SolverOutcome,
    next_request: u64,
}

impl SceneModel {
    pub fn new(profile: &ScaleProfile) -> Self {
        Self {
            target: TargetPosition::for_step(profile.default_target, profile.default_step),
            configuration: profile.schema.default_configuration(),
            input_step: profile.default_step,
            connection: ConnectionState::Closed,
            outcome: SolverOutcome::None,
            next_request: 1,
        }
    }

    pub fn target(&self) -> &TargetPosition {
        &self.target
    }

    pub fn configuration(&self) -> &ArmConfiguration {
        &self.configuration
    }

    pub fn input_step(&self) -> f64 {
        self.input_step
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn outcome(&self) -> &SolverOutcome {
        &self.outcome
    }

    /// Replace the whole target, e.g. to go back to the profile default.
    pub fn reset_target(&mut self, target: TargetPosition) {
        self.target = target;
    }

    pub fn set_axis_text(&mut self, axis: Axis, text: impl Into<String>) -> Option<f64> {
        self.target.axis_mut(axis).set_raw(text)
    }

    /// Move `axis` one input step from its last valid value and rewrite the
    /// text with the step's precision (never fewer than two decimals).
    pub fn nudge(&mut self, axis: Axis, direction: Sign) -> Result<f64, EditError> {
        let current = self
            .target
            .value(axis)
            .ok_or(EditError::NothingToNudge(axis))?;
        let next = current + f64::from(direction.value()) * self.input_step;
        let text = fmt_f64_fixed(next, input_decimals(self.input_step));
        self.target.axis_mut(axis).set_raw(text);
        Ok(self.target.value(axis).unwrap_or(next))
    }

    pub fn set_input_step(&mut self, step: f64, profile: &ScaleProfile) -> Result<(), EditError> {
        if !profile.offers_step(step) {
            return Err(EditError::StepNotOffered(step));
        }
        self.input_step = step;
        Ok(())
    }

    pub fn set_configuration(
        &mut self,
        configuration: ArmConfiguration,
        profile: &ScaleProfile,
    ) -> Result<(), EditError> {
        if !profile.schema.accepts(&configuration) {
            return Err(EditError::WrongSchema {
                profile: profile.name.clone(),
            });
        }
        self.configuration = configuration;
        Ok(())
    }

    pub fn set_arm(&mut self, arm: Sign, profile: &ScaleProfile) -> Result<(), EditError> {
        match &mut self.configuration {
            ArmConfiguration::SixDof { arm: a, .. } => {
                *a = arm;
                Ok(())
            }
            ArmConfiguration::Labeled { .. } => Err(wrong_schema(profile)),
        }
    }

    pub fn set_elbow(&mut self, elbow: Sign, profile: &ScaleProfile) -> Result<(), EditError> {
        match &mut self.configuration {
            ArmConfiguration::SixDof { elbow: e, .. } => {
                *e = elbow;
                Ok(())
            }
            ArmConfiguration::Labeled { .. } => Err(wrong_schema(profile)),
        }
    }

    pub fn set_config_label(
        &mut self,
        label: impl Into<String>,
        profile: &ScaleProfile,
    ) -> Result<(), EditError> {
        match &mut self.configuration {
            ArmConfiguration::Labeled { config_label } => {
                *config_label = label.into();
                Ok(())
            }
            ArmConfiguration::SixDof { .. } => Err(wrong_schema(profile)),
        }
    }

    pub fn set_connection(&mut self, state: ConnectionState) {
        if self.connection != state {
            debug!(from = %self.connection, to = %state, "connection state mirrored");
            self.connection = state;
        }
    }

    /// Id the next request will carry. Only consumed by [`Self::commit_request`].
    pub fn peek_request_id(&self) -> RequestId {
        RequestId(self.next_request)
    }

    /// Record that `id` was handed to the transport.
    pub fn commit_request(&mut self, id: RequestId) {
        self.next_request = self.next_request.max(id.0 + 1);
        self.outcome = SolverOutcome::Pending { request: id };
    }

    /// Id of the most recently committed request, if any.
    pub fn last_issued(&self) -> Option<RequestId> {
        (self.next_request > 1).then(|| RequestId(self.next_request - 1))
    }

    pub fn outstanding_request(&self) -> Option<RequestId> {
        match self.outcome {
            SolverOutcome::Pending { request } => Some(request),
            _ => None,
        }
    }

    /// Replace the outcome with a decoded reply, all at once.
    ///
    /// A reply that echoes an id other than the last one issued is dropped,
    /// pending or not. Replies without an id always apply.
    pub fn apply(&mut self, reply: Reply) -> Applied {
        if let Some(echoed) = reply.request_id {
            let latest = self.last_issued();
            if latest != Some(echoed) {
                warn!(%echoed, ?latest, "dropping reply for a superseded request");
                return Applied::Stale;
            }
        }
        self.outcome = reply.outcome;
        Applied::Replaced
    }

    /// Turn a still-pending `request` into a failure.
    pub fn fail_pending(&mut self, request: RequestId, message: impl Into<String>) -> bool {
        if self.outstanding_request() != Some(request) {
            return false;
        }
        self.outcome = SolverOutcome::Failure {
            message: message.into(),
        };
        true
    }
}

fn wrong_schema(profile: &ScaleProfile) -> EditError {
    EditError::WrongSchema {
        profile: profile.name.clone(),
    }
}

/// Decimals used when writing an axis value edited in steps of `step`.
fn input_decimals(step: f64) -> usize {
    decimals_for_step(step).max(LABEL_DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(chain: Option<Vec<Point3>>) -> Reply {
        Reply {
            request_id: None,
            outcome: SolverOutcome::Success(Solution {
                theta_deg: [12.5, -3.2, 45.0],
                chain,
            }),
        }
    }

    #[test]
    fn unparsable_text_keeps_last_valid_value() {
        let mut input = AxisInput::new(20.23);
        assert_eq!(input.value(), Some(20.23));
        assert!(input.is_current());

        assert_eq!(input.set_raw("20.2x"), None);
        assert_eq!(input.raw(), "20.2x");
        assert_eq!(input.value(), Some(20.23));
        assert!(!input.is_current());

        assert_eq!(input.set_raw(" -7.5 "), Some(-7.5));
        assert_eq!(input.value(), Some(-7.5));
    }

    #[test]
    fn empty_and_non_finite_text_never_becomes_a_value() {
        let mut input = AxisInput::empty();
        assert_eq!(input.set_raw(""), None);
        assert_eq!(input.set_raw("NaN"), None);
        assert_eq!(input.set_raw("inf"), None);
        assert_eq!(input.value(), None);
    }

    #[test]
    fn resolve_reports_first_missing_axis() {
        let mut target = TargetPosition::new([1.0, 2.0, 3.0]);
        assert_eq!(target.resolve(), Ok([1.0, 2.0, 3.0]));

        *target.axis_mut(Axis::Y) = AxisInput::empty();
        target.axis_mut(Axis::Y).set_raw("abc");
        assert_eq!(target.resolve(), Err(Axis::Y));
    }

    #[test]
    fn default_model_follows_profile() {
        let profile = ScaleProfile::robot_mm();
        let model = SceneModel::new(&profile);
        assert_eq!(model.target().axis(Axis::X).raw(), "-149.09");
        assert_eq!(model.target().axis(Axis::Y).raw(), "848.20");
        assert_eq!(model.target().resolve(), Ok([-149.09, 848.2, 20.23]));
        assert_eq!(model.connection(), ConnectionState::Closed);
        assert_eq!(model.outcome(), &SolverOutcome::None);
        assert_eq!(model.input_step(), 0.01);
    }

    #[test]
    fn seeded_text_matches_step_precision() {
        let target = TargetPosition::for_step([1.0, 848.2, -0.5], 0.001);
        let raws: Vec<&str> = Axis::ALL.iter().map(|a| target.axis(*a).raw()).collect();
        assert_eq!(raws, ["1.000", "848.200", "-0.500"]);
        assert_eq!(target.resolve(), Ok([1.0, 848.2, -0.5]));

        let coarse = TargetPosition::for_step([848.2, 0.0, 0.0], 10.0);
        assert_eq!(coarse.axis(Axis::X).raw(), "848.20");
    }

    #[test]
    fn nudge_uses_step_precision() {
        let profile = ScaleProfile::robot_mm();
        let mut model = SceneModel::new(&profile);

        let v = model.nudge(Axis::X, Sign::Positive).unwrap();
        assert!((v - (-149.08)).abs() < 1e-9);
        assert_eq!(model.target().axis(Axis::X).raw(), "-149.08");

        model.set_input_step(10.0, &profile).unwrap();
        model.nudge(Axis::Z, Sign::Negative).unwrap();
        assert_eq!(model.target().axis(Axis::Z).raw(), "10.23");

        assert_eq!(
            model.set_input_step(3.0, &profile),
            Err(EditError::StepNotOffered(3.0))
        );
    }

    #[test]
    fn selectors_respect_schema() {
        let robot = ScaleProfile::robot_mm();
        let mut model = SceneModel::new(&robot);
        model.set_arm(Sign::Negative, &robot).unwrap();
        model.set_elbow(Sign::Negative, &robot).unwrap();
        assert_eq!(
            model.configuration(),
            &ArmConfiguration::SixDof {
                arm: Sign::Negative,
                elbow: Sign::Negative
            }
        );
        assert!(model.set_config_label("lefty", &robot).is_err());
        assert!(model
            .set_configuration(
                ArmConfiguration::Labeled {
                    config_label: "x".into()
                },
                &robot
            )
            .is_err());

        let cube = ScaleProfile::unit_cube();
        let mut model = SceneModel::new(&cube);
        model.set_config_label("lefty", &cube).unwrap();
        assert_eq!(model.configuration().describe(), "config 'lefty'");
        assert!(model.set_arm(Sign::Positive, &cube).is_err());
    }

    #[test]
    fn failure_clears_angles_and_chain_together() {
        let profile = ScaleProfile::robot_mm();
        let mut model = SceneModel::new(&profile);
        model.apply(success(Some(vec![ORIGIN, [10.0, 20.0, 30.0], ORIGIN, ORIGIN])));
        assert!(model.outcome().solution().is_some());

        model.apply(Reply {
            request_id: None,
            outcome: SolverOutcome::Failure {
                message: "unreachable target".to_string(),
            },
        });
        assert_eq!(
            model.outcome(),
            &SolverOutcome::Failure {
                message: "unreachable target".to_string()
            }
        );
        assert!(model.outcome().solution().is_none());
    }

    #[test]
    fn request_ids_increase_and_gate_stale_replies() {
        let profile = ScaleProfile::robot_mm();
        let mut model = SceneModel::new(&profile);

        let first = model.peek_request_id();
        assert_eq!(first, model.peek_request_id());
        model.commit_request(first);
        let second = model.peek_request_id();
        assert!(second > first);
        model.commit_request(second);
        assert_eq!(model.outstanding_request(), Some(second));

        let mut stale = success(None);
        stale.request_id = Some(first);
        assert_eq!(model.apply(stale), Applied::Stale);
        assert!(model.outcome().is_pending());

        let mut fresh = success(None);
        fresh.request_id = Some(second);
        assert_eq!(model.apply(fresh), Applied::Replaced);
        assert!(model.outcome().solution().is_some());
        assert_eq!(model.last_issued(), Some(second));

        let late = Reply {
            request_id: Some(first),
            outcome: SolverOutcome::Failure {
                message: "late".to_string(),
            },
        };
        assert_eq!(model.apply(late), Applied::Stale);
        assert!(model.outcome().solution().is_some());
    }

    #[test]
    fn fail_pending_only_touches_matching_request() {
        let profile = ScaleProfile::robot_mm();
        let mut model = SceneModel::new(&profile);
        let id = model.peek_request_id();
        model.commit_request(id);

        assert!(!model.fail_pending(RequestId(id.0 + 7), "late"));
        assert!(model.outcome().is_pending());
        assert!(model.fail_pending(id, "timed out"));
        assert_eq!(
            model.outcome(),
            &SolverOutcome::Failure {
                message: "timed out".to_string()
            }
        );
    }

    #[test]
    fn sign_parsing_and_labels() {
        assert_eq!("-1".parse::<Sign>(), Ok(Sign::Negative));
        assert_eq!("+1".parse::<Sign>(), Ok(Sign::Positive));
        assert!("0".parse::<Sign>().is_err());
        assert!(Sign::try_from(2i8).is_err());
        assert_eq!(Sign::Positive.flipped(), Sign::Negative);
        assert_eq!(
            ArmConfiguration::SixDof {
                arm: Sign::Positive,
                elbow: Sign::Negative
            }
            .describe(),
            "right arm / elbow down"
        );
    }
}
