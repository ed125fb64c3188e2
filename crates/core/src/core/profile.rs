//! Scale profiles.
//!
//! A profile bundles everything that differs between deployments: the grid
//! range and step, camera placement, marker sizes, the configuration schema the
//! solver expects, and whether replies carry a joint chain. Two profiles ship
//! built in (`robot_mm` and `unit_cube`); others can be loaded from JSON.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grid::{GridError, GridSpec};
use crate::model::{ArmConfiguration, Sign};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("unknown profile '{0}' (expected robot_mm or unit_cube)")]
    Unknown(String),
    #[error("invalid grid: {0}")]
    Grid(#[from] GridError),
    #[error("{field} must be positive and finite (got {value})")]
    InvalidSize { field: &'static str, value: f64 },
    #[error("default input step {0} is not one of the offered steps")]
    StepNotOffered(f64),
    #[error("profile offers no input steps")]
    NoSteps,
    #[error("failed to read profile file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid profile JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraSpec {
    pub position: [f64; 3],
    /// The scene is Z-up.
    #[serde(default = "default_up")]
    pub up: [f64; 3],
    pub fov_deg: f64,
    pub near: f64,
    pub far: f64,
}

fn default_up() -> [f64; 3] {
    [0.0, 0.0, 1.0]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerSizes {
    pub target_radius: f64,
    pub chain_radius: f64,
    pub chain_line_width: f64,
    pub guide_line_width: f64,
    /// Distance from the origin of the X/Y/Z axis names.
    pub axis_label_distance: f64,
    pub axis_label_size: f64,
    pub tick_label_size: f64,
    /// Lift applied to tick labels so they don't z-fight with the axis.
    pub tick_offset: f64,
}

/// Which configuration selector the solver understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigurationSchema {
    SixDof { default_arm: Sign, default_elbow: Sign },
    Labeled { default_label: String },
}

impl ConfigurationSchema {
    pub fn default_configuration(&self) -> ArmConfiguration {
        match self {
            ConfigurationSchema::SixDof {
                default_arm,
                default_elbow,
            } => ArmConfiguration::SixDof {
                arm: *default_arm,
                elbow: *default_elbow,
            },
            ConfigurationSchema::Labeled { default_label } => ArmConfiguration::Labeled {
                config_label: default_label.clone(),
            },
        }
    }

    /// Whether `config` is the variant this schema expects.
    pub fn accepts(&self, config: &ArmConfiguration) -> bool {
        matches!(
            (self, config),
            (ConfigurationSchema::SixDof { .. }, ArmConfiguration::SixDof { .. })
                | (ConfigurationSchema::Labeled { .. }, ArmConfiguration::Labeled { .. })
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleProfile {
    pub name: String,
    pub grid: GridSpec,
    pub camera: CameraSpec,
    pub markers: MarkerSizes,
    pub schema: ConfigurationSchema,
    /// Replies carry `coords_0_1..coords_0_4`.
    pub expects_chain: bool,
    pub default_target: [f64; 3],
    pub input_steps: Vec<f64>,
    pub default_step: f64,
}

impl ScaleProfile {
    /// Physical robot, millimetres, arm/elbow selectors.
    pub fn robot_mm() -> Self {
        Self {
            name: "robot_mm".to_string(),
            grid: GridSpec {
                min: -950.0,
                max: 950.0,
                step: 100.0,
            },
            camera: CameraSpec {
                position: [1100.0, 1100.0, 1700.0],
                up: default_up(),
                fov_deg: 50.0,
                near: 1.0,
                far: 5000.0,
            },
            markers: MarkerSizes {
                target_radius: 6.0,
                chain_radius: 6.0,
                chain_line_width: 4.0,
                guide_line_width: 1.0,
                axis_label_distance: 1000.0,
                axis_label_size: 50.0,
                tick_label_size: 10.0,
                tick_offset: 0.01,
            },
            schema: ConfigurationSchema::SixDof {
                default_arm: Sign::Positive,
                default_elbow: Sign::Positive,
            },
            expects_chain: true,
            default_target: [-149.09, 848.20, 20.23],
            input_steps: vec![0.01, 0.1, 1.0, 10.0, 50.0],
            default_step: 0.01,
        }
    }

    /// Normalized unit cube, named configurations, no joint chain.
    pub fn unit_cube() -> Self {
        Self {
            name: "unit_cube".to_string(),
            grid: GridSpec {
                min: -1.0,
                max: 1.0,
                step: 0.25,
            },
            camera: CameraSpec {
                position: [1.6, 1.6, 2.4],
                up: default_up(),
                fov_deg: 50.0,
                near: 0.01,
                far: 10.0,
            },
            markers: MarkerSizes {
                target_radius: 0.03,
                chain_radius: 0.03,
                chain_line_width: 4.0,
                guide_line_width: 1.0,
                axis_label_distance: 1.2,
                axis_label_size: 0.08,
                tick_label_size: 0.04,
                tick_offset: 0.001,
            },
            schema: ConfigurationSchema::Labeled {
                default_label: "default".to_string(),
            },
            expects_chain: false,
            default_target: [0.25, 0.25, 0.25],
            input_steps: vec![0.001, 0.01, 0.05, 0.1],
            default_step: 0.01,
        }
    }

    pub fn builtin(name: &str) -> Result<Self, ProfileError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "robot_mm" | "robot" | "mm" => Ok(Self::robot_mm()),
            "unit_cube" | "unit" | "normalized" => Ok(Self::unit_cube()),
            other => Err(ProfileError::Unknown(other.to_string())),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ProfileError> {
        let profile: Self = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        self.grid.validate()?;

        let m = &self.markers;
        let sizes = [
            ("markers.target_radius", m.target_radius),
            ("markers.chain_radius", m.chain_radius),
            ("markers.chain_line_width", m.chain_line_width),
            ("markers.guide_line_width", m.guide_line_width),
            ("markers.axis_label_distance", m.axis_label_distance),
            ("markers.axis_label_size", m.axis_label_size),
            ("markers.tick_label_size", m.tick_label_size),
            ("camera.fov_deg", self.camera.fov_deg),
            ("camera.near", self.camera.near),
            ("camera.far", self.camera.far),
        ];
        for (field, value) in sizes {
            if !(value.is_finite() && value > 0.0) {
                return Err(ProfileError::InvalidSize { field, value });
            }
        }

        if self.input_steps.is_empty() {
            return Err(ProfileError::NoSteps);
        }
        for &step in &self.input_steps {
            if !(step.is_finite() && step > 0.0) {
                return Err(ProfileError::InvalidSize {
                    field: "input_steps",
                    value: step,
                });
            }
        }
        if !self.offers_step(self.default_step) {
            return Err(ProfileError::StepNotOffered(self.default_step));
        }
        Ok(())
    }

    pub fn offers_step(&self, step: f64) -> bool {
        self.input_steps.iter().any(|s| (s - step).abs() < 1e-12)
    }
}

impl Default for ScaleProfile {
    fn default() -> Self {
        Self::robot_mm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_valid() {
        ScaleProfile::robot_mm().validate().unwrap();
        ScaleProfile::unit_cube().validate().unwrap();
    }

    #[test]
    fn builtins_pick_their_schema() {
        let robot = ScaleProfile::builtin("robot_mm").unwrap();
        assert!(matches!(
            robot.schema.default_configuration(),
            ArmConfiguration::SixDof {
                arm: Sign::Positive,
                elbow: Sign::Positive
            }
        ));
        assert!(robot.expects_chain);

        let cube = ScaleProfile::builtin("Unit_Cube").unwrap();
        assert_eq!(
            cube.schema.default_configuration(),
            ArmConfiguration::Labeled {
                config_label: "default".to_string()
            }
        );
        assert!(!cube.expects_chain);

        assert!(matches!(
            ScaleProfile::builtin("bogus"),
            Err(ProfileError::Unknown(_))
        ));
    }

    #[test]
    fn json_profile_round_trips_through_validation() {
        let json = serde_json::to_string(&ScaleProfile::unit_cube()).unwrap();
        let loaded = ScaleProfile::from_json_str(&json).unwrap();
        assert_eq!(loaded, ScaleProfile::unit_cube());
    }

    #[test]
    fn json_profile_uses_signed_selectors() {
        let mut value = serde_json::to_value(ScaleProfile::robot_mm()).unwrap();
        assert_eq!(value["schema"]["kind"], "six_dof");
        assert_eq!(value["schema"]["default_arm"], 1);

        value["schema"]["default_elbow"] = serde_json::json!(-1);
        let loaded = ScaleProfile::from_json_str(&value.to_string()).unwrap();
        assert_eq!(
            loaded.schema,
            ConfigurationSchema::SixDof {
                default_arm: Sign::Positive,
                default_elbow: Sign::Negative
            }
        );
    }

    #[test]
    fn validation_rejects_broken_profiles() {
        let mut p = ScaleProfile::robot_mm();
        p.grid.step = 0.0;
        assert!(matches!(p.validate(), Err(ProfileError::Grid(_))));

        let mut p = ScaleProfile::robot_mm();
        p.markers.target_radius = -1.0;
        assert!(matches!(
            p.validate(),
            Err(ProfileError::InvalidSize {
                field: "markers.target_radius",
                ..
            })
        ));

        let mut p = ScaleProfile::robot_mm();
        p.default_step = 3.0;
        assert!(matches!(p.validate(), Err(ProfileError::StepNotOffered(_))));

        let mut p = ScaleProfile::robot_mm();
        p.input_steps.clear();
        assert!(matches!(p.validate(), Err(ProfileError::NoSteps)));

        let mut p = ScaleProfile::robot_mm();
        p.grid.min = -1e300;
        p.grid.max = 1e300;
        p.grid.step = 1.0;
        assert!(matches!(
            p.validate(),
            Err(ProfileError::Grid(GridError::TooManyTicks { .. }))
        ));
    }
}
