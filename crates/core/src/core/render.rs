//! Scene derivation.
//!
//! [`ViewportRenderer::derive`] turns the current [`SceneModel`] and the
//! profile into a flat list of primitives. It only reads: calling it twice on
//! the same inputs gives the same [`Scene`], and it never touches the model or
//! the connection. Backends (terminal, JSON dump, a real 3D canvas) draw the
//! primitives however they like.

use serde::Serialize;

use crate::grid::generate;
use crate::model::{Axis, Point3, SceneModel, ORIGIN};
use crate::profile::{CameraSpec, ScaleProfile};

pub const TARGET_COLOR: &str = "#ff0000";
pub const GUIDE_COLOR: &str = "#555555";
pub const JOINT_COLOR: &str = "#ffff00";
pub const LINK_COLOR: &str = "#0000ff";
pub const TICK_COLOR: &str = "#000000";

pub fn axis_color(axis: Axis) -> &'static str {
    match axis {
        Axis::X => "#ff0000",
        Axis::Y => "#008000",
        Axis::Z => "#0000ff",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Target,
    Footprint,
    DropLine,
    ChainJoint,
    ChainLink,
    AxisName,
    Tick,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Primitive {
    Marker {
        role: Role,
        position: Point3,
        radius: f64,
        color: &'static str,
    },
    Polyline {
        role: Role,
        points: Vec<Point3>,
        width: f64,
        color: &'static str,
    },
    Label {
        role: Role,
        position: Point3,
        text: String,
        size: f64,
        color: &'static str,
    },
}

impl Primitive {
    pub fn role(&self) -> Role {
        match self {
            Primitive::Marker { role, .. }
            | Primitive::Polyline { role, .. }
            | Primitive::Label { role, .. } => *role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    pub camera: CameraSpec,
    pub primitives: Vec<Primitive>,
}

impl Scene {
    pub fn with_role(&self, role: Role) -> impl Iterator<Item = &Primitive> + '_ {
        self.primitives.iter().filter(move |p| p.role() == role)
    }

    pub fn count(&self, role: Role) -> usize {
        self.with_role(role).count()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ViewportRenderer<'a> {
    profile: &'a ScaleProfile,
}

impl<'a> ViewportRenderer<'a> {
    pub fn new(profile: &'a ScaleProfile) -> Self {
        Self { profile }
    }

    pub fn derive(&self, model: &SceneModel) -> Scene {
        let mut primitives = Vec::new();
        self.push_axes(&mut primitives);
        self.push_target(model, &mut primitives);
        self.push_chain(model, &mut primitives);
        Scene {
            camera: self.profile.camera.clone(),
            primitives,
        }
    }

    fn push_axes(&self, out: &mut Vec<Primitive>) {
        let m = &self.profile.markers;
        for axis in Axis::ALL {
            out.push(Primitive::Label {
                role: Role::AxisName,
                position: axis.point_at(m.axis_label_distance),
                text: axis.to_string(),
                size: m.axis_label_size,
                color: axis_color(axis),
            });
        }

        // One tick sequence, placed three times.
        for axis in Axis::ALL {
            for tick in generate(&self.profile.grid) {
                out.push(Primitive::Label {
                    role: Role::Tick,
                    position: tick_position(axis, tick.value, m.tick_offset),
                    text: tick.label,
                    size: m.tick_label_size,
                    color: TICK_COLOR,
                });
            }
        }
    }

    /// Marker, ground footprint and drop line. Each piece is skipped when an
    /// axis it depends on has never held a valid value.
    fn push_target(&self, model: &SceneModel, out: &mut Vec<Primitive>) {
        let m = &self.profile.markers;
        let target = model.target();
        let (x, y, z) = (
            target.value(Axis::X),
            target.value(Axis::Y),
            target.value(Axis::Z),
        );

        if let (Some(x), Some(y)) = (x, y) {
            out.push(Primitive::Polyline {
                role: Role::Footprint,
                points: vec![ORIGIN, [x, 0.0, 0.0], [x, y, 0.0], [0.0, y, 0.0], ORIGIN],
                width: m.guide_line_width,
                color: GUIDE_COLOR,
            });
            if let Some(z) = z {
                out.push(Primitive::Polyline {
                    role: Role::DropLine,
                    points: vec![[x, y, 0.0], [x, y, z]],
                    width: m.guide_line_width,
                    color: GUIDE_COLOR,
                });
                out.push(Primitive::Marker {
                    role: Role::Target,
                    position: [x, y, z],
                    radius: m.target_radius,
                    color: TARGET_COLOR,
                });
            }
        }
    }

    fn push_chain(&self, model: &SceneModel, out: &mut Vec<Primitive>) {
        let Some(chain) = model
            .outcome()
            .solution()
            .and_then(|s| s.chain.as_deref())
            .filter(|c| !c.is_empty())
        else {
            return;
        };
        let m = &self.profile.markers;

        for &joint in chain {
            out.push(Primitive::Marker {
                role: Role::ChainJoint,
                position: joint,
                radius: m.chain_radius,
                color: JOINT_COLOR,
            });
        }
        out.push(Primitive::Polyline {
            role: Role::ChainLink,
            points: chain.to_vec(),
            width: m.chain_line_width,
            color: LINK_COLOR,
        });
    }
}

fn tick_position(axis: Axis, value: f64, offset: f64) -> Point3 {
    match axis {
        Axis::X => [value, 0.0, offset],
        Axis::Y => [0.0, value, offset],
        Axis::Z => [0.0, 0.0, value + offset],
    }
}
