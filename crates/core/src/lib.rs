//! # ikviz
//!
//! Client-side core for visualizing a remote inverse-kinematics solver.
//!
//! The crate holds no I/O of its own. A frontend supplies a [`connection::Transport`],
//! feeds transport events and user edits into a [`view::SolverView`], and draws
//! whatever [`render::Scene`] it derives.
//!
//! ## Quick Start
//!
//! ```
//! use ikviz::prelude::*;
//!
//! let profile = ScaleProfile::robot_mm();
//! let mut model = SceneModel::new(&profile);
//! model.set_axis_text(Axis::X, "-120.5");
//!
//! let scene = ViewportRenderer::new(&profile).derive(&model);
//! assert_eq!(scene.count(Role::Target), 1);
//! ```
//!
//! ## Modules
//!
//! - [`grid`]: tick generation along each axis
//! - [`profile`]: scale profiles (robot millimetres, unit cube)
//! - [`model`]: the scene model and its edit operations
//! - [`protocol`]: request encoding and reply interpretation
//! - [`connection`]: connection lifecycle over a pluggable transport
//! - [`render`]: scene derivation
//! - [`view`]: the controller tying them together

pub mod float_fmt;

#[path = "core/grid.rs"]
pub mod grid;

#[path = "core/profile.rs"]
pub mod profile;

#[path = "core/model.rs"]
pub mod model;

#[path = "core/protocol.rs"]
pub mod protocol;

#[path = "core/connection.rs"]
pub mod connection;

#[path = "core/render.rs"]
pub mod render;

#[path = "core/view.rs"]
pub mod view;

/// Prelude module for convenient imports.
///
/// ```
/// use ikviz::prelude::*;
/// ```
pub mod prelude {
    pub use crate::connection::{
        ConnectionController, ConnectionEvent, SendError, Transport, TransportError,
        TransportEvent,
    };
    pub use crate::grid::{GridSpec, GridTick};
    pub use crate::model::{
        ArmConfiguration, Axis, ConnectionState, Point3, SceneModel, Sign, Solution,
        SolverOutcome,
    };
    pub use crate::profile::ScaleProfile;
    pub use crate::protocol::{RequestId, ResponseInterpreter};
    pub use crate::render::{Primitive, Role, Scene, ViewportRenderer};
    pub use crate::view::{SolverView, ViewEvent};
}
