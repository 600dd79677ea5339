//! Strix Core - strand deformation and instancing for renderer export.
//!
//! This crate provides:
//!
//! - **Strands**: polylines with a transported reference axis and
//!   length-parametrized queries
//! - **Bending**: master shapes remapped to cylinder coordinates and bent
//!   onto strands, with a per-pass cache of prepared masters
//! - **Motion blur**: exact per-key sampling or velocity extrapolation
//! - **Export**: the per-frame pass that assigns masters to strands and
//!   hands renderer nodes to a [`NodeSink`]
//!
//! # Example
//!
//! ```ignore
//! use strix_core::{export_frame, ExportConfig, ExportContext, RecordingSink, Scene};
//!
//! let scene = Scene::from_json(&std::fs::read_to_string("scene.json")?)?;
//! let mut ctx = ExportContext::new(ExportConfig::default());
//! let mut sink = RecordingSink::new();
//! let stats = export_frame(&mut ctx, &scene, &mut sink)?;
//! println!("{} nodes", stats.nodes);
//! ```

pub mod assign;
pub mod attribute;
pub mod cache;
pub mod config;
pub mod context;
pub mod cylinder;
pub mod error;
pub mod exporter;
pub mod hair;
pub mod instance;
pub mod mesh;
pub mod motion;
pub mod nesting;
pub mod output;
pub mod provider;
pub mod scene;
pub mod strand;

// Re-export commonly used types
pub use assign::{Assignment, AssignmentMode, LegacyJitter};
pub use attribute::{AttributeArray, AttributeKind, AttributeScope, AttributeValue, UserAttribute};
pub use cache::{CacheKey, InstanceCache};
pub use config::{ExportConfig, JitterConfig, JitterSource, MotionBlurConfig, ShutterPosition};
pub use context::{AbortSignal, ExportContext, ExportStats};
pub use cylinder::{BoundingCylinder, CylindricalPoint};
pub use error::{ExportError, ExportResult, StrandError};
pub use exporter::export_frame;
pub use hair::{Hair, InstancingSettings, OrientationMode};
pub use instance::{BentShape, MasterInstances, StrandInstance};
pub use mesh::{MasterShape, Mesh, ShapeKind};
pub use motion::{MotionBlurMode, MotionBlurSampler, MotionSamples};
pub use nesting::NestingError;
pub use output::{NodeDesc, NodeGeometry, NodeSink, RecordingSink};
pub use provider::{AttributeProvider, MasterShapeProvider, ObjectId, ObjectKind, StrandSample};
pub use scene::{Scene, SceneError, SceneObject, Transform};
pub use strand::Strand;
