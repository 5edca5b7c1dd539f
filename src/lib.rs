//! inkflow - audio- and pointer-reactive GPU fluid ink.
//!
//! A 2D incompressible fluid drives tracer particles whose paths
//! accumulate into fading ink trails. Pointer drags and audio band
//! energy inject velocity; everything heavy runs in wgpu compute.
//!
//! ```no_run
//! fn main() -> Result<(), inkflow::SimulationError> {
//!     inkflow::run()
//! }
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod forces;
pub mod gpu;
pub mod particles;
pub mod pointer;
pub mod render;
mod shader_utils;
pub mod simulation;
pub mod solver;
pub mod trails;
pub mod window;

pub use audio::{AudioBands, AudioSource, Silence};
pub use config::{Params, RenderMode};
pub use error::{CaptureError, GpuError, SimulationError};
pub use simulation::FluidSim;
pub use window::{run, run_with_source};
