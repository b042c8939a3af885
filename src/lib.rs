//! Offline HLSL shader permutation compiler.
//!
//! Reads declarative shader-input descriptions and procedural shader
//! populators, expands each shader stage into its valid permutations,
//! generates matching C++ and HLSL headers, and drives an external
//! compiler once per permutation.

pub mod error;
pub mod logging;
pub mod shaders;
pub mod util;

pub use error::ShaderError;
pub use shaders::build_tasks;
