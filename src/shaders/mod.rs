pub mod build_tasks;
pub mod codegen;
pub mod compile_job;
pub mod constant_buffer;
pub mod driver;
pub mod file_writer;
pub mod json;
pub mod model;
pub mod permutations;
pub mod populators;
pub mod process;
pub mod session;
pub mod type_traits;
