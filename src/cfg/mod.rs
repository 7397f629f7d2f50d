//! cfg 模块 - 基于 TypeOptions 的组件配置与创建

pub mod macros;
pub mod registry;
pub mod type_options;

pub use registry::{create_trait_from_type_options, register_trait};
pub use type_options::TypeOptions;
