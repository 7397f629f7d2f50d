//! 配置到组件的转换宏
//!
//! 注册表要求组件实现 `From<Config>` 以及 `Box<T>: Into<Box<dyn Trait>>`，
//! 这里的两个宏负责生成这两段样板代码。

/// 为组件实现 `From<Config>`
///
/// - `impl_from!(Config => Type)`：调用 `Type::new(config)`
/// - `impl_from!(Config => Type, expect: "msg")`：调用返回 `Result` 的 `Type::new(config).expect("msg")`
/// - `impl_from!(Config => Type, field: name)`：构造 `Self { name: config }`
#[macro_export]
macro_rules! impl_from {
    ($config_type:ty => $target_type:ty) => {
        impl From<$config_type> for $target_type {
            fn from(config: $config_type) -> Self {
                <$target_type>::new(config)
            }
        }
    };

    ($config_type:ty => $target_type:ty, expect: $msg:literal) => {
        impl From<$config_type> for $target_type {
            fn from(config: $config_type) -> Self {
                <$target_type>::new(config).expect($msg)
            }
        }
    };

    ($config_type:ty => $target_type:ty, field: $field:ident) => {
        impl From<$config_type> for $target_type {
            fn from(config: $config_type) -> Self {
                Self { $field: config }
            }
        }
    };
}

/// 为 `Box<Type>` 实现到 `Box<dyn Trait>` 的转换
#[macro_export]
macro_rules! impl_box_from {
    ($source_type:ty => dyn $trait_name:path) => {
        impl From<Box<$source_type>> for Box<dyn $trait_name> {
            fn from(source: Box<$source_type>) -> Self {
                source as Box<dyn $trait_name>
            }
        }
    };
}
