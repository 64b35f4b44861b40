//! 动作层：上下文、调用规范推导、注册表与执行器

pub mod context;
pub mod emoji;
pub mod executor;
pub mod registry;
pub mod schema;

pub use context::Context;
pub use emoji::{emoji_reaction, EMOJI_REACTION};
pub use executor::{decode_arguments, ActionInvoker, Observation, DONE_OBSERVATION};
pub use registry::{Action, ActionOutput, ActionRegistry, Arguments, Callable};
pub use schema::{
    derive, describe, CallSpecification, Describe, ParamType, Parameter, ParametersSpec, Properties,
    PropertySpec, Signature,
};
