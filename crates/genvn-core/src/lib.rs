//! Process configuration for the GenVN backend.
//!
//! One explicit [`Config`] struct, loaded from TOML with `GENVN_*` env
//! overrides, passed to constructors. No global settings lookup.

mod config;

pub use config::{
    AssetsConfig, Config, EmbeddingConfig, GatewayConfig, LlmConfig, StoreConfig, StoryConfig,
};
