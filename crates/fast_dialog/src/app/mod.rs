pub(crate) mod advance;
pub(crate) mod bootstrap;
pub(crate) mod control_port;
pub(crate) mod loop_runner;
pub(crate) mod scene_source;
