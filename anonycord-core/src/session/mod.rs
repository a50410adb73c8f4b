pub(crate) mod builder;
pub(crate) mod controller;
pub(crate) mod lifecycle;
pub(crate) mod notifier;
pub(crate) mod permission_gate;
pub(crate) mod queue;
pub mod recorder;

#[cfg(test)]
pub(crate) mod fake_device;
