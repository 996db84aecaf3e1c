//! Beam - a cooperative routine runtime with suspendable queues and a
//! service locator built on top.

pub mod consts;
pub mod error;
pub mod queues;
pub mod routines;
pub mod service_locator;
pub mod services;
pub mod threading;
