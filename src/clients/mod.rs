//! Adapters to the two upstream systems.

pub mod cloud;
pub mod device;

pub use cloud::{CloudClient, PushOutcome, ZohoPeopleClient};
pub use device::{DeviceClient, DeviceSession, ExportDirDevice, SessionGuard};
