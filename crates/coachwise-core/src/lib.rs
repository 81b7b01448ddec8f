// Library root: the live state and synchronization core of the coachwise
// client, re-exported for the CLI driver and integration tests.

pub mod config;
pub mod gateway;
pub mod live;
pub mod model;
pub mod protocol;
