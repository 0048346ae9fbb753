// src/sources/mod.rs

pub mod clock;     // injectable wall clock
pub mod reftag;    // shell script or in-process tag generation
pub mod snapshot;  // workspace observation, degrades instead of failing

pub use clock::{Clock, FixedClock, SystemClock};
pub use reftag::{NativeRefTagSource, RefTagSource, ShellRefTagSource};
pub use snapshot::{SnapshotSource, WorkspaceSnapshotSource};
