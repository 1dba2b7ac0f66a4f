//! Screen registry and animated transitions between screens
//!
//! - `registry` - ViewRegistry mapping view ids to screen producers
//! - `transition` - TransitionController, the fade/work/fade state machine
//! - `clock` - time source abstraction (system and manual clocks)

pub mod clock;
pub mod error;
pub mod registry;
pub mod transition;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::NavigationError;
pub use registry::{Producer, ViewRegistry, ViewRegistryBuilder};
pub use transition::{
    Frame, TransitionController, TransitionKind, TransitionPhase, TransitionTiming, WorkFuture,
};
