//! Prelude for convenient imports.

pub use crate::crawl::CrawlTransitionController;
pub use crate::linear::LinearTransitionController;
pub use crate::pattern::{TransitionController, TransitionTarget, precision_of};
pub use crate::status::{TransitionCompleter, TransitionOutcome, TransitionStatus, transition_status};
pub use crate::token::TransitionToken;
pub use servokit_errors::{ServoError, ServoResult};
