//! Upstream event payloads consumed from the platform's event streams.
//!
//! Unknown fields are ignored. Correlation fields that upstream producers
//! may omit are modelled as `Option` so that the adapter can decide between
//! rejecting the event and applying a configured fallback.

pub mod media;
pub mod report;
pub mod submission;

pub use media::{MediaOutcome, MediaProcessingEvent};
pub use report::{
    ReportAssignmentEvent, ReportCreatedEvent, ReportEscalationEvent, ReportResponseEvent,
    ReportStatusChangeEvent,
};
pub use submission::SubmissionEvent;
