//! Core domain model for the scheduling engine: the `Task`/`Dependency`
//! data model, calendar-aware working-day arithmetic, fractional ordering
//! keys, and project-wide structural validation. No scheduling logic lives
//! here — see `pls-engine`.

pub mod calendar;
pub mod error;
pub mod ordering;
pub mod task;
pub mod validate;

pub use calendar::{Calendar, CalendarException};
pub use error::{Error, Result};
pub use task::{
    calculate_variance, ConstraintType, Dependency, LinkType, RowType, SchedulingMode, Task,
    TaskHealth, TaskPatch, Variance,
};
pub use validate::validate_project;
