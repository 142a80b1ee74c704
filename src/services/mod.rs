pub mod calendar;
pub mod catalog;
pub mod conflicts;
pub mod next_session;
pub mod recurrence;
pub mod sessions;
pub mod summary;

pub use calendar::CalendarService;
pub use catalog::{CatalogService, EnrollmentService};
pub use conflicts::ConflictDetector;
pub use next_session::NextSessionResolver;
pub use recurrence::RecurrenceService;
pub use sessions::SessionService;
pub use summary::{ScheduleSummaryAggregator, SqliteSummarySource, SummaryCache, SummarySource};
