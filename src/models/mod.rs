pub mod class;
pub mod day;
pub mod enrollment;
pub mod program;
pub mod schedule;
pub mod session;
pub mod views;

pub use class::{Class, NewClassRequest};
pub use day::DayOfWeek;
pub use enrollment::{
    Attendance, Enrollment, EnrollmentStatus, NewAttendanceRequest, NewEnrollmentRequest,
    UpdateEnrollmentStatusRequest,
};
pub use program::{NewProgramRequest, Program};
pub use schedule::{ClassSchedule, ReplaceSchedulesRequest, ScheduleSlot, slot_end};
pub use session::{
    BulkDeleteResult, BulkDeleteSessionsRequest, ClassSession, GenerateSessionsRequest,
    NewSessionRequest, SessionStatus, UpdateSessionStatusRequest,
};
pub use views::{
    CalendarEvent, ConflictCheck, MainPageScheduleSummary, NextSession, ScheduleConflict,
    WeeklySchedule,
};
