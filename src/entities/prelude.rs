pub use super::action_log::Entity as ActionLog;
pub use super::faculty_members::Entity as FacultyMembers;
pub use super::lms_activity::Entity as LmsActivity;
pub use super::students::Entity as Students;
pub use super::sync_config::Entity as SyncConfig;
