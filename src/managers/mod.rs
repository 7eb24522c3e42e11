// State managers
// Stateful orchestration on the owner thread: tabs and their coordinators,
// the tab collection, session persistence and the word lookup session.

pub mod lookup_session;
pub mod session_manager;
pub mod tab;
pub mod tab_coordinator;
pub mod tab_manager;
