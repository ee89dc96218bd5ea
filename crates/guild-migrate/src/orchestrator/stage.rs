//! Run stages. A run only moves forward, one stage at a time, and `Aborted`
//! is reachable from every non-terminal stage.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    NotStarted,
    ServerCreated,
    RolesCreated,
    CategoriesCreated,
    ChannelsCreated,
    Done,
    Aborted,
}

impl RunStage {
    /// The stage that follows a successful step, `None` when terminal.
    pub fn next(self) -> Option<RunStage> {
        match self {
            RunStage::NotStarted => Some(RunStage::ServerCreated),
            RunStage::ServerCreated => Some(RunStage::RolesCreated),
            RunStage::RolesCreated => Some(RunStage::CategoriesCreated),
            RunStage::CategoriesCreated => Some(RunStage::ChannelsCreated),
            RunStage::ChannelsCreated => Some(RunStage::Done),
            RunStage::Done | RunStage::Aborted => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    /// Work performed to leave this stage.
    pub fn pending_work(self) -> Option<&'static str> {
        match self {
            RunStage::NotStarted => Some("server"),
            RunStage::ServerCreated => Some("roles"),
            RunStage::RolesCreated => Some("categories"),
            RunStage::CategoriesCreated => Some("channels"),
            RunStage::ChannelsCreated => Some("finish"),
            RunStage::Done | RunStage::Aborted => None,
        }
    }

    /// Move to the next stage. Terminal stages stay put.
    pub fn advance(&mut self) {
        if let Some(next) = self.next() {
            *self = next;
        }
    }

    /// Enter `Aborted`, returning the work that was in progress.
    pub fn abort(&mut self) -> Option<&'static str> {
        let work = self.pending_work();
        *self = RunStage::Aborted;
        work
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunStage::NotStarted => "not_started",
            RunStage::ServerCreated => "server_created",
            RunStage::RolesCreated => "roles_created",
            RunStage::CategoriesCreated => "categories_created",
            RunStage::ChannelsCreated => "channels_created",
            RunStage::Done => "done",
            RunStage::Aborted => "aborted",
        };
        f.write_str(label)
    }
}
