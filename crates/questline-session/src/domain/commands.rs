//! Commands for the Session context.
//!
//! Each command is issued on behalf of one peer and handled on that peer's
//! runtime.

use questline_core::command::Command;
use questline_core::peer::PeerId;
use questline_quest::domain::objective::ObjectiveKind;
use uuid::Uuid;

/// Command to start (or restart) a quest.
#[derive(Debug, Clone)]
pub struct StartQuest {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The issuing peer.
    pub peer_id: PeerId,
    /// Quest position in the sequence.
    pub quest_index: usize,
}

impl Command for StartQuest {
    fn command_type(&self) -> &'static str {
        "session.start_quest"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn peer_id(&self) -> PeerId {
        self.peer_id
    }
}

/// Command to complete a quest outright.
#[derive(Debug, Clone)]
pub struct CompleteQuest {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The issuing peer.
    pub peer_id: PeerId,
    /// Quest position in the sequence.
    pub quest_index: usize,
}

impl Command for CompleteQuest {
    fn command_type(&self) -> &'static str {
        "session.complete_quest"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn peer_id(&self) -> PeerId {
        self.peer_id
    }
}

/// Command reporting gameplay progress (a kill, a pickup, a conversation).
#[derive(Debug, Clone)]
pub struct ReportProgress {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The issuing peer.
    pub peer_id: PeerId,
    /// Objective kind.
    pub kind: ObjectiveKind,
    /// Target id.
    pub target_id: String,
    /// Amount.
    pub amount: u32,
}

impl Command for ReportProgress {
    fn command_type(&self) -> &'static str {
        "session.report_progress"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn peer_id(&self) -> PeerId {
        self.peer_id
    }
}

/// Command fired by an area trigger when the player enters it.
#[derive(Debug, Clone)]
pub struct EnterArea {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The issuing peer.
    pub peer_id: PeerId,
    /// The area entered.
    pub area_id: String,
}

impl Command for EnterArea {
    fn command_type(&self) -> &'static str {
        "session.enter_area"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn peer_id(&self) -> PeerId {
        self.peer_id
    }
}

/// Command fired by an area trigger when the player leaves it.
#[derive(Debug, Clone)]
pub struct ExitArea {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The issuing peer.
    pub peer_id: PeerId,
    /// The area left.
    pub area_id: String,
}

impl Command for ExitArea {
    fn command_type(&self) -> &'static str {
        "session.exit_area"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn peer_id(&self) -> PeerId {
        self.peer_id
    }
}

/// Command to push one peer's progress to another for reconciliation.
#[derive(Debug, Clone)]
pub struct ShareProgress {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The peer whose progress is shared.
    pub peer_id: PeerId,
    /// The peer that merges it.
    pub to: PeerId,
}

impl Command for ShareProgress {
    fn command_type(&self) -> &'static str {
        "session.share_progress"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn peer_id(&self) -> PeerId {
        self.peer_id
    }
}
