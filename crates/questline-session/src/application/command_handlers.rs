//! Command handlers for the Session context.
//!
//! Each handler runs the command on the issuing peer's runtime, pumps the
//! session until every peer has processed the consequences, and returns the
//! quest events emitted anywhere in the session.

use questline_core::command::Command;
use questline_core::error::DomainError;
use questline_quest::domain::events::QuestEvent;
use tracing::info;

use crate::application::session::Session;
use crate::domain::commands::{
    CompleteQuest, EnterArea, ExitArea, ReportProgress, ShareProgress, StartQuest,
};

/// Result of a successfully handled command.
#[derive(Debug)]
pub struct SessionCommandResult {
    /// Quest events emitted by every peer while the command settled.
    pub events: Vec<QuestEvent>,
}

fn log_command(command: &dyn Command) {
    info!(
        command_type = command.command_type(),
        correlation_id = %command.correlation_id(),
        peer_id = %command.peer_id(),
        "handling command"
    );
}

/// Handles the `StartQuest` command.
///
/// # Errors
///
/// Returns `DomainError::UnknownPeer`, `DomainError::QuestIndexOutOfRange` or
/// `DomainError::EmptyQuest`.
pub fn handle_start_quest(
    command: &StartQuest,
    session: &mut Session,
) -> Result<SessionCommandResult, DomainError> {
    log_command(command);
    session
        .runtime_mut(command.peer_id)?
        .start_quest(command.quest_index)?;
    Ok(SessionCommandResult {
        events: session.pump()?,
    })
}

/// Handles the `CompleteQuest` command.
///
/// # Errors
///
/// Returns `DomainError::UnknownPeer` or `DomainError::QuestIndexOutOfRange`.
pub fn handle_complete_quest(
    command: &CompleteQuest,
    session: &mut Session,
) -> Result<SessionCommandResult, DomainError> {
    log_command(command);
    session
        .runtime_mut(command.peer_id)?
        .complete_quest(command.quest_index)?;
    Ok(SessionCommandResult {
        events: session.pump()?,
    })
}

/// Handles the `ReportProgress` command.
///
/// # Errors
///
/// Returns `DomainError::UnknownPeer`, `DomainError::Validation` for a zero
/// amount, or the driver's error.
pub fn handle_report_progress(
    command: &ReportProgress,
    session: &mut Session,
) -> Result<SessionCommandResult, DomainError> {
    log_command(command);
    if command.amount == 0 {
        return Err(DomainError::Validation("amount must be at least 1".into()));
    }
    session.runtime_mut(command.peer_id)?.report_progress(
        command.kind,
        &command.target_id,
        command.amount,
    )?;
    Ok(SessionCommandResult {
        events: session.pump()?,
    })
}

/// Handles the `EnterArea` command.
///
/// # Errors
///
/// Returns `DomainError::UnknownPeer` or `DomainError::Validation` for an
/// area without a gate.
pub fn handle_enter_area(
    command: &EnterArea,
    session: &mut Session,
) -> Result<SessionCommandResult, DomainError> {
    log_command(command);
    session
        .runtime_mut(command.peer_id)?
        .enter_area(&command.area_id)?;
    Ok(SessionCommandResult {
        events: session.pump()?,
    })
}

/// Handles the `ExitArea` command.
///
/// # Errors
///
/// Returns `DomainError::UnknownPeer` or `DomainError::Validation` for an
/// area without a gate.
pub fn handle_exit_area(
    command: &ExitArea,
    session: &mut Session,
) -> Result<SessionCommandResult, DomainError> {
    log_command(command);
    session
        .runtime_mut(command.peer_id)?
        .exit_area(&command.area_id)?;
    Ok(SessionCommandResult {
        events: session.pump()?,
    })
}

/// Handles the `ShareProgress` command.
///
/// # Errors
///
/// Returns `DomainError::UnknownPeer` if either peer is not connected.
pub fn handle_share_progress(
    command: &ShareProgress,
    session: &mut Session,
) -> Result<SessionCommandResult, DomainError> {
    log_command(command);
    session.runtime(command.to)?;
    session.runtime(command.peer_id)?.share_progress(command.to)?;
    Ok(SessionCommandResult {
        events: session.pump()?,
    })
}
