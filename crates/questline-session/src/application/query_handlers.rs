//! Query handlers for the Session context.

use std::collections::BTreeMap;

use questline_core::error::DomainError;
use questline_core::peer::PeerId;
use questline_presence::domain::area::QuorumView;
use questline_quest::application::query_handlers::QuestLogView;
use serde::Serialize;

use crate::application::session::Session;

/// Read-only view of the session roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    /// Connected peers, in id order.
    pub peers: Vec<PeerId>,
    /// Current authority holder.
    pub authority: Option<PeerId>,
    /// Fingerprint of the catalog every peer runs.
    pub catalog_fingerprint: String,
}

/// Retrieves the session roster.
#[must_use]
pub fn get_session(session: &Session) -> SessionView {
    SessionView {
        peers: session.peers(),
        authority: session.authority(),
        catalog_fingerprint: session.catalog().fingerprint().to_owned(),
    }
}

/// Retrieves `peer`'s quest log.
///
/// # Errors
///
/// Returns `DomainError::UnknownPeer` if `peer` is not connected.
pub fn get_quest_log(session: &Session, peer: PeerId) -> Result<QuestLogView, DomainError> {
    Ok(session.runtime(peer)?.quest_log())
}

/// Retrieves the quorum view of `area_id` as seen from `peer`.
///
/// # Errors
///
/// Returns `DomainError::UnknownPeer` if `peer` is not connected, or
/// `DomainError::Validation` if the area has no gate.
pub fn get_area(session: &Session, peer: PeerId, area_id: &str) -> Result<QuorumView, DomainError> {
    session
        .runtime(peer)?
        .quorum_view(area_id)
        .ok_or_else(|| DomainError::Validation(format!("no area gate for {area_id}")))
}

/// Retrieves `peer`'s reward ledger.
///
/// # Errors
///
/// Returns `DomainError::UnknownPeer` if `peer` is not connected.
pub fn get_inventory(session: &Session, peer: PeerId) -> Result<BTreeMap<String, u32>, DomainError> {
    Ok(session.runtime(peer)?.ledger().items())
}
