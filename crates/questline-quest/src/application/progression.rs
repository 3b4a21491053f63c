//! The progression driver.
//!
//! One driver runs on every peer and owns that peer's copy of the quest
//! sequence. It applies start/progress/complete operations, grants rewards,
//! emits events to observers, and decides which operations must also be sent
//! to the other peers:
//!
//! * `start_quest` and `complete_quest` issued locally are always sent, as
//!   buffered broadcasts so late joiners replay them.
//! * `update_objective_progress` issued locally is applied locally only,
//!   unless it concerns an area registered as gated (all peers required),
//!   in which case it is also broadcast, unbuffered.
//!
//! Operations applied on behalf of another peer (`Origin::Remote`,
//! `Origin::Relay`, `Origin::Replay`) never produce outbound messages, so a
//! replicated operation is sent exactly once, by the peer that originated it.

use std::collections::HashSet;
use std::sync::Arc;

use questline_core::clock::Clock;
use questline_core::error::DomainError;
use questline_core::event::EventMetadata;
use questline_core::net::{Outbound, SendTarget};
use questline_core::observer::{EventObserver, ObserverHandle, ObserverRegistry};
use questline_core::peer::PeerId;
use questline_core::reward::RewardSink;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::catalog::QuestCatalog;
use crate::domain::events::{
    ObjectiveCompleted, ObjectiveUpdated, QuestCompleted, QuestEvent, QuestEventKind,
    QuestStarted, QuestUpdated,
};
use crate::domain::messages::QuestMessage;
use crate::domain::objective::{Objective, ObjectiveKind, ProgressChange, Reward};
use crate::domain::quest::Quest;
use crate::domain::snapshot::{ObjectiveProgress, ProgressSnapshot, QuestProgress, ReconcileReport};

/// Where an operation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Gameplay on this peer.
    Local,
    /// A broadcast from another peer.
    Remote,
    /// The authority, through this peer's progress relay.
    Relay,
    /// A progress snapshot being merged.
    Replay,
}

impl Origin {
    /// Returns true if operations with this origin are sent to other peers.
    #[must_use]
    pub fn replicates(self) -> bool {
        matches!(self, Self::Local)
    }
}

/// Result of a progress update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressOutcome {
    /// Objectives of the current quest that matched the report.
    pub matched: usize,
    /// Objectives whose count moved.
    pub advanced: usize,
    /// Objectives that became complete.
    pub completed_objectives: usize,
    /// Whether the update completed the quest.
    pub quest_completed: bool,
    /// Whether the update was queued for broadcast.
    pub broadcast: bool,
}

/// Owns one peer's quest sequence and applies progression operations to it.
pub struct ProgressionDriver {
    peer_id: PeerId,
    quests: Vec<Quest>,
    current_quest_index: usize,
    catalog_fingerprint: String,
    gated_areas: HashSet<String>,
    clock: Arc<dyn Clock>,
    reward_sink: Option<Arc<dyn RewardSink>>,
    observers: ObserverRegistry<QuestEvent>,
    sequence_number: i64,
    uncommitted_events: Vec<QuestEvent>,
    outbox: Vec<Outbound<QuestMessage>>,
}

impl std::fmt::Debug for ProgressionDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressionDriver")
            .field("peer_id", &self.peer_id)
            .field("current_quest_index", &self.current_quest_index)
            .field("quests", &self.quests.len())
            .field("gated_areas", &self.gated_areas)
            .field("has_reward_sink", &self.reward_sink.is_some())
            .field("sequence_number", &self.sequence_number)
            .finish_non_exhaustive()
    }
}

impl ProgressionDriver {
    /// Creates a driver over an explicit quest sequence.
    #[must_use]
    pub fn new(peer_id: PeerId, quests: Vec<Quest>, clock: Arc<dyn Clock>) -> Self {
        Self {
            peer_id,
            quests,
            current_quest_index: 0,
            catalog_fingerprint: String::new(),
            gated_areas: HashSet::new(),
            clock,
            reward_sink: None,
            observers: ObserverRegistry::new(),
            sequence_number: 0,
            uncommitted_events: Vec::new(),
            outbox: Vec::new(),
        }
    }

    /// Creates a driver over a fresh sequence built from `catalog`.
    #[must_use]
    pub fn from_catalog(peer_id: PeerId, catalog: &QuestCatalog, clock: Arc<dyn Clock>) -> Self {
        let mut driver = Self::new(peer_id, catalog.quests(), clock);
        driver.catalog_fingerprint = catalog.fingerprint().to_owned();
        driver
    }

    /// Attaches the inventory that receives rewards.
    #[must_use]
    pub fn with_reward_sink(mut self, sink: Arc<dyn RewardSink>) -> Self {
        self.reward_sink = Some(sink);
        self
    }

    /// The peer this driver belongs to.
    #[must_use]
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// The quest sequence.
    #[must_use]
    pub fn quests(&self) -> &[Quest] {
        &self.quests
    }

    /// The quest at `index`.
    #[must_use]
    pub fn quest(&self, index: usize) -> Option<&Quest> {
        self.quests.get(index)
    }

    /// Index of the active quest.
    #[must_use]
    pub fn current_quest_index(&self) -> usize {
        self.current_quest_index
    }

    /// The active quest.
    #[must_use]
    pub fn current_quest(&self) -> Option<&Quest> {
        self.quests.get(self.current_quest_index)
    }

    /// Fingerprint of the catalog the sequence came from (empty if built by hand).
    #[must_use]
    pub fn catalog_fingerprint(&self) -> &str {
        &self.catalog_fingerprint
    }

    /// Returns true if the active, unfinished quest currently directs the
    /// player to an objective matching (`kind`, `target_id`).
    #[must_use]
    pub fn is_current_objective(&self, kind: ObjectiveKind, target_id: &str) -> bool {
        self.current_quest()
            .filter(|quest| !quest.is_completed())
            .and_then(Quest::current_objective)
            .is_some_and(|objective| objective.matches(kind, target_id))
    }

    /// Registers `area_id` as requiring every peer; local progress reported
    /// for it is broadcast.
    pub fn mark_area_gated(&mut self, area_id: impl Into<String>) {
        self.gated_areas.insert(area_id.into());
    }

    /// Returns true if `area_id` has been registered as gated.
    #[must_use]
    pub fn is_area_gated(&self, area_id: &str) -> bool {
        self.gated_areas.contains(area_id)
    }

    /// Adds an observer for this driver's events.
    pub fn register_observer(
        &mut self,
        observer: Arc<dyn EventObserver<QuestEvent>>,
    ) -> ObserverHandle {
        self.observers.register(observer)
    }

    /// Removes an observer.
    pub fn unregister_observer(&mut self, handle: ObserverHandle) -> bool {
        self.observers.unregister(handle)
    }

    /// Events emitted since the last drain.
    #[must_use]
    pub fn uncommitted_events(&self) -> &[QuestEvent] {
        &self.uncommitted_events
    }

    /// Drains the emitted events.
    pub fn take_uncommitted_events(&mut self) -> Vec<QuestEvent> {
        std::mem::take(&mut self.uncommitted_events)
    }

    /// Messages waiting to be sent.
    #[must_use]
    pub fn outbound(&self) -> &[Outbound<QuestMessage>] {
        &self.outbox
    }

    /// Drains the messages waiting to be sent.
    pub fn take_outbound(&mut self) -> Vec<Outbound<QuestMessage>> {
        std::mem::take(&mut self.outbox)
    }

    /// Starts (or restarts) the quest at `index`.
    ///
    /// Objective progress is cleared and the cursor moves to the quest's
    /// entry objective. Starting a completed quest is ignored.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::QuestIndexOutOfRange` or `DomainError::EmptyQuest`;
    /// state is unchanged in both cases.
    pub fn start_quest(&mut self, index: usize, origin: Origin) -> Result<(), DomainError> {
        self.start_quest_with(index, origin, Uuid::new_v4(), true)
    }

    /// Applies progress to every matching objective of the active quest.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::QuestIndexOutOfRange` if the sequence is empty.
    pub fn update_objective_progress(
        &mut self,
        kind: ObjectiveKind,
        target_id: &str,
        amount: u32,
        origin: Origin,
    ) -> Result<ProgressOutcome, DomainError> {
        let correlation_id = Uuid::new_v4();
        let quest_index = self.current_quest_index;
        let Some(quest) = self.quests.get(quest_index) else {
            warn!(
                peer_id = %self.peer_id,
                quest_index,
                "progress reported with no active quest"
            );
            return Err(DomainError::QuestIndexOutOfRange {
                index: quest_index,
                len: self.quests.len(),
            });
        };

        let mut outcome = ProgressOutcome::default();
        if quest.is_completed() || amount == 0 {
            return Ok(outcome);
        }

        let matched: Vec<usize> = quest
            .objectives()
            .iter()
            .enumerate()
            .filter(|(_, objective)| objective.matches(kind, target_id))
            .map(|(i, _)| i)
            .collect();
        outcome.matched = matched.len();
        if matched.is_empty() {
            debug!(peer_id = %self.peer_id, %kind, target_id, "no matching objective");
            return Ok(outcome);
        }

        if origin.replicates() && kind.is_area() && self.gated_areas.contains(target_id) {
            outcome.broadcast = true;
            self.outbox.push(Outbound {
                target: SendTarget::All,
                message: QuestMessage::UpdateProgress {
                    kind,
                    target_id: target_id.to_owned(),
                    amount,
                },
                correlation_id,
            });
        }

        for objective_index in matched {
            let Some(change) = self.quests[quest_index]
                .objective_mut(objective_index)
                .and_then(|objective| objective.apply_progress(target_id, amount))
            else {
                continue;
            };
            if change.advanced() {
                outcome.advanced += 1;
            }
            if self.after_objective_change(quest_index, objective_index, change, correlation_id) {
                outcome.completed_objectives += 1;
            }
        }

        if self.quests[quest_index].is_satisfied() {
            outcome.quest_completed =
                self.complete_quest_with(quest_index, origin, correlation_id)?;
        }

        Ok(outcome)
    }

    /// Completes the quest at `index`, grants its rewards and starts the next
    /// quest in the sequence. Returns false if it was already completed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::QuestIndexOutOfRange`; state is unchanged.
    pub fn complete_quest(&mut self, index: usize, origin: Origin) -> Result<bool, DomainError> {
        self.complete_quest_with(index, origin, Uuid::new_v4())
    }

    /// Applies a message received from `sender`.
    ///
    /// # Errors
    ///
    /// Propagates the error of the operation the message maps to.
    pub fn apply_message(
        &mut self,
        sender: PeerId,
        message: QuestMessage,
    ) -> Result<(), DomainError> {
        debug!(peer_id = %self.peer_id, %sender, ?message, "applying remote quest message");
        match message {
            QuestMessage::StartQuest { quest_index } => {
                self.start_quest(quest_index, Origin::Remote)
            }
            QuestMessage::CompleteQuest { quest_index } => {
                self.complete_quest(quest_index, Origin::Remote).map(|_| ())
            }
            QuestMessage::UpdateProgress {
                kind,
                target_id,
                amount,
            } => self
                .update_objective_progress(kind, &target_id, amount, Origin::Remote)
                .map(|_| ()),
            QuestMessage::Snapshot(snapshot) => self.reconcile(&snapshot).map(|_| ()),
        }
    }

    /// Reports a kill.
    ///
    /// # Errors
    ///
    /// See [`ProgressionDriver::update_objective_progress`].
    pub fn add_kill_progress(
        &mut self,
        target_id: &str,
        amount: u32,
    ) -> Result<ProgressOutcome, DomainError> {
        self.update_objective_progress(ObjectiveKind::Kill, target_id, amount, Origin::Local)
    }

    /// Reports collected items.
    ///
    /// # Errors
    ///
    /// See [`ProgressionDriver::update_objective_progress`].
    pub fn add_collect_progress(
        &mut self,
        item_id: &str,
        amount: u32,
    ) -> Result<ProgressOutcome, DomainError> {
        self.update_objective_progress(ObjectiveKind::Collect, item_id, amount, Origin::Local)
    }

    /// Reports a conversation.
    ///
    /// # Errors
    ///
    /// See [`ProgressionDriver::update_objective_progress`].
    pub fn add_talk_to_progress(
        &mut self,
        npc_id: &str,
        amount: u32,
    ) -> Result<ProgressOutcome, DomainError> {
        self.update_objective_progress(ObjectiveKind::TalkTo, npc_id, amount, Origin::Local)
    }

    /// Reports reaching an area.
    ///
    /// # Errors
    ///
    /// See [`ProgressionDriver::update_objective_progress`].
    pub fn add_reach_area_progress(
        &mut self,
        area_id: &str,
        amount: u32,
    ) -> Result<ProgressOutcome, DomainError> {
        self.update_objective_progress(ObjectiveKind::ReachArea, area_id, amount, Origin::Local)
    }

    /// Reports finding an area.
    ///
    /// # Errors
    ///
    /// See [`ProgressionDriver::update_objective_progress`].
    pub fn add_find_area_progress(
        &mut self,
        area_id: &str,
        amount: u32,
    ) -> Result<ProgressOutcome, DomainError> {
        self.update_objective_progress(ObjectiveKind::FindArea, area_id, amount, Origin::Local)
    }

    /// Reports a shrine offering.
    ///
    /// # Errors
    ///
    /// See [`ProgressionDriver::update_objective_progress`].
    pub fn add_shrine_offering_progress(
        &mut self,
        shrine_id: &str,
        amount: u32,
    ) -> Result<ProgressOutcome, DomainError> {
        self.update_objective_progress(
            ObjectiveKind::ShrineOffering,
            shrine_id,
            amount,
            Origin::Local,
        )
    }

    /// Reports a power steal.
    ///
    /// # Errors
    ///
    /// See [`ProgressionDriver::update_objective_progress`].
    pub fn add_power_steal_progress(
        &mut self,
        target_id: &str,
        amount: u32,
    ) -> Result<ProgressOutcome, DomainError> {
        self.update_objective_progress(ObjectiveKind::PowerSteal, target_id, amount, Origin::Local)
    }

    /// Captures this peer's progress.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            catalog_fingerprint: self.catalog_fingerprint.clone(),
            current_quest_index: self.current_quest_index,
            quests: self
                .quests
                .iter()
                .map(|quest| QuestProgress {
                    is_completed: quest.is_completed(),
                    current_objective_index: quest.current_objective_index(),
                    objectives: quest
                        .objectives()
                        .iter()
                        .map(|objective| ObjectiveProgress {
                            current_count: objective.current_count(),
                            item_progress: objective
                                .multi_target()
                                .map(|items| items.iter().map(|t| t.progress).collect())
                                .unwrap_or_default(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    /// Merges another peer's progress into this one.
    ///
    /// Quests the snapshot has completed take its objective counts (granting
    /// objective rewards) and are then completed here (quest rewards granted
    /// once, next quest started). If both peers are on the same active quest,
    /// objective counts are raised to the snapshot's where higher. Nothing is
    /// broadcast.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Configuration` if the snapshot was taken from a
    /// different catalog, or `DomainError::ObjectiveIndexOutOfRange` if one of
    /// its quests lists more objectives than ours. State is unchanged.
    pub fn reconcile(&mut self, snapshot: &ProgressSnapshot) -> Result<ReconcileReport, DomainError> {
        if snapshot.catalog_fingerprint != self.catalog_fingerprint
            || snapshot.quests.len() != self.quests.len()
        {
            warn!(
                peer_id = %self.peer_id,
                local = %self.catalog_fingerprint,
                remote = %snapshot.catalog_fingerprint,
                "snapshot catalog mismatch; reconciliation skipped"
            );
            return Err(DomainError::Configuration(
                "snapshot was taken from a different quest catalog".to_owned(),
            ));
        }
        for (quest_index, remote) in snapshot.quests.iter().enumerate() {
            let len = self.quests[quest_index].objectives().len();
            if remote.objectives.len() > len {
                warn!(peer_id = %self.peer_id, quest_index, len, "snapshot objective list too long");
                return Err(DomainError::ObjectiveIndexOutOfRange { quest_index, index: len });
            }
        }

        let correlation_id = Uuid::new_v4();
        let mut report = ReconcileReport::default();

        for (quest_index, remote) in snapshot.quests.iter().enumerate() {
            if self.quests[quest_index].is_completed() {
                continue;
            }
            if remote.is_completed {
                self.merge_objectives(quest_index, remote, correlation_id, &mut report);
                if self.complete_quest_with(quest_index, Origin::Replay, correlation_id)? {
                    report.quests_completed += 1;
                }
                continue;
            }
            if quest_index != self.current_quest_index
                || quest_index != snapshot.current_quest_index
            {
                continue;
            }

            self.merge_objectives(quest_index, remote, correlation_id, &mut report);

            if self.quests[quest_index].is_satisfied() {
                if self.complete_quest_with(quest_index, Origin::Replay, correlation_id)? {
                    report.quests_completed += 1;
                }
                continue;
            }

            // Follow the snapshot's cursor when ours rests on a finished objective.
            let quest = &mut self.quests[quest_index];
            let resting_on_complete = quest
                .current_objective()
                .is_some_and(Objective::is_complete);
            let remote_open = quest
                .objective(remote.current_objective_index)
                .is_some_and(|objective| !objective.is_complete());
            if resting_on_complete
                && remote_open
                && quest.set_current_objective_index(remote.current_objective_index)
            {
                self.emit(
                    correlation_id,
                    QuestEventKind::QuestUpdated(QuestUpdated {
                        quest_index,
                        current_objective_index: remote.current_objective_index,
                    }),
                );
            }
        }

        if !report.is_noop() {
            info!(peer_id = %self.peer_id, ?report, "progress reconciled");
        }
        Ok(report)
    }

    fn merge_objectives(
        &mut self,
        quest_index: usize,
        remote: &QuestProgress,
        correlation_id: Uuid,
        report: &mut ReconcileReport,
    ) {
        for (objective_index, progress) in remote.objectives.iter().enumerate() {
            let Some(objective) = self.quests[quest_index].objective_mut(objective_index) else {
                continue;
            };
            let change = objective.merge_counts(progress.current_count, &progress.item_progress);
            if change.advanced() {
                report.objectives_advanced += 1;
            }
            if self.after_objective_change(quest_index, objective_index, change, correlation_id) {
                report.objectives_completed += 1;
            }
        }
    }

    fn start_quest_with(
        &mut self,
        index: usize,
        origin: Origin,
        correlation_id: Uuid,
        replicate: bool,
    ) -> Result<(), DomainError> {
        let len = self.quests.len();
        let Some(quest) = self.quests.get_mut(index) else {
            warn!(peer_id = %self.peer_id, quest_index = index, len, "start ignored: quest index out of range");
            return Err(DomainError::QuestIndexOutOfRange { index, len });
        };
        if quest.objectives().is_empty() {
            warn!(peer_id = %self.peer_id, quest_index = index, "start ignored: quest has no objectives");
            return Err(DomainError::EmptyQuest(index));
        }
        if quest.is_completed() {
            info!(peer_id = %self.peer_id, quest_index = index, "start ignored: quest already completed");
            return Ok(());
        }

        let objective_index = quest.restart();
        let name = quest.name.clone();
        self.current_quest_index = index;

        info!(peer_id = %self.peer_id, quest_index = index, objective_index, ?origin, "quest started");
        self.emit(
            correlation_id,
            QuestEventKind::QuestStarted(QuestStarted {
                quest_index: index,
                name,
                objective_index,
            }),
        );

        if replicate && origin.replicates() {
            self.outbox.push(Outbound {
                target: SendTarget::AllBuffered,
                message: QuestMessage::StartQuest { quest_index: index },
                correlation_id,
            });
        }
        Ok(())
    }

    fn complete_quest_with(
        &mut self,
        index: usize,
        origin: Origin,
        correlation_id: Uuid,
    ) -> Result<bool, DomainError> {
        let len = self.quests.len();
        let Some(quest) = self.quests.get_mut(index) else {
            warn!(peer_id = %self.peer_id, quest_index = index, len, "complete ignored: quest index out of range");
            return Err(DomainError::QuestIndexOutOfRange { index, len });
        };
        if !quest.mark_completed() {
            debug!(peer_id = %self.peer_id, quest_index = index, "quest already completed");
            return Ok(false);
        }
        let rewards = quest.rewards().to_vec();
        let name = quest.name.clone();

        for reward in &rewards {
            self.grant(reward);
        }

        info!(peer_id = %self.peer_id, quest_index = index, ?origin, "quest completed");
        self.emit(
            correlation_id,
            QuestEventKind::QuestCompleted(QuestCompleted {
                quest_index: index,
                name,
            }),
        );

        if origin.replicates() {
            self.outbox.push(Outbound {
                target: SendTarget::AllBuffered,
                message: QuestMessage::CompleteQuest { quest_index: index },
                correlation_id,
            });
        }

        if index + 1 < len {
            // Every receiver of the completion cascades on its own, so the
            // follow-up start is never sent.
            if let Err(err) = self.start_quest_with(index + 1, origin, correlation_id, false) {
                warn!(peer_id = %self.peer_id, quest_index = index + 1, %err, "cascaded start failed");
            }
        }
        Ok(true)
    }

    /// Emits the events for one objective's change, grants its reward and
    /// auto-advances the cursor. Returns true if the objective completed.
    fn after_objective_change(
        &mut self,
        quest_index: usize,
        objective_index: usize,
        change: ProgressChange,
        correlation_id: Uuid,
    ) -> bool {
        let quest = &self.quests[quest_index];
        let Some(objective) = quest.objective(objective_index) else {
            return false;
        };
        let required_count = objective.required_count();
        let reward = objective.reward().cloned();

        if change.advanced() {
            self.emit(
                correlation_id,
                QuestEventKind::ObjectiveUpdated(ObjectiveUpdated {
                    quest_index,
                    objective_index,
                    current_count: change.current,
                    required_count,
                }),
            );
        }
        if !change.completed_now {
            return false;
        }

        if let Some(reward) = reward {
            self.grant(&reward);
        }
        self.emit(
            correlation_id,
            QuestEventKind::ObjectiveCompleted(ObjectiveCompleted {
                quest_index,
                objective_index,
            }),
        );

        let quest = &mut self.quests[quest_index];
        if quest.auto_advance() && quest.advance_from(objective_index) {
            let current_objective_index = quest.current_objective_index();
            self.emit(
                correlation_id,
                QuestEventKind::QuestUpdated(QuestUpdated {
                    quest_index,
                    current_objective_index,
                }),
            );
        }
        true
    }

    fn grant(&self, reward: &Reward) {
        match &self.reward_sink {
            None => {
                debug!(peer_id = %self.peer_id, item_id = %reward.item_id, "no reward sink; reward skipped");
            }
            Some(sink) => {
                if !sink.add_item(&reward.item_id, reward.quantity) {
                    warn!(
                        peer_id = %self.peer_id,
                        item_id = %reward.item_id,
                        quantity = reward.quantity,
                        "reward sink rejected item"
                    );
                }
            }
        }
    }

    fn emit(&mut self, correlation_id: Uuid, kind: QuestEventKind) {
        self.sequence_number += 1;
        let event = QuestEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.event_type().to_owned(),
                peer_id: self.peer_id,
                sequence_number: self.sequence_number,
                correlation_id,
                occurred_at: self.clock.now(),
            },
            kind,
        };
        self.observers.notify(&event);
        self.uncommitted_events.push(event);
    }
}
