//! Reservation manager
//!
//! A reservation is a RESERVED slot plus a release timer. The timer is a
//! cancellable task keyed by slot id: approval aborts it, and when it fires
//! it deletes the slot only if the slot is still RESERVED, so an approval
//! racing the deadline is never undone.

use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::store::{NewRoom, RoomQuery, RoomStore};
use crate::types::{Reservation, Room, RoomId, Slot, SlotId, SlotRequest};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type TimerMap = Arc<Mutex<HashMap<SlotId, JoinHandle<()>>>>;

/// Creates reservations, expires them and converts them on approval
#[derive(Clone)]
pub struct ReservationManager {
    store: Arc<dyn RoomStore>,
    grace: Duration,
    timers: TimerMap,
    metrics: Arc<MetricsCollector>,
}

impl ReservationManager {
    pub fn new(store: Arc<dyn RoomStore>, grace: Duration, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            store,
            grace,
            timers: Arc::new(Mutex::new(HashMap::new())),
            metrics,
        }
    }

    pub fn store(&self) -> Arc<dyn RoomStore> {
        self.store.clone()
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Reserve slots in the best matching room and start their release timers
    pub async fn reserve(
        &self,
        query: &RoomQuery,
        members: &[SlotRequest],
    ) -> Result<(Room, Vec<Reservation>)> {
        let (room, reservations) = self.store.find_and_reserve(query, members).await?;
        self.metrics.record_reservations(reservations.len());
        self.schedule_release(room.id, &reservations);
        Ok((room, reservations))
    }

    /// Reserve slots in a known room and start their release timers
    pub async fn reserve_in_room(
        &self,
        room_id: RoomId,
        members: &[SlotRequest],
    ) -> Result<(Room, Vec<Reservation>)> {
        let (room, reservations) = self.store.reserve_in_room(room_id, members).await?;
        self.metrics.record_reservations(reservations.len());
        self.schedule_release(room.id, &reservations);
        Ok((room, reservations))
    }

    /// Insert a room with its first reservations
    ///
    /// No timers are started: the room is not reachable until it has been
    /// spawned, and the caller schedules the release once it is.
    pub async fn create_with_reservations(
        &self,
        new_room: NewRoom,
        members: &[SlotRequest],
    ) -> Result<(Room, Vec<Reservation>)> {
        let (room, reservations) = self.store.create_room(new_room, members).await?;
        self.metrics.record_reservations(reservations.len());
        Ok((room, reservations))
    }

    /// Start a release timer for every reservation
    pub fn schedule_release(&self, room_id: RoomId, reservations: &[Reservation]) {
        let mut timers = match self.timers.lock() {
            Ok(timers) => timers,
            Err(_) => {
                warn!("Failed to acquire reservation timers lock, reservations will not expire - room_id: {}", room_id);
                return;
            }
        };

        for reservation in reservations {
            let slot_id = reservation.slot_id;
            let handle = tokio::spawn(release_after(
                self.store.clone(),
                self.timers.clone(),
                self.metrics.clone(),
                self.grace,
                room_id,
                slot_id,
            ));
            if let Some(previous) = timers.insert(slot_id, handle) {
                previous.abort();
            }
        }

        debug!(
            "Release scheduled - room_id: {}, slots: {}, grace: {}s",
            room_id,
            reservations.len(),
            self.grace.as_secs()
        );
    }

    /// Confirm a reservation by join key; a second approval fails
    pub async fn approve(&self, room_id: RoomId, key: &str) -> Result<Slot> {
        match self.store.approve_join(room_id, key).await {
            Ok(slot) => {
                self.cancel(slot.id);
                self.metrics.record_approval(true);
                info!(
                    "Reservation approved - room_id: {}, slot_id: {}, account_id: '{}'",
                    room_id, slot.id, slot.account_id
                );
                Ok(slot)
            }
            Err(e) => {
                self.metrics.record_approval(false);
                Err(e)
            }
        }
    }

    /// Release a reservation now if it is still RESERVED
    pub async fn release(&self, room_id: RoomId, slot_id: SlotId) -> Result<bool> {
        self.cancel(slot_id);
        self.store.release_reserved(room_id, slot_id).await
    }

    /// Remove an account's slot, optionally deleting the room as well
    pub async fn leave(&self, room_id: RoomId, account_id: &str, remove_room: bool) -> Result<bool> {
        if let Ok(slots) = self.store.list_slots(room_id).await {
            for slot in slots.iter().filter(|slot| slot.account_id == account_id) {
                self.cancel(slot.id);
            }
        }
        self.store.leave(room_id, account_id, remove_room).await
    }

    /// Delete a slot by join key after the game server reports the player gone
    pub async fn approve_leave(&self, room_id: RoomId, key: &str) -> Result<bool> {
        if let Ok(slots) = self.store.list_slots(room_id).await {
            if let Some(slot) = slots.iter().find(|slot| slot.key == key) {
                self.cancel(slot.id);
            }
        }
        self.store.approve_leave(room_id, key).await
    }

    /// Number of release timers still armed
    pub fn pending_timers(&self) -> usize {
        self.timers.lock().map(|timers| timers.len()).unwrap_or(0)
    }

    /// Abort every armed timer
    pub fn shutdown(&self) {
        if let Ok(mut timers) = self.timers.lock() {
            for (_, handle) in timers.drain() {
                handle.abort();
            }
        }
    }

    fn cancel(&self, slot_id: SlotId) {
        if let Ok(mut timers) = self.timers.lock() {
            if let Some(handle) = timers.remove(&slot_id) {
                handle.abort();
            }
        }
    }
}

async fn release_after(
    store: Arc<dyn RoomStore>,
    timers: TimerMap,
    metrics: Arc<MetricsCollector>,
    grace: Duration,
    room_id: RoomId,
    slot_id: SlotId,
) {
    tokio::time::sleep(grace).await;

    match store.release_reserved(room_id, slot_id).await {
        Ok(true) => {
            metrics.record_reservation_expired();
            warn!(
                "Reservation expired without approval - room_id: {}, slot_id: {}",
                room_id, slot_id
            );
        }
        Ok(false) => {
            debug!(
                "Reservation already settled - room_id: {}, slot_id: {}",
                room_id, slot_id
            );
        }
        Err(e) => {
            warn!(
                "Failed to release reservation - room_id: {}, slot_id: {}, error: {}",
                room_id, slot_id, e
            );
        }
    }

    if let Ok(mut timers) = timers.lock() {
        timers.remove(&slot_id);
    }
}
