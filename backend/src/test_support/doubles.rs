//! In-memory doubles for every driven port.
//!
//! The store double keeps all state behind one mutex, so each repository
//! call is atomic the way a store transaction is.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use crate::domain::ports::{
    GeocodingSource, GeocodingSourceError, LifecycleEvent, LifecycleEventChannel,
    LifecycleEventChannelError, LifecycleEventPublishError, LifecycleEventPublisher,
    SchedulingCache, SchedulingCacheError, SchedulingCacheKey, SchedulingMetrics,
    SchedulingMetricsError, SchedulingMutation, SchedulingRepository, SchedulingRepositoryError,
    TechnicianRepository, TechnicianRepositoryError,
};
use crate::domain::{
    ChildReplacement, EquipmentDraft, EquipmentItem, LocationDetails, NewSchedulingRecord,
    PerformanceAggregates, SchedulingId, SchedulingRecord, SchedulingStatus, SchedulingView,
    SparePartDraft, SparePartItem, Technician, TechnicianId,
};

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(_) => panic!("{what} mutex poisoned"),
    }
}

#[derive(Default)]
struct StoreState {
    last_id: i64,
    last_child_id: i64,
    technicians: HashMap<TechnicianId, Technician>,
    records: BTreeMap<SchedulingId, SchedulingRecord>,
}

impl StoreState {
    fn next_child_id(&mut self) -> i64 {
        self.last_child_id += 1;
        self.last_child_id
    }

    fn equipment_items(&mut self, drafts: &[EquipmentDraft]) -> Vec<EquipmentItem> {
        drafts
            .iter()
            .map(|draft| EquipmentItem {
                id: self.next_child_id(),
                name: draft.name.clone(),
                serial_number: draft.serial_number.clone(),
                description: draft.description.clone(),
            })
            .collect()
    }

    fn spare_part_items(&mut self, drafts: &[SparePartDraft]) -> Vec<SparePartItem> {
        drafts
            .iter()
            .map(|draft| SparePartItem {
                id: self.next_child_id(),
                name: draft.name.clone(),
                part_number: draft.part_number.clone(),
                quantity: draft.quantity,
            })
            .collect()
    }
}

/// Authoritative store double implementing both repository ports.
#[derive(Default)]
pub struct InMemorySchedulingStore {
    state: Mutex<StoreState>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    unavailable: AtomicBool,
    range_gate: Mutex<Option<Arc<Notify>>>,
}

impl InMemorySchedulingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a technician that records may reference.
    pub fn add_technician(&self, technician: Technician) {
        lock(&self.state, "store")
            .technicians
            .insert(technician.id, technician);
    }

    /// Insert a fully-formed record, bypassing the service.
    pub fn seed(&self, mut record: SchedulingRecord) -> SchedulingId {
        let mut state = lock(&self.state, "store");
        state.last_id += 1;
        record.id = SchedulingId::new(state.last_id);
        let id = record.id;
        state.records.insert(id, record);
        id
    }

    /// Current stored copy of a record, without counting as a read.
    pub fn snapshot(&self, id: SchedulingId) -> Option<SchedulingRecord> {
        lock(&self.state, "store").records.get(&id).cloned()
    }

    pub fn record_count(&self) -> usize {
        lock(&self.state, "store").records.len()
    }

    /// Repository calls that read records.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Repository calls that wrote records.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail with a connection error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Hold `find_in_range` until `gate` is notified.
    pub fn gate_range_queries(&self, gate: Arc<Notify>) {
        *lock(&self.range_gate, "range gate") = Some(gate);
    }

    fn check_available(&self) -> Result<(), SchedulingRepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SchedulingRepositoryError::connection("store offline"));
        }
        Ok(())
    }

    fn read(&self) -> Result<MutexGuard<'_, StoreState>, SchedulingRepositoryError> {
        self.check_available()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.state, "store"))
    }

    fn write(&self) -> Result<MutexGuard<'_, StoreState>, SchedulingRepositoryError> {
        self.check_available()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.state, "store"))
    }
}

#[async_trait]
impl SchedulingRepository for InMemorySchedulingStore {
    async fn create(
        &self,
        record: &NewSchedulingRecord,
    ) -> Result<SchedulingRecord, SchedulingRepositoryError> {
        let mut state = self.write()?;
        let technician = state
            .technicians
            .get(&record.technician_id)
            .cloned()
            .ok_or_else(|| SchedulingRepositoryError::query("technician foreign key violated"))?;
        state.last_id += 1;
        let id = SchedulingId::new(state.last_id);
        let equipment = state.equipment_items(&record.equipment);
        let spare_parts = state.spare_part_items(&record.spare_parts);
        let stored = SchedulingRecord {
            id,
            technician,
            farm_name: record.farm_name.clone(),
            client_name: record.client_name.clone(),
            client_email: record.client_email.clone(),
            address: record.address.clone(),
            latitude: record.latitude,
            longitude: record.longitude,
            scheduled_at: record.scheduled_at,
            completed_at: None,
            service_description: record.service_description.clone(),
            status: record.status,
            priority: record.priority,
            client_rating: None,
            client_feedback: None,
            equipment,
            spare_parts,
        };
        state.records.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(
        &self,
        id: SchedulingId,
    ) -> Result<Option<SchedulingRecord>, SchedulingRepositoryError> {
        Ok(self.read()?.records.get(&id).cloned())
    }

    async fn list_for_technician(
        &self,
        technician_id: &TechnicianId,
    ) -> Result<Vec<SchedulingRecord>, SchedulingRepositoryError> {
        let state = self.read()?;
        let mut records: Vec<_> = state
            .records
            .values()
            .filter(|record| record.is_owned_by(technician_id))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.scheduled_at.cmp(&a.scheduled_at));
        Ok(records)
    }

    async fn list_upcoming_for_technician(
        &self,
        technician_id: &TechnicianId,
        after: DateTime<Utc>,
    ) -> Result<Vec<SchedulingRecord>, SchedulingRepositoryError> {
        let state = self.read()?;
        let mut records: Vec<_> = state
            .records
            .values()
            .filter(|record| record.is_owned_by(technician_id) && record.scheduled_at > after)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at));
        Ok(records)
    }

    async fn find_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SchedulingRecord>, SchedulingRepositoryError> {
        let gate = lock(&self.range_gate, "range gate").clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let state = self.read()?;
        let mut records: Vec<_> = state
            .records
            .values()
            .filter(|record| {
                record.status != SchedulingStatus::Cancelled
                    && record.scheduled_at >= start
                    && record.scheduled_at < end
            })
            .cloned()
            .collect();
        records.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at));
        Ok(records)
    }

    async fn update(
        &self,
        record: &SchedulingRecord,
        children: &ChildReplacement,
    ) -> Result<SchedulingRecord, SchedulingRepositoryError> {
        let mut state = self.write()?;
        let current = state
            .records
            .get(&record.id)
            .cloned()
            .ok_or_else(|| SchedulingRepositoryError::missing(record.id.get()))?;
        let equipment = match &children.equipment {
            Some(drafts) => state.equipment_items(drafts),
            None => current.equipment,
        };
        let spare_parts = match &children.spare_parts {
            Some(drafts) => state.spare_part_items(drafts),
            None => current.spare_parts,
        };
        let stored = SchedulingRecord {
            technician: current.technician,
            equipment,
            spare_parts,
            ..record.clone()
        };
        state.records.insert(record.id, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, id: SchedulingId) -> Result<bool, SchedulingRepositoryError> {
        Ok(self.write()?.records.remove(&id).is_some())
    }

    async fn performance_for_technician(
        &self,
        technician_id: &TechnicianId,
    ) -> Result<PerformanceAggregates, SchedulingRepositoryError> {
        let state = self.read()?;
        let owned: Vec<_> = state
            .records
            .values()
            .filter(|record| record.is_owned_by(technician_id))
            .collect();
        let ratings: Vec<f64> = owned
            .iter()
            .filter_map(|record| record.client_rating)
            .map(|rating| f64::from(rating.get()))
            .collect();
        let completed: Vec<_> = owned
            .iter()
            .filter(|record| record.status == SchedulingStatus::Completed)
            .collect();
        let durations: Vec<f64> = completed
            .iter()
            .filter_map(|record| record.completed_at.map(|at| at - record.scheduled_at))
            .map(|delta| delta.num_seconds() as f64 / 3600.0)
            .collect();
        Ok(PerformanceAggregates {
            average_rating: mean(&ratings),
            completed_visits: completed.len() as u64,
            average_visit_duration_hours: mean(&durations),
        })
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[async_trait]
impl TechnicianRepository for InMemorySchedulingStore {
    async fn find_by_id(
        &self,
        id: &TechnicianId,
    ) -> Result<Option<Technician>, TechnicianRepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TechnicianRepositoryError::connection("store offline"));
        }
        Ok(lock(&self.state, "store").technicians.get(id).cloned())
    }
}

/// View cache double that records the TTL of every write.
#[derive(Default)]
pub struct InMemorySchedulingCache {
    entries: Mutex<HashMap<String, (SchedulingView, Duration)>>,
    unavailable: AtomicBool,
}

impl InMemorySchedulingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read an entry directly, bypassing the service.
    pub fn peek(&self, id: SchedulingId) -> Option<SchedulingView> {
        let key = SchedulingCacheKey::for_scheduling(id);
        lock(&self.entries, "cache")
            .get(key.as_str())
            .map(|(view, _)| view.clone())
    }

    /// TTL used by the last write for `id`.
    pub fn ttl_for(&self, id: SchedulingId) -> Option<Duration> {
        let key = SchedulingCacheKey::for_scheduling(id);
        lock(&self.entries, "cache")
            .get(key.as_str())
            .map(|(_, ttl)| *ttl)
    }

    /// Store a view directly, bypassing the service.
    pub fn plant(&self, view: SchedulingView) {
        let key = SchedulingCacheKey::for_scheduling(view.id);
        lock(&self.entries, "cache").insert(key.as_str().to_owned(), (view, Duration::ZERO));
    }

    /// Make every subsequent call fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), SchedulingCacheError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SchedulingCacheError::backend("cache offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl SchedulingCache for InMemorySchedulingCache {
    async fn get(
        &self,
        key: &SchedulingCacheKey,
    ) -> Result<Option<SchedulingView>, SchedulingCacheError> {
        self.check_available()?;
        Ok(lock(&self.entries, "cache")
            .get(key.as_str())
            .map(|(view, _)| view.clone()))
    }

    async fn put(
        &self,
        key: &SchedulingCacheKey,
        view: &SchedulingView,
        ttl: Duration,
    ) -> Result<(), SchedulingCacheError> {
        self.check_available()?;
        lock(&self.entries, "cache").insert(key.as_str().to_owned(), (view.clone(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &SchedulingCacheKey) -> Result<(), SchedulingCacheError> {
        self.check_available()?;
        lock(&self.entries, "cache").remove(key.as_str());
        Ok(())
    }
}

/// One event as seen by [`RecordingEventPublisher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishedEvent {
    pub event: LifecycleEvent,
    /// Whether the store held the record at the moment of publication.
    pub visible_in_store: bool,
}

/// Publisher double that notes store visibility at publish time.
pub struct RecordingEventPublisher {
    store: Arc<InMemorySchedulingStore>,
    events: Mutex<Vec<PublishedEvent>>,
    failing: AtomicBool,
}

impl RecordingEventPublisher {
    pub fn new(store: Arc<InMemorySchedulingStore>) -> Self {
        Self {
            store,
            events: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn events(&self) -> Vec<PublishedEvent> {
        lock(&self.events, "publisher").clone()
    }

    /// Reject every subsequent publish.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl LifecycleEventPublisher for RecordingEventPublisher {
    async fn publish(&self, event: LifecycleEvent) -> Result<(), LifecycleEventPublishError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LifecycleEventPublishError::closed("publisher offline"));
        }
        let visible_in_store = self.store.snapshot(event.scheduling_id).is_some();
        lock(&self.events, "publisher").push(PublishedEvent {
            event,
            visible_in_store,
        });
        Ok(())
    }
}

/// Transport double replaying scripted outcomes, then succeeding.
#[derive(Default)]
pub struct ScriptedEventChannel {
    script: Mutex<VecDeque<Result<(), LifecycleEventChannelError>>>,
    attempts: AtomicUsize,
    delivered: Mutex<Vec<LifecycleEvent>>,
    delivered_signal: Notify,
}

impl ScriptedEventChannel {
    pub fn new(script: Vec<Result<(), LifecycleEventChannelError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> Vec<LifecycleEvent> {
        lock(&self.delivered, "channel").clone()
    }

    /// Wait until at least `count` events were delivered.
    pub async fn wait_for_deliveries(&self, count: usize) {
        loop {
            let notified = self.delivered_signal.notified();
            if lock(&self.delivered, "channel").len() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl LifecycleEventChannel for ScriptedEventChannel {
    async fn send(&self, event: &LifecycleEvent) -> Result<(), LifecycleEventChannelError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let outcome = lock(&self.script, "channel script")
            .pop_front()
            .unwrap_or(Ok(()));
        if outcome.is_ok() {
            lock(&self.delivered, "channel").push(*event);
            self.delivered_signal.notify_waiters();
        }
        outcome
    }
}

enum GeocoderBehaviour {
    Resolve(LocationDetails),
    Fail,
    Stall(Duration),
}

/// Geocoding double with a fixed behaviour.
pub struct StubGeocoder {
    behaviour: GeocoderBehaviour,
    calls: AtomicUsize,
}

impl StubGeocoder {
    /// Resolve every coordinate pair to `details`, with the queried
    /// coordinates filled in.
    pub fn resolving(details: LocationDetails) -> Self {
        Self::with(GeocoderBehaviour::Resolve(details))
    }

    /// Fail every lookup.
    pub fn failing() -> Self {
        Self::with(GeocoderBehaviour::Fail)
    }

    /// Sleep for `delay` before answering.
    pub fn stalled(delay: Duration) -> Self {
        Self::with(GeocoderBehaviour::Stall(delay))
    }

    fn with(behaviour: GeocoderBehaviour) -> Self {
        Self {
            behaviour,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeocodingSource for StubGeocoder {
    async fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<LocationDetails, GeocodingSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            GeocoderBehaviour::Resolve(details) => Ok(LocationDetails {
                latitude,
                longitude,
                ..details.clone()
            }),
            GeocoderBehaviour::Fail => Err(GeocodingSourceError::transport("connection reset")),
            GeocoderBehaviour::Stall(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(LocationDetails::at(latitude, longitude))
            }
        }
    }
}

/// Metrics double keeping every observation.
#[derive(Default)]
pub struct RecordingSchedulingMetrics {
    created: AtomicUsize,
    statuses: Mutex<Vec<SchedulingStatus>>,
    mutations: Mutex<Vec<SchedulingMutation>>,
}

impl RecordingSchedulingMetrics {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn statuses(&self) -> Vec<SchedulingStatus> {
        lock(&self.statuses, "metrics").clone()
    }

    pub fn mutations(&self) -> Vec<SchedulingMutation> {
        lock(&self.mutations, "metrics").clone()
    }
}

#[async_trait]
impl SchedulingMetrics for RecordingSchedulingMetrics {
    async fn record_created(&self) -> Result<(), SchedulingMetricsError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn record_status(&self, status: SchedulingStatus) -> Result<(), SchedulingMetricsError> {
        lock(&self.statuses, "metrics").push(status);
        Ok(())
    }

    async fn observe_mutation(
        &self,
        mutation: SchedulingMutation,
        _elapsed: Duration,
    ) -> Result<(), SchedulingMetricsError> {
        lock(&self.mutations, "metrics").push(mutation);
        Ok(())
    }
}
