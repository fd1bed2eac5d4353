//! Ready-wired lifecycle service and sample payloads.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use super::clock::MutableClock;
use super::doubles::{
    InMemorySchedulingCache, InMemorySchedulingStore, RecordingEventPublisher,
    RecordingSchedulingMetrics, StubGeocoder,
};
use crate::domain::ports::CreateSchedulingRequest;
use crate::domain::{
    EquipmentDraft, LocationDetails, SchedulingLifecycleConfig, SchedulingLifecyclePorts,
    SchedulingLifecycleService, SparePartDraft, Technician, TechnicianId,
};

/// Fixed reference instant used by fixtures.
pub fn reference_now() -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).single() {
        Some(now) => now,
        None => panic!("reference timestamp is valid"),
    }
}

/// Technician with predictable display fields.
pub fn technician(username: &str) -> Technician {
    Technician {
        id: TechnicianId::random(),
        username: username.to_owned(),
        full_name: format!("{username} (field team)"),
        email: format!("{username}@coop.example"),
    }
}

/// Location returned by the default geocoder.
pub fn sample_location() -> LocationDetails {
    LocationDetails {
        display_name: Some("Estrada Municipal, Ribeirão Preto, SP, Brasil".to_owned()),
        city: Some("Ribeirão Preto".to_owned()),
        state: Some("São Paulo".to_owned()),
        country: Some("Brasil".to_owned()),
        postal_code: Some("14000-000".to_owned()),
        formatted_address: Some("Ribeirão Preto, São Paulo, 14000-000, Brasil".to_owned()),
        ..LocationDetails::default()
    }
}

/// Valid creation request scheduled `lead` after `now`.
pub fn create_request(now: DateTime<Utc>, lead: TimeDelta) -> CreateSchedulingRequest {
    CreateSchedulingRequest {
        farm_name: "Fazenda Santa Luzia".to_owned(),
        client_name: "Marta Reis".to_owned(),
        client_email: "marta@santaluzia.example".to_owned(),
        address: "Rodovia SP-330 km 310".to_owned(),
        latitude: -21.17,
        longitude: -47.81,
        scheduled_at: now + lead,
        service_description: Some("Irrigation pump maintenance".to_owned()),
        priority: None,
        equipment: vec![EquipmentDraft {
            name: "Centre pivot".to_owned(),
            serial_number: Some("CP-2291".to_owned()),
            description: None,
        }],
        spare_parts: vec![SparePartDraft {
            name: "Pressure gauge".to_owned(),
            part_number: Some("PG-10".to_owned()),
            quantity: 2,
        }],
    }
}

/// Lifecycle service wired to in-memory doubles, with handles on each.
pub struct LifecycleHarness {
    pub service: Arc<SchedulingLifecycleService>,
    pub store: Arc<InMemorySchedulingStore>,
    pub cache: Arc<InMemorySchedulingCache>,
    pub events: Arc<RecordingEventPublisher>,
    pub metrics: Arc<RecordingSchedulingMetrics>,
    pub geocoder: Arc<StubGeocoder>,
    pub clock: Arc<MutableClock>,
    pub owner: Technician,
    pub config: SchedulingLifecycleConfig,
}

impl LifecycleHarness {
    /// Harness with a resolving geocoder and one registered technician.
    pub fn new() -> Self {
        Self::with_geocoder(StubGeocoder::resolving(sample_location()))
    }

    /// Harness with a custom geocoder.
    pub fn with_geocoder(geocoder: StubGeocoder) -> Self {
        let store = Arc::new(InMemorySchedulingStore::new());
        let owner = technician("joana");
        store.add_technician(owner.clone());
        let cache = Arc::new(InMemorySchedulingCache::new());
        let events = Arc::new(RecordingEventPublisher::new(Arc::clone(&store)));
        let metrics = Arc::new(RecordingSchedulingMetrics::default());
        let geocoder = Arc::new(geocoder);
        let clock = Arc::new(MutableClock::new(reference_now()));
        let config = SchedulingLifecycleConfig {
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            enrichment_timeout: Duration::from_millis(50),
        };
        let service = Arc::new(SchedulingLifecycleService::new(
            SchedulingLifecyclePorts {
                schedulings: store.clone(),
                technicians: store.clone(),
                cache: cache.clone(),
                geocoder: geocoder.clone(),
                events: events.clone(),
                metrics: metrics.clone(),
            },
            clock.clone(),
            config,
        ));
        Self {
            service,
            store,
            cache,
            events,
            metrics,
            geocoder,
            clock,
            owner,
            config,
        }
    }

    /// Register and return another technician.
    pub fn add_technician(&self, username: &str) -> Technician {
        let other = technician(username);
        self.store.add_technician(other.clone());
        other
    }

    pub fn now(&self) -> DateTime<Utc> {
        mockable::Clock::utc(self.clock.as_ref())
    }
}

impl Default for LifecycleHarness {
    fn default() -> Self {
        Self::new()
    }
}
