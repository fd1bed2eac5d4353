//! Unit tests for lifecycle orchestration.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use mockall::Sequence;
use rstest::{fixture, rstest};

use super::{SchedulingLifecycleConfig, SchedulingLifecyclePorts, SchedulingLifecycleService};
use crate::domain::ports::{
    ClientFeedbackRequest, LifecycleEventKind, MockLifecycleEventPublisher,
    MockSchedulingRepository, MockTechnicianRepository, NoOpSchedulingCache,
    NoOpSchedulingMetrics, SchedulingCommand, SchedulingQuery, SchedulingRepositoryError,
    UpdateSchedulingRequest,
};
use crate::domain::{
    ErrorCode, SchedulingId, SchedulingRecord, SchedulingStatus, ServicePriority, SparePartDraft,
    TechnicianId,
};
use crate::test_support::clock::MutableClock;
use crate::test_support::doubles::StubGeocoder;
use crate::test_support::fixtures::{
    LifecycleHarness, create_request, reference_now, sample_location, technician,
};

#[fixture]
fn harness() -> LifecycleHarness {
    LifecycleHarness::new()
}

async fn create_one(harness: &LifecycleHarness) -> SchedulingId {
    harness
        .service
        .create(
            create_request(harness.now(), TimeDelta::hours(4)),
            harness.owner.id,
        )
        .await
        .expect("create succeeds")
        .id
}

fn record_for(owner: crate::domain::Technician, id: i64) -> SchedulingRecord {
    let now = reference_now();
    SchedulingRecord {
        id: SchedulingId::new(id),
        technician: owner,
        farm_name: "Fazenda".to_owned(),
        client_name: "Cliente".to_owned(),
        client_email: "cliente@farm.example".to_owned(),
        address: "Km 1".to_owned(),
        latitude: -10.0,
        longitude: -50.0,
        scheduled_at: now + TimeDelta::hours(1),
        completed_at: None,
        service_description: None,
        status: SchedulingStatus::Pending,
        priority: ServicePriority::Medium,
        client_rating: None,
        client_feedback: None,
        equipment: Vec::new(),
        spare_parts: Vec::new(),
    }
}

fn service_with(
    schedulings: MockSchedulingRepository,
    technicians: MockTechnicianRepository,
    events: MockLifecycleEventPublisher,
) -> SchedulingLifecycleService {
    SchedulingLifecycleService::new(
        SchedulingLifecyclePorts {
            schedulings: Arc::new(schedulings),
            technicians: Arc::new(technicians),
            cache: Arc::new(NoOpSchedulingCache),
            geocoder: Arc::new(StubGeocoder::failing()),
            events: Arc::new(events),
            metrics: Arc::new(NoOpSchedulingMetrics),
        },
        Arc::new(MutableClock::new(reference_now())),
        SchedulingLifecycleConfig::default(),
    )
}

#[rstest]
#[case(None)]
#[case(Some("EXTREME"))]
#[tokio::test]
async fn create_defaults_to_pending_and_medium(
    harness: LifecycleHarness,
    #[case] priority: Option<&str>,
) {
    let mut request = create_request(harness.now(), TimeDelta::hours(2));
    request.priority = priority.map(str::to_owned);

    let view = harness
        .service
        .create(request, harness.owner.id)
        .await
        .expect("create succeeds");

    assert_eq!(view.status, SchedulingStatus::Pending);
    assert_eq!(view.priority, ServicePriority::Medium);
    assert_eq!(view.technician_id, harness.owner.id);
    assert_eq!(view.equipment.len(), 1);
    assert_eq!(view.spare_parts.len(), 1);
    assert!(harness.store.snapshot(view.id).is_some());
}

#[rstest]
#[tokio::test]
async fn create_accepts_now_exactly(harness: LifecycleHarness) {
    let request = create_request(harness.now(), TimeDelta::zero());
    let view = harness
        .service
        .create(request, harness.owner.id)
        .await
        .expect("scheduled_at == now is not in the past");
    assert_eq!(view.scheduled_at, harness.now());
}

#[rstest]
#[tokio::test]
async fn create_in_the_past_writes_nothing(harness: LifecycleHarness) {
    let request = create_request(harness.now(), TimeDelta::seconds(-1));

    let err = harness
        .service
        .create(request, harness.owner.id)
        .await
        .expect_err("past schedule rejected");

    assert_eq!(err.code(), ErrorCode::InvalidRequest);
    assert_eq!(harness.store.write_count(), 0);
    assert!(harness.events.events().is_empty());
    assert_eq!(harness.metrics.created(), 0);
}

#[rstest]
#[tokio::test]
async fn create_for_unknown_technician_is_not_found(harness: LifecycleHarness) {
    let request = create_request(harness.now(), TimeDelta::hours(1));
    let err = harness
        .service
        .create(request, TechnicianId::random())
        .await
        .expect_err("unknown technician");
    assert_eq!(err.code(), ErrorCode::NotFound);
    assert_eq!(harness.store.write_count(), 0);
}

#[rstest]
#[tokio::test]
async fn create_rejects_zero_quantity_spare_part(harness: LifecycleHarness) {
    let mut request = create_request(harness.now(), TimeDelta::hours(1));
    request.spare_parts = vec![SparePartDraft {
        name: "Belt".to_owned(),
        part_number: None,
        quantity: 0,
    }];
    let err = harness
        .service
        .create(request, harness.owner.id)
        .await
        .expect_err("zero quantity");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn create_publishes_once_after_the_record_is_visible(harness: LifecycleHarness) {
    let id = create_one(&harness).await;

    let events = harness.events.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event.kind, LifecycleEventKind::Created);
    assert_eq!(events[0].event.scheduling_id, id);
    assert!(events[0].visible_in_store);
    assert_eq!(harness.metrics.created(), 1);
    assert_eq!(harness.metrics.statuses(), vec![SchedulingStatus::Pending]);
}

#[rstest]
#[tokio::test]
async fn create_publishes_only_after_the_store_write() {
    let owner = technician("ordering");
    let mut sequence = Sequence::new();
    let mut technicians = MockTechnicianRepository::new();
    let found = owner.clone();
    technicians
        .expect_find_by_id()
        .returning(move |_| Ok(Some(found.clone())));
    let mut schedulings = MockSchedulingRepository::new();
    let stored_owner = owner.clone();
    schedulings
        .expect_create()
        .times(1)
        .in_sequence(&mut sequence)
        .returning(move |_| Ok(record_for(stored_owner.clone(), 77)));
    let mut events = MockLifecycleEventPublisher::new();
    events
        .expect_publish()
        .withf(|event| {
            event.kind == LifecycleEventKind::Created
                && event.scheduling_id == SchedulingId::new(77)
        })
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_| Ok(()));

    let service = service_with(schedulings, technicians, events);
    let view = service
        .create(create_request(reference_now(), TimeDelta::hours(3)), owner.id)
        .await
        .expect("create succeeds");
    assert_eq!(view.id, SchedulingId::new(77));
}

#[rstest]
#[tokio::test]
async fn store_failure_on_create_is_surfaced_without_event() {
    let owner = technician("offline");
    let mut technicians = MockTechnicianRepository::new();
    let found = owner.clone();
    technicians
        .expect_find_by_id()
        .returning(move |_| Ok(Some(found.clone())));
    let mut schedulings = MockSchedulingRepository::new();
    schedulings
        .expect_create()
        .returning(|_| Err(SchedulingRepositoryError::connection("refused")));
    let mut events = MockLifecycleEventPublisher::new();
    events.expect_publish().times(0);

    let service = service_with(schedulings, technicians, events);
    let err = service
        .create(create_request(reference_now(), TimeDelta::hours(3)), owner.id)
        .await
        .expect_err("store down");
    assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
}

#[rstest]
#[tokio::test]
async fn get_by_id_second_call_is_served_from_cache(harness: LifecycleHarness) {
    let id = create_one(&harness).await;
    let reads_before = harness.store.read_count();

    let first = harness
        .service
        .get_by_id(id, harness.owner.id)
        .await
        .expect("first read");
    let second = harness
        .service
        .get_by_id(id, harness.owner.id)
        .await
        .expect("second read");

    assert_eq!(first, second);
    assert_eq!(harness.store.read_count(), reads_before);
}

#[rstest]
#[tokio::test]
async fn cache_hit_for_another_technician_falls_through_to_not_found(harness: LifecycleHarness) {
    let id = create_one(&harness).await;
    assert!(harness.cache.peek(id).is_some());
    let intruder = harness.add_technician("intruder");
    let reads_before = harness.store.read_count();

    let err = harness
        .service
        .get_by_id(id, intruder.id)
        .await
        .expect_err("foreign record hidden");

    assert_eq!(err.code(), ErrorCode::NotFound);
    assert_eq!(harness.store.read_count(), reads_before + 1);
}

#[rstest]
#[tokio::test]
async fn stale_cache_entry_for_previous_owner_does_not_hide_record(harness: LifecycleHarness) {
    let id = create_one(&harness).await;
    let mut stale = harness.cache.peek(id).expect("cached after create");
    stale.technician_id = TechnicianId::random();
    harness.cache.plant(stale);

    let view = harness
        .service
        .get_by_id(id, harness.owner.id)
        .await
        .expect("owner still reads the record");
    assert_eq!(view.technician_id, harness.owner.id);
    assert_eq!(harness.cache.peek(id).map(|v| v.technician_id), Some(harness.owner.id));
}

#[rstest]
#[tokio::test]
async fn unavailable_cache_degrades_to_store_reads(harness: LifecycleHarness) {
    let id = create_one(&harness).await;
    harness.cache.set_unavailable(true);

    let view = harness
        .service
        .get_by_id(id, harness.owner.id)
        .await
        .expect("cache outage is not fatal");
    assert_eq!(view.id, id);

    let updated = harness
        .service
        .update(
            id,
            UpdateSchedulingRequest {
                status: Some("CONFIRMED".to_owned()),
                ..UpdateSchedulingRequest::default()
            },
            harness.owner.id,
        )
        .await
        .expect("cache outage does not fail writes");
    assert_eq!(updated.status, SchedulingStatus::Confirmed);
}

#[rstest]
#[tokio::test]
async fn system_read_ignores_the_cache(harness: LifecycleHarness) {
    let id = create_one(&harness).await;
    let mut stale = harness.cache.peek(id).expect("cached after create");
    stale.farm_name = "stale".to_owned();
    harness.cache.plant(stale);

    let view = harness
        .service
        .get_by_id_for_system(id)
        .await
        .expect("system read");
    assert_eq!(view.farm_name, "Fazenda Santa Luzia");
    assert_eq!(
        harness.cache.peek(id).map(|v| v.farm_name),
        Some("Fazenda Santa Luzia".to_owned())
    );
}

#[rstest]
#[tokio::test]
async fn enrichment_failure_leaves_location_empty() {
    let harness = LifecycleHarness::with_geocoder(StubGeocoder::failing());
    let id = create_one(&harness).await;
    let view = harness
        .service
        .get_by_id_for_system(id)
        .await
        .expect("read succeeds without enrichment");
    assert!(view.location_details.is_none());
    assert_eq!(harness.events.events().len(), 1);
}

#[rstest]
#[tokio::test]
async fn slow_enrichment_is_cut_off_by_timeout() {
    let harness = LifecycleHarness::with_geocoder(StubGeocoder::stalled(Duration::from_secs(30)));
    let started = std::time::Instant::now();

    let view = harness
        .service
        .create(
            create_request(harness.now(), TimeDelta::hours(1)),
            harness.owner.id,
        )
        .await
        .expect("create succeeds");

    assert!(view.location_details.is_none());
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[rstest]
#[tokio::test]
async fn successful_enrichment_is_cached_with_configured_ttl(harness: LifecycleHarness) {
    let id = create_one(&harness).await;
    let cached = harness.cache.peek(id).expect("cached view");
    let location = cached.location_details.expect("enriched");
    assert_eq!(location.city, sample_location().city);
    assert_eq!(harness.cache.ttl_for(id), Some(harness.config.cache_ttl));
}

#[rstest]
#[tokio::test]
async fn completing_via_partial_update_keeps_other_fields(harness: LifecycleHarness) {
    let id = create_one(&harness).await;
    let before = harness.store.snapshot(id).expect("stored");

    let view = harness
        .service
        .update(
            id,
            UpdateSchedulingRequest {
                status: Some("COMPLETED".to_owned()),
                ..UpdateSchedulingRequest::default()
            },
            harness.owner.id,
        )
        .await
        .expect("update succeeds");

    assert_eq!(view.status, SchedulingStatus::Completed);
    assert_eq!(view.completed_at, Some(harness.now()));
    assert_eq!(view.farm_name, before.farm_name);
    assert_eq!(view.client_name, before.client_name);
    assert_eq!(view.address, before.address);
    assert_eq!(view.equipment, before.equipment);
    assert_eq!(
        harness.metrics.statuses(),
        vec![SchedulingStatus::Pending, SchedulingStatus::Completed]
    );
    let kinds: Vec<_> = harness.events.events().iter().map(|e| e.event.kind).collect();
    assert_eq!(kinds, vec![LifecycleEventKind::Created, LifecycleEventKind::Updated]);
}

#[rstest]
#[tokio::test]
async fn update_without_status_publishes_nothing(harness: LifecycleHarness) {
    let id = create_one(&harness).await;
    harness
        .service
        .update(
            id,
            UpdateSchedulingRequest {
                client_name: Some("Marta R. Souza".to_owned()),
                status: Some("SOMEDAY".to_owned()),
                ..UpdateSchedulingRequest::default()
            },
            harness.owner.id,
        )
        .await
        .expect("update succeeds");

    assert_eq!(harness.events.events().len(), 1);
    let stored = harness.store.snapshot(id).expect("stored");
    assert_eq!(stored.client_name, "Marta R. Souza");
    assert_eq!(stored.status, SchedulingStatus::Pending);
}

#[rstest]
#[tokio::test]
async fn update_by_non_owner_is_not_found(harness: LifecycleHarness) {
    let id = create_one(&harness).await;
    let other = harness.add_technician("other");
    let err = harness
        .service
        .update(id, UpdateSchedulingRequest::default(), other.id)
        .await
        .expect_err("not owner");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn update_replaces_children_wholesale(harness: LifecycleHarness) {
    let id = create_one(&harness).await;
    let view = harness
        .service
        .update(
            id,
            UpdateSchedulingRequest {
                equipment: Some(Vec::new()),
                spare_parts: Some(vec![SparePartDraft {
                    name: "Filter".to_owned(),
                    part_number: None,
                    quantity: 1,
                }]),
                ..UpdateSchedulingRequest::default()
            },
            harness.owner.id,
        )
        .await
        .expect("update succeeds");
    assert!(view.equipment.is_empty());
    assert_eq!(view.spare_parts.len(), 1);
    assert_eq!(view.spare_parts[0].name, "Filter");
}

#[rstest]
#[tokio::test]
async fn update_refreshes_the_cache(harness: LifecycleHarness) {
    let id = create_one(&harness).await;
    harness
        .service
        .update(
            id,
            UpdateSchedulingRequest {
                address: Some("New gate, km 311".to_owned()),
                ..UpdateSchedulingRequest::default()
            },
            harness.owner.id,
        )
        .await
        .expect("update succeeds");
    assert_eq!(
        harness.cache.peek(id).map(|v| v.address),
        Some("New gate, km 311".to_owned())
    );
}

#[rstest]
#[tokio::test]
async fn feedback_on_pending_record_is_a_conflict(harness: LifecycleHarness) {
    let id = create_one(&harness).await;
    let err = harness
        .service
        .add_client_feedback(
            id,
            ClientFeedbackRequest {
                rating: 4,
                feedback: Some("fine".to_owned()),
            },
        )
        .await
        .expect_err("not completed");

    assert_eq!(err.code(), ErrorCode::Conflict);
    let stored = harness.store.snapshot(id).expect("stored");
    assert!(stored.client_rating.is_none());
    assert!(stored.client_feedback.is_none());
}

#[rstest]
#[tokio::test]
async fn feedback_on_completed_record_is_stored_and_cached(harness: LifecycleHarness) {
    let id = create_one(&harness).await;
    harness
        .service
        .update(
            id,
            UpdateSchedulingRequest {
                status: Some("COMPLETED".to_owned()),
                ..UpdateSchedulingRequest::default()
            },
            harness.owner.id,
        )
        .await
        .expect("complete");

    let view = harness
        .service
        .add_client_feedback(
            id,
            ClientFeedbackRequest {
                rating: 5,
                feedback: Some("great".to_owned()),
            },
        )
        .await
        .expect("feedback accepted");

    assert_eq!(view.client_rating, Some(5));
    assert_eq!(view.client_feedback.as_deref(), Some("great"));
    assert_eq!(harness.cache.peek(id).and_then(|v| v.client_rating), Some(5));
}

#[rstest]
#[case(0)]
#[case(6)]
#[tokio::test]
async fn feedback_rating_out_of_range_is_invalid(harness: LifecycleHarness, #[case] rating: i64) {
    let id = create_one(&harness).await;
    let err = harness
        .service
        .add_client_feedback(
            id,
            ClientFeedbackRequest {
                rating,
                feedback: None,
            },
        )
        .await
        .expect_err("rating out of range");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn delete_removes_record_and_cache_entry(harness: LifecycleHarness) {
    let id = create_one(&harness).await;
    assert!(harness.cache.peek(id).is_some());

    harness
        .service
        .delete(id, harness.owner.id)
        .await
        .expect("delete succeeds");

    assert!(harness.cache.peek(id).is_none());
    assert!(harness.store.snapshot(id).is_none());
    let err = harness
        .service
        .get_by_id(id, harness.owner.id)
        .await
        .expect_err("gone");
    assert_eq!(err.code(), ErrorCode::NotFound);
    let last = harness.events.events().last().copied().expect("events");
    assert_eq!(last.event.kind, LifecycleEventKind::Deleted);
    assert!(!last.visible_in_store);
}

#[rstest]
#[tokio::test]
async fn publisher_failure_does_not_fail_the_write(harness: LifecycleHarness) {
    harness.events.set_failing(true);
    let id = create_one(&harness).await;
    assert!(harness.store.snapshot(id).is_some());
    harness
        .service
        .delete(id, harness.owner.id)
        .await
        .expect("delete succeeds despite publisher outage");
}

#[rstest]
#[tokio::test]
async fn mutations_are_timed(harness: LifecycleHarness) {
    use crate::domain::ports::SchedulingMutation;

    let id = create_one(&harness).await;
    harness
        .service
        .update(id, UpdateSchedulingRequest::default(), harness.owner.id)
        .await
        .expect("update");
    harness
        .service
        .delete(id, harness.owner.id)
        .await
        .expect("delete");
    let err = harness
        .service
        .delete(id, harness.owner.id)
        .await
        .expect_err("already deleted");
    assert_eq!(err.code(), ErrorCode::NotFound);

    assert_eq!(
        harness.metrics.mutations(),
        vec![
            SchedulingMutation::Create,
            SchedulingMutation::Update,
            SchedulingMutation::Delete,
            SchedulingMutation::Delete,
        ]
    );
}

#[rstest]
#[tokio::test]
async fn listings_are_ordered_and_warm_the_cache(harness: LifecycleHarness) {
    let now = harness.now();
    let mut ids = Vec::new();
    for hours in [5, 1, 3] {
        let view = harness
            .service
            .create(create_request(now, TimeDelta::hours(hours)), harness.owner.id)
            .await
            .expect("create");
        ids.push(view.id);
    }
    let other = harness.add_technician("someone-else");
    harness
        .service
        .create(create_request(now, TimeDelta::hours(2)), other.id)
        .await
        .expect("create for other");

    let all = harness
        .service
        .list_for_technician(harness.owner.id)
        .await
        .expect("list");
    let hours: Vec<_> = all
        .iter()
        .map(|view| (view.scheduled_at - now).num_hours())
        .collect();
    assert_eq!(hours, vec![5, 3, 1]);

    let upcoming = harness
        .service
        .list_upcoming_for_technician(harness.owner.id, now + TimeDelta::hours(1))
        .await
        .expect("upcoming");
    let hours: Vec<_> = upcoming
        .iter()
        .map(|view| (view.scheduled_at - now).num_hours())
        .collect();
    assert_eq!(hours, vec![3, 5]);

    for id in ids {
        assert!(harness.cache.peek(id).is_some());
    }
}

#[rstest]
#[tokio::test]
async fn performance_reports_store_aggregates(harness: LifecycleHarness) {
    let now = harness.now();
    let mut completed = record_for(harness.owner.clone(), 0);
    completed.status = SchedulingStatus::Completed;
    completed.scheduled_at = now - TimeDelta::hours(10);
    completed.completed_at = Some(now - TimeDelta::hours(8));
    completed.client_rating = Some(crate::domain::ClientRating::new(4).expect("rating"));
    harness.store.seed(completed.clone());
    completed.completed_at = Some(now - TimeDelta::hours(6));
    completed.client_rating = Some(crate::domain::ClientRating::new(2).expect("rating"));
    harness.store.seed(completed);
    harness.store.seed(record_for(harness.owner.clone(), 0));

    let performance = harness
        .service
        .technician_performance(harness.owner.id)
        .await
        .expect("performance");

    assert_eq!(performance.completed_visits, 2);
    assert_eq!(performance.average_rating, Some(3.0));
    assert_eq!(performance.average_visit_duration_hours, Some(3.0));
    assert_eq!(performance.technician_name, harness.owner.full_name);
}

#[rstest]
#[tokio::test]
async fn performance_for_unknown_technician_is_not_found(harness: LifecycleHarness) {
    let err = harness
        .service
        .technician_performance(TechnicianId::random())
        .await
        .expect_err("unknown technician");
    assert_eq!(err.code(), ErrorCode::NotFound);
}
