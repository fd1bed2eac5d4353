//! PostgreSQL-backed `SchedulingRepository` implementation using Diesel ORM.
//!
//! A record spans three tables: the parent row plus its equipment and spare
//! part rows. Every mutation runs in one transaction, and reads load parents
//! and children inside a single transaction so they observe one snapshot.
//! Concurrent updates of the same record serialise on the parent row lock
//! taken by the `UPDATE`; the last committed write wins.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel::sql_query;
use diesel::sql_types::Uuid as SqlUuid;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::ports::{SchedulingRepository, SchedulingRepositoryError};
use crate::domain::{
    ChildReplacement, ClientRating, EquipmentDraft, EquipmentItem, NewSchedulingRecord,
    PerformanceAggregates, SchedulingId, SchedulingRecord, SchedulingStatus, ServicePriority,
    SparePartDraft, SparePartItem, Technician, TechnicianId,
};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::{
    EquipmentRow, NewEquipmentRow, NewSchedulingRow, NewSparePartRow, PerformanceRow,
    SchedulingRow, SchedulingUpdate, SparePartRow, TechnicianRow,
};
use super::pool::{DbPool, PoolError};
use super::schema::{scheduling_equipment, scheduling_spare_parts, schedulings, technicians};

const PERFORMANCE_SQL: &str = r#"
SELECT
    AVG(client_rating)::float8 AS average_rating,
    COUNT(*) FILTER (WHERE status = 'COMPLETED') AS completed_visits,
    (AVG(EXTRACT(EPOCH FROM (completed_at - scheduled_at)))
        FILTER (WHERE status = 'COMPLETED' AND completed_at IS NOT NULL)
        / 3600.0)::float8 AS average_visit_duration_hours
FROM schedulings
WHERE technician_id = $1
"#;

/// Diesel-backed implementation of the scheduling repository port.
#[derive(Clone)]
pub struct DieselSchedulingRepository {
    pool: DbPool,
}

impl DieselSchedulingRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Map pool errors to domain repository errors.
fn map_pool_error(error: PoolError) -> SchedulingRepositoryError {
    map_basic_pool_error(error, SchedulingRepositoryError::connection)
}

/// Map Diesel errors to domain repository errors.
fn map_diesel_error(error: DieselError) -> SchedulingRepositoryError {
    map_basic_diesel_error(
        error,
        SchedulingRepositoryError::query,
        SchedulingRepositoryError::connection,
    )
}

/// Failure inside a write transaction.
#[derive(Debug)]
enum WriteError {
    Diesel(DieselError),
    Missing(i64),
    Invalid(String),
}

impl From<DieselError> for WriteError {
    fn from(error: DieselError) -> Self {
        Self::Diesel(error)
    }
}

fn map_write_error(error: WriteError) -> SchedulingRepositoryError {
    match error {
        WriteError::Diesel(error) => map_diesel_error(error),
        WriteError::Missing(id) => SchedulingRepositoryError::missing(id),
        WriteError::Invalid(message) => SchedulingRepositoryError::query(message),
    }
}

/// Which parent rows a read loads.
#[derive(Debug, Clone, Copy)]
enum Selection {
    ById(i64),
    OwnedBy(Uuid),
    UpcomingFor(Uuid, DateTime<Utc>),
    InRange(DateTime<Utc>, DateTime<Utc>),
}

type ParentRow = (SchedulingRow, TechnicianRow);

/// Raw rows for a set of records, read in one transaction.
struct Snapshot {
    parents: Vec<ParentRow>,
    equipment: Vec<EquipmentRow>,
    spare_parts: Vec<SparePartRow>,
}

async fn load_parents(
    conn: &mut AsyncPgConnection,
    selection: Selection,
) -> QueryResult<Vec<ParentRow>> {
    let columns = (SchedulingRow::as_select(), TechnicianRow::as_select());
    let joined = schedulings::table.inner_join(technicians::table);
    match selection {
        Selection::ById(id) => {
            joined
                .filter(schedulings::id.eq(id))
                .select(columns)
                .load(conn)
                .await
        }
        Selection::OwnedBy(technician_id) => {
            joined
                .filter(schedulings::technician_id.eq(technician_id))
                .order((schedulings::scheduled_at.desc(), schedulings::id.desc()))
                .select(columns)
                .load(conn)
                .await
        }
        Selection::UpcomingFor(technician_id, after) => {
            joined
                .filter(schedulings::technician_id.eq(technician_id))
                .filter(schedulings::scheduled_at.gt(after))
                .order((schedulings::scheduled_at.asc(), schedulings::id.asc()))
                .select(columns)
                .load(conn)
                .await
        }
        Selection::InRange(start, end) => {
            joined
                .filter(schedulings::scheduled_at.ge(start))
                .filter(schedulings::scheduled_at.lt(end))
                .filter(schedulings::status.ne(SchedulingStatus::Cancelled.as_str()))
                .order((schedulings::scheduled_at.asc(), schedulings::id.asc()))
                .select(columns)
                .load(conn)
                .await
        }
    }
}

async fn load_snapshot(
    conn: &mut AsyncPgConnection,
    selection: Selection,
) -> QueryResult<Snapshot> {
    let parents = load_parents(conn, selection).await?;
    if parents.is_empty() {
        return Ok(Snapshot {
            parents,
            equipment: Vec::new(),
            spare_parts: Vec::new(),
        });
    }
    let ids: Vec<i64> = parents.iter().map(|(row, _)| row.id).collect();
    let equipment = scheduling_equipment::table
        .filter(scheduling_equipment::scheduling_id.eq_any(&ids))
        .order(scheduling_equipment::id)
        .select(EquipmentRow::as_select())
        .load(conn)
        .await?;
    let spare_parts = scheduling_spare_parts::table
        .filter(scheduling_spare_parts::scheduling_id.eq_any(&ids))
        .order(scheduling_spare_parts::id)
        .select(SparePartRow::as_select())
        .load(conn)
        .await?;
    Ok(Snapshot {
        parents,
        equipment,
        spare_parts,
    })
}

async fn insert_equipment(
    conn: &mut AsyncPgConnection,
    scheduling_id: i64,
    drafts: &[EquipmentDraft],
) -> QueryResult<()> {
    if drafts.is_empty() {
        return Ok(());
    }
    let rows: Vec<NewEquipmentRow<'_>> = drafts
        .iter()
        .map(|draft| NewEquipmentRow {
            scheduling_id,
            name: &draft.name,
            serial_number: draft.serial_number.as_deref(),
            description: draft.description.as_deref(),
        })
        .collect();
    diesel::insert_into(scheduling_equipment::table)
        .values(&rows)
        .execute(conn)
        .await?;
    Ok(())
}

async fn insert_spare_parts(
    conn: &mut AsyncPgConnection,
    scheduling_id: i64,
    drafts: &[SparePartDraft],
) -> Result<(), WriteError> {
    if drafts.is_empty() {
        return Ok(());
    }
    let rows = drafts
        .iter()
        .map(|draft| {
            let quantity = i32::try_from(draft.quantity).map_err(|_| {
                WriteError::Invalid(format!("spare part quantity {} too large", draft.quantity))
            })?;
            Ok(NewSparePartRow {
                scheduling_id,
                name: &draft.name,
                part_number: draft.part_number.as_deref(),
                quantity,
            })
        })
        .collect::<Result<Vec<_>, WriteError>>()?;
    diesel::insert_into(scheduling_spare_parts::table)
        .values(&rows)
        .execute(conn)
        .await?;
    Ok(())
}

fn row_to_technician(row: TechnicianRow) -> Technician {
    Technician {
        id: TechnicianId::from_uuid(row.id),
        username: row.username,
        full_name: row.full_name,
        email: row.email,
    }
}

fn row_to_spare_part(row: SparePartRow) -> Result<SparePartItem, SchedulingRepositoryError> {
    let quantity = u32::try_from(row.quantity).map_err(|_| {
        SchedulingRepositoryError::query(format!(
            "spare part {} has invalid quantity {}",
            row.id, row.quantity
        ))
    })?;
    Ok(SparePartItem {
        id: row.id,
        name: row.name,
        part_number: row.part_number,
        quantity,
    })
}

/// Convert a parent row and its children into a domain record.
fn row_to_record(
    row: SchedulingRow,
    technician: TechnicianRow,
    equipment: Vec<EquipmentItem>,
    spare_parts: Vec<SparePartItem>,
) -> Result<SchedulingRecord, SchedulingRepositoryError> {
    let status: SchedulingStatus = row
        .status
        .parse()
        .map_err(|err| SchedulingRepositoryError::query(format!("scheduling {}: {err}", row.id)))?;
    let priority: ServicePriority = row
        .priority
        .parse()
        .map_err(|err| SchedulingRepositoryError::query(format!("scheduling {}: {err}", row.id)))?;
    let client_rating = row
        .client_rating
        .map(|raw| ClientRating::new(i64::from(raw)))
        .transpose()
        .map_err(|err| SchedulingRepositoryError::query(format!("scheduling {}: {err}", row.id)))?;

    Ok(SchedulingRecord {
        id: SchedulingId::new(row.id),
        technician: row_to_technician(technician),
        farm_name: row.farm_name,
        client_name: row.client_name,
        client_email: row.client_email,
        address: row.address,
        latitude: row.latitude,
        longitude: row.longitude,
        scheduled_at: row.scheduled_at,
        completed_at: row.completed_at,
        service_description: row.service_description,
        status,
        priority,
        client_rating,
        client_feedback: row.client_feedback,
        equipment,
        spare_parts,
    })
}

/// Parent-row columns rewritten by an update. `updated_at` is set by the
/// statement itself.
fn record_changeset(record: &SchedulingRecord) -> SchedulingUpdate<'_> {
    SchedulingUpdate {
        farm_name: &record.farm_name,
        client_name: &record.client_name,
        client_email: &record.client_email,
        address: &record.address,
        latitude: record.latitude,
        longitude: record.longitude,
        scheduled_at: record.scheduled_at,
        completed_at: record.completed_at,
        service_description: record.service_description.as_deref(),
        status: record.status.as_str(),
        priority: record.priority.as_str(),
        client_rating: record
            .client_rating
            .map(|rating| i16::from(rating.get())),
        client_feedback: record.client_feedback.as_deref(),
    }
}

/// Group children by parent and build records in parent order.
fn assemble(snapshot: Snapshot) -> Result<Vec<SchedulingRecord>, SchedulingRepositoryError> {
    let Snapshot {
        parents,
        equipment,
        spare_parts,
    } = snapshot;

    let mut equipment_by_parent: HashMap<i64, Vec<EquipmentItem>> = HashMap::new();
    for row in equipment {
        equipment_by_parent
            .entry(row.scheduling_id)
            .or_default()
            .push(EquipmentItem {
                id: row.id,
                name: row.name,
                serial_number: row.serial_number,
                description: row.description,
            });
    }
    let mut parts_by_parent: HashMap<i64, Vec<SparePartItem>> = HashMap::new();
    for row in spare_parts {
        let parent = row.scheduling_id;
        parts_by_parent
            .entry(parent)
            .or_default()
            .push(row_to_spare_part(row)?);
    }

    parents
        .into_iter()
        .map(|(row, technician)| {
            let equipment = equipment_by_parent.remove(&row.id).unwrap_or_default();
            let spare_parts = parts_by_parent.remove(&row.id).unwrap_or_default();
            row_to_record(row, technician, equipment, spare_parts)
        })
        .collect()
}

fn single(
    snapshot: Snapshot,
    id: i64,
) -> Result<SchedulingRecord, SchedulingRepositoryError> {
    assemble(snapshot)?
        .into_iter()
        .next()
        .ok_or_else(|| SchedulingRepositoryError::missing(id))
}

fn performance_from_row(
    row: PerformanceRow,
) -> Result<PerformanceAggregates, SchedulingRepositoryError> {
    let completed_visits = u64::try_from(row.completed_visits).map_err(|_| {
        SchedulingRepositoryError::query(format!(
            "negative completed visit count {}",
            row.completed_visits
        ))
    })?;
    Ok(PerformanceAggregates {
        average_rating: row.average_rating,
        completed_visits,
        average_visit_duration_hours: row.average_visit_duration_hours,
    })
}

impl DieselSchedulingRepository {
    async fn read(&self, selection: Selection) -> Result<Snapshot, SchedulingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| async move { load_snapshot(conn, selection).await }.scope_boxed())
            .await
            .map_err(map_diesel_error)
    }
}

#[async_trait]
impl SchedulingRepository for DieselSchedulingRepository {
    async fn create(
        &self,
        record: &NewSchedulingRecord,
    ) -> Result<SchedulingRecord, SchedulingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let new_row = NewSchedulingRow {
            technician_id: *record.technician_id.as_uuid(),
            farm_name: &record.farm_name,
            client_name: &record.client_name,
            client_email: &record.client_email,
            address: &record.address,
            latitude: record.latitude,
            longitude: record.longitude,
            scheduled_at: record.scheduled_at,
            service_description: record.service_description.as_deref(),
            status: record.status.as_str(),
            priority: record.priority.as_str(),
        };

        let (id, snapshot) = conn
            .transaction::<_, WriteError, _>(|conn| {
                async move {
                    let id: i64 = diesel::insert_into(schedulings::table)
                        .values(&new_row)
                        .returning(schedulings::id)
                        .get_result(conn)
                        .await?;
                    insert_equipment(conn, id, &record.equipment).await?;
                    insert_spare_parts(conn, id, &record.spare_parts).await?;
                    let snapshot = load_snapshot(conn, Selection::ById(id)).await?;
                    Ok((id, snapshot))
                }
                .scope_boxed()
            })
            .await
            .map_err(map_write_error)?;

        single(snapshot, id)
    }

    async fn find_by_id(
        &self,
        id: SchedulingId,
    ) -> Result<Option<SchedulingRecord>, SchedulingRepositoryError> {
        let snapshot = self.read(Selection::ById(id.get())).await?;
        Ok(assemble(snapshot)?.into_iter().next())
    }

    async fn list_for_technician(
        &self,
        technician_id: &TechnicianId,
    ) -> Result<Vec<SchedulingRecord>, SchedulingRepositoryError> {
        let snapshot = self
            .read(Selection::OwnedBy(*technician_id.as_uuid()))
            .await?;
        assemble(snapshot)
    }

    async fn list_upcoming_for_technician(
        &self,
        technician_id: &TechnicianId,
        after: DateTime<Utc>,
    ) -> Result<Vec<SchedulingRecord>, SchedulingRepositoryError> {
        let snapshot = self
            .read(Selection::UpcomingFor(*technician_id.as_uuid(), after))
            .await?;
        assemble(snapshot)
    }

    async fn find_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SchedulingRecord>, SchedulingRepositoryError> {
        let snapshot = self.read(Selection::InRange(start, end)).await?;
        assemble(snapshot)
    }

    async fn update(
        &self,
        record: &SchedulingRecord,
        children: &ChildReplacement,
    ) -> Result<SchedulingRecord, SchedulingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let id = record.id.get();
        let changes = record_changeset(record);

        let snapshot = conn
            .transaction::<_, WriteError, _>(|conn| {
                async move {
                    let affected = diesel::update(schedulings::table.find(id))
                        .set((&changes, schedulings::updated_at.eq(diesel::dsl::now)))
                        .execute(conn)
                        .await?;
                    if affected == 0 {
                        return Err(WriteError::Missing(id));
                    }
                    if let Some(equipment) = &children.equipment {
                        diesel::delete(
                            scheduling_equipment::table
                                .filter(scheduling_equipment::scheduling_id.eq(id)),
                        )
                        .execute(conn)
                        .await?;
                        insert_equipment(conn, id, equipment).await?;
                    }
                    if let Some(spare_parts) = &children.spare_parts {
                        diesel::delete(
                            scheduling_spare_parts::table
                                .filter(scheduling_spare_parts::scheduling_id.eq(id)),
                        )
                        .execute(conn)
                        .await?;
                        insert_spare_parts(conn, id, spare_parts).await?;
                    }
                    Ok(load_snapshot(conn, Selection::ById(id)).await?)
                }
                .scope_boxed()
            })
            .await
            .map_err(map_write_error)?;

        single(snapshot, id)
    }

    async fn delete(&self, id: SchedulingId) -> Result<bool, SchedulingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        // Child rows go with the parent through ON DELETE CASCADE.
        let affected = diesel::delete(schedulings::table.find(id.get()))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(affected > 0)
    }

    async fn performance_for_technician(
        &self,
        technician_id: &TechnicianId,
    ) -> Result<PerformanceAggregates, SchedulingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: PerformanceRow = sql_query(PERFORMANCE_SQL)
            .bind::<SqlUuid, _>(*technician_id.as_uuid())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        performance_from_row(row)
    }
}
