//! Scheduler entry-point: applies migrations, wires the adapters into the
//! lifecycle service and reminder sweep, and serves operational probes.

use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use async_trait::async_trait;
use color_eyre::eyre::{Result, WrapErr as _, eyre};
use mockable::DefaultClock;
use ortho_config::OrthoConfig as _;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use scheduler_backend::SchedulerSettings;
use scheduler_backend::domain::ports::SchedulingMetrics;
#[cfg(not(feature = "metrics"))]
use scheduler_backend::domain::ports::NoOpSchedulingMetrics;
use scheduler_backend::domain::{
    ReminderSweep, SchedulingLifecyclePorts, SchedulingLifecycleService,
};
use scheduler_backend::inbound::http::{self, DependencyProbe, HealthState};
use scheduler_backend::outbound::cache::RedisSchedulingCache;
use scheduler_backend::outbound::geocoding::NominatimHttpSource;
#[cfg(feature = "metrics")]
use scheduler_backend::outbound::metrics::PrometheusSchedulingMetrics;
use scheduler_backend::outbound::persistence::{
    DbPool, DieselSchedulingRepository, DieselTechnicianRepository, run_pending_migrations,
};
use scheduler_backend::outbound::queue::{
    BufferedEventDispatcher, DispatcherRuntime, RedisLifecycleEventChannel,
};
use scheduler_backend::outbound::redis::RedisPool;

/// Readiness check against PostgreSQL.
struct StoreProbe(DbPool);

#[async_trait]
impl DependencyProbe for StoreProbe {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn check(&self) -> Result<(), String> {
        self.0.ping().await.map_err(|err| err.to_string())
    }
}

/// Readiness check against Redis.
struct CacheProbe(RedisPool);

#[async_trait]
impl DependencyProbe for CacheProbe {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn check(&self) -> Result<(), String> {
        self.0.ping().await.map_err(|err| err.to_string())
    }
}

/// Application bootstrap.
#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = SchedulerSettings::load_from_iter(std::env::args_os())
        .map_err(|err| eyre!("load scheduler settings: {err}"))?;
    let database_url = settings.database_url()?.to_owned();

    let applied = run_pending_migrations(&database_url)
        .await
        .wrap_err("apply database migrations")?;
    info!(applied, "database migrations applied");

    let db_pool = DbPool::new(settings.pool_config()?)
        .await
        .wrap_err("connect to PostgreSQL")?;
    let redis_pool = RedisPool::connect(
        settings.redis_url()?,
        settings.redis_pool_max_size(),
        settings.connection_timeout(),
    )
    .await
    .wrap_err("connect to Redis")?;

    let geocoder = NominatimHttpSource::new(
        settings.geocoding_base_url()?,
        settings.geocoding_timeout(),
    )
    .wrap_err("build geocoding client")?;

    let (dispatcher, dispatcher_handle) = BufferedEventDispatcher::spawn(
        Arc::new(RedisLifecycleEventChannel::new(redis_pool.clone())),
        settings.dispatcher_config(),
        DispatcherRuntime::default(),
    );
    let events = Arc::new(dispatcher);

    #[cfg(feature = "metrics")]
    let registry = prometheus::Registry::new();
    #[cfg(feature = "metrics")]
    let metrics: Arc<dyn SchedulingMetrics> = Arc::new(
        PrometheusSchedulingMetrics::new(&registry).wrap_err("register scheduling metrics")?,
    );
    #[cfg(not(feature = "metrics"))]
    let metrics: Arc<dyn SchedulingMetrics> = Arc::new(NoOpSchedulingMetrics);

    let schedulings = Arc::new(DieselSchedulingRepository::new(db_pool.clone()));
    let clock = Arc::new(DefaultClock);
    let lifecycle = web::Data::new(SchedulingLifecycleService::new(
        SchedulingLifecyclePorts {
            schedulings: schedulings.clone(),
            technicians: Arc::new(DieselTechnicianRepository::new(db_pool.clone())),
            cache: Arc::new(RedisSchedulingCache::new(redis_pool.clone())),
            geocoder: Arc::new(geocoder),
            events: events.clone(),
            metrics,
        },
        clock.clone(),
        settings.lifecycle_config(),
    ));

    let sweep = Arc::new(ReminderSweep::new(
        schedulings,
        events,
        clock,
        settings.reminder_config(),
    ))
    .start();

    let probes: Vec<Arc<dyn DependencyProbe>> = vec![
        Arc::new(StoreProbe(db_pool)),
        Arc::new(CacheProbe(redis_pool)),
    ];
    let health_state = web::Data::new(HealthState::new(probes));
    // Clone for server factory so readiness probe remains accessible.
    let server_health_state = health_state.clone();
    #[cfg(feature = "metrics")]
    let registry = web::Data::new(registry);
    let bind_addr = settings.bind_addr()?;
    let server = HttpServer::new(move || {
        let app = App::new()
            .app_data(server_health_state.clone())
            .app_data(lifecycle.clone())
            .configure(http::configure);
        #[cfg(feature = "metrics")]
        let app = app.app_data(registry.clone());
        app
    })
    .disable_signals()
    .bind(bind_addr)
    .wrap_err_with(|| format!("bind {bind_addr}"))?
    .run();
    let server_handle = server.handle();
    tokio::pin!(server);

    health_state.mark_ready();
    info!(%bind_addr, "scheduler ready");

    let server_result = tokio::select! {
        result = &mut server => result,
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                warn!(error = %err, "signal listener failed; shutting down");
            }
            info!("shutdown requested");
            health_state.mark_unhealthy();
            server_handle.stop(true).await;
            Ok(())
        }
    };

    health_state.mark_unhealthy();
    sweep.stop().await;
    let stats = dispatcher_handle.shutdown().await;
    info!(
        delivered = stats.delivered,
        dropped = stats.dropped,
        "event dispatcher drained"
    );
    server_result.wrap_err("HTTP server failed")
}
