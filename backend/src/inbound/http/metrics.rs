//! Prometheus scrape endpoint.

use actix_web::{HttpResponse, get, http::header, web};
use prometheus::{Encoder as _, Registry, TextEncoder};
use tracing::error;

/// Render every metric in the shared registry in the text exposition format.
#[get("/metrics")]
pub async fn metrics(registry: web::Data<Registry>) -> HttpResponse {
    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&registry.gather()) {
        Ok(body) => HttpResponse::Ok()
            .insert_header((header::CONTENT_TYPE, encoder.format_type()))
            .insert_header((header::CACHE_CONTROL, "no-store"))
            .body(body),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use prometheus::{IntCounter, Opts};

    #[actix_web::test]
    async fn exposes_registered_metrics() {
        let registry = Registry::new();
        let counter = IntCounter::with_opts(Opts::new("scheduler_probe_total", "probe"))
            .expect("valid counter");
        registry
            .register(Box::new(counter.clone()))
            .expect("registers");
        counter.inc_by(3);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(registry))
                .service(metrics),
        )
        .await;
        let res = test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request())
            .await;
        assert_eq!(res.status(), StatusCode::OK);

        let body = test::read_body(res).await;
        let text = String::from_utf8(body.to_vec()).expect("utf-8 body");
        assert!(text.contains("scheduler_probe_total 3"));
    }
}
