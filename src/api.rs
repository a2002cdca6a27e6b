//! JSON read/ops API over the monitoring manager

use crate::config::ServiceConfig;
use crate::errors::MonitorError;
use crate::monitor::MonitoringManager;
use actix_web::{HttpResponse, Responder, web};
use serde_json::json;
use tracing::{info, warn};

/// Mount every monitoring route
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(overall_health))
        .route("/health/services", web::get().to(all_services_health))
        .route("/health/services/{name}", web::get().to(service_health))
        .route("/services", web::get().to(list_services))
        .route("/services", web::post().to(add_service))
        .route("/services/{name}", web::delete().to(remove_service))
        .route("/alerts", web::get().to(active_alerts))
        .route("/alerts/{id}/resolve", web::post().to(resolve_alert))
        .route("/monitoring/start", web::post().to(start_monitoring))
        .route("/monitoring/stop", web::post().to(stop_monitoring));
}

fn error_response(err: &MonitorError) -> HttpResponse {
    let body = json!({ "error": err.to_string() });

    match err {
        MonitorError::Validation(_) => HttpResponse::BadRequest().json(body),
        MonitorError::DuplicateService(_) => HttpResponse::Conflict().json(body),
        MonitorError::ServiceNotFound(_) | MonitorError::AlertNotFound(_) => {
            HttpResponse::NotFound().json(body)
        }
        MonitorError::Timeout(_) => HttpResponse::GatewayTimeout().json(body),
        _ => HttpResponse::InternalServerError().json(body),
    }
}

async fn overall_health(data: web::Data<MonitoringManager>) -> impl Responder {
    HttpResponse::Ok().json(data.get_overall_health().await)
}

async fn all_services_health(data: web::Data<MonitoringManager>) -> impl Responder {
    HttpResponse::Ok().json(data.get_all_services_health().await)
}

async fn service_health(
    data: web::Data<MonitoringManager>,
    service_name: web::Path<String>,
) -> impl Responder {
    let name = service_name.into_inner();

    match data.get_service_health(&name).await {
        Some(health) => HttpResponse::Ok().json(health),
        None => HttpResponse::NotFound()
            .json(json!({ "error": format!("No health data for service '{}'", name) })),
    }
}

async fn list_services(data: web::Data<MonitoringManager>) -> impl Responder {
    HttpResponse::Ok().json(data.list_services().await)
}

async fn add_service(
    data: web::Data<MonitoringManager>,
    service: web::Json<ServiceConfig>,
) -> impl Responder {
    let config = service.into_inner();
    let name = config.service.clone();
    info!("Request to add service: {}", name);

    match data.add_service(config).await {
        Ok(()) => HttpResponse::Created().json(json!({ "service": name })),
        Err(e) => {
            warn!("Rejected service {}: {}", name, e);
            error_response(&e)
        }
    }
}

async fn remove_service(
    data: web::Data<MonitoringManager>,
    service_name: web::Path<String>,
) -> impl Responder {
    let name = service_name.into_inner();
    info!("Request to remove service: {}", name);

    match data.remove_service(&name).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "service": name })),
        Err(e) => error_response(&e),
    }
}

async fn active_alerts(data: web::Data<MonitoringManager>) -> impl Responder {
    HttpResponse::Ok().json(data.get_active_alerts().await)
}

async fn resolve_alert(
    data: web::Data<MonitoringManager>,
    alert_id: web::Path<String>,
) -> impl Responder {
    match data.resolve_alert(&alert_id.into_inner()).await {
        Ok(alert) => HttpResponse::Ok().json(alert),
        Err(e) => error_response(&e),
    }
}

async fn start_monitoring(data: web::Data<MonitoringManager>) -> impl Responder {
    data.start_monitoring().await;
    HttpResponse::Ok().json(json!({ "running": data.is_running() }))
}

async fn stop_monitoring(data: web::Data<MonitoringManager>) -> impl Responder {
    data.stop_monitoring().await;
    HttpResponse::Ok().json(json!({ "running": data.is_running() }))
}
