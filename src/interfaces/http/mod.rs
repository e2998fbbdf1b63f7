mod templates;

use crate::application::use_cases::scrape_job::JobLauncher;
use crate::application::use_cases::session_registry::SessionRegistry;
use crate::domain::error::AppError;
use crate::domain::scrape_session::{ScrapeRequest, MAX_POSTS_LIMIT};
use crate::infrastructure::config::AppConfig;
use crate::shared::log_buffer::snapshot;
use crate::shared::{add_log, SharedLogs};
use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{dev::Server, get, post, web, App, HttpResponse, HttpServer, Responder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

const INVALID_SESSION: &str = "Invalid session ID";
const RESULTS_UNAVAILABLE: &str = "Results not available";

pub struct HttpState {
    pub registry: SessionRegistry,
    pub launcher: Arc<dyn JobLauncher>,
    pub logs: SharedLogs,
    pub config: Arc<AppConfig>,
}

#[derive(Deserialize)]
pub struct StartScrapeForm {
    pub profile_url: String,
    #[serde(default)]
    pub max_posts: Option<String>,
}

#[derive(Serialize)]
struct StatusResponse<'a> {
    status: &'a str,
    message: &'a str,
    progress: u8,
}

fn error_response(status: actix_web::http::StatusCode, message: &str) -> HttpResponse {
    HttpResponse::build(status)
        .content_type("text/html; charset=utf-8")
        .body(templates::error_page(message))
}

fn parse_max_posts(raw: Option<&str>, default: usize) -> Result<usize, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(value) => value
            .parse::<usize>()
            .map_err(|_| AppError::ValidationError(format!("max_posts must be a number, got {}", value))),
    }
}

#[get("/")]
async fn index(data: web::Data<HttpState>) -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(templates::index_page(
            data.config.scrape.default_max_posts,
            MAX_POSTS_LIMIT,
        ))
}

#[post("/start_scrape")]
async fn start_scrape(data: web::Data<HttpState>, form: web::Form<StartScrapeForm>) -> impl Responder {
    let request = parse_max_posts(form.max_posts.as_deref(), data.config.scrape.default_max_posts)
        .and_then(|max_posts| ScrapeRequest::new(form.profile_url.as_str(), max_posts));

    let request = match request {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Rejected scrape request");
            add_log(&data.logs, "WARN", "HTTP", &e.to_string());
            return error_response(actix_web::http::StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    let session_id = data.registry.create(&request);
    info!(session_id = %session_id, profile_url = %request.profile_url, "Starting scrape session");
    add_log(
        &data.logs,
        "INFO",
        "HTTP",
        &format!("Started session {} for {}", session_id, request.profile_url),
    );
    data.launcher.launch(session_id.clone(), request);

    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, format!("/scrape_status/{}", session_id)))
        .finish()
}

#[get("/scrape_status/{session_id}")]
async fn scrape_status(data: web::Data<HttpState>, path: web::Path<String>) -> impl Responder {
    let session_id = path.into_inner();
    match data.registry.get(&session_id) {
        Some(session) => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(templates::status_page(
                &session.id,
                &session.profile_url,
                session.status.as_str(),
                &session.message,
                session.progress,
            )),
        None => error_response(actix_web::http::StatusCode::NOT_FOUND, INVALID_SESSION),
    }
}

#[get("/api/status/{session_id}")]
async fn api_status(data: web::Data<HttpState>, path: web::Path<String>) -> impl Responder {
    match data.registry.get(&path.into_inner()) {
        Some(session) => HttpResponse::Ok().json(StatusResponse {
            status: session.status.as_str(),
            message: &session.message,
            progress: session.progress,
        }),
        None => HttpResponse::NotFound().json(serde_json::json!({ "error": INVALID_SESSION })),
    }
}

#[get("/download/{session_id}")]
async fn download(data: web::Data<HttpState>, path: web::Path<String>) -> impl Responder {
    let session_id = path.into_inner();
    let Some(csv_path) = data.registry.result_path(&session_id) else {
        return error_response(actix_web::http::StatusCode::NOT_FOUND, RESULTS_UNAVAILABLE);
    };

    match tokio::fs::read(&csv_path).await {
        Ok(bytes) => {
            let filename = csv_path
                .file_name()
                .map(|name| name.to_string_lossy().chars().filter(|c| !c.is_control()).collect())
                .unwrap_or_else(|| format!("{}.csv", session_id));
            HttpResponse::Ok()
                .content_type("text/csv")
                .insert_header(header::ContentDisposition {
                    disposition: header::DispositionType::Attachment,
                    parameters: vec![header::DispositionParam::Filename(filename)],
                })
                .body(bytes)
        }
        Err(e) => {
            warn!(path = %csv_path.display(), error = %e, "Failed to read results file");
            error_response(actix_web::http::StatusCode::NOT_FOUND, RESULTS_UNAVAILABLE)
        }
    }
}

#[get("/sessions")]
async fn list_sessions(data: web::Data<HttpState>) -> impl Responder {
    HttpResponse::Ok().json(data.registry.list())
}

#[get("/logs")]
async fn get_logs(data: web::Data<HttpState>) -> impl Responder {
    HttpResponse::Ok().json(snapshot(&data.logs))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(index)
        .service(start_scrape)
        .service(scrape_status)
        .service(download)
        .service(api_status)
        .service(web::scope("/api").service(list_sessions).service(get_logs));
}

pub fn start_server(state: HttpState, host: &str, port: u16) -> std::io::Result<Server> {
    let state = web::Data::new(state);

    let server = HttpServer::new(move || {
        let cors = Cors::permissive(); // Local tool, any origin

        App::new().wrap(cors).app_data(state.clone()).configure(configure)
    })
    .bind((host, port))?
    .run();

    Ok(server)
}
