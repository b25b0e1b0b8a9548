use crate::auth::{MIN_PASSWORD_LEN, Session, SessionStore, require_login};
use crate::config::NewRule;
use crate::error::{PanelError, Result};
use crate::http::AppState;
use crate::rules::PageRequest;
use crate::service::ServiceAction;
use actix_web::http::header;
use actix_web::middleware::from_fn;
use actix_web::{HttpResponse, web};
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;

/// Placeholder replaced with the session's CSRF token in page templates.
const CSRF_PLACEHOLDER: &str = "{{csrf_token}}";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RulesQuery {
    pub page: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub listen: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/login").route(web::get().to(login_page)).route(web::post().to(login))).service(
        web::scope("")
            .wrap(from_fn(require_login))
            .route("/", web::get().to(index))
            .route("/get_csrf_token", web::get().to(get_csrf_token))
            .route("/get_rules", web::get().to(get_rules))
            .route("/add_rule", web::post().to(add_rule))
            .route("/delete_rule", web::delete().to(delete_rule))
            .route("/start_service", web::post().to(start_service))
            .route("/stop_service", web::post().to(stop_service))
            .route("/restart_service", web::post().to(restart_service))
            .route("/check_status", web::get().to(check_status))
            .route("/logout", web::post().to(logout)),
    );
}

async fn render_page(templates_dir: &Path, name: &str, csrf_token: &str) -> Result<String> {
    let path = templates_dir.join(name);
    let template = tokio::fs::read_to_string(&path).await.map_err(|e| {
        error!("Failed to read template {}: {}", path.display(), e);
        PanelError::internal(format!("missing template {name}"))
    })?;
    Ok(template.replace(CSRF_PLACEHOLDER, csrf_token))
}

/// Render `name` with a fresh CSRF token and reseal the session around it.
async fn page_with_fresh_token(state: &AppState, sessions: &SessionStore, mut session: Session, name: &str) -> Result<HttpResponse> {
    let token = session.issue_csrf_token();
    let body = render_page(&state.templates_dir, name, &token).await?;
    let cookie = sessions.save(&session)?;
    Ok(HttpResponse::Ok().cookie(cookie).content_type("text/html; charset=utf-8").body(body))
}

async fn login_page(state: web::Data<AppState>, sessions: web::Data<SessionStore>, session: Session) -> Result<HttpResponse> {
    if session.is_authenticated() {
        return Ok(HttpResponse::Found().insert_header((header::LOCATION, "/")).finish());
    }
    page_with_fresh_token(&state, &sessions, session, "login.html").await
}

async fn login(
    state: web::Data<AppState>,
    sessions: web::Data<SessionStore>,
    mut session: Session,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    let LoginRequest { password } = body.into_inner();
    if password.len() < MIN_PASSWORD_LEN {
        return Err(PanelError::validation(format!("Password must be at least {} characters", MIN_PASSWORD_LEN)));
    }

    let state = state.into_inner();
    let verified = web::block(move || state.verifier.verify(&password)).await.map_err(PanelError::internal)?;
    if !verified {
        warn!("Failed login attempt");
        return Err(PanelError::InvalidCredentials);
    }

    session.login();
    let cookie = sessions.save(&session)?;
    info!("Operator logged in");
    Ok(HttpResponse::Ok().cookie(cookie).json(json!({ "message": "Login successful" })))
}

async fn logout(sessions: web::Data<SessionStore>) -> HttpResponse {
    info!("Operator logged out");
    HttpResponse::Ok().cookie(sessions.clear()).json(json!({ "message": "Logged out" }))
}

async fn index(state: web::Data<AppState>, sessions: web::Data<SessionStore>, session: Session) -> Result<HttpResponse> {
    page_with_fresh_token(&state, &sessions, session, "index.html").await
}

async fn get_csrf_token(sessions: web::Data<SessionStore>, mut session: Session) -> Result<HttpResponse> {
    let token = session.csrf_token_or_issue();
    let cookie = sessions.save(&session)?;
    Ok(HttpResponse::Ok().cookie(cookie).json(json!({ "csrf_token": token })))
}

async fn get_rules(state: web::Data<AppState>, query: web::Query<RulesQuery>) -> HttpResponse {
    let page = PageRequest::from_query(query.page.as_deref(), query.size.as_deref());
    HttpResponse::Ok().json(state.rules.list(page).await)
}

async fn add_rule(state: web::Data<AppState>, body: web::Json<NewRule>) -> Result<HttpResponse> {
    let rule = state.rules.add(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(rule))
}

async fn delete_rule(state: web::Data<AppState>, query: web::Query<DeleteQuery>) -> Result<HttpResponse> {
    let listen = query.into_inner().listen.unwrap_or_default();
    state.rules.delete(&listen).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Forwarding rule deleted" })))
}

async fn service_action(state: &AppState, action: ServiceAction) -> Result<HttpResponse> {
    state.service.run(action).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": action.success_message() })))
}

async fn start_service(state: web::Data<AppState>) -> Result<HttpResponse> {
    service_action(&state, ServiceAction::Start).await
}

async fn stop_service(state: web::Data<AppState>) -> Result<HttpResponse> {
    service_action(&state, ServiceAction::Stop).await
}

async fn restart_service(state: web::Data<AppState>) -> Result<HttpResponse> {
    service_action(&state, ServiceAction::Restart).await
}

async fn check_status(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": state.service.status().await }))
}
