use crate::auth::{SessionStore, csrf_guard};
use crate::http::AppState;
use crate::http::redirect::{RedirectTarget, https_redirect, redirect_to_https};
use crate::http::routes;
use crate::settings::PanelSettings;
use actix_files::Files;
use actix_web::body::MessageBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::error::InternalError;
use actix_web::middleware::{Logger, from_fn};
use actix_web::{App, Error, HttpResponse, HttpServer, web};
use anyhow::{Context, Result};
use log::{info, warn};
use openssl::ssl::{SslAcceptor, SslAcceptorBuilder, SslFiletype, SslMethod};
use serde_json::json;
use std::path::Path;

/// Largest JSON body the API accepts.
const JSON_LIMIT: usize = 16 * 1024;

/// The panel application: logging, HTTPS redirect and CSRF checks around the
/// static assets, the login routes and the session-gated API.
pub fn build_app(
    state: web::Data<AppState>,
    sessions: web::Data<SessionStore>,
) -> App<impl ServiceFactory<ServiceRequest, Config = (), Response = ServiceResponse<impl MessageBody>, Error = Error, InitError = ()>> {
    let static_dir = state.static_dir.clone();
    App::new()
        .app_data(state)
        .app_data(sessions)
        .app_data(web::JsonConfig::default().limit(JSON_LIMIT).error_handler(|err, _req| {
            let response = HttpResponse::BadRequest().json(json!({ "error": format!("Invalid request body: {}", err) }));
            InternalError::from_response(err, response).into()
        }))
        .wrap(from_fn(csrf_guard))
        .wrap(from_fn(https_redirect))
        .wrap(Logger::default())
        .service(Files::new("/static", static_dir))
        .configure(routes::configure)
}

fn tls_acceptor(cert_file: &Path, key_file: &Path) -> Result<SslAcceptorBuilder> {
    let mut builder = SslAcceptor::mozilla_intermediate(SslMethod::tls())?;
    builder
        .set_private_key_file(key_file, SslFiletype::PEM)
        .with_context(|| format!("Failed to load TLS key {}", key_file.display()))?;
    builder
        .set_certificate_chain_file(cert_file)
        .with_context(|| format!("Failed to load TLS certificate {}", cert_file.display()))?;
    Ok(builder)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Serve the panel until a shutdown signal arrives.
///
/// With HTTPS enabled a second, plaintext listener on the redirect port
/// answers everything with a `301` to the HTTPS listener.
pub async fn run(state: AppState, sessions: SessionStore, settings: &PanelSettings) -> Result<()> {
    let port = settings.port();
    let state = web::Data::new(state);
    let sessions = web::Data::new(sessions);

    let app_state = state.clone();
    let app_sessions = sessions.clone();
    let panel = HttpServer::new(move || build_app(app_state.clone(), app_sessions.clone())).disable_signals();

    let (cert_file, key_file) = settings.tls_files()?;
    let acceptor = tls_acceptor(cert_file, key_file)?;
    let server = panel.bind_openssl(("0.0.0.0", port), acceptor).with_context(|| format!("Failed to bind port {}", port))?.run();
    info!("Panel listening on https://0.0.0.0:{}", port);

    let redirect_port = settings.redirect_port();
    let target = web::Data::new(RedirectTarget { https_port: port });
    let redirect = HttpServer::new(move || App::new().app_data(target.clone()).wrap(Logger::default()).default_service(web::to(redirect_to_https)))
        .disable_signals()
        .bind(("0.0.0.0", redirect_port))
        .with_context(|| format!("Failed to bind redirect port {}", redirect_port))?
        .run();
    info!("Redirecting http://0.0.0.0:{} to HTTPS", redirect_port);

    let server_handle = server.handle();
    let redirect_handle = redirect.handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutting down");
        tokio::join!(server_handle.stop(true), redirect_handle.stop(true));
    });

    tokio::try_join!(server, redirect)?;
    info!("Panel stopped");
    Ok(())
}
