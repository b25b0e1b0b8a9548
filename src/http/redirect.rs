use crate::http::AppState;
use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header;
use actix_web::middleware::Next;
use actix_web::{Error, HttpRequest, HttpResponse, web};
use log::trace;

/// Port the plaintext listener points browsers at.
#[derive(Debug, Clone, Copy)]
pub struct RedirectTarget {
    pub https_port: u16,
}

/// Drop any `:port` suffix from a Host value, keeping bracketed IPv6 intact.
fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, _)) => name,
        None => host,
    }
}

/// `https://` URL for the same host and path on the HTTPS listener.
pub fn https_location(host: &str, https_port: u16, path_and_query: &str) -> String {
    let name = strip_port(host);
    if https_port == 443 {
        format!("https://{}{}", name, path_and_query)
    } else {
        format!("https://{}:{}{}", name, https_port, path_and_query)
    }
}

fn location_for(req: &HttpRequest, https_port: u16) -> String {
    let path_and_query = req.uri().path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    https_location(req.connection_info().host(), https_port, path_and_query)
}

/// Answers plaintext requests with `301` when HTTPS is enabled.
pub async fn https_redirect<B: MessageBody>(req: ServiceRequest, next: Next<B>) -> Result<ServiceResponse<EitherBody<B>>, Error> {
    let location = match req.app_data::<web::Data<AppState>>() {
        Some(state) if state.https_enabled && req.connection_info().scheme() != "https" => {
            Some(location_for(req.request(), state.https_port))
        }
        _ => None,
    };
    if let Some(location) = location {
        trace!("Redirecting plaintext request to {}", location);
        let response = HttpResponse::MovedPermanently().insert_header((header::LOCATION, location)).finish();
        return Ok(req.into_response(response).map_into_right_body());
    }
    next.call(req).await.map(ServiceResponse::map_into_left_body)
}

/// Catch-all handler of the plaintext listener.
pub async fn redirect_to_https(req: HttpRequest, target: web::Data<RedirectTarget>) -> HttpResponse {
    let location = location_for(&req, target.https_port);
    HttpResponse::MovedPermanently().insert_header((header::LOCATION, location)).finish()
}
