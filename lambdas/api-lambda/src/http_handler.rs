use condo_core::access::nav_items;
use condo_core::listing::OrderBy;
use condo_core::stats::{CountQuery, CountResponse};
use condo_core::types::{
    CreateNoticeRequest, CreateOccurrenceRequest, CreatePackageRequest, CreateReservationRequest,
    CreateVisitorRequest, PickupRequest, ReplyOccurrenceRequest, ReservationDecision,
    UpdateOccurrenceStatusRequest, UpdateProfileRequest,
};
use condo_core::{Capability, Table};
use condo_shared::error::ApiError;
use condo_shared::guard::authorize;
use condo_shared::http::{self, parse_body, parse_optional_body, reply};
use condo_shared::{
    auth, notices, occurrences, packages, profiles, reservations, roles, session, stats, tables,
    visitors, AppState,
};
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};
use std::sync::Arc;

/// Identity of the caller as established by the JWT authorizer.
struct Caller {
    user_id: String,
    email: Option<String>,
}

fn jwt_claim(event: &Request, claim: &str) -> Option<String> {
    event
        .request_context_ref()
        .and_then(|ctx| ctx.authorizer())
        .and_then(|auth| auth.jwt.as_ref())
        .and_then(|jwt| jwt.claims.get(claim))
        .map(|s| s.to_string())
}

/// Get user ID from JWT claims. The X-User-Id header is only honoured when
/// the local development switch is on and no JWT subject is present.
fn caller(event: &Request, allow_user_id_header: bool) -> Result<Caller, ApiError> {
    let user_id = jwt_claim(event, "sub")
        .or_else(|| {
            if !allow_user_id_header {
                return None;
            }
            event
                .headers()
                .get("X-User-Id")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

    Ok(Caller {
        user_id,
        email: jwt_claim(event, "email"),
    })
}

fn bearer_token(event: &Request) -> Result<String, ApiError> {
    event
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Missing access token".to_string()))
}

/// Main Lambda handler - routes requests to auth and data endpoints
pub(crate) async fn function_handler(event: Request, state: Arc<AppState>) -> Result<Response<Body>, Error> {
    let method = event.method().clone();
    let path = event.uri().path().to_string();
    tracing::info!("API Lambda invoked - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    if method == Method::OPTIONS {
        return http::preflight();
    }

    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    http::respond(route(&event, &state, &method, &parts).await)
}

async fn route(
    event: &Request,
    state: &AppState,
    method: &Method,
    parts: &[&str],
) -> Result<Response<Body>, ApiError> {
    let body: &[u8] = event.body();

    // Auth endpoints (no JWT validation)
    match (method, parts) {
        (&Method::POST, ["login"]) => return reply(StatusCode::OK, &auth::login(state, parse_body(body)?).await?),
        (&Method::POST, ["signup"]) => {
            return reply(StatusCode::CREATED, &auth::signup(state, parse_body(body)?).await?)
        }
        (&Method::POST, ["refresh"]) => {
            return reply(StatusCode::OK, &auth::refresh(state, parse_body(body)?).await?)
        }
        (&Method::POST, ["logout"]) => {
            auth::logout(state, &bearer_token(event)?).await?;
            return no_content();
        }
        (_, ["login" | "signup" | "refresh" | "logout"]) => return method_not_allowed(),
        _ => {}
    }

    let caller = caller(event, state.config.allow_user_id_header)?;
    let db = &state.dynamo_client;
    let table_name = state.table_name();
    tracing::info!("Caller: {}", caller.user_id);

    match (method, parts) {
        // Session
        (&Method::GET, ["session"]) => reply(
            StatusCode::OK,
            &session::resolve_session(db, table_name, &caller.user_id, caller.email.as_deref()).await?,
        ),
        (&Method::GET, ["navigation"]) => {
            let items = roles::get_role(db, table_name, &caller.user_id)
                .await?
                .map(nav_items)
                .unwrap_or_default();
            reply(StatusCode::OK, &items)
        }

        (&Method::GET, ["roles", "me"]) => reply(
            StatusCode::OK,
            &roles::get_role(db, table_name, &caller.user_id).await?,
        ),

        // Profile
        (&Method::GET, ["profiles", "me"]) => reply(
            StatusCode::OK,
            &profiles::require_profile(db, table_name, &caller.user_id).await?,
        ),
        (&Method::PATCH, ["profiles", "me"]) => {
            authorize(db, table_name, &caller.user_id, Capability::EditOwnProfile).await?;
            let req: UpdateProfileRequest = parse_body(body)?;
            reply(
                StatusCode::OK,
                &profiles::update_profile(db, table_name, &caller.user_id, req).await?,
            )
        }

        // People management
        (&Method::GET, ["people"]) => {
            authorize(db, table_name, &caller.user_id, Capability::ManagePeople).await?;
            reply(StatusCode::OK, &profiles::list_people(db, table_name).await?)
        }
        (&Method::POST, ["people"]) => {
            authorize(db, table_name, &caller.user_id, Capability::ManagePeople).await?;
            reply(StatusCode::CREATED, &auth::signup(state, parse_body(body)?).await?)
        }

        // Dashboard
        (&Method::GET, ["stats"]) => {
            authorize(db, table_name, &caller.user_id, Capability::ViewDashboard).await?;
            reply(StatusCode::OK, &stats::dashboard_stats(db, table_name).await?)
        }
        (&Method::GET, ["stats", name]) => {
            let query = CountQuery::parse(name)?;
            authorize(db, table_name, &caller.user_id, Capability::ViewDashboard).await?;
            let count = stats::count(db, table_name, query).await?;
            reply(StatusCode::OK, &CountResponse { count })
        }

        // Packages
        (&Method::POST, ["packages"]) => {
            authorize(db, table_name, &caller.user_id, Capability::ManagePackages).await?;
            let req: CreatePackageRequest = parse_body(body)?;
            reply(
                StatusCode::CREATED,
                &packages::create_package(db, table_name, &caller.user_id, req).await?,
            )
        }
        (&Method::POST, ["packages", id, "pickup"]) => {
            authorize(db, table_name, &caller.user_id, Capability::ManagePackages).await?;
            let req: PickupRequest = parse_optional_body(body)?;
            reply(StatusCode::OK, &packages::confirm_pickup(db, table_name, id, req).await?)
        }
        (&Method::POST, ["packages", id, "return"]) => {
            authorize(db, table_name, &caller.user_id, Capability::ManagePackages).await?;
            reply(StatusCode::OK, &packages::mark_returned(db, table_name, id).await?)
        }

        // Visitors
        (&Method::POST, ["visitors"]) => {
            authorize(db, table_name, &caller.user_id, Capability::ManageVisitors).await?;
            let req: CreateVisitorRequest = parse_body(body)?;
            reply(
                StatusCode::CREATED,
                &visitors::register_entry(db, table_name, &caller.user_id, req).await?,
            )
        }
        (&Method::POST, ["visitors", id, "exit"]) => {
            authorize(db, table_name, &caller.user_id, Capability::ManageVisitors).await?;
            reply(StatusCode::OK, &visitors::register_exit(db, table_name, id).await?)
        }

        // Reservations
        (&Method::POST, ["reservations"]) => {
            let (_, requester) = tokio::try_join!(
                authorize(db, table_name, &caller.user_id, Capability::RequestReservation),
                profiles::require_profile(db, table_name, &caller.user_id),
            )?;
            let req: CreateReservationRequest = parse_body(body)?;
            reply(
                StatusCode::CREATED,
                &reservations::request_reservation(db, table_name, &requester, req).await?,
            )
        }
        (&Method::POST, ["reservations", id, action @ ("approve" | "reject")]) => {
            authorize(db, table_name, &caller.user_id, Capability::DecideReservation).await?;
            let decision = if *action == "approve" {
                ReservationDecision::Approve
            } else {
                ReservationDecision::Reject
            };
            reply(
                StatusCode::OK,
                &reservations::decide_reservation(db, table_name, id, decision).await?,
            )
        }

        // Notices
        (&Method::POST, ["notices"]) => {
            let (_, author) = tokio::try_join!(
                authorize(db, table_name, &caller.user_id, Capability::PublishNotice),
                profiles::require_profile(db, table_name, &caller.user_id),
            )?;
            let req: CreateNoticeRequest = parse_body(body)?;
            reply(
                StatusCode::CREATED,
                &notices::publish_notice(db, table_name, &author, req).await?,
            )
        }
        (&Method::DELETE, ["notices", id]) => {
            authorize(db, table_name, &caller.user_id, Capability::PublishNotice).await?;
            notices::delete_notice(db, table_name, id).await?;
            no_content()
        }

        // Occurrences
        (&Method::POST, ["occurrences"]) => {
            let (_, requester) = tokio::try_join!(
                authorize(db, table_name, &caller.user_id, Capability::OpenOccurrence),
                profiles::require_profile(db, table_name, &caller.user_id),
            )?;
            let req: CreateOccurrenceRequest = parse_body(body)?;
            reply(
                StatusCode::CREATED,
                &occurrences::open_occurrence(db, table_name, &requester, req).await?,
            )
        }
        (&Method::GET, ["occurrences", id]) => {
            authorize(db, table_name, &caller.user_id, Capability::ViewOccurrences).await?;
            reply(StatusCode::OK, &occurrences::get_occurrence(db, table_name, id).await?)
        }
        (&Method::PATCH, ["occurrences", id]) => {
            authorize(db, table_name, &caller.user_id, Capability::ManageOccurrence).await?;
            let req: UpdateOccurrenceStatusRequest = parse_body(body)?;
            reply(
                StatusCode::OK,
                &occurrences::set_status(db, table_name, id, req.status).await?,
            )
        }
        (&Method::POST, ["occurrences", id, "events"]) => {
            let (role, author) = tokio::try_join!(
                roles::get_role(db, table_name, &caller.user_id),
                profiles::require_profile(db, table_name, &caller.user_id),
            )?;
            let req: ReplyOccurrenceRequest = parse_body(body)?;
            reply(
                StatusCode::CREATED,
                &occurrences::reply(db, table_name, id, &author, role, &req.message).await?,
            )
        }

        // Full ordered read of one table
        (&Method::GET, [name]) => {
            let table = Table::parse(name).map_err(|_| ApiError::NotFound("Route"))?;
            authorize(db, table_name, &caller.user_id, tables::read_capability(table)).await?;
            let params = event.query_string_parameters_ref();
            let order = OrderBy::from_query(
                table,
                params.and_then(|p| p.first("order")),
                params.and_then(|p| p.first("ascending")),
            );
            reply(StatusCode::OK, &tables::list_table(db, table_name, table, &order).await?)
        }

        _ => {
            tracing::warn!("No route for {} /{}", method, parts.join("/"));
            Err(ApiError::NotFound("Route"))
        }
    }
}

fn no_content() -> Result<Response<Body>, ApiError> {
    http::no_content().map_err(|e| ApiError::Backend(format!("failed to build response: {}", e)))
}

fn method_not_allowed() -> Result<Response<Body>, ApiError> {
    http::method_not_allowed().map_err(|e| ApiError::Backend(format!("failed to build response: {}", e)))
}
