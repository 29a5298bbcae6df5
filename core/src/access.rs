//! Role capabilities and route gating.
//!
//! The same table is consulted for menu rendering on the client and for
//! authorization of writes on the server.

use serde::Serialize;

use crate::types::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewDashboard,
    ViewPackages,
    ManagePackages,
    ViewVisitors,
    ManageVisitors,
    ViewReservations,
    RequestReservation,
    DecideReservation,
    ViewNotices,
    PublishNotice,
    ViewOccurrences,
    OpenOccurrence,
    ManageOccurrence,
    EditOwnProfile,
    ManagePeople,
}

impl Role {
    pub fn can(&self, capability: Capability) -> bool {
        use Capability::*;
        match self {
            Role::Manager => true,
            Role::Doorman => matches!(
                capability,
                ViewDashboard
                    | ViewPackages
                    | ManagePackages
                    | ViewVisitors
                    | ManageVisitors
                    | EditOwnProfile
            ),
            Role::Resident => matches!(
                capability,
                ViewDashboard
                    | ViewPackages
                    | ViewReservations
                    | RequestReservation
                    | ViewNotices
                    | ViewOccurrences
                    | OpenOccurrence
                    | EditOwnProfile
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Dashboard,
    Packages,
    Visitors,
    Reservations,
    Notices,
    Occurrences,
    Profile,
    People,
}

impl Route {
    pub const ALL: [Route; 8] = [
        Route::Dashboard,
        Route::Packages,
        Route::Visitors,
        Route::Reservations,
        Route::Notices,
        Route::Occurrences,
        Route::Profile,
        Route::People,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Dashboard => "/dashboard",
            Route::Packages => "/encomendas",
            Route::Visitors => "/visitantes",
            Route::Reservations => "/reservas",
            Route::Notices => "/avisos",
            Route::Occurrences => "/ocorrencias",
            Route::Profile => "/perfil",
            Route::People => "/pessoas",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Dashboard => "Dashboard",
            Route::Packages => "Encomendas",
            Route::Visitors => "Visitantes",
            Route::Reservations => "Reservas",
            Route::Notices => "Avisos",
            Route::Occurrences => "Ocorrências",
            Route::Profile => "Meu Perfil",
            Route::People => "Gestão de Pessoas",
        }
    }

    pub fn from_path(path: &str) -> Option<Route> {
        let path = path.trim_end_matches('/');
        Route::ALL.into_iter().find(|r| r.path() == path)
    }

    pub fn required(&self) -> Capability {
        match self {
            Route::Dashboard => Capability::ViewDashboard,
            Route::Packages => Capability::ViewPackages,
            Route::Visitors => Capability::ViewVisitors,
            Route::Reservations => Capability::ViewReservations,
            Route::Notices => Capability::ViewNotices,
            Route::Occurrences => Capability::ViewOccurrences,
            Route::Profile => Capability::EditOwnProfile,
            Route::People => Capability::ManagePeople,
        }
    }

    /// People management is reachable by URL only, it has no menu entry.
    pub fn in_menu(&self) -> bool {
        !matches!(self, Route::Profile | Route::People)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "access", rename_all = "snake_case")]
pub enum RouteAccess {
    Allowed { route: Route },
    /// Authenticated, but the role lacks the route's capability.
    Denied { route: Route },
    RequiresLogin,
    NotFound,
}

/// Decides what a navigation to `path` shows. `role` is `None` without a
/// session; a session whose role has not resolved yet is treated as denied.
pub fn route_access(path: &str, session: Option<Option<Role>>) -> RouteAccess {
    let Some(route) = Route::from_path(path) else {
        return RouteAccess::NotFound;
    };
    match session {
        None => RouteAccess::RequiresLogin,
        Some(Some(role)) if role.can(route.required()) => RouteAccess::Allowed { route },
        Some(_) => RouteAccess::Denied { route },
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NavItem {
    pub title: &'static str,
    pub url: &'static str,
}

pub fn nav_items(role: Role) -> Vec<NavItem> {
    Route::ALL
        .into_iter()
        .filter(|r| r.in_menu() && role.can(r.required()))
        .map(|r| NavItem {
            title: r.title(),
            url: r.path(),
        })
        .collect()
}
