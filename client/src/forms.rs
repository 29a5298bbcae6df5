//! Form submissions, the actions each row offers, and the list filters.
//!
//! A submission is checked for presence of its required fields and for the
//! caller's role, then performs exactly one write. Its outcome is always a
//! toast; nothing is retried or applied optimistically.

use condo_core::access::Capability;
use condo_core::error::DomainResult;
use condo_core::mutation::Mutation;
use condo_core::types::{
    Occurrence, OccurrenceStatus, Package, PackageStatus, Person, Reservation, ReservationDecision,
    ReservationStatus, UpdateProfileRequest, Visitor, VisitorStatus,
};
use condo_core::{DomainError, Role};
use std::sync::Arc;

use crate::backend::Backend;
use crate::error::{ClientError, UNEXPECTED_ERROR};
use crate::notify::Toast;
use crate::session::SessionStore;

pub const ACCESS_DENIED: &str = "Acesso negado";

pub struct Forms {
    backend: Arc<dyn Backend>,
}

impl Forms {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub async fn submit(&self, role: Option<Role>, mutation: Mutation) -> Toast {
        if !role.is_some_and(|r| r.can(required_capability(&mutation))) {
            return Toast::error(ACCESS_DENIED);
        }
        if let Err(e) = validate(&mutation) {
            return Toast::error(invalid_message(&mutation, e));
        }

        match self.backend.mutate(&mutation).await {
            Ok(_) => Toast::success(success_message(&mutation)),
            Err(e) => {
                let (method, path) = mutation.endpoint();
                tracing::error!("{} {} failed: {}", method.as_str(), path, e);
                Toast::error(failure_message(&mutation, &e))
            }
        }
    }

    /// Saves the caller's profile and re-reads the session so the new
    /// values show up everywhere.
    pub async fn save_profile(&self, session: &SessionStore, request: UpdateProfileRequest) -> Toast {
        let toast = self
            .submit(session.current().role(), Mutation::UpdateProfile(request))
            .await;
        if toast.is_success() {
            if let Err(message) = session.refresh().await {
                tracing::warn!("Profile saved but session refresh failed: {}", message);
            }
        }
        toast
    }
}

/// Coarse role check done before submitting. Replies are further limited to
/// the requester by the server.
pub fn required_capability(mutation: &Mutation) -> Capability {
    match mutation {
        Mutation::CreatePackage(_) | Mutation::ConfirmPickup { .. } | Mutation::ReturnPackage { .. } => {
            Capability::ManagePackages
        }
        Mutation::RegisterVisitor(_) | Mutation::RegisterExit { .. } => Capability::ManageVisitors,
        Mutation::RequestReservation(_) => Capability::RequestReservation,
        Mutation::DecideReservation { .. } => Capability::DecideReservation,
        Mutation::PublishNotice(_) | Mutation::DeleteNotice { .. } => Capability::PublishNotice,
        Mutation::OpenOccurrence(_) => Capability::OpenOccurrence,
        Mutation::SetOccurrenceStatus { .. } => Capability::ManageOccurrence,
        Mutation::ReplyOccurrence { .. } => Capability::ViewOccurrences,
        Mutation::UpdateProfile(_) => Capability::EditOwnProfile,
        Mutation::RegisterPerson(_) => Capability::ManagePeople,
    }
}

fn validate(mutation: &Mutation) -> DomainResult<()> {
    match mutation {
        Mutation::CreatePackage(req) => req.validate(),
        Mutation::RegisterVisitor(req) => req.validate(),
        Mutation::RequestReservation(req) => req.validate(),
        Mutation::PublishNotice(req) => req.validate(),
        Mutation::OpenOccurrence(req) => req.validate(),
        Mutation::ReplyOccurrence { message, .. } => condo_core::error::require("message", message).map(|_| ()),
        Mutation::UpdateProfile(req) => req.validate(),
        Mutation::RegisterPerson(req) => req.validate(),
        Mutation::ConfirmPickup { .. }
        | Mutation::ReturnPackage { .. }
        | Mutation::RegisterExit { .. }
        | Mutation::DecideReservation { .. }
        | Mutation::DeleteNotice { .. }
        | Mutation::SetOccurrenceStatus { .. } => Ok(()),
    }
}

fn invalid_message(mutation: &Mutation, err: DomainError) -> String {
    match (mutation, &err) {
        (Mutation::RegisterVisitor(_), DomainError::MissingField(_)) => {
            "Preencha os campos obrigatórios".to_string()
        }
        _ => ClientError::from(err).user_message(),
    }
}

fn success_message(mutation: &Mutation) -> String {
    let message = match mutation {
        Mutation::CreatePackage(_) => "Encomenda registrada!",
        Mutation::ConfirmPickup { .. } => "Retirada confirmada!",
        Mutation::ReturnPackage { .. } => "Encomenda devolvida!",
        Mutation::RegisterVisitor(_) => "Visitante registrado!",
        Mutation::RegisterExit { .. } => "Saída registrada!",
        Mutation::RequestReservation(_) => "Reserva solicitada!",
        Mutation::DecideReservation {
            decision: ReservationDecision::Approve,
            ..
        } => "Reserva aprovada!",
        Mutation::DecideReservation {
            decision: ReservationDecision::Reject,
            ..
        } => "Reserva rejeitada!",
        Mutation::PublishNotice(_) => "Aviso publicado!",
        Mutation::DeleteNotice { .. } => "Aviso removido!",
        Mutation::OpenOccurrence(_) => "Ocorrência registrada!",
        Mutation::SetOccurrenceStatus { .. } => "Status atualizado!",
        Mutation::ReplyOccurrence { .. } => "Resposta enviada!",
        Mutation::UpdateProfile(_) => "Perfil atualizado!",
        Mutation::RegisterPerson(req) => return format!("{} adicionado com sucesso!", req.role.label()),
    };
    message.to_string()
}

/// Errors reported by the API carry their message; anything else is
/// unexpected.
fn failure_message(mutation: &Mutation, err: &ClientError) -> String {
    let ClientError::Api { message, .. } = err else {
        return match err {
            ClientError::NotSignedIn => err.user_message(),
            _ => UNEXPECTED_ERROR.to_string(),
        };
    };
    match mutation {
        Mutation::CreatePackage(_) => format!("Erro ao registrar: {}", message),
        Mutation::UpdateProfile(_) => "Erro ao salvar perfil".to_string(),
        Mutation::RegisterPerson(_) => message.clone(),
        _ => format!("Erro: {}", message),
    }
}

// ---------- row actions ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageAction {
    ConfirmPickup,
    MarkReturned,
}

impl PackageAction {
    pub fn mutation(&self, package: &Package) -> Mutation {
        match self {
            PackageAction::ConfirmPickup => Mutation::ConfirmPickup {
                id: package.id.clone(),
                picked_up_by: None,
            },
            PackageAction::MarkReturned => Mutation::ReturnPackage {
                id: package.id.clone(),
            },
        }
    }
}

/// Only pending packages can be handed over or returned.
pub fn package_actions(package: &Package, role: Role) -> Vec<PackageAction> {
    if package.status != PackageStatus::Pending || !role.can(Capability::ManagePackages) {
        return Vec::new();
    }
    vec![PackageAction::ConfirmPickup, PackageAction::MarkReturned]
}

pub fn can_register_exit(visitor: &Visitor, role: Role) -> bool {
    visitor.status == VisitorStatus::Inside && role.can(Capability::ManageVisitors)
}

/// Decided reservations offer nothing.
pub fn reservation_actions(reservation: &Reservation, role: Role) -> Vec<ReservationDecision> {
    if reservation.status != ReservationStatus::Pending || !role.can(Capability::DecideReservation) {
        return Vec::new();
    }
    vec![ReservationDecision::Approve, ReservationDecision::Reject]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccurrenceActions {
    pub statuses: Vec<OccurrenceStatus>,
    pub can_reply: bool,
}

pub fn occurrence_actions(occurrence: &Occurrence, role: Role, user_id: &str) -> OccurrenceActions {
    let manager = role.can(Capability::ManageOccurrence);
    OccurrenceActions {
        statuses: if manager {
            occurrence.status.next().to_vec()
        } else {
            Vec::new()
        },
        can_reply: manager || occurrence.requested_by == user_id,
    }
}

// ---------- filters ----------

/// Rows with a status column the list pages filter on.
pub trait HasStatus {
    type Status: Copy + PartialEq;

    fn status(&self) -> Self::Status;
}

impl HasStatus for Package {
    type Status = PackageStatus;

    fn status(&self) -> PackageStatus {
        self.status
    }
}

impl HasStatus for Visitor {
    type Status = VisitorStatus;

    fn status(&self) -> VisitorStatus {
        self.status
    }
}

impl HasStatus for Occurrence {
    type Status = OccurrenceStatus;

    fn status(&self) -> OccurrenceStatus {
        self.status
    }
}

impl HasStatus for Person {
    type Status = Role;

    fn status(&self) -> Role {
        self.role
    }
}

/// One filter tab; `status: None` shows every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterTab<S> {
    pub label: &'static str,
    pub status: Option<S>,
}

impl<S: Copy + PartialEq> FilterTab<S> {
    const fn new(label: &'static str, status: Option<S>) -> Self {
        Self { label, status }
    }

    pub fn apply<'a, T: HasStatus<Status = S>>(&self, rows: &'a [T]) -> Vec<&'a T> {
        rows.iter()
            .filter(|row| self.status.map_or(true, |s| row.status() == s))
            .collect()
    }
}

pub const PACKAGE_TABS: [FilterTab<PackageStatus>; 3] = [
    FilterTab::new("Todas", None),
    FilterTab::new("Pendentes", Some(PackageStatus::Pending)),
    FilterTab::new("Retiradas", Some(PackageStatus::PickedUp)),
];

pub const VISITOR_TABS: [FilterTab<VisitorStatus>; 3] = [
    FilterTab::new("Todos", None),
    FilterTab::new("Dentro", Some(VisitorStatus::Inside)),
    FilterTab::new("Saiu", Some(VisitorStatus::Left)),
];

pub const OCCURRENCE_TABS: [FilterTab<OccurrenceStatus>; 4] = [
    FilterTab::new("Todas", None),
    FilterTab::new("Abertas", Some(OccurrenceStatus::Open)),
    FilterTab::new("Em andamento", Some(OccurrenceStatus::InProgress)),
    FilterTab::new("Resolvidas", Some(OccurrenceStatus::Resolved)),
];

pub const PEOPLE_TABS: [FilterTab<Role>; 4] = [
    FilterTab::new("Todos", None),
    FilterTab::new("Moradores", Some(Role::Resident)),
    FilterTab::new("Porteiros", Some(Role::Doorman)),
    FilterTab::new("Síndicos", Some(Role::Manager)),
];

/// Pending packages addressed to one apartment, as the resident dashboard
/// lists them.
pub fn pending_for<'a>(packages: &'a [Package], unit: &str, block: &str) -> Vec<&'a Package> {
    packages
        .iter()
        .filter(|p| p.status == PackageStatus::Pending && p.belongs_to(unit, block))
        .collect()
}

/// Head counts shown above the people list.
pub fn people_summary(people: &[Person]) -> Vec<(&'static str, usize)> {
    PEOPLE_TABS
        .iter()
        .map(|tab| (if tab.status.is_none() { "Total" } else { tab.label }, tab.apply(people).len()))
        .collect()
}
