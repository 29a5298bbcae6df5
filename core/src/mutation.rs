//! Every write the application performs, one variant per form submission.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::SignUpRequest;
use crate::types::{
    CreateNoticeRequest, CreateOccurrenceRequest, CreatePackageRequest, CreateReservationRequest,
    CreateVisitorRequest, OccurrenceStatus, ReservationDecision, UpdateProfileRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMethod {
    Post,
    Patch,
    Delete,
}

impl WriteMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMethod::Post => "POST",
            WriteMethod::Patch => "PATCH",
            WriteMethod::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    CreatePackage(CreatePackageRequest),
    ConfirmPickup { id: String, picked_up_by: Option<String> },
    ReturnPackage { id: String },
    RegisterVisitor(CreateVisitorRequest),
    RegisterExit { id: String },
    RequestReservation(CreateReservationRequest),
    DecideReservation { id: String, decision: ReservationDecision },
    PublishNotice(CreateNoticeRequest),
    DeleteNotice { id: String },
    OpenOccurrence(CreateOccurrenceRequest),
    SetOccurrenceStatus { id: String, status: OccurrenceStatus },
    ReplyOccurrence { id: String, message: String },
    UpdateProfile(UpdateProfileRequest),
    RegisterPerson(SignUpRequest),
}

impl Mutation {
    /// HTTP method and path of the API endpoint performing the write.
    pub fn endpoint(&self) -> (WriteMethod, String) {
        use WriteMethod::*;
        match self {
            Mutation::CreatePackage(_) => (Post, "/packages".into()),
            Mutation::ConfirmPickup { id, .. } => (Post, format!("/packages/{}/pickup", id)),
            Mutation::ReturnPackage { id } => (Post, format!("/packages/{}/return", id)),
            Mutation::RegisterVisitor(_) => (Post, "/visitors".into()),
            Mutation::RegisterExit { id } => (Post, format!("/visitors/{}/exit", id)),
            Mutation::RequestReservation(_) => (Post, "/reservations".into()),
            Mutation::DecideReservation { id, decision } => {
                let action = match decision {
                    ReservationDecision::Approve => "approve",
                    ReservationDecision::Reject => "reject",
                };
                (Post, format!("/reservations/{}/{}", id, action))
            }
            Mutation::PublishNotice(_) => (Post, "/notices".into()),
            Mutation::DeleteNotice { id } => (Delete, format!("/notices/{}", id)),
            Mutation::OpenOccurrence(_) => (Post, "/occurrences".into()),
            Mutation::SetOccurrenceStatus { id, .. } => (Patch, format!("/occurrences/{}", id)),
            Mutation::ReplyOccurrence { id, .. } => (Post, format!("/occurrences/{}/events", id)),
            Mutation::UpdateProfile(_) => (Patch, "/profiles/me".into()),
            Mutation::RegisterPerson(_) => (Post, "/people".into()),
        }
    }

    /// JSON body sent with the request, if the endpoint takes one.
    pub fn body(&self) -> Option<Value> {
        match self {
            Mutation::CreatePackage(req) => serde_json::to_value(req).ok(),
            Mutation::ConfirmPickup { picked_up_by, .. } => {
                Some(serde_json::json!({ "picked_up_by": picked_up_by }))
            }
            Mutation::RegisterVisitor(req) => serde_json::to_value(req).ok(),
            Mutation::RequestReservation(req) => serde_json::to_value(req).ok(),
            Mutation::PublishNotice(req) => serde_json::to_value(req).ok(),
            Mutation::OpenOccurrence(req) => serde_json::to_value(req).ok(),
            Mutation::SetOccurrenceStatus { status, .. } => {
                Some(serde_json::json!({ "status": status }))
            }
            Mutation::ReplyOccurrence { message, .. } => {
                Some(serde_json::json!({ "message": message }))
            }
            Mutation::UpdateProfile(req) => serde_json::to_value(req).ok(),
            Mutation::RegisterPerson(req) => serde_json::to_value(req).ok(),
            Mutation::ReturnPackage { .. }
            | Mutation::RegisterExit { .. }
            | Mutation::DecideReservation { .. }
            | Mutation::DeleteNotice { .. } => None,
        }
    }
}
