use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{require, DomainError, DomainResult};

macro_rules! wire_enum {
    ($name:ident, $entity:literal { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }

            pub fn parse(value: &str) -> DomainResult<Self> {
                match value {
                    $($wire => Ok(Self::$variant),)+
                    other => Err(DomainError::InvalidValue {
                        field: $entity,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// ========== ROLE ==========
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "sindico")]
    Manager,
    #[serde(rename = "porteiro")]
    Doorman,
    #[serde(rename = "morador")]
    Resident,
}

wire_enum!(Role, "role" {
    Manager => "sindico",
    Doorman => "porteiro",
    Resident => "morador",
});

impl Role {
    pub const ALL: [Role; 3] = [Role::Manager, Role::Doorman, Role::Resident];

    pub fn label(&self) -> &'static str {
        match self {
            Role::Manager => "Síndico",
            Role::Doorman => "Porteiro",
            Role::Resident => "Morador",
        }
    }
}

// ========== PROFILE ==========
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Profile {
    pub user_id: String,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub block: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub unit: Option<String>,
    pub block: Option<String>,
    pub avatar_url: Option<String>,
}

impl UpdateProfileRequest {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.phone.is_none()
            && self.unit.is_none()
            && self.block.is_none()
            && self.avatar_url.is_none()
    }

    pub fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.full_name {
            require("full_name", name)?;
        }
        Ok(())
    }
}

/// Profile joined with its role, as listed in people management.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Person {
    #[serde(flatten)]
    pub profile: Profile,
    pub role: Role,
}

// ========== PACKAGE ==========
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageKind {
    #[serde(rename = "caixa")]
    Box,
    #[serde(rename = "envelope")]
    Envelope,
    #[serde(rename = "sacola")]
    Bag,
    #[serde(rename = "outro")]
    Other,
}

wire_enum!(PackageKind, "package type" {
    Box => "caixa",
    Envelope => "envelope",
    Bag => "sacola",
    Other => "outro",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageStatus {
    #[serde(rename = "pendente")]
    Pending,
    #[serde(rename = "retirada")]
    PickedUp,
    #[serde(rename = "devolvida")]
    Returned,
}

wire_enum!(PackageStatus, "package status" {
    Pending => "pendente",
    PickedUp => "retirada",
    Returned => "devolvida",
});

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Package {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: PackageKind,
    pub description: String,
    pub resident_name: String,
    pub unit: String,
    pub block: String,
    pub status: PackageStatus,
    pub received_at: DateTime<Utc>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub picked_up_by: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreatePackageRequest {
    pub block: String,
    pub unit: String,
    pub resident_name: String,
    #[serde(rename = "type")]
    pub kind: PackageKind,
    pub description: String,
}

impl CreatePackageRequest {
    pub fn validate(&self) -> DomainResult<()> {
        require("description", &self.description)?;
        require("block", &self.block)?;
        require("unit", &self.unit)?;
        require("resident_name", &self.resident_name)?;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PickupRequest {
    /// Defaults to the package's resident name.
    pub picked_up_by: Option<String>,
}

impl Package {
    pub fn receive(
        id: String,
        req: CreatePackageRequest,
        created_by: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        req.validate()?;
        Ok(Self {
            id,
            kind: req.kind,
            description: req.description,
            resident_name: req.resident_name,
            unit: req.unit,
            block: req.block,
            status: PackageStatus::Pending,
            received_at: now,
            picked_up_at: None,
            picked_up_by: None,
            created_by,
        })
    }

    /// Pickup timestamp and actor are written together, exactly once.
    pub fn confirm_pickup(&mut self, by: Option<String>, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_pending(PackageStatus::PickedUp)?;
        self.status = PackageStatus::PickedUp;
        self.picked_up_at = Some(at);
        self.picked_up_by = Some(by.unwrap_or_else(|| self.resident_name.clone()));
        Ok(())
    }

    pub fn mark_returned(&mut self) -> DomainResult<()> {
        self.ensure_pending(PackageStatus::Returned)?;
        self.status = PackageStatus::Returned;
        Ok(())
    }

    fn ensure_pending(&self, to: PackageStatus) -> DomainResult<()> {
        if self.status != PackageStatus::Pending {
            return Err(DomainError::InvalidTransition {
                entity: "package",
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }

    pub fn belongs_to(&self, unit: &str, block: &str) -> bool {
        self.unit == unit && self.block == block
    }
}

// ========== VISITOR ==========
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisitorStatus {
    #[serde(rename = "dentro")]
    Inside,
    #[serde(rename = "saiu")]
    Left,
}

wire_enum!(VisitorStatus, "visitor status" {
    Inside => "dentro",
    Left => "saiu",
});

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Visitor {
    pub id: String,
    pub name: String,
    pub document: String,
    pub unit: String,
    pub block: String,
    #[serde(default)]
    pub resident_name: String,
    pub vehicle: Option<String>,
    pub entry_at: DateTime<Utc>,
    pub exit_at: Option<DateTime<Utc>>,
    pub status: VisitorStatus,
    pub registered_by: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateVisitorRequest {
    pub name: String,
    pub document: String,
    pub block: String,
    pub unit: String,
    #[serde(default)]
    pub resident_name: String,
    pub vehicle: Option<String>,
}

impl CreateVisitorRequest {
    pub fn validate(&self) -> DomainResult<()> {
        require("name", &self.name)?;
        require("document", &self.document)?;
        require("block", &self.block)?;
        require("unit", &self.unit)?;
        Ok(())
    }
}

impl Visitor {
    pub fn enter(
        id: String,
        req: CreateVisitorRequest,
        registered_by: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        req.validate()?;
        Ok(Self {
            id,
            name: req.name,
            document: req.document,
            unit: req.unit,
            block: req.block,
            resident_name: req.resident_name,
            vehicle: req.vehicle.filter(|v| !v.trim().is_empty()),
            entry_at: now,
            exit_at: None,
            status: VisitorStatus::Inside,
            registered_by,
        })
    }

    pub fn register_exit(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if self.status != VisitorStatus::Inside {
            return Err(DomainError::InvalidTransition {
                entity: "visitor",
                from: self.status.to_string(),
                to: VisitorStatus::Left.to_string(),
            });
        }
        self.status = VisitorStatus::Left;
        self.exit_at = Some(at);
        Ok(())
    }
}

// ========== RESERVATION ==========
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    #[serde(rename = "pendente")]
    Pending,
    #[serde(rename = "aprovada")]
    Approved,
    #[serde(rename = "rejeitada")]
    Rejected,
}

wire_enum!(ReservationStatus, "reservation status" {
    Pending => "pendente",
    Approved => "aprovada",
    Rejected => "rejeitada",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationDecision {
    Approve,
    Reject,
}

impl ReservationDecision {
    pub fn status(&self) -> ReservationStatus {
        match self {
            ReservationDecision::Approve => ReservationStatus::Approved,
            ReservationDecision::Reject => ReservationStatus::Rejected,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Reservation {
    pub id: String,
    pub space: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub requested_by: String,
    pub resident_name: String,
    pub unit: String,
    pub block: String,
    pub status: ReservationStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateReservationRequest {
    pub space: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub notes: Option<String>,
}

impl CreateReservationRequest {
    pub fn validate(&self) -> DomainResult<()> {
        require("space", &self.space)?;
        require("date", &self.date)?;
        require("start_time", &self.start_time)?;
        require("end_time", &self.end_time)?;
        Ok(())
    }
}

impl Reservation {
    pub fn request(
        id: String,
        req: CreateReservationRequest,
        requester: &Profile,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        req.validate()?;
        Ok(Self {
            id,
            space: req.space,
            date: req.date,
            start_time: req.start_time,
            end_time: req.end_time,
            requested_by: requester.user_id.clone(),
            resident_name: requester.full_name.clone(),
            unit: requester.unit.clone(),
            block: requester.block.clone(),
            status: ReservationStatus::Pending,
            notes: req.notes.filter(|n| !n.trim().is_empty()),
            created_at: now,
        })
    }

    pub fn decide(&mut self, decision: ReservationDecision) -> DomainResult<()> {
        if self.status != ReservationStatus::Pending {
            return Err(DomainError::InvalidTransition {
                entity: "reservation",
                from: self.status.to_string(),
                to: decision.status().to_string(),
            });
        }
        self.status = decision.status();
        Ok(())
    }
}

// ========== NOTICE ==========
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NoticeKind {
    #[default]
    #[serde(rename = "aviso")]
    Notice,
    #[serde(rename = "assembleia")]
    Assembly,
}

wire_enum!(NoticeKind, "notice type" {
    Notice => "aviso",
    Assembly => "assembleia",
});

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Notice {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: NoticeKind,
    pub date: Option<String>,
    pub location: Option<String>,
    pub author_id: String,
    pub author_name: String,
    pub is_new: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateNoticeRequest {
    pub title: String,
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: NoticeKind,
    pub date: Option<String>,
    pub location: Option<String>,
}

impl CreateNoticeRequest {
    pub fn validate(&self) -> DomainResult<()> {
        require("title", &self.title)?;
        require("content", &self.content)?;
        Ok(())
    }
}

impl Notice {
    pub fn publish(
        id: String,
        req: CreateNoticeRequest,
        author: &Profile,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        req.validate()?;
        Ok(Self {
            id,
            title: req.title,
            content: req.content,
            kind: req.kind,
            date: req.date.filter(|d| !d.trim().is_empty()),
            location: req.location.filter(|l| !l.trim().is_empty()),
            author_id: author.user_id.clone(),
            author_name: author.full_name.clone(),
            is_new: true,
            created_at: now,
        })
    }
}

// ========== OCCURRENCE ==========
pub const OCCURRENCE_OPENED_ACTION: &str = "Ocorrência registrada";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OccurrenceKind {
    #[serde(rename = "barulho")]
    Noise,
    #[serde(rename = "manutencao")]
    Maintenance,
    #[serde(rename = "seguranca")]
    Security,
    #[serde(rename = "limpeza")]
    Cleaning,
    #[serde(rename = "outro")]
    Other,
}

wire_enum!(OccurrenceKind, "occurrence type" {
    Noise => "barulho",
    Maintenance => "manutencao",
    Security => "seguranca",
    Cleaning => "limpeza",
    Other => "outro",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OccurrenceStatus {
    #[serde(rename = "aberta")]
    Open,
    #[serde(rename = "em_andamento")]
    InProgress,
    #[serde(rename = "resolvida")]
    Resolved,
}

wire_enum!(OccurrenceStatus, "occurrence status" {
    Open => "aberta",
    InProgress => "em_andamento",
    Resolved => "resolvida",
});

impl OccurrenceStatus {
    /// Statuses a manager may move to from `self`. Resolved is terminal.
    pub fn next(&self) -> &'static [OccurrenceStatus] {
        match self {
            OccurrenceStatus::Open => &[OccurrenceStatus::InProgress, OccurrenceStatus::Resolved],
            OccurrenceStatus::InProgress => &[OccurrenceStatus::Resolved],
            OccurrenceStatus::Resolved => &[],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OccurrenceEvent {
    pub occurrence_id: String,
    pub action: String,
    pub by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Occurrence {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OccurrenceKind,
    pub title: String,
    pub description: String,
    pub requested_by: String,
    pub resident_name: String,
    pub unit: String,
    pub block: String,
    pub status: OccurrenceStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub timeline: Vec<OccurrenceEvent>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateOccurrenceRequest {
    #[serde(rename = "type")]
    pub kind: OccurrenceKind,
    pub title: String,
    pub description: String,
}

impl CreateOccurrenceRequest {
    pub fn validate(&self) -> DomainResult<()> {
        require("title", &self.title)?;
        require("description", &self.description)?;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UpdateOccurrenceStatusRequest {
    pub status: OccurrenceStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReplyOccurrenceRequest {
    pub message: String,
}

impl Occurrence {
    /// New occurrence in `aberta` with its first timeline entry.
    pub fn open(
        id: String,
        req: CreateOccurrenceRequest,
        requester: &Profile,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        req.validate()?;
        let first = OccurrenceEvent {
            occurrence_id: id.clone(),
            action: OCCURRENCE_OPENED_ACTION.to_string(),
            by: requester.full_name.clone(),
            created_at: now,
        };
        Ok(Self {
            id,
            kind: req.kind,
            title: req.title,
            description: req.description,
            requested_by: requester.user_id.clone(),
            resident_name: requester.full_name.clone(),
            unit: requester.unit.clone(),
            block: requester.block.clone(),
            status: OccurrenceStatus::Open,
            created_at: now,
            timeline: vec![first],
        })
    }

    /// Status changes never touch the timeline.
    pub fn set_status(&mut self, status: OccurrenceStatus) -> DomainResult<()> {
        if !self.status.next().contains(&status) {
            return Err(DomainError::InvalidTransition {
                entity: "occurrence",
                from: self.status.to_string(),
                to: status.to_string(),
            });
        }
        self.status = status;
        Ok(())
    }

    pub fn reply(&mut self, message: &str, by: &str, at: DateTime<Utc>) -> DomainResult<&OccurrenceEvent> {
        let action = require("message", message)?.to_string();
        self.timeline.push(OccurrenceEvent {
            occurrence_id: self.id.clone(),
            action,
            by: by.to_string(),
            created_at: at,
        });
        self.timeline.sort_by_key(|e| e.created_at);
        self.timeline
            .iter()
            .rev()
            .find(|e| e.created_at == at)
            .ok_or(DomainError::MissingField("timeline"))
    }
}
