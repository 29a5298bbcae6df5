mod support;

use condo_client::forms::{
    can_register_exit, package_actions, reservation_actions, PackageAction, PACKAGE_TABS, VISITOR_TABS,
};
use condo_client::{Backend, DashboardStats, Forms, LiveTable};
use condo_core::listing::OrderBy;
use condo_core::mutation::Mutation;
use condo_core::types::{
    CreateNoticeRequest, CreateOccurrenceRequest, CreatePackageRequest, CreateReservationRequest,
    CreateVisitorRequest, Notice, NoticeKind, Occurrence, OccurrenceKind, OccurrenceStatus, Package,
    PackageKind, PackageStatus, Reservation, ReservationDecision, ReservationStatus, Visitor,
    VisitorStatus, OCCURRENCE_OPENED_ACTION,
};
use condo_core::{Role, Table};
use serde_json::Value;
use std::sync::Arc;
use support::{eventually, settle, FakeBackend};

fn parcel(resident: &str) -> CreatePackageRequest {
    CreatePackageRequest {
        block: "A".into(),
        unit: "101".into(),
        resident_name: resident.into(),
        kind: PackageKind::Box,
        description: "Caixa média".into(),
    }
}

fn visitor(name: &str) -> CreateVisitorRequest {
    CreateVisitorRequest {
        name: name.into(),
        document: "12.345.678-9".into(),
        block: "A".into(),
        unit: "101".into(),
        resident_name: "Ana".into(),
        vehicle: None,
    }
}

async fn signed_in(fake: &Arc<FakeBackend>, email: &str, role: Role) {
    fake.add_user(email, "123456", email, role, "101", "A");
    fake.sign_in(&condo_core::session::LoginRequest {
        email: email.into(),
        password: "123456".into(),
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn incident_is_opened_and_moved_in_progress() {
    let fake = FakeBackend::new();
    signed_in(&fake, "ana@example.com", Role::Resident).await;
    let forms = Forms::new(fake.clone());
    let view: LiveTable<Occurrence> = LiveTable::newest_first(fake.clone(), Table::Occurrences);
    let mut rows = view.watch();
    settle(&mut rows, |s| !s.loading).await;

    let toast = forms
        .submit(
            Some(Role::Resident),
            Mutation::OpenOccurrence(CreateOccurrenceRequest {
                kind: OccurrenceKind::Noise,
                title: "Noise".into(),
                description: "Loud music".into(),
            }),
        )
        .await;
    assert_eq!(toast.message, "Ocorrência registrada!");

    let opened = settle(&mut rows, |s| s.rows.len() == 1).await.rows.remove(0);
    assert_eq!(opened.status, OccurrenceStatus::Open);
    assert_eq!(opened.kind, OccurrenceKind::Noise);
    assert_eq!(opened.timeline.len(), 1);
    assert_eq!(opened.timeline[0].action, OCCURRENCE_OPENED_ACTION);

    // A resident cannot move it; a manager can, without adding an event.
    let set_status = Mutation::SetOccurrenceStatus {
        id: opened.id.clone(),
        status: OccurrenceStatus::InProgress,
    };
    assert!(!forms.submit(Some(Role::Resident), set_status.clone()).await.is_success());
    assert!(forms.submit(Some(Role::Manager), set_status).await.is_success());

    let moved = settle(&mut rows, |s| {
        s.rows.first().is_some_and(|o| o.status == OccurrenceStatus::InProgress)
    })
    .await
    .rows
    .remove(0);
    assert_eq!(moved.timeline.len(), 1);
}

#[tokio::test]
async fn picked_up_package_leaves_the_pending_tab() {
    let fake = FakeBackend::new();
    signed_in(&fake, "ze@example.com", Role::Doorman).await;
    let forms = Forms::new(fake.clone());
    let view: LiveTable<Package> = LiveTable::newest_first(fake.clone(), Table::Packages);
    let mut rows = view.watch();

    let toast = forms.submit(Some(Role::Doorman), Mutation::CreatePackage(parcel("Ana"))).await;
    assert_eq!(toast.message, "Encomenda registrada!");

    let pending = settle(&mut rows, |s| s.rows.len() == 1).await.rows;
    let package = &pending[0];
    assert_eq!(package.status, PackageStatus::Pending);
    assert!(package.picked_up_at.is_none() && package.picked_up_by.is_none());
    assert_eq!(PACKAGE_TABS[1].apply(&pending).len(), 1);

    let actions = package_actions(package, Role::Doorman);
    assert_eq!(actions[0], PackageAction::ConfirmPickup);
    let toast = forms.submit(Some(Role::Doorman), actions[0].mutation(package)).await;
    assert_eq!(toast.message, "Retirada confirmada!");

    let after = settle(&mut rows, |s| {
        s.rows.first().is_some_and(|p| p.status == PackageStatus::PickedUp)
    })
    .await
    .rows;
    assert!(after[0].picked_up_at.is_some());
    assert_eq!(after[0].picked_up_by.as_deref(), Some("Ana"));
    assert!(PACKAGE_TABS[1].apply(&after).is_empty());
    assert!(package_actions(&after[0], Role::Doorman).is_empty());

    // A second pickup is refused by the backend.
    let again = forms
        .submit(Some(Role::Doorman), PackageAction::ConfirmPickup.mutation(&after[0]))
        .await;
    assert!(again.message.starts_with("Erro: "));
}

#[tokio::test]
async fn every_view_of_a_table_rereads_after_a_write() {
    let fake = FakeBackend::new();
    signed_in(&fake, "ze@example.com", Role::Doorman).await;
    let backend: Arc<dyn Backend> = fake.clone();

    let newest: LiveTable<Package> = LiveTable::newest_first(Arc::clone(&backend), Table::Packages);
    let oldest: LiveTable<Package> =
        LiveTable::spawn(Arc::clone(&backend), Table::Packages, OrderBy::new("received_at", true));
    let visitors: LiveTable = LiveTable::newest_first(Arc::clone(&backend), Table::Visitors);
    let (mut a, mut b, mut v) = (newest.watch(), oldest.watch(), visitors.watch());
    settle(&mut a, |s| !s.loading).await;
    settle(&mut b, |s| !s.loading).await;
    settle(&mut v, |s| !s.loading).await;
    assert_eq!(fake.reads(Table::Packages), 2);

    Forms::new(Arc::clone(&backend))
        .submit(Some(Role::Doorman), Mutation::CreatePackage(parcel("Ana")))
        .await;

    settle(&mut a, |s| s.rows.len() == 1).await;
    settle(&mut b, |s| s.rows.len() == 1).await;
    assert_eq!(fake.reads(Table::Packages), 4);
    assert_eq!(fake.reads(Table::Visitors), 1);
}

#[tokio::test]
async fn failed_read_keeps_the_last_rows() {
    let fake = FakeBackend::new();
    signed_in(&fake, "ze@example.com", Role::Doorman).await;
    let forms = Forms::new(fake.clone());
    forms.submit(Some(Role::Doorman), Mutation::CreatePackage(parcel("Ana"))).await;

    let view: LiveTable<Package> = LiveTable::newest_first(fake.clone(), Table::Packages);
    let mut rows = view.watch();
    settle(&mut rows, |s| s.rows.len() == 1).await;

    fake.fail_reads(true);
    fake.touch(Table::Packages);
    eventually(|| fake.reads(Table::Packages) == 2).await;
    tokio::task::yield_now().await;
    assert_eq!(view.rows().len(), 1);
    assert!(!view.is_loading());
}

#[tokio::test]
async fn dropping_a_view_unsubscribes() {
    let fake = FakeBackend::new();
    let view: LiveTable<Value> = LiveTable::newest_first(fake.clone(), Table::Notices);
    assert_eq!(fake.subscribers(Table::Notices), 1);
    drop(view);
    eventually(|| fake.subscribers(Table::Notices) == 0).await;
}

#[tokio::test]
async fn dashboard_counts_follow_writes() {
    let fake = FakeBackend::new();
    signed_in(&fake, "ze@example.com", Role::Doorman).await;
    let forms = Forms::new(fake.clone());
    let stats = DashboardStats::spawn(fake.clone());
    let mut state = stats.watch();

    let initial = settle(&mut state, |s| !s.loading).await;
    assert_eq!(initial.counts.active_residents, 1);
    assert_eq!(initial.counts.pending_packages, 0);

    forms.submit(Some(Role::Doorman), Mutation::CreatePackage(parcel("Ana"))).await;
    forms
        .submit(
            Some(Role::Doorman),
            Mutation::RegisterVisitor(visitor("João")),
        )
        .await;

    let counts = settle(&mut state, |s| {
        s.counts.pending_packages == 1 && s.counts.visitors_today == 1
    })
    .await
    .counts;
    assert_eq!(counts.open_occurrences, 0);
    assert_eq!(stats.counts(), counts);
}

#[tokio::test]
async fn reply_shows_up_in_an_open_occurrence_view() {
    let fake = FakeBackend::new();
    signed_in(&fake, "ana@example.com", Role::Resident).await;
    let forms = Forms::new(fake.clone());
    let view: LiveTable<Occurrence> = LiveTable::newest_first(fake.clone(), Table::Occurrences);
    let mut rows = view.watch();

    forms
        .submit(
            Some(Role::Resident),
            Mutation::OpenOccurrence(CreateOccurrenceRequest {
                kind: OccurrenceKind::Noise,
                title: "Noise".into(),
                description: "Loud music".into(),
            }),
        )
        .await;
    let opened = settle(&mut rows, |s| s.rows.len() == 1).await.rows.remove(0);

    // The reply only writes an event row; the occurrence view still re-reads.
    let toast = forms
        .submit(
            Some(Role::Resident),
            Mutation::ReplyOccurrence {
                id: opened.id.clone(),
                message: "Ainda está alto".into(),
            },
        )
        .await;
    assert_eq!(toast.message, "Resposta enviada!");

    let replied = settle(&mut rows, |s| s.rows.first().is_some_and(|o| o.timeline.len() == 2))
        .await
        .rows
        .remove(0);
    assert_eq!(replied.timeline[1].action, "Ainda está alto");
    assert_eq!(replied.status, OccurrenceStatus::Open);
}

#[tokio::test]
async fn visitor_exit_moves_to_the_left_tab() {
    let fake = FakeBackend::new();
    signed_in(&fake, "ze@example.com", Role::Doorman).await;
    let forms = Forms::new(fake.clone());
    let view: LiveTable<Visitor> = LiveTable::newest_first(fake.clone(), Table::Visitors);
    let mut rows = view.watch();

    let toast = forms.submit(Some(Role::Doorman), Mutation::RegisterVisitor(visitor("João"))).await;
    assert_eq!(toast.message, "Visitante registrado!");
    let inside = settle(&mut rows, |s| s.rows.len() == 1).await.rows;
    assert_eq!(inside[0].status, VisitorStatus::Inside);
    assert_eq!(VISITOR_TABS[1].apply(&inside).len(), 1);
    assert!(can_register_exit(&inside[0], Role::Doorman));
    assert!(!can_register_exit(&inside[0], Role::Resident));

    let exit = Mutation::RegisterExit { id: inside[0].id.clone() };
    let toast = forms.submit(Some(Role::Doorman), exit.clone()).await;
    assert_eq!(toast.message, "Saída registrada!");

    let left = settle(&mut rows, |s| {
        s.rows.first().is_some_and(|v| v.status == VisitorStatus::Left)
    })
    .await
    .rows;
    assert!(left[0].exit_at.is_some());
    assert_eq!(VISITOR_TABS[2].label, "Saiu");
    assert_eq!(VISITOR_TABS[2].apply(&left).len(), 1);
    assert!(VISITOR_TABS[1].apply(&left).is_empty());
    assert!(!can_register_exit(&left[0], Role::Doorman));

    let again = forms.submit(Some(Role::Doorman), exit).await;
    assert!(again.message.starts_with("Erro: "));
}

#[tokio::test]
async fn approved_reservation_refuses_a_second_decision() {
    let fake = FakeBackend::new();
    signed_in(&fake, "ana@example.com", Role::Resident).await;
    let forms = Forms::new(fake.clone());
    let view: LiveTable<Reservation> = LiveTable::newest_first(fake.clone(), Table::Reservations);
    let mut rows = view.watch();

    let toast = forms
        .submit(
            Some(Role::Resident),
            Mutation::RequestReservation(CreateReservationRequest {
                space: "Salão de Festas".into(),
                date: "2024-06-01".into(),
                start_time: "18:00".into(),
                end_time: "23:00".into(),
                notes: None,
            }),
        )
        .await;
    assert_eq!(toast.message, "Reserva solicitada!");
    let pending = settle(&mut rows, |s| s.rows.len() == 1).await.rows.remove(0);
    assert_eq!(pending.status, ReservationStatus::Pending);

    // Residents cannot decide, even by submitting the write directly.
    let approve = Mutation::DecideReservation {
        id: pending.id.clone(),
        decision: ReservationDecision::Approve,
    };
    assert_eq!(forms.submit(Some(Role::Resident), approve.clone()).await.message, "Acesso negado");

    assert_eq!(forms.submit(Some(Role::Manager), approve).await.message, "Reserva aprovada!");
    let approved = settle(&mut rows, |s| {
        s.rows.first().is_some_and(|r| r.status == ReservationStatus::Approved)
    })
    .await
    .rows
    .remove(0);
    assert!(reservation_actions(&approved, Role::Manager).is_empty());

    let reject = Mutation::DecideReservation {
        id: approved.id.clone(),
        decision: ReservationDecision::Reject,
    };
    let refused = forms.submit(Some(Role::Manager), reject).await;
    assert!(!refused.is_success());
    assert!(refused.message.starts_with("Erro: "));
    assert_eq!(view.rows()[0].status, ReservationStatus::Approved);
}

#[tokio::test]
async fn published_notice_can_be_removed() {
    let fake = FakeBackend::new();
    signed_in(&fake, "sindico@example.com", Role::Manager).await;
    let forms = Forms::new(fake.clone());
    let view: LiveTable<Notice> = LiveTable::newest_first(fake.clone(), Table::Notices);
    let mut rows = view.watch();

    let toast = forms
        .submit(
            Some(Role::Manager),
            Mutation::PublishNotice(CreateNoticeRequest {
                title: "Assembleia geral".into(),
                content: "Pauta: orçamento anual".into(),
                kind: NoticeKind::Assembly,
                date: Some("2024-06-10".into()),
                location: Some("Salão".into()),
            }),
        )
        .await;
    assert_eq!(toast.message, "Aviso publicado!");
    let notice = settle(&mut rows, |s| s.rows.len() == 1).await.rows.remove(0);
    assert_eq!(notice.kind, NoticeKind::Assembly);
    assert_eq!(notice.author_name, "sindico@example.com");

    let delete = Mutation::DeleteNotice { id: notice.id.clone() };
    assert_eq!(forms.submit(Some(Role::Doorman), delete.clone()).await.message, "Acesso negado");
    assert_eq!(forms.submit(Some(Role::Manager), delete.clone()).await.message, "Aviso removido!");
    settle(&mut rows, |s| s.rows.is_empty()).await;

    let again = forms.submit(Some(Role::Manager), delete).await;
    assert!(again.message.starts_with("Erro: "));
}
