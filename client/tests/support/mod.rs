//! In-memory backend applying the same domain transitions as the API and
//! publishing a change event for every write.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use condo_client::backend::{Backend, ChangeHub, Identity};
use condo_client::ClientError;
use condo_core::listing::OrderBy;
use condo_core::mutation::Mutation;
use condo_core::session::{LoginRequest, SignUpRequest};
use condo_core::stats::{start_of_day, CountQuery};
use condo_core::types::{
    Notice, Occurrence, OccurrenceStatus, Package, PackageStatus, Profile, Reservation, Visitor,
};
use condo_core::{ChangeEvent, ChangeKind, DomainError, Role, Table};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};

struct Account {
    user_id: String,
    email: String,
    password: String,
}

#[derive(Default)]
struct Data {
    accounts: Vec<Account>,
    profiles: Vec<Profile>,
    roles: HashMap<String, Role>,
    packages: Vec<Package>,
    visitors: Vec<Visitor>,
    reservations: Vec<Reservation>,
    notices: Vec<Notice>,
    occurrences: Vec<Occurrence>,
    next_id: usize,
}

impl Data {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn profile(&self, user_id: &str) -> Result<Profile, ClientError> {
        self.profiles
            .iter()
            .find(|p| p.user_id == user_id)
            .cloned()
            .ok_or_else(|| api(404, "Profile not found"))
    }
}

pub struct FakeBackend {
    hub: ChangeHub,
    auth_tx: watch::Sender<Option<Identity>>,
    data: Mutex<Data>,
    reads: Mutex<HashMap<Table, usize>>,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
}

fn api(status: u16, message: &str) -> ClientError {
    ClientError::Api {
        status,
        message: message.to_string(),
    }
}

fn conflict(err: DomainError) -> ClientError {
    match err {
        DomainError::InvalidTransition { .. } => api(409, &err.to_string()),
        other => api(400, &other.to_string()),
    }
}

fn rows<T: Serialize>(items: &[T]) -> Vec<Value> {
    items
        .iter()
        .map(|item| serde_json::to_value(item).unwrap())
        .collect()
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            hub: ChangeHub::new(),
            auth_tx: watch::channel(None).0,
            data: Mutex::new(Data::default()),
            reads: Mutex::new(HashMap::new()),
            writes: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
        })
    }

    /// Registers an account with its profile and role, without signing in.
    pub fn add_user(&self, email: &str, password: &str, full_name: &str, role: Role, unit: &str, block: &str) -> String {
        let mut data = self.data.lock().unwrap();
        let user_id = data.id("user");
        data.accounts.push(Account {
            user_id: user_id.clone(),
            email: email.into(),
            password: password.into(),
        });
        data.profiles.push(Profile {
            user_id: user_id.clone(),
            full_name: full_name.into(),
            email: email.into(),
            phone: String::new(),
            avatar_url: None,
            unit: unit.into(),
            block: block.into(),
            created_at: Utc::now(),
        });
        data.roles.insert(user_id.clone(), role);
        user_id
    }

    pub fn reads(&self, table: Table) -> usize {
        self.reads.lock().unwrap().get(&table).copied().unwrap_or(0)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn subscribers(&self, table: Table) -> usize {
        self.hub.receivers(table)
    }

    /// Emits a change event without writing anything.
    pub fn touch(&self, table: Table) {
        self.hub.publish(ChangeEvent::new(table, ChangeKind::Update));
    }

    fn caller(&self) -> Result<Identity, ClientError> {
        self.auth_tx.borrow().clone().ok_or(ClientError::NotSignedIn)
    }

    fn apply(&self, mutation: &Mutation) -> Result<(Value, Vec<ChangeEvent>), ClientError> {
        let now = Utc::now();
        let caller = self.caller()?;
        let mut data = self.data.lock().unwrap();
        let insert = |table| ChangeEvent::new(table, ChangeKind::Insert);
        let update = |table| ChangeEvent::new(table, ChangeKind::Update);

        match mutation.clone() {
            Mutation::CreatePackage(req) => {
                let id = data.id("pkg");
                let package = Package::receive(id, req, Some(caller.user_id), now).map_err(conflict)?;
                data.packages.push(package.clone());
                Ok((json!(package), vec![insert(Table::Packages)]))
            }
            Mutation::ConfirmPickup { id, picked_up_by } => {
                let package = data
                    .packages
                    .iter_mut()
                    .find(|p| p.id == id)
                    .ok_or_else(|| api(404, "Package not found"))?;
                package.confirm_pickup(picked_up_by, now).map_err(conflict)?;
                Ok((json!(package), vec![update(Table::Packages)]))
            }
            Mutation::ReturnPackage { id } => {
                let package = data
                    .packages
                    .iter_mut()
                    .find(|p| p.id == id)
                    .ok_or_else(|| api(404, "Package not found"))?;
                package.mark_returned().map_err(conflict)?;
                Ok((json!(package), vec![update(Table::Packages)]))
            }
            Mutation::RegisterVisitor(req) => {
                let id = data.id("vis");
                let visitor = Visitor::enter(id, req, Some(caller.user_id), now).map_err(conflict)?;
                data.visitors.push(visitor.clone());
                Ok((json!(visitor), vec![insert(Table::Visitors)]))
            }
            Mutation::RegisterExit { id } => {
                let visitor = data
                    .visitors
                    .iter_mut()
                    .find(|v| v.id == id)
                    .ok_or_else(|| api(404, "Visitor not found"))?;
                visitor.register_exit(now).map_err(conflict)?;
                Ok((json!(visitor), vec![update(Table::Visitors)]))
            }
            Mutation::RequestReservation(req) => {
                let requester = data.profile(&caller.user_id)?;
                let id = data.id("res");
                let reservation = Reservation::request(id, req, &requester, now).map_err(conflict)?;
                data.reservations.push(reservation.clone());
                Ok((json!(reservation), vec![insert(Table::Reservations)]))
            }
            Mutation::DecideReservation { id, decision } => {
                let reservation = data
                    .reservations
                    .iter_mut()
                    .find(|r| r.id == id)
                    .ok_or_else(|| api(404, "Reservation not found"))?;
                reservation.decide(decision).map_err(conflict)?;
                Ok((json!(reservation), vec![update(Table::Reservations)]))
            }
            Mutation::PublishNotice(req) => {
                let author = data.profile(&caller.user_id)?;
                let id = data.id("not");
                let notice = Notice::publish(id, req, &author, now).map_err(conflict)?;
                data.notices.push(notice.clone());
                Ok((json!(notice), vec![insert(Table::Notices)]))
            }
            Mutation::DeleteNotice { id } => {
                let before = data.notices.len();
                data.notices.retain(|n| n.id != id);
                if data.notices.len() == before {
                    return Err(api(404, "Notice not found"));
                }
                Ok((Value::Null, vec![ChangeEvent::new(Table::Notices, ChangeKind::Delete)]))
            }
            Mutation::OpenOccurrence(req) => {
                let requester = data.profile(&caller.user_id)?;
                let id = data.id("occ");
                let occurrence = Occurrence::open(id, req, &requester, now).map_err(conflict)?;
                data.occurrences.push(occurrence.clone());
                Ok((
                    json!(occurrence),
                    vec![insert(Table::Occurrences), insert(Table::OccurrenceEvents)],
                ))
            }
            Mutation::SetOccurrenceStatus { id, status } => {
                let occurrence = data
                    .occurrences
                    .iter_mut()
                    .find(|o| o.id == id)
                    .ok_or_else(|| api(404, "Occurrence not found"))?;
                occurrence.set_status(status).map_err(conflict)?;
                Ok((json!(occurrence), vec![update(Table::Occurrences)]))
            }
            Mutation::ReplyOccurrence { id, message } => {
                let author = data.profile(&caller.user_id)?;
                let occurrence = data
                    .occurrences
                    .iter_mut()
                    .find(|o| o.id == id)
                    .ok_or_else(|| api(404, "Occurrence not found"))?;
                let event = occurrence
                    .reply(&message, &author.full_name, now)
                    .map_err(conflict)?
                    .clone();
                Ok((json!(event), vec![insert(Table::OccurrenceEvents)]))
            }
            Mutation::UpdateProfile(req) => {
                let profile = data
                    .profiles
                    .iter_mut()
                    .find(|p| p.user_id == caller.user_id)
                    .ok_or_else(|| api(404, "Profile not found"))?;
                if let Some(v) = req.full_name {
                    profile.full_name = v;
                }
                if let Some(v) = req.phone {
                    profile.phone = v;
                }
                if let Some(v) = req.unit {
                    profile.unit = v;
                }
                if let Some(v) = req.block {
                    profile.block = v;
                }
                Ok((json!(profile), vec![update(Table::Profiles)]))
            }
            Mutation::RegisterPerson(req) => {
                drop(data);
                let user_id = self.create_account(&req)?;
                Ok((
                    json!({"user_id": user_id}),
                    vec![insert(Table::Profiles), insert(Table::UserRoles)],
                ))
            }
        }
    }

    fn create_account(&self, req: &SignUpRequest) -> Result<String, ClientError> {
        req.validate().map_err(conflict)?;
        if self.data.lock().unwrap().accounts.iter().any(|a| a.email == req.email) {
            return Err(api(409, "An account with this email already exists"));
        }
        let (unit, block) = req.location().unwrap_or_default();
        Ok(self.add_user(&req.email, &req.password, &req.full_name, req.role, &unit, &block))
    }

    fn table_rows(&self, table: Table) -> Vec<Value> {
        let data = self.data.lock().unwrap();
        match table {
            Table::Profiles => rows(&data.profiles),
            Table::UserRoles => data
                .roles
                .iter()
                .map(|(user_id, role)| json!({"user_id": user_id, "role": role}))
                .collect(),
            Table::Packages => rows(&data.packages),
            Table::Visitors => rows(&data.visitors),
            Table::Reservations => rows(&data.reservations),
            Table::Notices => rows(&data.notices),
            Table::Occurrences => rows(&data.occurrences),
            Table::OccurrenceEvents => {
                let events: Vec<_> = data.occurrences.iter().flat_map(|o| o.timeline.clone()).collect();
                rows(&events)
            }
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    fn auth_state(&self) -> watch::Receiver<Option<Identity>> {
        self.auth_tx.subscribe()
    }

    async fn sign_in(&self, credentials: &LoginRequest) -> Result<Identity, ClientError> {
        let identity = {
            let data = self.data.lock().unwrap();
            let account = data
                .accounts
                .iter()
                .find(|a| a.email == credentials.email && a.password == credentials.password)
                .ok_or_else(|| api(401, "Incorrect email or password"))?;
            Identity {
                user_id: account.user_id.clone(),
                email: account.email.clone(),
            }
        };
        self.auth_tx.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<String, ClientError> {
        self.create_account(request)
    }

    async fn sign_out(&self) -> Result<(), ClientError> {
        self.auth_tx.send_replace(None);
        Ok(())
    }

    async fn refresh_tokens(&self) -> Result<(), ClientError> {
        self.caller().map(|_| ())
    }

    async fn fetch_profile(&self) -> Result<Option<Profile>, ClientError> {
        let caller = self.caller()?;
        let data = self.data.lock().unwrap();
        Ok(data.profiles.iter().find(|p| p.user_id == caller.user_id).cloned())
    }

    async fn fetch_role(&self) -> Result<Option<Role>, ClientError> {
        let caller = self.caller()?;
        Ok(self.data.lock().unwrap().roles.get(&caller.user_id).copied())
    }

    async fn fetch_rows(&self, table: Table, order: &OrderBy) -> Result<Vec<Value>, ClientError> {
        *self.reads.lock().unwrap().entry(table).or_insert(0) += 1;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(api(500, "Unexpected error. Please try again"));
        }
        let mut rows = self.table_rows(table);
        order.sort(&mut rows);
        Ok(rows)
    }

    async fn count(&self, query: CountQuery) -> Result<u64, ClientError> {
        let data = self.data.lock().unwrap();
        let count = match query {
            CountQuery::PendingPackages => data
                .packages
                .iter()
                .filter(|p| p.status == PackageStatus::Pending)
                .count(),
            CountQuery::Residents => data.profiles.len(),
            CountQuery::VisitorsToday => {
                let since = start_of_day(Utc::now());
                data.visitors.iter().filter(|v| v.entry_at >= since).count()
            }
            CountQuery::OpenOccurrences => data
                .occurrences
                .iter()
                .filter(|o| o.status != OccurrenceStatus::Resolved)
                .count(),
        };
        Ok(count as u64)
    }

    async fn mutate(&self, mutation: &Mutation) -> Result<Value, ClientError> {
        let (row, events) = self.apply(mutation)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        for event in events {
            self.hub.publish(event);
        }
        Ok(row)
    }

    fn subscribe(&self, table: Table) -> broadcast::Receiver<ChangeEvent> {
        self.hub.subscribe(table)
    }
}

/// Waits until the watched value satisfies `ready`, failing the test after
/// a few seconds.
pub async fn settle<T: Clone>(rx: &mut watch::Receiver<T>, ready: impl FnMut(&T) -> bool) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(ready))
        .await
        .expect("timed out waiting for state")
        .expect("state channel closed")
        .clone()
}

/// Polls `ready` until it holds, failing the test after a few seconds.
pub async fn eventually(mut ready: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !ready() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition never held");
}
