//! In-process service wiring: event store, bus, dispatcher, read models and
//! the background subscribers that keep them current.

use std::sync::{Arc, Mutex};

use serde_json::Value as JsonValue;
use tracing::{info, warn};
use uuid::Uuid;

use workshop_core::{Aggregate, AggregateId, DomainError, TenantId, UserId};
use workshop_events::{Event, EventEnvelope, InMemoryEventBus};
use workshop_infra::command_dispatcher::{CommandDispatcher, DispatchError};
use workshop_infra::event_store::{InMemoryEventStore, StoredEvent};
use workshop_infra::projections::{
    AuditEntryReadModel, AuditTrailProjection, CatalogEntryReadModel, CatalogKind, CatalogProjection, ClientReadModel,
    ClientsProjection, HomeVisitReadModel, HomeVisitsProjection, MovementReadModel, Projection, ProjectionError,
    StockItemReadModel, StockItemsProjection, StockMovementsProjection, UserReadModel, UsersProjection,
    WorkOrderReadModel, WorkOrdersProjection, rebuild_tenant,
};
use workshop_infra::provisioning::ProfileProvisioner;
use workshop_infra::read_model::InMemoryTenantStore;
use workshop_infra::unique_index::UniqueKeyIndex;
use workshop_infra::workers::{ProjectionWorker, WorkerHandle};
use workshop_infra::workflows::WorkshopWorkflows;
use workshop_inventory::StockItemId;
use workshop_service::{ClientId, HomeVisitId, WorkOrderId};
use workshop_audit::ChangeRecordId;

pub type EventStoreHandle = Arc<InMemoryEventStore>;
pub type BusHandle = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type Dispatcher = CommandDispatcher<EventStoreHandle, BusHandle>;

type Store<K, V> = Arc<InMemoryTenantStore<K, V>>;

pub struct AppServices {
    dispatcher: Arc<Dispatcher>,
    unique_keys: Arc<UniqueKeyIndex>,
    provisioner: Arc<ProfileProvisioner<EventStoreHandle, BusHandle>>,
    workflows: WorkshopWorkflows<EventStoreHandle, BusHandle>,

    users: Arc<UsersProjection<Store<UserId, UserReadModel>>>,
    categories: Arc<CatalogProjection<Store<AggregateId, CatalogEntryReadModel>>>,
    locations: Arc<CatalogProjection<Store<AggregateId, CatalogEntryReadModel>>>,
    machine_types: Arc<CatalogProjection<Store<AggregateId, CatalogEntryReadModel>>>,
    items: Arc<StockItemsProjection<Store<StockItemId, StockItemReadModel>>>,
    movements: Arc<StockMovementsProjection<Store<Uuid, MovementReadModel>>>,
    clients: Arc<ClientsProjection<Store<ClientId, ClientReadModel>>>,
    orders: Arc<WorkOrdersProjection<Store<WorkOrderId, WorkOrderReadModel>>>,
    visits: Arc<HomeVisitsProjection<Store<HomeVisitId, HomeVisitReadModel>>>,
    audit: Arc<AuditTrailProjection<Store<ChangeRecordId, AuditEntryReadModel>>>,

    projections: Vec<Arc<dyn Projection>>,
    workers: Mutex<Vec<WorkerHandle>>,
}

impl core::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppServices")
            .field("projections", &self.projections.iter().map(|p| p.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl AppServices {
    /// Wire everything in memory and start the bus subscribers.
    pub fn start() -> std::io::Result<Arc<Self>> {
        let store: EventStoreHandle = Arc::new(InMemoryEventStore::new());
        let bus: BusHandle = Arc::new(InMemoryEventBus::new());
        let dispatcher = Arc::new(CommandDispatcher::new(store, bus.clone()));
        let unique_keys = Arc::new(UniqueKeyIndex::new());

        let users = Arc::new(UsersProjection::new(Arc::default()));
        let categories = Arc::new(CatalogProjection::new(CatalogKind::Category, Arc::default()));
        let locations = Arc::new(CatalogProjection::new(CatalogKind::Location, Arc::default()));
        let machine_types = Arc::new(CatalogProjection::new(CatalogKind::MachineType, Arc::default()));
        let items = Arc::new(StockItemsProjection::new(Arc::default()));
        let movements = Arc::new(StockMovementsProjection::new(Arc::default()));
        let clients = Arc::new(ClientsProjection::new(Arc::default()));
        let orders = Arc::new(WorkOrdersProjection::new(Arc::default()));
        let visits = Arc::new(HomeVisitsProjection::new(Arc::default()));
        let audit = Arc::new(AuditTrailProjection::new(Arc::default()));

        let projections: Vec<Arc<dyn Projection>> = vec![
            users.clone(),
            categories.clone(),
            locations.clone(),
            machine_types.clone(),
            items.clone(),
            movements.clone(),
            clients.clone(),
            orders.clone(),
            visits.clone(),
            audit.clone(),
        ];

        let provisioner = Arc::new(ProfileProvisioner::new(dispatcher.clone()));

        let read_models = projections.clone();
        let projection_worker =
            ProjectionWorker::spawn("workshop-projections", bus.as_ref(), None, move |env: EventEnvelope<JsonValue>| {
                apply_all(&read_models, &env)
            })?;

        let reactor = provisioner.clone();
        let provisioning_worker =
            ProjectionWorker::spawn("workshop-provisioner", bus.as_ref(), None, move |env: EventEnvelope<JsonValue>| {
                reactor.handle_envelope(&env)
            })?;

        info!(projections = projections.len(), "services started");

        Ok(Arc::new(Self {
            workflows: WorkshopWorkflows::new(dispatcher.clone(), unique_keys.clone()),
            dispatcher,
            unique_keys,
            provisioner,
            users,
            categories,
            locations,
            machine_types,
            items,
            movements,
            clients,
            orders,
            visits,
            audit,
            projections,
            workers: Mutex::new(vec![projection_worker, provisioning_worker]),
        }))
    }

    /// Stop the subscribers and wait for them to exit.
    pub fn shutdown(&self) {
        let handles = match self.workers.lock() {
            Ok(mut workers) => std::mem::take(&mut *workers),
            Err(_) => return,
        };
        for handle in handles {
            let name = handle.name();
            handle.shutdown();
            info!(worker = name, "worker stopped");
        }
    }

    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &'static str,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: Event + serde::Serialize + serde::de::DeserializeOwned,
    {
        self.dispatcher
            .dispatch(tenant_id, aggregate_id, aggregate_type, command, make_aggregate)
    }

    pub fn load<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: serde::de::DeserializeOwned,
    {
        self.dispatcher.load(tenant_id, aggregate_id, make_aggregate)
    }

    /// Like [`Self::load`], but a missing record is a validation error on `field`.
    pub fn load_reference<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        field: &str,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: serde::de::DeserializeOwned,
    {
        self.load(tenant_id, aggregate_id, make_aggregate).map_err(|e| match e {
            DispatchError::NotFound => DispatchError::Validation(format!("{field}: no such record")),
            other => other,
        })
    }

    /// Drop and replay every read model of one tenant.
    pub fn rebuild(&self, tenant_id: TenantId) -> Result<usize, ProjectionError> {
        let projections: Vec<&dyn Projection> = self.projections.iter().map(|p| p.as_ref()).collect();
        rebuild_tenant(self.dispatcher.store().as_ref(), tenant_id, &projections)
    }

    pub fn unique_keys(&self) -> &UniqueKeyIndex {
        &self.unique_keys
    }

    pub fn provisioner(&self) -> &ProfileProvisioner<EventStoreHandle, BusHandle> {
        &self.provisioner
    }

    pub fn workflows(&self) -> &WorkshopWorkflows<EventStoreHandle, BusHandle> {
        &self.workflows
    }

    pub fn users(&self) -> &UsersProjection<Store<UserId, UserReadModel>> {
        &self.users
    }

    pub fn categories(&self) -> &CatalogProjection<Store<AggregateId, CatalogEntryReadModel>> {
        &self.categories
    }

    pub fn locations(&self) -> &CatalogProjection<Store<AggregateId, CatalogEntryReadModel>> {
        &self.locations
    }

    pub fn machine_types(&self) -> &CatalogProjection<Store<AggregateId, CatalogEntryReadModel>> {
        &self.machine_types
    }

    pub fn items(&self) -> &StockItemsProjection<Store<StockItemId, StockItemReadModel>> {
        &self.items
    }

    pub fn movements(&self) -> &StockMovementsProjection<Store<Uuid, MovementReadModel>> {
        &self.movements
    }

    pub fn clients(&self) -> &ClientsProjection<Store<ClientId, ClientReadModel>> {
        &self.clients
    }

    pub fn orders(&self) -> &WorkOrdersProjection<Store<WorkOrderId, WorkOrderReadModel>> {
        &self.orders
    }

    pub fn visits(&self) -> &HomeVisitsProjection<Store<HomeVisitId, HomeVisitReadModel>> {
        &self.visits
    }

    pub fn audit(&self) -> &AuditTrailProjection<Store<ChangeRecordId, AuditEntryReadModel>> {
        &self.audit
    }
}

/// Feed one envelope to every read model; the first failure is reported after
/// the others have had their turn.
fn apply_all(projections: &[Arc<dyn Projection>], envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
    let mut first_error = None;
    for projection in projections {
        if let Err(e) = projection.apply_envelope(envelope) {
            warn!(projection = projection.name(), error = %e, "projection rejected envelope");
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}
