//! End-to-end pipeline: command → event store → bus → projections.
//!
//! The bus is drained synchronously so every assertion sees a settled state.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use workshop_auth::{ProfileRole, RegisterUser, UserAccount, UserCommand};
use workshop_core::{TenantId, UserId};
use workshop_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};
use workshop_inventory::{
    CategoryId, LocationId, MovementKind, RecordMovement, RegisterItem, StockItem, StockItemCommand, StockItemId,
};
use workshop_service::{
    ClientId, HomeVisit, HomeVisitCommand, HomeVisitId, MachineDetails, MachineTypeId, OpenWorkOrder,
    ScheduleVisit, VisitStatus, WorkOrder, WorkOrderCommand, WorkOrderId, WorkOrderStatus, ChangeStatus,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, InMemoryEventStore};
use crate::projections::{
    MovementQuery, Projection, StockItemsProjection, StockMovementsProjection, UserQuery, UsersProjection,
    WorkOrdersProjection, rebuild_tenant,
};
use crate::provisioning::ProfileProvisioner;
use crate::read_model::{InMemoryTenantStore, Pagination};
use crate::streams;
use crate::unique_index::UniqueKeyIndex;
use crate::workflows::{ConsumePart, SpawnOrderFromVisit, WorkflowError, WorkshopWorkflows};

type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Bus>;

struct Harness {
    store: Arc<InMemoryEventStore>,
    dispatcher: Arc<Dispatcher>,
    subscription: Subscription<EventEnvelope<JsonValue>>,
    provisioner: ProfileProvisioner<Arc<InMemoryEventStore>, Bus>,
    workflows: WorkshopWorkflows<Arc<InMemoryEventStore>, Bus>,
    users: UsersProjection<InMemoryTenantStore<UserId, crate::projections::UserReadModel>>,
    items: StockItemsProjection<InMemoryTenantStore<StockItemId, crate::projections::StockItemReadModel>>,
    movements: StockMovementsProjection<InMemoryTenantStore<uuid::Uuid, crate::projections::MovementReadModel>>,
    orders: WorkOrdersProjection<InMemoryTenantStore<WorkOrderId, crate::projections::WorkOrderReadModel>>,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(InMemoryEventStore::new());
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let subscription = bus.subscribe();
        let dispatcher = Arc::new(CommandDispatcher::new(store.clone(), bus));
        Self {
            store,
            provisioner: ProfileProvisioner::new(dispatcher.clone()),
            workflows: WorkshopWorkflows::new(dispatcher.clone(), Arc::new(UniqueKeyIndex::new())),
            dispatcher,
            subscription,
            users: UsersProjection::new(InMemoryTenantStore::new()),
            items: StockItemsProjection::new(InMemoryTenantStore::new()),
            movements: StockMovementsProjection::new(InMemoryTenantStore::new()),
            orders: WorkOrdersProjection::new(InMemoryTenantStore::new()),
        }
    }

    fn projections(&self) -> [&dyn Projection; 4] {
        [&self.users, &self.items, &self.movements, &self.orders]
    }

    /// Deliver everything published so far, including events the provisioner emits.
    fn pump(&self) {
        while let Ok(envelope) = self.subscription.try_recv() {
            for projection in self.projections() {
                projection.apply_envelope(&envelope).unwrap();
            }
            self.provisioner.handle_envelope(&envelope).unwrap();
        }
    }

    fn register_user(&self, tenant_id: TenantId, username: &str) -> UserId {
        let user_id = UserId::new();
        self.dispatcher
            .dispatch(
                tenant_id,
                user_id.into(),
                streams::USER,
                UserCommand::Register(RegisterUser {
                    tenant_id,
                    user_id,
                    username: username.to_string(),
                    first_name: Some("Ana".to_string()),
                    last_name: Some("Rojas".to_string()),
                    email: None,
                    occurred_at: Utc::now(),
                }),
                |_, id| UserAccount::empty(UserId::from(id)),
            )
            .unwrap();
        user_id
    }

    fn register_item(&self, tenant_id: TenantId, code: &str, quantity: i64, sale_price: Option<Decimal>) -> StockItemId {
        let item_id = StockItemId::generate();
        self.dispatcher
            .dispatch(
                tenant_id,
                item_id.into(),
                streams::STOCK_ITEM,
                StockItemCommand::Register(RegisterItem {
                    tenant_id,
                    item_id,
                    code: code.to_string(),
                    name: format!("Part {code}"),
                    category_id: CategoryId::generate(),
                    location_id: LocationId::generate(),
                    description: None,
                    measurements: None,
                    material: None,
                    brand: None,
                    model: None,
                    unit: None,
                    quantity,
                    minimum_stock: Some(2),
                    purchase_price: None,
                    sale_price,
                    notes: None,
                    user_id: UserId::new(),
                    occurred_at: Utc::now(),
                }),
                |_, id| StockItem::empty(StockItemId::new(id)),
            )
            .unwrap();
        item_id
    }

    fn open_order(&self, tenant_id: TenantId, number: &str) -> WorkOrderId {
        let order_id = WorkOrderId::generate();
        self.dispatcher
            .dispatch(
                tenant_id,
                order_id.into(),
                streams::WORK_ORDER,
                WorkOrderCommand::Open(OpenWorkOrder {
                    tenant_id,
                    order_id,
                    order_number: number.to_string(),
                    client_id: ClientId::generate(),
                    machine_type_id: MachineTypeId::generate(),
                    machine: MachineDetails::default(),
                    intake_reason: "Does not start".to_string(),
                    work_description: None,
                    notes: None,
                    estimated_delivery: None,
                    estimated_cost: None,
                    assigned_technician: None,
                    user_id: UserId::new(),
                    occurred_at: Utc::now(),
                }),
                |_, id| WorkOrder::empty(WorkOrderId::new(id)),
            )
            .unwrap();
        order_id
    }

    fn schedule_visit(&self, tenant_id: TenantId) -> HomeVisitId {
        let visit_id = HomeVisitId::generate();
        self.dispatcher
            .dispatch(
                tenant_id,
                visit_id.into(),
                streams::HOME_VISIT,
                HomeVisitCommand::Schedule(ScheduleVisit {
                    tenant_id,
                    visit_id,
                    client_id: ClientId::generate(),
                    machine_type_id: MachineTypeId::generate(),
                    visit_at: Utc::now(),
                    address: "Av. Matta 1200".to_string(),
                    problem_description: "Engine overheats".to_string(),
                    technician: UserId::new(),
                    user_id: UserId::new(),
                    occurred_at: Utc::now(),
                }),
                |_, id| HomeVisit::empty(HomeVisitId::new(id)),
            )
            .unwrap();
        visit_id
    }

    fn movement(&self, tenant_id: TenantId, item_id: StockItemId, kind: MovementKind, quantity: i64) -> Result<(), DispatchError> {
        self.dispatcher
            .dispatch(
                tenant_id,
                item_id.into(),
                streams::STOCK_ITEM,
                StockItemCommand::RecordMovement(RecordMovement {
                    tenant_id,
                    item_id,
                    kind,
                    quantity,
                    reason: "Counter sale".to_string(),
                    user_id: UserId::new(),
                    occurred_at: Utc::now(),
                }),
                |_, id| StockItem::empty(StockItemId::new(id)),
            )
            .map(|_| ())
    }

    fn consume(&self, tenant_id: TenantId, order_id: WorkOrderId, item_id: StockItemId, quantity: i64) -> ConsumePart {
        ConsumePart {
            tenant_id,
            order_id,
            item_id,
            quantity,
            unit_price: None,
            user_id: UserId::new(),
            occurred_at: Utc::now(),
        }
    }
}

#[test]
fn registering_a_user_provisions_a_worker_profile() {
    let h = Harness::new();
    let tenant_id = TenantId::new();

    let user_id = h.register_user(tenant_id, "arojas");
    h.pump();

    let user = h.users.get(tenant_id, &user_id).unwrap();
    assert_eq!(user.username, "arojas");
    assert_eq!(user.full_name, "Ana Rojas");
    assert_eq!(user.role, Some(ProfileRole::Worker));
    assert!(user.active);

    // Redelivery of the registration does not create a second profile.
    for stored in h.store.load_stream(tenant_id, user_id.into()).unwrap() {
        h.provisioner.handle_envelope(&stored.to_envelope()).unwrap();
    }
    assert_eq!(h.store.load_tenant(tenant_id).unwrap().len(), 2);
    assert_eq!(h.store.load_stream(tenant_id, user_id.into()).unwrap().len(), 1);
    assert_eq!(h.store.load_stream(tenant_id, user_id.profile_stream_id()).unwrap().len(), 1);
}

#[test]
fn movement_chain_links_previous_and_new_stock() {
    let h = Harness::new();
    let tenant_id = TenantId::new();
    let item_id = h.register_item(tenant_id, "FLT-01", 10, None);

    h.movement(tenant_id, item_id, MovementKind::Outbound, 4).unwrap();
    h.movement(tenant_id, item_id, MovementKind::Inbound, 3).unwrap();
    h.movement(tenant_id, item_id, MovementKind::Return, 1).unwrap();
    h.pump();

    let page = h.movements.list(tenant_id, &MovementQuery::default(), Pagination::default());
    let mut chain = page.items;
    chain.sort_by_key(|m| m.sequence_number);
    assert_eq!(chain.len(), 4);
    assert_eq!(chain[0].reason, workshop_inventory::INITIAL_STOCK_REASON);
    assert_eq!(chain[0].previous_stock, 0);
    for pair in chain.windows(2) {
        assert_eq!(pair[0].new_stock, pair[1].previous_stock);
    }
    assert_eq!(chain.last().unwrap().new_stock, 10);
    assert_eq!(h.items.get(tenant_id, &item_id).unwrap().quantity, 10);
}

#[test]
fn outbound_beyond_stock_is_rejected_and_leaves_no_trace() {
    let h = Harness::new();
    let tenant_id = TenantId::new();
    let item_id = h.register_item(tenant_id, "BLT-02", 3, None);

    let err = h.movement(tenant_id, item_id, MovementKind::Outbound, 5).unwrap_err();
    assert!(matches!(err, DispatchError::InvariantViolation(_)));
    h.pump();

    assert_eq!(h.items.get(tenant_id, &item_id).unwrap().quantity, 3);
    assert_eq!(h.movements.list(tenant_id, &MovementQuery::default(), Pagination::default()).total, 1);
}

#[test]
fn consuming_a_part_moves_stock_and_adds_an_order_line() {
    let h = Harness::new();
    let tenant_id = TenantId::new();
    let item_id = h.register_item(tenant_id, "SPK-03", 5, Some(Decimal::new(4500, 0)));
    let order_id = h.open_order(tenant_id, "1001");

    let consumed = h.workflows.consume_part(h.consume(tenant_id, order_id, item_id, 2)).unwrap();
    h.pump();

    assert_eq!(consumed.line_no, 1);
    assert_eq!(consumed.unit_price, Decimal::new(4500, 0));
    assert_eq!(consumed.subtotal, Decimal::new(9000, 0));
    assert_eq!(consumed.remaining_stock, 3);

    let order = h.orders.get(tenant_id, &order_id).unwrap();
    assert_eq!(order.parts_total, Decimal::new(9000, 0));
    let outbound = h
        .movements
        .list(
            tenant_id,
            &MovementQuery {
                kind: Some(MovementKind::Outbound),
                ..Default::default()
            },
            Pagination::default(),
        );
    assert_eq!(outbound.items[0].reason, "OT-1001");
}

#[test]
fn consuming_a_part_without_a_price_moves_nothing() {
    let h = Harness::new();
    let tenant_id = TenantId::new();
    let item_id = h.register_item(tenant_id, "GSK-04", 5, None);
    let order_id = h.open_order(tenant_id, "1002");

    let err = h.workflows.consume_part(h.consume(tenant_id, order_id, item_id, 1)).unwrap_err();
    match err {
        WorkflowError::Dispatch(DispatchError::Validation(msg)) => assert!(msg.starts_with("unit_price")),
        other => panic!("expected a unit_price validation error, got {other:?}"),
    }
    assert_eq!(h.store.load_stream(tenant_id, item_id.into()).unwrap().len(), 2);
}

#[test]
fn consuming_a_part_on_a_closed_order_is_rejected_before_stock_moves() {
    let h = Harness::new();
    let tenant_id = TenantId::new();
    let item_id = h.register_item(tenant_id, "CHN-05", 5, Some(Decimal::new(1200, 0)));
    let order_id = h.open_order(tenant_id, "1003");
    h.dispatcher
        .dispatch(
            tenant_id,
            order_id.into(),
            streams::WORK_ORDER,
            WorkOrderCommand::ChangeStatus(ChangeStatus {
                tenant_id,
                order_id,
                status: WorkOrderStatus::Cancelled,
                occurred_at: Utc::now(),
            }),
            |_, id| WorkOrder::empty(WorkOrderId::new(id)),
        )
        .unwrap();

    let err = h.workflows.consume_part(h.consume(tenant_id, order_id, item_id, 1)).unwrap_err();
    assert!(matches!(err, WorkflowError::Dispatch(DispatchError::InvariantViolation(_))));
    h.pump();
    assert_eq!(h.items.get(tenant_id, &item_id).unwrap().quantity, 5);
}

#[test]
fn spawning_an_order_links_the_visit_and_moves_it_to_the_workshop() {
    let h = Harness::new();
    let tenant_id = TenantId::new();
    let visit_id = h.schedule_visit(tenant_id);
    let order_id = WorkOrderId::generate();

    let cmd = SpawnOrderFromVisit {
        tenant_id,
        visit_id,
        order_id,
        order_number: "2001".to_string(),
        user_id: UserId::new(),
        occurred_at: Utc::now(),
    };
    h.workflows.spawn_order_from_visit(cmd.clone()).unwrap();
    h.pump();

    let visit: HomeVisit = h
        .dispatcher
        .load(tenant_id, visit_id.into(), |_, id| HomeVisit::empty(HomeVisitId::new(id)))
        .unwrap();
    assert_eq!(visit.generated_order(), Some(order_id));
    assert_eq!(visit.status(), VisitStatus::MovedToWorkshop);

    let order = h.orders.get(tenant_id, &order_id).unwrap();
    assert_eq!(order.intake_reason, "Engine overheats");
    assert_eq!(order.assigned_technician, visit.technician());

    // A second spawn for the same visit is a conflict and opens nothing.
    let again = SpawnOrderFromVisit {
        order_id: WorkOrderId::generate(),
        order_number: "2002".to_string(),
        ..cmd
    };
    let err = h.workflows.spawn_order_from_visit(again).unwrap_err();
    assert!(matches!(err, WorkflowError::Dispatch(DispatchError::Conflict(_))));
}

#[test]
fn spawning_with_a_taken_order_number_is_a_conflict() {
    let h = Harness::new();
    let tenant_id = TenantId::new();
    let first = h.schedule_visit(tenant_id);
    let second = h.schedule_visit(tenant_id);

    let spawn = |visit_id| SpawnOrderFromVisit {
        tenant_id,
        visit_id,
        order_id: WorkOrderId::generate(),
        order_number: "3001".to_string(),
        user_id: UserId::new(),
        occurred_at: Utc::now(),
    };
    h.workflows.spawn_order_from_visit(spawn(first)).unwrap();
    let err = h.workflows.spawn_order_from_visit(spawn(second)).unwrap_err();
    assert!(matches!(err, WorkflowError::Dispatch(DispatchError::Conflict(_))));
}

#[test]
fn rebuild_reproduces_the_live_read_models() {
    let h = Harness::new();
    let tenant_id = TenantId::new();
    let user_id = h.register_user(tenant_id, "mtapia");
    let item_id = h.register_item(tenant_id, "OIL-06", 8, Some(Decimal::new(990, 0)));
    let order_id = h.open_order(tenant_id, "4001");
    h.workflows.consume_part(h.consume(tenant_id, order_id, item_id, 3)).unwrap();
    h.pump();

    let live_user = h.users.get(tenant_id, &user_id).unwrap();
    let live_item = h.items.get(tenant_id, &item_id).unwrap();
    let live_order = h.orders.get(tenant_id, &order_id).unwrap();

    let events = rebuild_tenant(h.store.as_ref(), tenant_id, &h.projections()).unwrap();
    assert_eq!(events, h.store.load_tenant(tenant_id).unwrap().len());

    assert_eq!(h.users.get(tenant_id, &user_id).unwrap(), live_user);
    assert_eq!(h.items.get(tenant_id, &item_id).unwrap(), live_item);
    assert_eq!(h.orders.get(tenant_id, &order_id).unwrap(), live_order);
}

#[test]
fn read_models_are_isolated_per_tenant() {
    let h = Harness::new();
    let tenant_a = TenantId::new();
    let tenant_b = TenantId::new();
    h.register_user(tenant_a, "shared");
    h.register_user(tenant_b, "shared");
    let item_id = h.register_item(tenant_a, "ISO-07", 1, None);
    h.pump();

    assert_eq!(h.users.list(tenant_a, &UserQuery::default(), Pagination::default()).total, 1);
    assert_eq!(h.users.list(tenant_b, &UserQuery::default(), Pagination::default()).total, 1);
    assert!(h.items.get(tenant_b, &item_id).is_none());

    let err = h.movement(tenant_b, item_id, MovementKind::Inbound, 1).unwrap_err();
    assert!(matches!(err, DispatchError::NotFound | DispatchError::Validation(_) | DispatchError::InvariantViolation(_)));
}
