//! Workshop service domain (event-sourced): clients, machine types,
//! work orders and home visits.

pub mod client;
pub mod home_visit;
pub mod machine_type;
pub mod status;
pub mod work_order;

pub use client::{
    Client, ClientActiveChanged, ClientCommand, ClientEvent, ClientId, ClientRegistered,
    ClientUpdated, ContactInfo, RegisterClient, SetClientActive, UpdateClient,
};
pub use home_visit::{
    ChangeVisitStatus, HomeVisit, HomeVisitCommand, HomeVisitEvent, HomeVisitId, LinkWorkOrder,
    RecordVisitNotes, ScheduleVisit, VisitNotesRecorded, VisitScheduled, VisitStatusChanged,
    WorkOrderLinked,
};
pub use machine_type::{
    CreateMachineType, MachineType, MachineTypeCommand, MachineTypeDefined, MachineTypeEvent,
    MachineTypeId, UpdateMachineType,
};
pub use status::{VisitStatus, WorkOrderStatus};
pub use work_order::{
    AddUsedPart, AssignTechnician, ChangeStatus, CostsSet, MachineDetails, OpenWorkOrder, PartAdded,
    SetCosts, StatusChanged, TechnicianAssigned, UpdateWorkOrder, UsedPart, WorkOrder,
    WorkOrderChanges, WorkOrderCommand, WorkOrderEvent, WorkOrderId, WorkOrderOpened,
    WorkOrderUpdated, order_reference,
};
