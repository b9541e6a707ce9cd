//! In-process Local Store for the four entity collections.
//!
//! The store is a cheaply cloneable handle over one shared `RwLock`. CRUD
//! mutators are synchronous and enforce referential integrity at mutation
//! time: every foreign id must resolve to an existing entity. Deleting a
//! property cascades to its tenants and payments.
//!
//! Sync uses [`LocalStore::snapshot`], [`LocalStore::replace_all`] and
//! [`LocalStore::adopt`]; each takes the lock once, so readers never observe
//! a partially applied transition across collections.

mod storage;

pub use storage::{SnapshotStorage, StorageError};

use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::models::{Payment, Property, RepairRequest, Tenant};

/// Errors returned by Local Store mutators.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("{kind} already exists: {id}")]
    DuplicateId { kind: &'static str, id: String },
    #[error("{kind} {id} references missing {target} {target_id}")]
    MissingReference {
        kind: &'static str,
        id: String,
        target: &'static str,
        target_id: String,
    },
}

/// A full copy of all four collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub tenants: Vec<Tenant>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub repair_requests: Vec<RepairRequest>,
}

impl Snapshot {
    pub fn counts(&self) -> CollectionCounts {
        CollectionCounts {
            properties: self.properties.len(),
            tenants: self.tenants.len(),
            payments: self.payments.len(),
            repair_requests: self.repair_requests.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts().total() == 0
    }
}

/// Per-collection record counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectionCounts {
    pub properties: usize,
    pub tenants: usize,
    pub payments: usize,
    pub repair_requests: usize,
}

impl CollectionCounts {
    pub fn total(&self) -> usize {
        self.properties + self.tenants + self.payments + self.repair_requests
    }
}

impl std::fmt::Display for CollectionCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} properties, {} tenants, {} payments, {} repair requests",
            self.properties, self.tenants, self.payments, self.repair_requests
        )
    }
}

/// Shared handle to the Local Store.
#[derive(Debug, Clone, Default)]
pub struct LocalStore {
    inner: Arc<RwLock<Snapshot>>,
}

fn position_of<T>(items: &[T], id: &str, id_of: impl Fn(&T) -> &str) -> Option<usize> {
    items.iter().position(|item| id_of(item) == id)
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with `snapshot`. Payment statuses are
    /// recomputed; references are not checked.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        store.replace_all(snapshot);
        store
    }

    fn read(&self) -> RwLockReadGuard<'_, Snapshot> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Snapshot> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a copy of every collection, taken under one read lock.
    pub fn snapshot(&self) -> Snapshot {
        self.read().clone()
    }

    pub fn counts(&self) -> CollectionCounts {
        self.read().counts()
    }

    /// Replaces all four collections in one transition.
    pub fn replace_all(&self, mut snapshot: Snapshot) {
        for payment in &mut snapshot.payments {
            payment.refresh_status();
        }
        *self.write() = snapshot;
    }

    /// Inserts every record of `records` whose id is not already present,
    /// in one transition. Returns how many records were inserted.
    ///
    /// Materialized records are taken verbatim; foreign references are not
    /// checked.
    pub fn adopt(&self, records: Snapshot) -> CollectionCounts {
        let mut data = self.write();
        let mut adopted = CollectionCounts::default();

        for property in records.properties {
            if position_of(&data.properties, &property.id, |p| p.id.as_str()).is_none() {
                data.properties.push(property);
                adopted.properties += 1;
            }
        }
        for tenant in records.tenants {
            if position_of(&data.tenants, &tenant.id, |t| t.id.as_str()).is_none() {
                data.tenants.push(tenant);
                adopted.tenants += 1;
            }
        }
        for mut payment in records.payments {
            if position_of(&data.payments, &payment.id, |p| p.id.as_str()).is_none() {
                payment.refresh_status();
                data.payments.push(payment);
                adopted.payments += 1;
            }
        }
        for request in records.repair_requests {
            if position_of(&data.repair_requests, &request.id, |r| r.id.as_str()).is_none() {
                data.repair_requests.push(request);
                adopted.repair_requests += 1;
            }
        }

        adopted
    }

    // ========== Properties ==========

    pub fn get_property(&self, id: &str) -> Option<Property> {
        self.read().properties.iter().find(|p| p.id == id).cloned()
    }

    pub fn list_properties(&self) -> Vec<Property> {
        self.read().properties.clone()
    }

    pub fn add_property(&self, property: Property) -> Result<Property, StoreError> {
        let mut data = self.write();
        if position_of(&data.properties, &property.id, |p| p.id.as_str()).is_some() {
            return Err(StoreError::DuplicateId {
                kind: "Property",
                id: property.id,
            });
        }
        data.properties.push(property.clone());
        Ok(property)
    }

    pub fn update_property(&self, property: Property) -> Result<Property, StoreError> {
        let mut data = self.write();
        let index = position_of(&data.properties, &property.id, |p| p.id.as_str()).ok_or_else(|| {
            StoreError::NotFound {
                kind: "Property",
                id: property.id.clone(),
            }
        })?;
        data.properties[index] = property.clone();
        Ok(property)
    }

    /// Deletes a property together with its tenants and payments.
    pub fn delete_property(&self, id: &str) -> Result<Property, StoreError> {
        let mut data = self.write();
        let index =
            position_of(&data.properties, id, |p| p.id.as_str()).ok_or_else(|| StoreError::NotFound {
                kind: "Property",
                id: id.to_string(),
            })?;
        let removed = data.properties.remove(index);

        let tenants_before = data.tenants.len();
        data.tenants.retain(|t| t.property_id != id);
        let payments_before = data.payments.len();
        data.payments.retain(|p| p.property_id != id);

        tracing::info!(
            property_id = %id,
            tenants = tenants_before - data.tenants.len(),
            payments = payments_before - data.payments.len(),
            "deleted property with cascade"
        );

        Ok(removed)
    }

    // ========== Tenants ==========

    pub fn get_tenant(&self, id: &str) -> Option<Tenant> {
        self.read().tenants.iter().find(|t| t.id == id).cloned()
    }

    pub fn list_tenants(&self) -> Vec<Tenant> {
        self.read().tenants.clone()
    }

    pub fn add_tenant(&self, tenant: Tenant) -> Result<Tenant, StoreError> {
        let mut data = self.write();
        if position_of(&data.tenants, &tenant.id, |t| t.id.as_str()).is_some() {
            return Err(StoreError::DuplicateId {
                kind: "Tenant",
                id: tenant.id,
            });
        }
        check_property(&data, "Tenant", &tenant.id, &tenant.property_id)?;
        data.tenants.push(tenant.clone());
        Ok(tenant)
    }

    pub fn update_tenant(&self, tenant: Tenant) -> Result<Tenant, StoreError> {
        let mut data = self.write();
        let index =
            position_of(&data.tenants, &tenant.id, |t| t.id.as_str()).ok_or_else(|| StoreError::NotFound {
                kind: "Tenant",
                id: tenant.id.clone(),
            })?;
        check_property(&data, "Tenant", &tenant.id, &tenant.property_id)?;
        data.tenants[index] = tenant.clone();
        Ok(tenant)
    }

    pub fn delete_tenant(&self, id: &str) -> Result<Tenant, StoreError> {
        let mut data = self.write();
        let index = position_of(&data.tenants, id, |t| t.id.as_str()).ok_or_else(|| StoreError::NotFound {
            kind: "Tenant",
            id: id.to_string(),
        })?;
        Ok(data.tenants.remove(index))
    }

    // ========== Payments ==========

    pub fn get_payment(&self, id: &str) -> Option<Payment> {
        self.read().payments.iter().find(|p| p.id == id).cloned()
    }

    pub fn list_payments(&self) -> Vec<Payment> {
        self.read().payments.clone()
    }

    pub fn add_payment(&self, mut payment: Payment) -> Result<Payment, StoreError> {
        let mut data = self.write();
        if position_of(&data.payments, &payment.id, |p| p.id.as_str()).is_some() {
            return Err(StoreError::DuplicateId {
                kind: "Payment",
                id: payment.id,
            });
        }
        check_payment_refs(&data, &payment)?;
        payment.refresh_status();
        data.payments.push(payment.clone());
        Ok(payment)
    }

    pub fn update_payment(&self, mut payment: Payment) -> Result<Payment, StoreError> {
        let mut data = self.write();
        let index = position_of(&data.payments, &payment.id, |p| p.id.as_str()).ok_or_else(|| {
            StoreError::NotFound {
                kind: "Payment",
                id: payment.id.clone(),
            }
        })?;
        check_payment_refs(&data, &payment)?;
        payment.refresh_status();
        data.payments[index] = payment.clone();
        Ok(payment)
    }

    pub fn delete_payment(&self, id: &str) -> Result<Payment, StoreError> {
        let mut data = self.write();
        let index =
            position_of(&data.payments, id, |p| p.id.as_str()).ok_or_else(|| StoreError::NotFound {
                kind: "Payment",
                id: id.to_string(),
            })?;
        Ok(data.payments.remove(index))
    }

    // ========== Repair requests ==========

    pub fn get_repair_request(&self, id: &str) -> Option<RepairRequest> {
        self.read()
            .repair_requests
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub fn list_repair_requests(&self) -> Vec<RepairRequest> {
        self.read().repair_requests.clone()
    }

    pub fn add_repair_request(&self, request: RepairRequest) -> Result<RepairRequest, StoreError> {
        let mut data = self.write();
        if position_of(&data.repair_requests, &request.id, |r| r.id.as_str()).is_some() {
            return Err(StoreError::DuplicateId {
                kind: "RepairRequest",
                id: request.id,
            });
        }
        check_repair_refs(&data, &request)?;
        data.repair_requests.push(request.clone());
        Ok(request)
    }

    pub fn update_repair_request(
        &self,
        request: RepairRequest,
    ) -> Result<RepairRequest, StoreError> {
        let mut data = self.write();
        let index = position_of(&data.repair_requests, &request.id, |r| r.id.as_str()).ok_or_else(|| {
            StoreError::NotFound {
                kind: "RepairRequest",
                id: request.id.clone(),
            }
        })?;
        check_repair_refs(&data, &request)?;
        data.repair_requests[index] = request.clone();
        Ok(request)
    }

    pub fn delete_repair_request(&self, id: &str) -> Result<RepairRequest, StoreError> {
        let mut data = self.write();
        let index = position_of(&data.repair_requests, id, |r| r.id.as_str()).ok_or_else(|| {
            StoreError::NotFound {
                kind: "RepairRequest",
                id: id.to_string(),
            }
        })?;
        Ok(data.repair_requests.remove(index))
    }
}

// ========== Referential integrity ==========

fn check_property(
    data: &Snapshot,
    kind: &'static str,
    id: &str,
    property_id: &str,
) -> Result<(), StoreError> {
    if data.properties.iter().any(|p| p.id == property_id) {
        Ok(())
    } else {
        Err(StoreError::MissingReference {
            kind,
            id: id.to_string(),
            target: "Property",
            target_id: property_id.to_string(),
        })
    }
}

fn check_tenant(
    data: &Snapshot,
    kind: &'static str,
    id: &str,
    tenant_id: &str,
) -> Result<(), StoreError> {
    if data.tenants.iter().any(|t| t.id == tenant_id) {
        Ok(())
    } else {
        Err(StoreError::MissingReference {
            kind,
            id: id.to_string(),
            target: "Tenant",
            target_id: tenant_id.to_string(),
        })
    }
}

fn check_payment_refs(data: &Snapshot, payment: &Payment) -> Result<(), StoreError> {
    check_property(data, "Payment", &payment.id, &payment.property_id)?;
    if let Some(tenant_id) = &payment.tenant_id {
        check_tenant(data, "Payment", &payment.id, tenant_id)?;
    }
    Ok(())
}

fn check_repair_refs(data: &Snapshot, request: &RepairRequest) -> Result<(), StoreError> {
    check_property(data, "RepairRequest", &request.id, &request.property_id)?;
    check_tenant(data, "RepairRequest", &request.id, &request.tenant_id)
}
