//! Monitoring alerts and the records attached to them

use crate::error::{ComputeError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudplane_sync::Actor;
use cloudplane_task::{DeletableModel, SubjectRef};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

pub const ALERT_KEYWORD: &str = "commonalert";
pub const DELETE_ALERT_TASK: &str = "DeleteAlertRecordTask";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonAlert {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl CommonAlert {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            enabled: true,
            created_at: Utc::now(),
        }
    }

    pub fn subject(&self) -> SubjectRef {
        SubjectRef::new(ALERT_KEYWORD, &self.id, &self.name)
    }
}

/// One firing of an alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: String,
    pub alert_id: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    alerts: Vec<CommonAlert>,
    records: Vec<AlertRecord>,
    /// Records referenced by an in-flight notification
    held: HashSet<String>,
}

/// Alert table with its attached records
#[derive(Debug, Default)]
pub struct AlertTable {
    tables: Mutex<Tables>,
}

impl AlertTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|e| ComputeError::Poisoned(e.to_string()))
    }

    pub fn create_alert(&self, name: &str) -> Result<CommonAlert> {
        let alert = CommonAlert::new(name);
        self.tables()?.alerts.push(alert.clone());
        Ok(alert)
    }

    pub fn get_alert(&self, id: &str) -> Result<CommonAlert> {
        self.tables()?
            .alerts
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| ComputeError::AlertNotFound(id.to_string()))
    }

    pub fn add_record(&self, alert_id: &str, state: &str) -> Result<AlertRecord> {
        let mut tables = self.tables()?;
        if !tables.alerts.iter().any(|a| a.id == alert_id) {
            return Err(ComputeError::AlertNotFound(alert_id.to_string()));
        }
        let record = AlertRecord {
            id: uuid::Uuid::new_v4().to_string(),
            alert_id: alert_id.to_string(),
            state: state.to_string(),
            created_at: Utc::now(),
        };
        tables.records.push(record.clone());
        Ok(record)
    }

    pub fn records_of(&self, alert_id: &str) -> Result<Vec<AlertRecord>> {
        Ok(self
            .tables()?
            .records
            .iter()
            .filter(|r| r.alert_id == alert_id)
            .cloned()
            .collect())
    }

    /// Mark a record as in use; deleting it fails until released
    pub fn hold_record(&self, record_id: &str) -> Result<()> {
        self.tables()?.held.insert(record_id.to_string());
        Ok(())
    }

    pub fn release_record(&self, record_id: &str) -> Result<()> {
        self.tables()?.held.remove(record_id);
        Ok(())
    }

    /// Delete every record attached to `alert`, collecting failures
    pub fn delete_attached_records(&self, alert: &CommonAlert) -> Vec<ComputeError> {
        let mut tables = match self.tables() {
            Ok(tables) => tables,
            Err(e) => return vec![e],
        };
        let Tables { records, held, .. } = &mut *tables;
        let mut errors = Vec::new();
        records.retain(|r| {
            if r.alert_id != alert.id {
                return true;
            }
            if held.contains(&r.id) {
                errors.push(ComputeError::RecordHeld(r.id.clone()));
                return true;
            }
            false
        });
        errors
    }

    pub fn real_delete(&self, alert: &CommonAlert) -> Result<()> {
        let mut tables = self.tables()?;
        let before = tables.alerts.len();
        tables.alerts.retain(|a| a.id != alert.id);
        if tables.alerts.len() == before {
            return Err(ComputeError::AlertNotFound(alert.id.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl DeletableModel for AlertTable {
    type Object = CommonAlert;
    type Error = ComputeError;

    const DELETE_TASK: &'static str = DELETE_ALERT_TASK;

    async fn load(&self, id: &str) -> Result<CommonAlert> {
        self.get_alert(id)
    }

    async fn delete_dependents(&self, alert: &CommonAlert, actor: &Actor) -> Vec<ComputeError> {
        let errors = self.delete_attached_records(alert);
        tracing::debug!(
            "{} removed records of alert {}: {} failure(s)",
            actor,
            alert.name,
            errors.len()
        );
        errors
    }

    async fn real_delete(&self, alert: &CommonAlert, _actor: &Actor) -> Result<()> {
        AlertTable::real_delete(self, alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_attach_to_alerts() {
        let table = AlertTable::new();
        let alert = table.create_alert("cpu-high").unwrap();
        table.add_record(&alert.id, "alerting").unwrap();
        table.add_record(&alert.id, "ok").unwrap();

        assert_eq!(table.records_of(&alert.id).unwrap().len(), 2);
        assert!(matches!(
            table.add_record("nope", "ok"),
            Err(ComputeError::AlertNotFound(_))
        ));
    }

    #[test]
    fn test_held_records_survive_cleanup() {
        let table = AlertTable::new();
        let alert = table.create_alert("cpu-high").unwrap();
        let held = table.add_record(&alert.id, "alerting").unwrap();
        table.add_record(&alert.id, "ok").unwrap();
        table.hold_record(&held.id).unwrap();

        let errors = table.delete_attached_records(&alert);
        assert_eq!(errors.len(), 1);
        let left = table.records_of(&alert.id).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, held.id);

        table.release_record(&held.id).unwrap();
        assert!(table.delete_attached_records(&alert).is_empty());
        assert!(table.records_of(&alert.id).unwrap().is_empty());
    }

    #[test]
    fn test_real_delete() {
        let table = AlertTable::new();
        let alert = table.create_alert("disk-full").unwrap();
        table.real_delete(&alert).unwrap();
        assert!(table.get_alert(&alert.id).is_err());
        assert!(table.real_delete(&alert).is_err());
    }
}
