//! Autonomous system repository.

use redb::{Database, ReadableDatabase, ReadableTable};

use crate::error::StateResult;
use crate::store::{count, decode, encode};
use crate::tables::AUTONOMOUS_SYSTEMS;
use crate::types::{AsNumber, AutonomousSystem};

pub struct AutonomousSystems<'a> {
    pub(crate) db: &'a Database,
}

impl AutonomousSystems<'_> {
    /// Insert or update an AS record. Idempotent for repeated ingestion.
    pub fn put(&self, system: &AutonomousSystem) -> StateResult<()> {
        let value = encode(system)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(AUTONOMOUS_SYSTEMS).map_err(map_err!(Table))?;
            table
                .insert(system.number, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    pub fn get(&self, number: AsNumber) -> StateResult<Option<AutonomousSystem>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(AUTONOMOUS_SYSTEMS).map_err(map_err!(Table))?;
        match table.get(number).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    pub fn count(&self) -> StateResult<u64> {
        count(self.db, AUTONOMOUS_SYSTEMS)
    }
}

#[cfg(test)]
mod tests {
    use crate::{AutonomousSystem, StateStore};

    #[test]
    fn put_is_an_upsert() {
        let store = StateStore::open_in_memory().unwrap();
        let mut system = AutonomousSystem {
            number: 3333,
            name: "RIPE-NCC".to_string(),
        };
        store.autonomous_systems().put(&system).unwrap();
        system.name = "RIPE-NCC-AS".to_string();
        store.autonomous_systems().put(&system).unwrap();

        assert_eq!(store.autonomous_systems().count().unwrap(), 1);
        assert_eq!(store.autonomous_systems().get(3333).unwrap(), Some(system));
        assert!(store.autonomous_systems().get(1).unwrap().is_none());
    }
}
