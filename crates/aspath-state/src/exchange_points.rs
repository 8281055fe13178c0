//! Exchange point repository.

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::StateResult;
use crate::store::{count, decode, encode, next_id};
use crate::tables::EXCHANGE_POINTS;
use crate::types::{ExchangePoint, ExchangePointId};

pub struct ExchangePoints<'a> {
    pub(crate) db: &'a Database,
}

impl ExchangePoints<'_> {
    /// Create an exchange point with a freshly allocated id.
    pub fn create(&self, name: &str) -> StateResult<ExchangePoint> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let id = next_id(&txn, "exchange_points")?;
        let exchange_point = ExchangePoint {
            id,
            name: name.to_string(),
            country: None,
            city: None,
            website: None,
        };
        let value = encode(&exchange_point)?;
        {
            let mut table = txn.open_table(EXCHANGE_POINTS).map_err(map_err!(Table))?;
            table
                .insert(id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id, %name, "exchange point created");
        Ok(exchange_point)
    }

    /// Insert or replace an exchange point record (administrative edits).
    pub fn put(&self, exchange_point: &ExchangePoint) -> StateResult<()> {
        let value = encode(exchange_point)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(EXCHANGE_POINTS).map_err(map_err!(Table))?;
            table
                .insert(exchange_point.id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    pub fn get(&self, id: ExchangePointId) -> StateResult<Option<ExchangePoint>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(EXCHANGE_POINTS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// List all exchange points, ordered by id.
    pub fn list(&self) -> StateResult<Vec<ExchangePoint>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(EXCHANGE_POINTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(decode(value.value())?);
        }
        Ok(results)
    }

    pub fn count(&self) -> StateResult<u64> {
        count(self.db, EXCHANGE_POINTS)
    }
}
