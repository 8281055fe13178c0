//! Route collector repository.
//!
//! Collector names are unique; a name index is maintained next to the
//! primary table so lookups by URL key are a single point read.

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::store::{count, decode, encode, next_id};
use crate::tables::{COLLECTOR_NAMES, EXCHANGE_POINTS, ROUTE_COLLECTORS};
use crate::types::{CollectorId, ExchangePointId, RouteCollector};

pub struct RouteCollectors<'a> {
    pub(crate) db: &'a Database,
}

impl RouteCollectors<'_> {
    /// Register a collector under an existing exchange point.
    ///
    /// Fails with `NotFound` if the exchange point does not exist and with
    /// `DuplicateName` if another collector already uses `name`.
    pub fn create(&self, name: &str, exchange_point_id: ExchangePointId) -> StateResult<RouteCollector> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let exchange_points = txn.open_table(EXCHANGE_POINTS).map_err(map_err!(Table))?;
            if exchange_points
                .get(exchange_point_id)
                .map_err(map_err!(Read))?
                .is_none()
            {
                return Err(StateError::NotFound(format!(
                    "exchange point {exchange_point_id}"
                )));
            }
        }
        {
            let names = txn.open_table(COLLECTOR_NAMES).map_err(map_err!(Table))?;
            if names.get(name).map_err(map_err!(Read))?.is_some() {
                return Err(StateError::DuplicateName(format!("route collector {name}")));
            }
        }

        let id = next_id(&txn, "route_collectors")?;
        let collector = RouteCollector {
            id,
            name: name.to_string(),
            exchange_point_id,
            address: None,
        };
        let value = encode(&collector)?;
        {
            let mut table = txn.open_table(ROUTE_COLLECTORS).map_err(map_err!(Table))?;
            table
                .insert(id, value.as_slice())
                .map_err(map_err!(Write))?;
            let mut names = txn.open_table(COLLECTOR_NAMES).map_err(map_err!(Table))?;
            names.insert(name, id).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id, %name, exchange_point_id, "route collector created");
        Ok(collector)
    }

    /// Set or clear the peering address of a collector.
    pub fn set_address(
        &self,
        id: CollectorId,
        address: Option<&str>,
    ) -> StateResult<RouteCollector> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let collector;
        {
            let mut table = txn.open_table(ROUTE_COLLECTORS).map_err(map_err!(Table))?;
            let mut current: RouteCollector = match table.get(id).map_err(map_err!(Read))? {
                Some(guard) => decode(guard.value())?,
                None => return Err(StateError::NotFound(format!("route collector {id}"))),
            };
            current.address = address.map(str::to_string);
            let value = encode(&current)?;
            table
                .insert(id, value.as_slice())
                .map_err(map_err!(Write))?;
            collector = current;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id, address = ?collector.address, "route collector address set");
        Ok(collector)
    }

    pub fn get(&self, id: CollectorId) -> StateResult<Option<RouteCollector>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ROUTE_COLLECTORS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Resolve a collector by its unique name.
    pub fn by_name(&self, name: &str) -> StateResult<Option<RouteCollector>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let names = txn.open_table(COLLECTOR_NAMES).map_err(map_err!(Table))?;
        let Some(id) = names.get(name).map_err(map_err!(Read))?.map(|g| g.value()) else {
            return Ok(None);
        };
        let table = txn.open_table(ROUTE_COLLECTORS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Err(StateError::NotFound(format!(
                "route collector {id} (indexed as {name})"
            ))),
        }
    }

    /// List all collectors, ordered by id.
    pub fn list(&self) -> StateResult<Vec<RouteCollector>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ROUTE_COLLECTORS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(decode(value.value())?);
        }
        Ok(results)
    }

    /// List the collectors of one exchange point.
    pub fn list_for_exchange_point(
        &self,
        exchange_point_id: ExchangePointId,
    ) -> StateResult<Vec<RouteCollector>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|c| c.exchange_point_id == exchange_point_id)
            .collect())
    }

    pub fn count(&self) -> StateResult<u64> {
        count(self.db, ROUTE_COLLECTORS)
    }
}
