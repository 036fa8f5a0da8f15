//! SeaORM implementation of ConnectorRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter,
    QueryOrder, Set,
};

use super::db_err;
use crate::domain::connector::ConnectorRepository;
use crate::domain::{Connector, ConnectorUpdate, DomainResult};
use crate::infrastructure::database::entities::connector;

pub struct SeaOrmConnectorRepository {
    db: DatabaseConnection,
}

impl SeaOrmConnectorRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find_model(&self, station_id: &str, connector_id: i32) -> DomainResult<Option<connector::Model>> {
        connector::Entity::find()
            .filter(connector::Column::StationId.eq(station_id))
            .filter(connector::Column::ConnectorId.eq(connector_id))
            .one(&self.db)
            .await
            .map_err(db_err)
    }
}

fn model_to_domain(m: connector::Model) -> Connector {
    Connector {
        station_id: m.station_id,
        connector_id: m.connector_id,
        name: m.name,
        last_status: m.last_status,
        last_status_time: m.last_status_time,
        last_meter: m.last_meter,
        last_meter_time: m.last_meter_time,
        error_code: m.error_code,
        info: m.info,
        vendor_id: m.vendor_id,
        vendor_error_code: m.vendor_error_code,
    }
}

fn fill_active(model: &mut connector::ActiveModel, c: &Connector) {
    model.name = Set(c.name.clone());
    model.last_status = Set(c.last_status.clone());
    model.last_status_time = Set(c.last_status_time);
    model.last_meter = Set(c.last_meter);
    model.last_meter_time = Set(c.last_meter_time);
    model.error_code = Set(c.error_code.clone());
    model.info = Set(c.info.clone());
    model.vendor_id = Set(c.vendor_id.clone());
    model.vendor_error_code = Set(c.vendor_error_code.clone());
}

#[async_trait]
impl ConnectorRepository for SeaOrmConnectorRepository {
    async fn find(&self, station_id: &str, connector_id: i32) -> DomainResult<Option<Connector>> {
        Ok(self
            .find_model(station_id, connector_id)
            .await?
            .map(model_to_domain))
    }

    async fn upsert(
        &self,
        station_id: &str,
        connector_id: i32,
        update: &ConnectorUpdate,
    ) -> DomainResult<Connector> {
        match self.find_model(station_id, connector_id).await? {
            Some(existing) => {
                let mut merged = model_to_domain(existing.clone());
                merged.apply(update);
                let mut model: connector::ActiveModel = existing.into();
                fill_active(&mut model, &merged);
                model.update(&self.db).await.map_err(db_err)?;
                Ok(merged)
            }
            None => {
                let mut created = Connector::new(station_id, connector_id);
                created.apply(update);
                let mut model = connector::ActiveModel {
                    id: NotSet,
                    station_id: Set(station_id.to_string()),
                    connector_id: Set(connector_id),
                    ..Default::default()
                };
                fill_active(&mut model, &created);
                model.insert(&self.db).await.map_err(db_err)?;
                Ok(created)
            }
        }
    }

    async fn list_for_station(&self, station_id: &str) -> DomainResult<Vec<Connector>> {
        let models = connector::Entity::find()
            .filter(connector::Column::StationId.eq(station_id))
            .order_by_asc(connector::Column::ConnectorId)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }
}
