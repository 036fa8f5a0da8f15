//! SeaORM implementation of StationRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use tracing::debug;

use super::db_err;
use crate::domain::station::StationRepository;
use crate::domain::{BootInfo, DomainResult, Station};
use crate::infrastructure::database::entities::station;

pub struct SeaOrmStationRepository {
    db: DatabaseConnection,
}

impl SeaOrmStationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn model_to_domain(m: station::Model) -> Station {
    Station {
        station_id: m.station_id,
        name: m.name,
        username: m.username,
        password: m.password,
        client_cert_thumbprint: m.client_cert_thumbprint,
        vendor: m.vendor,
        model: m.model,
        charge_point_serial: m.charge_point_serial,
        charge_box_serial: m.charge_box_serial,
        firmware_version: m.firmware_version,
        iccid: m.iccid,
        imsi: m.imsi,
        meter_type: m.meter_type,
        meter_serial: m.meter_serial,
        current_time: m.clock_time,
        heartbeat_interval: m.heartbeat_interval,
        last_seen: m.last_seen,
    }
}

fn domain_to_active(s: Station) -> station::ActiveModel {
    station::ActiveModel {
        station_id: Set(s.station_id),
        name: Set(s.name),
        username: Set(s.username),
        password: Set(s.password),
        client_cert_thumbprint: Set(s.client_cert_thumbprint),
        vendor: Set(s.vendor),
        model: Set(s.model),
        charge_point_serial: Set(s.charge_point_serial),
        charge_box_serial: Set(s.charge_box_serial),
        firmware_version: Set(s.firmware_version),
        iccid: Set(s.iccid),
        imsi: Set(s.imsi),
        meter_type: Set(s.meter_type),
        meter_serial: Set(s.meter_serial),
        clock_time: Set(s.current_time),
        heartbeat_interval: Set(s.heartbeat_interval),
        last_seen: Set(s.last_seen),
    }
}

#[async_trait]
impl StationRepository for SeaOrmStationRepository {
    async fn find_by_id(&self, station_id: &str) -> DomainResult<Option<Station>> {
        let model = station::Entity::find_by_id(station_id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn save(&self, s: Station) -> DomainResult<()> {
        let exists = station::Entity::find_by_id(s.station_id.clone())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .is_some();
        let model = domain_to_active(s);
        if exists {
            model.update(&self.db).await.map_err(db_err)?;
        } else {
            model.insert(&self.db).await.map_err(db_err)?;
        }
        Ok(())
    }

    async fn apply_boot(&self, station_id: &str, boot: &BootInfo, now: DateTime<Utc>) -> DomainResult<bool> {
        let Some(existing) = station::Entity::find_by_id(station_id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?
        else {
            return Ok(false);
        };

        debug!(station_id, vendor = boot.vendor.as_str(), "Persisting boot metadata");
        let mut model: station::ActiveModel = existing.into();
        model.vendor = Set(Some(boot.vendor.clone()));
        model.model = Set(Some(boot.model.clone()));
        model.charge_point_serial = Set(boot.charge_point_serial.clone());
        model.charge_box_serial = Set(boot.charge_box_serial.clone());
        model.firmware_version = Set(boot.firmware_version.clone());
        model.iccid = Set(boot.iccid.clone());
        model.imsi = Set(boot.imsi.clone());
        model.meter_type = Set(boot.meter_type.clone());
        model.meter_serial = Set(boot.meter_serial.clone());
        model.clock_time = Set(Some(now));
        model.last_seen = Set(Some(now));
        model.update(&self.db).await.map_err(db_err)?;
        Ok(true)
    }

    async fn touch(&self, station_id: &str, now: DateTime<Utc>) -> DomainResult<bool> {
        let Some(existing) = station::Entity::find_by_id(station_id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?
        else {
            return Ok(false);
        };
        let mut model: station::ActiveModel = existing.into();
        model.last_seen = Set(Some(now));
        model.update(&self.db).await.map_err(db_err)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::repositories::test_support::memory_db;

    #[tokio::test]
    async fn boot_updates_only_known_stations() {
        let repo = SeaOrmStationRepository::new(memory_db().await);
        repo.save(Station::new("CP1")).await.unwrap();

        let boot = BootInfo {
            vendor: "Acme".into(),
            model: "Fast".into(),
            firmware_version: Some("1.2".into()),
            ..Default::default()
        };
        let now = Utc::now();
        assert!(repo.apply_boot("CP1", &boot, now).await.unwrap());
        assert!(!repo.apply_boot("CP2", &boot, now).await.unwrap());

        let stored = repo.find_by_id("CP1").await.unwrap().unwrap();
        assert_eq!(stored.vendor.as_deref(), Some("Acme"));
        assert_eq!(stored.firmware_version.as_deref(), Some("1.2"));
        assert!(stored.last_seen.is_some());
    }
}
