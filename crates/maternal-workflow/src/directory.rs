//! 行政与机构目录
//!
//! 省 -> 卫生区(HGR) -> 卫生中心

use maternal_core::{HealthStructure, MaternalError, Province, Result, StructureType, ZoneDeSante};
use serde::{Deserialize, Serialize};

/// 机构目录
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDirectory {
    pub provinces: Vec<Province>,
    pub zones: Vec<ZoneDeSante>,
    pub structures: Vec<HealthStructure>,
}

impl HealthDirectory {
    /// 北基伍省初始目录
    pub fn north_kivu() -> Self {
        let province = |id: &str, name: &str| Province {
            id: id.to_string(),
            name: name.to_string(),
        };
        let zone = |id: &str, name: &str, hgr_id: &str, hgr_name: &str| ZoneDeSante {
            id: id.to_string(),
            name: name.to_string(),
            province_id: "NK".to_string(),
            hgr_id: hgr_id.to_string(),
            hgr_name: Some(hgr_name.to_string()),
        };
        let cs = |id: &str, name: &str, zone_id: &str| HealthStructure {
            id: id.to_string(),
            name: name.to_string(),
            structure_type: StructureType::Cs,
            zone_id: zone_id.to_string(),
            province_id: "NK".to_string(),
        };

        Self {
            provinces: vec![province("NK", "Nord-Kivu")],
            zones: vec![
                zone("GOMA", "Zone Goma", "HGR-GOMA", "HGR Provincial Nord-Kivu"),
                zone("NYIRAGONGO", "Zone Nyiragongo", "HGR-NYI", "HGR Nyiragongo"),
                zone("KARISIMBI", "Zone Karisimbi", "HGR-KAR", "HGR Karisimbi"),
            ],
            structures: vec![
                cs("HEAL", "Heal Africa", "GOMA"),
                cs("MOTCARMEL", "CS Mot Carmel", "GOMA"),
                cs("RUSAYO", "CS Rusayo", "NYIRAGONGO"),
                cs("KIZIBA", "CS Kiziba", "NYIRAGONGO"),
                cs("MABANGA", "CS Mabanga Sud", "KARISIMBI"),
                cs("METHODISTE", "CS Méthodiste", "KARISIMBI"),
            ],
        }
    }

    pub fn province(&self, id: &str) -> Result<&Province> {
        self.provinces
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| MaternalError::NotFound(format!("省 {} 不存在", id)))
    }

    pub fn zone(&self, id: &str) -> Result<&ZoneDeSante> {
        self.zones
            .iter()
            .find(|z| z.id == id)
            .ok_or_else(|| MaternalError::NotFound(format!("卫生区 {} 不存在", id)))
    }

    pub fn zones_in(&self, province_id: &str) -> Vec<&ZoneDeSante> {
        self.zones.iter().filter(|z| z.province_id == province_id).collect()
    }

    /// 卫生区内的卫生中心
    pub fn structures_in(&self, zone_id: &str) -> Vec<&HealthStructure> {
        self.structures.iter().filter(|s| s.zone_id == zone_id).collect()
    }

    /// 卫生区的参考医院
    pub fn hgr_of(&self, zone_id: &str) -> Result<HealthStructure> {
        let zone = self.zone(zone_id)?;
        Ok(HealthStructure {
            id: zone.hgr_id.clone(),
            name: zone.hgr_name.clone().unwrap_or_else(|| zone.name.clone()),
            structure_type: StructureType::Hgr,
            zone_id: zone.id.clone(),
            province_id: zone.province_id.clone(),
        })
    }

    /// 按编号查找机构，包括各卫生区的 HGR
    pub fn structure(&self, id: &str) -> Result<HealthStructure> {
        if let Some(cs) = self.structures.iter().find(|s| s.id == id) {
            return Ok(cs.clone());
        }
        match self.zones.iter().find(|z| z.hgr_id == id) {
            Some(zone) => self.hgr_of(&zone.id),
            None => Err(MaternalError::NotFound(format!("机构 {} 不存在", id))),
        }
    }
}
