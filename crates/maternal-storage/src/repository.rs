//! 仓储接口与本地实现
//!
//! 每类实体一份 JSON 文档，无事务、后写覆盖。
//! 读取时损坏的文档视为空集合，写入时则拒绝覆盖损坏的文档。

use crate::collection::JsonCollection;
use crate::storage::{FileStore, KeyValueStore, MemoryStore};
use async_trait::async_trait;
use chrono::Utc;
use maternal_core::utils::{generate_record_id, REFERRAL_ID_PREFIX};
use maternal_core::{
    MaternalError, NewReferral, Partograph, PartographStatus, Patient, Referral, ReferralStatus,
    Result,
};
use std::path::Path;
use std::sync::Arc;

pub const PATIENTS_KEY: &str = "maternalcare_patients_v1";
pub const PARTOGRAPHS_KEY: &str = "maternalcare_partograms_v1";
pub const REFERRALS_KEY: &str = "maternalcare_referrals_v1";

/// 患者仓储
#[async_trait]
pub trait PatientRepository: Send + Sync {
    async fn get_all(&self) -> Result<Vec<Patient>>;
    async fn get_by_id(&self, id: &str) -> Result<Option<Patient>>;
    /// 新增或覆盖，返回带时间戳的已保存记录
    async fn save(&self, patient: Patient) -> Result<Patient>;
}

/// 产程图仓储
#[async_trait]
pub trait PartographRepository: Send + Sync {
    async fn get_active(&self) -> Result<Vec<Partograph>>;
    async fn get_all(&self) -> Result<Vec<Partograph>>;
    async fn get_by_id(&self, id: &str) -> Result<Option<Partograph>>;
    /// 新增或覆盖；已关闭的产程图不可再写
    async fn save(&self, partograph: Partograph) -> Result<Partograph>;
}

/// 转诊仓储
#[async_trait]
pub trait ReferralRepository: Send + Sync {
    async fn get_all(&self) -> Result<Vec<Referral>>;
    async fn get_by_id(&self, id: &str) -> Result<Option<Referral>>;
    /// 创建转诊并返回分配的编号
    async fn create(&self, referral: NewReferral) -> Result<String>;
    /// 将转诊推进到下一状态
    async fn advance_status(&self, id: &str) -> Result<Referral>;
}

/// 基于键值存储的本地仓储
#[derive(Debug)]
pub struct LocalStore {
    patients: JsonCollection<Patient>,
    partographs: JsonCollection<Partograph>,
    referrals: JsonCollection<Referral>,
}

impl LocalStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            patients: JsonCollection::new(PATIENTS_KEY, store.clone()),
            partographs: JsonCollection::new(PARTOGRAPHS_KEY, store.clone()),
            referrals: JsonCollection::new(REFERRALS_KEY, store),
        }
    }

    /// 以数据目录打开文件存储
    pub fn open(data_dir: impl AsRef<Path>) -> Self {
        tracing::info!("Opening local store at {}", data_dir.as_ref().display());
        Self::new(Arc::new(FileStore::new(data_dir)))
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }
}

#[async_trait]
impl PatientRepository for LocalStore {
    async fn get_all(&self) -> Result<Vec<Patient>> {
        Ok(self.patients.load().await)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Patient>> {
        Ok(self.patients.load().await.into_iter().find(|p| p.id == id))
    }

    async fn save(&self, mut patient: Patient) -> Result<Patient> {
        let mut all = self.patients.load_for_update().await?;
        let now = Utc::now();

        match all.iter().position(|p| p.id == patient.id) {
            Some(index) => {
                patient.created_at = all[index].created_at.or(patient.created_at);
                patient.updated_at = Some(now);
                all[index] = patient.clone();
                tracing::info!("Updated patient {}", patient.id);
            }
            None => {
                patient.created_at = Some(now);
                patient.updated_at = Some(now);
                all.push(patient.clone());
                tracing::info!("Registered patient {}", patient.id);
            }
        }

        self.patients.store(&all).await?;
        Ok(patient)
    }
}

#[async_trait]
impl PartographRepository for LocalStore {
    async fn get_active(&self) -> Result<Vec<Partograph>> {
        Ok(self
            .partographs
            .load()
            .await
            .into_iter()
            .filter(|p| p.status == PartographStatus::Active)
            .collect())
    }

    async fn get_all(&self) -> Result<Vec<Partograph>> {
        Ok(self.partographs.load().await)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Partograph>> {
        Ok(self.partographs.load().await.into_iter().find(|p| p.id == id))
    }

    async fn save(&self, mut partograph: Partograph) -> Result<Partograph> {
        let mut all = self.partographs.load_for_update().await?;
        let now = Utc::now();

        match all.iter().position(|p| p.id == partograph.id) {
            Some(index) => {
                if all[index].status == PartographStatus::Closed {
                    return Err(MaternalError::Workflow(format!(
                        "产程图 {} 已关闭，不可修改",
                        partograph.id
                    )));
                }
                partograph.created_at = all[index].created_at.or(partograph.created_at);
                partograph.updated_at = Some(now);
                all[index] = partograph.clone();
            }
            None => {
                partograph.created_at = Some(now);
                partograph.updated_at = Some(now);
                all.push(partograph.clone());
            }
        }

        self.partographs.store(&all).await?;
        tracing::debug!("Saved partograph {} ({:?})", partograph.id, partograph.status);
        Ok(partograph)
    }
}

#[async_trait]
impl ReferralRepository for LocalStore {
    async fn get_all(&self) -> Result<Vec<Referral>> {
        Ok(self.referrals.load().await)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Referral>> {
        Ok(self.referrals.load().await.into_iter().find(|r| r.id == id))
    }

    async fn create(&self, referral: NewReferral) -> Result<String> {
        let mut all = self.referrals.load_for_update().await?;

        let mut id = generate_record_id(REFERRAL_ID_PREFIX);
        while all.iter().any(|r| r.id == id) {
            id = generate_record_id(REFERRAL_ID_PREFIX);
        }

        let now = Utc::now();
        all.push(Referral {
            id: id.clone(),
            patient_id: referral.patient_id,
            from_structure_id: referral.from_structure_id,
            to_structure_id: referral.to_structure_id,
            priority: referral.priority,
            reason: referral.reason,
            status: ReferralStatus::Pending,
            created_at: Some(now),
            updated_at: Some(now),
        });

        self.referrals.store(&all).await?;
        tracing::info!("Created referral {}", id);
        Ok(id)
    }

    async fn advance_status(&self, id: &str) -> Result<Referral> {
        let mut all = self.referrals.load_for_update().await?;
        let referral = all
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| MaternalError::NotFound(format!("转诊 {} 不存在", id)))?;

        let next = referral.status.next().ok_or_else(|| MaternalError::InvalidStateTransition {
            from: format!("{:?}", referral.status),
            event: "Advance".to_string(),
        })?;

        tracing::info!("Referral {} moved from {:?} to {:?}", id, referral.status, next);
        referral.status = next;
        referral.updated_at = Some(Utc::now());
        let updated = referral.clone();

        self.referrals.store(&all).await?;
        Ok(updated)
    }
}
